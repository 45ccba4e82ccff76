use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::picker::options::{
    PickerOptions, DEFAULT_DEBOUNCE_DELAY, DEFAULT_ERROR_DISPLAY_DELAY, DEFAULT_PAGE_SIZE,
    DEFAULT_SUCCESS_DISPLAY_DELAY,
};

const CONFIG_DIR_NAME: &str = ".mediapicker";
const CONFIG_FILE_NAME: &str = "config.toml";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level configuration, loaded from `~/.mediapicker/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Picker behaviour (`[picker]`).
    #[serde(default)]
    pub picker: PickerConfig,

    /// Directory-backed library used by the CLI (`[library]`).
    #[serde(default)]
    pub library: LibraryConfig,
}

/// Picker behaviour (`[picker]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerConfig {
    /// Allow selecting more than one item. Default: `false`.
    #[serde(default)]
    pub multiple: bool,
    /// Quiet period after the last keystroke before searching. Default: `500`.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Items requested per page. Default: `20`.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Restrict listing to one folder.
    #[serde(default)]
    pub folder_id: Option<String>,
    /// How long a finished upload stays visible. Default: `500`.
    #[serde(default = "default_success_display_ms")]
    pub success_display_ms: u64,
    /// How long a failed upload stays visible. Default: `3000`.
    #[serde(default = "default_error_display_ms")]
    pub error_display_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_DELAY.as_millis() as u64
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_success_display_ms() -> u64 {
    DEFAULT_SUCCESS_DISPLAY_DELAY.as_millis() as u64
}

fn default_error_display_ms() -> u64 {
    DEFAULT_ERROR_DISPLAY_DELAY.as_millis() as u64
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            multiple: false,
            debounce_ms: default_debounce_ms(),
            page_size: default_page_size(),
            folder_id: None,
            success_display_ms: default_success_display_ms(),
            error_display_ms: default_error_display_ms(),
        }
    }
}

/// Local library settings (`[library]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Where media files and the manifest live. Default: `~/.mediapicker/library`.
    #[serde(default = "default_library_dir")]
    pub dir: PathBuf,
    /// Reject uploads larger than this many bytes. Unset means no limit.
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,
}

fn default_library_dir() -> PathBuf {
    home_dir().join(CONFIG_DIR_NAME).join("library")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dir: default_library_dir(),
            max_upload_bytes: None,
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: home_dir().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            picker: PickerConfig::default(),
            library: LibraryConfig::default(),
        }
    }
}

fn home_dir() -> PathBuf {
    UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf())
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(CONFIG_DIR_NAME))
}

impl Config {
    /// Load `config.toml` from `config_dir` (default `~/.mediapicker`),
    /// writing a default file on first run.
    pub async fn load_or_init(config_dir: Option<&Path>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_config_dir()?,
        };
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(&config_dir).await.with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;

        let (mut config, initialized) = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            (config, false)
        } else {
            let mut config = Config::default();
            config.library.dir = config_dir.join("library");
            config.config_path = config_path.clone();
            config.save().await?;
            (config, true)
        };

        config.config_path = config_path;
        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            library = %config.library.dir.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.picker.page_size == 0 {
            anyhow::bail!("picker.page_size must be greater than 0");
        }
        if self
            .picker
            .folder_id
            .as_deref()
            .is_some_and(|f| f.trim().is_empty())
        {
            anyhow::bail!("picker.folder_id must not be blank when set");
        }
        if self.library.dir.as_os_str().is_empty() {
            anyhow::bail!("library.dir must not be empty");
        }
        if self.library.max_upload_bytes == Some(0) {
            anyhow::bail!("library.max_upload_bytes must be greater than 0 when set");
        }
        Ok(())
    }

    /// Apply `MEDIAPICKER_*` environment overrides. Unparseable values are
    /// ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("MEDIAPICKER_LIBRARY_DIR") {
            if !dir.is_empty() {
                self.library.dir = PathBuf::from(dir);
            }
        }

        if let Ok(raw) = std::env::var("MEDIAPICKER_PAGE_SIZE") {
            match raw.trim().parse::<u32>() {
                Ok(size) => self.picker.page_size = size,
                Err(error) => {
                    tracing::warn!("Ignoring invalid MEDIAPICKER_PAGE_SIZE={raw:?}: {error}");
                }
            }
        }

        if let Ok(raw) = std::env::var("MEDIAPICKER_DEBOUNCE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.picker.debounce_ms = ms,
                Err(error) => {
                    tracing::warn!("Ignoring invalid MEDIAPICKER_DEBOUNCE_MS={raw:?}: {error}");
                }
            }
        }
    }

    /// Picker options for this configuration. Initial selection is left
    /// empty; it is a per-session concern.
    pub fn picker_options(&self) -> PickerOptions {
        PickerOptions {
            multiple: self.picker.multiple,
            initial_selected: Vec::new(),
            debounce_delay: Duration::from_millis(self.picker.debounce_ms),
            page_size: self.picker.page_size,
            folder_id: self.picker.folder_id.clone(),
            success_display_delay: Duration::from_millis(self.picker.success_display_ms),
            error_display_delay: Duration::from_millis(self.picker.error_display_ms),
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;
        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let temp_path = parent_dir.join(format!(".{CONFIG_FILE_NAME}.tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&temp_path, toml_str)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.config_path)
            .await
            .with_context(|| format!("Failed to replace {}", self.config_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::{Mutex, MutexGuard};

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.picker.page_size, 20);
        assert_eq!(config.picker.debounce_ms, 500);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [picker]
            multiple = true
            page_size = 50

            [library]
            dir = "/srv/media"
            "#,
        )
        .unwrap();
        assert!(config.picker.multiple);
        assert_eq!(config.picker.page_size, 50);
        assert_eq!(config.picker.debounce_ms, 500);
        assert_eq!(config.library.dir, PathBuf::from("/srv/media"));
        assert!(config.library.max_upload_bytes.is_none());
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.picker.page_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn validate_rejects_empty_library_dir() {
        let mut config = Config::default();
        config.library.dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn picker_options_carry_timings() {
        let mut config = Config::default();
        config.picker.debounce_ms = 120;
        config.picker.error_display_ms = 1000;
        config.picker.folder_id = Some("trips".into());
        let options = config.picker_options();
        assert_eq!(options.debounce_delay, Duration::from_millis(120));
        assert_eq!(options.error_display_delay, Duration::from_millis(1000));
        assert_eq!(options.folder_id.as_deref(), Some("trips"));
        assert!(options.validate().is_ok());
    }

    // ── Env override helpers ─────────────────────────────────

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            "MEDIAPICKER_LIBRARY_DIR",
            "MEDIAPICKER_PAGE_SIZE",
            "MEDIAPICKER_DEBOUNCE_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Env override tests ───────────────────────────────────

    #[tokio::test]
    async fn env_overrides_replace_file_values() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("MEDIAPICKER_LIBRARY_DIR", "/srv/env-media");
        std::env::set_var("MEDIAPICKER_PAGE_SIZE", " 42 ");
        std::env::set_var("MEDIAPICKER_DEBOUNCE_MS", "75");
        config.apply_env_overrides();
        assert_eq!(config.library.dir, PathBuf::from("/srv/env-media"));
        assert_eq!(config.picker.page_size, 42);
        assert_eq!(config.picker.debounce_ms, 75);

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_overrides_ignore_unparseable_and_empty_values() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();
        config.picker.page_size = 30;
        let library = config.library.dir.clone();

        std::env::set_var("MEDIAPICKER_LIBRARY_DIR", "");
        std::env::set_var("MEDIAPICKER_PAGE_SIZE", "lots");
        std::env::set_var("MEDIAPICKER_DEBOUNCE_MS", "-5");
        config.apply_env_overrides();
        assert_eq!(config.library.dir, library);
        assert_eq!(config.picker.page_size, 30);
        assert_eq!(config.picker.debounce_ms, 500);

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_override_wins_over_loaded_file() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[picker]\npage_size = 5\n",
        )
        .unwrap();

        std::env::set_var("MEDIAPICKER_PAGE_SIZE", "12");
        let config = Config::load_or_init(Some(tmp.path())).await.unwrap();
        assert_eq!(config.picker.page_size, 12);

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn load_or_init_writes_then_reads_back() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();
        let created = Config::load_or_init(Some(tmp.path())).await.unwrap();
        assert!(tmp.path().join("config.toml").exists());
        assert_eq!(created.library.dir, tmp.path().join("library"));

        let mut edited = created.clone();
        edited.picker.page_size = 7;
        edited.save().await.unwrap();

        let loaded = Config::load_or_init(Some(tmp.path())).await.unwrap();
        assert_eq!(loaded.config_path, tmp.path().join("config.toml"));
        assert_eq!(loaded.picker.page_size, 7);
    }

    #[tokio::test]
    async fn load_or_init_rejects_malformed_file() {
        let _env_guard = env_override_lock().await;
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[picker\nbroken").unwrap();
        let err = Config::load_or_init(Some(tmp.path())).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
