#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mediapicker::adapters::create_local_adapter;
use mediapicker::{Config, ConfigCommands, MediaPicker, UploadFile};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// `mediapicker` - browse, search, upload and select media in a local library.
#[derive(Parser, Debug)]
#[command(name = "mediapicker")]
#[command(version)]
#[command(about = "Headless media library picker.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List library items as JSON
    #[command(long_about = "\
List library items as JSON.

Prints the picker view (items, pagination, selection) after loading the \
requested number of pages.

Examples:
  mediapicker list
  mediapicker list --search beach
  mediapicker list --pages 3")]
    List {
        /// Case-insensitive name filter
        #[arg(short, long)]
        search: Option<String>,

        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,
    },

    /// Upload files into the library
    #[command(long_about = "\
Upload image and video files into the library.

Each file is uploaded independently; a failure on one file does not stop \
the others. Uploaded items are selected, so with --multiple every \
successful upload ends up in the printed selection.

Examples:
  mediapicker upload ./holiday.jpg
  mediapicker upload --multiple a.png b.mp4")]
    Upload {
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Keep every uploaded item selected instead of only the last
        #[arg(long)]
        multiple: bool,
    },

    /// Delete an item by id
    Delete {
        /// Media id as printed by `list`
        id: String,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init(cli.config_dir.as_deref().map(Path::new)).await?;

    match cli.command {
        Commands::List { search, pages } => list(&config, search, pages).await,
        Commands::Upload { paths, multiple } => upload(&config, paths, multiple).await,
        Commands::Delete { id } => delete(&config, &id).await,
        Commands::Config { config_command } => match config_command {
            ConfigCommands::Show => {
                let rendered =
                    toml::to_string_pretty(&config).context("Failed to render config")?;
                println!("{rendered}");
                Ok(())
            }
            ConfigCommands::Path => {
                println!("{}", config.config_path.display());
                Ok(())
            }
        },
    }
}

fn build_picker(config: &Config, multiple: Option<bool>) -> Result<MediaPicker> {
    let adapter = create_local_adapter(&config.library.dir, config.library.max_upload_bytes);
    let mut options = config.picker_options();
    if let Some(multiple) = multiple {
        options.multiple = multiple;
    }
    MediaPicker::new(adapter, options)
}

fn print_view(picker: &MediaPicker) -> Result<()> {
    let json = serde_json::to_string_pretty(&picker.view()).context("Failed to encode view")?;
    println!("{json}");
    Ok(())
}

async fn list(config: &Config, search: Option<String>, pages: u32) -> Result<()> {
    let picker = build_picker(config, None)?;
    match search {
        Some(query) => picker.submit_search(&query).await,
        None => picker.refresh().await,
    }

    for _ in 1..pages.max(1) {
        if !picker.view().has_more {
            break;
        }
        picker.load_more().await;
    }

    print_view(&picker)
}

async fn upload(config: &Config, paths: Vec<PathBuf>, multiple: bool) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(UploadFile::from_path(path).await?);
    }

    let picker = build_picker(config, Some(multiple || config.picker.multiple))?;
    let submitted = files.len();
    picker.upload_files(files);
    picker.settle_uploads().await;

    let uploaded = picker.view().items.len();
    info!(uploaded, submitted, "Upload finished");
    print_view(&picker)?;

    if uploaded < submitted {
        bail!("{} of {submitted} uploads failed", submitted - uploaded);
    }
    Ok(())
}

async fn delete(config: &Config, id: &str) -> Result<()> {
    let picker = build_picker(config, None)?;
    if !picker.delete_item(id).await {
        bail!("Failed to delete {id}");
    }
    println!("Deleted {id}");
    Ok(())
}
