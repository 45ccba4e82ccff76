//! Upload lifecycle: placeholder, progress, completion and delayed cleanup.

use futures::future::join_all;

use super::MediaPicker;
use crate::adapters::{AdapterError, ProgressReporter};
use crate::media::{TempId, UploadFile, UploadingItem};
use crate::store::UploadingPatch;

const FALLBACK_UPLOAD_ERROR: &str = "Upload failed";

impl MediaPicker {
    /// Start one independent upload per file and return their temp ids.
    ///
    /// Placeholders are registered before this returns, so the next view
    /// already shows them. Each lifecycle runs on its own task; one file's
    /// failure never affects another.
    pub fn upload_files(&self, files: Vec<UploadFile>) -> Vec<TempId> {
        let mut started = Vec::with_capacity(files.len());
        for file in files {
            let temp_id = self.register_placeholder(&file);
            let picker = self.clone();
            let task_id = temp_id.clone();
            let task = tokio::spawn(async move { picker.run_upload(task_id, file).await });

            let mut uploads = self.inner.uploads.lock();
            uploads.retain(|t| !t.is_finished());
            uploads.push(task);
            started.push(temp_id);
        }
        started
    }

    /// Wait until every upload started so far has finished its lifecycle,
    /// display delays included.
    pub async fn settle_uploads(&self) {
        loop {
            let pending: Vec<_> = self.inner.uploads.lock().drain(..).collect();
            if pending.is_empty() {
                return;
            }
            for outcome in join_all(pending).await {
                if let Err(e) = outcome {
                    if !e.is_cancelled() {
                        tracing::error!("Upload task ended abnormally: {e}");
                    }
                }
            }
        }
    }

    fn register_placeholder(&self, file: &UploadFile) -> TempId {
        let preview = self.inner.previews.create(file);
        self.update(|store| {
            let mut temp_id = TempId::generate();
            while store.state().uploading(&temp_id).is_some() {
                temp_id = TempId::generate();
            }
            let placeholder =
                UploadingItem::new(temp_id.clone(), preview.url().to_string(), file.name.clone());
            store.add_uploading_item(placeholder, preview);
            temp_id
        })
    }

    async fn run_upload(&self, temp_id: TempId, file: UploadFile) {
        let file_name = file.name.clone();
        tracing::debug!(temp_id = %temp_id, file = %file_name, size = file.size(), "Upload started");

        let progress = {
            let picker = self.clone();
            let temp_id = temp_id.clone();
            ProgressReporter::new(move |percent| {
                picker.update(|store| {
                    store.update_uploading_item(&temp_id, UploadingPatch::progress(percent));
                });
            })
        };

        match self.inner.adapter.upload(file, progress).await {
            Ok(media) => {
                self.update(|store| {
                    store.update_uploading_item(&temp_id, UploadingPatch::succeeded(media.clone()));
                });
                tokio::time::sleep(self.inner.options.success_display_delay).await;

                let multiple = self.inner.options.multiple;
                let id = media.id.clone();
                self.update(|store| {
                    store.replace_uploading_with_media(&temp_id, media);
                    store.select_item(&id, multiple);
                });
                tracing::info!(temp_id = %temp_id, id = %id, file = %file_name, "Upload complete");
            }
            Err(e) => {
                let message = upload_error_message(&e);
                tracing::error!(temp_id = %temp_id, file = %file_name, "Upload failed: {message}");
                self.update(|store| {
                    store.update_uploading_item(&temp_id, UploadingPatch::failed(message));
                });
                tokio::time::sleep(self.inner.options.error_display_delay).await;
                self.update(|store| store.remove_uploading_item(&temp_id));
            }
        }
    }
}

fn upload_error_message(error: &AdapterError) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        FALLBACK_UPLOAD_ERROR.to_string()
    } else {
        message
    }
}
