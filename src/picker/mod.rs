//! Picker orchestrator.
//!
//! [`MediaPicker`] bridges a [`MediaAdapter`] and a [`PickerStore`]. It owns
//! every asynchronous concern of the widget: debounced search, supersession
//! of stale listing requests, pagination, upload lifecycles and deletion.
//! Adapter failures are converted into state or return values here and never
//! escape to the presentation layer.
//!
//! The store sits behind a `parking_lot::Mutex` that is never held across an
//! `.await`, so each group of store mutations lands as one unit. Every
//! mutation republishes a [`PickerView`] on a `watch` channel.
//!
//! All methods that start background work call `tokio::spawn` and must run
//! inside a Tokio runtime.

pub mod options;
mod upload;

pub use options::PickerOptions;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adapters::{CancelToken, ListParams, MediaAdapter};
use crate::preview::PreviewRegistry;
use crate::store::{PickerState, PickerStore, PickerView};

struct Inner {
    adapter: Arc<dyn MediaAdapter>,
    options: PickerOptions,
    store: Mutex<PickerStore>,
    previews: PreviewRegistry,
    view_tx: watch::Sender<PickerView>,
    /// Query the last settled debounce fired with; listing requests use it.
    debounced_query: Mutex<String>,
    debounce_generation: AtomicU64,
    debounce_task: Mutex<Option<JoinHandle<()>>>,
    /// Token of the outstanding fresh (page 1) request, if any.
    fresh_token: Mutex<Option<CancelToken>>,
    /// Bumped under the store lock each time a fresh request is issued.
    fresh_epoch: AtomicU64,
    uploads: Mutex<Vec<JoinHandle<()>>>,
}

/// Kind of listing request. Appends remember the fresh epoch they were
/// issued in.
#[derive(Debug, Clone, Copy)]
enum Fetch {
    Fresh,
    Append { epoch: u64 },
}

impl Fetch {
    fn is_append(self) -> bool {
        matches!(self, Self::Append { .. })
    }
}

/// Handle to one picker instance. Clones share the same instance; separate
/// [`MediaPicker::new`] calls never share state.
#[derive(Clone)]
pub struct MediaPicker {
    inner: Arc<Inner>,
}

impl MediaPicker {
    pub fn new(adapter: Arc<dyn MediaAdapter>, options: PickerOptions) -> anyhow::Result<Self> {
        options.validate()?;
        let store = PickerStore::new(options.initial_selected_ids());
        let (view_tx, _) = watch::channel(store.state().view());
        tracing::debug!(
            adapter = adapter.name(),
            multiple = options.multiple,
            page_size = options.page_size,
            "Media picker created"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                adapter,
                options,
                store: Mutex::new(store),
                previews: PreviewRegistry::new(),
                view_tx,
                debounced_query: Mutex::new(String::new()),
                debounce_generation: AtomicU64::new(0),
                debounce_task: Mutex::new(None),
                fresh_token: Mutex::new(None),
                fresh_epoch: AtomicU64::new(0),
                uploads: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn options(&self) -> &PickerOptions {
        &self.inner.options
    }

    pub fn adapter(&self) -> &Arc<dyn MediaAdapter> {
        &self.inner.adapter
    }

    pub fn preview_registry(&self) -> &PreviewRegistry {
        &self.inner.previews
    }

    /// Current snapshot.
    pub fn state(&self) -> Arc<PickerState> {
        self.inner.store.lock().snapshot()
    }

    /// Current read projection.
    pub fn view(&self) -> PickerView {
        self.inner.store.lock().state().view()
    }

    /// Receiver that is notified with a fresh projection after every change.
    pub fn subscribe(&self) -> watch::Receiver<PickerView> {
        self.inner.view_tx.subscribe()
    }

    /// Run `f` against the store and republish the view if anything changed.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut PickerStore) -> R) -> R {
        let mut store = self.inner.store.lock();
        let before = store.snapshot();
        let out = f(&mut *store);
        if !Arc::ptr_eq(&before, &store.snapshot()) {
            self.inner.view_tx.send_replace(store.state().view());
        }
        out
    }

    // ── Selection ───────────────────────────────────────────────────

    pub fn toggle_selection(&self, id: &str) {
        let multiple = self.inner.options.multiple;
        self.update(|store| store.toggle_selection(id, multiple));
    }

    pub fn select_item(&self, id: &str) {
        let multiple = self.inner.options.multiple;
        self.update(|store| store.select_item(id, multiple));
    }

    pub fn deselect_item(&self, id: &str) {
        self.update(|store| store.deselect_item(id));
    }

    pub fn clear_selection(&self) {
        self.update(PickerStore::clear_selection);
    }

    // ── Listing ─────────────────────────────────────────────────────

    /// Record the query immediately and schedule a fresh fetch once input
    /// has been quiet for the debounce delay. Earlier pending schedules are
    /// superseded.
    pub fn set_search_query(&self, query: &str) {
        self.update(|store| store.set_search_query(query));

        let generation = self.inner.debounce_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.inner.options.debounce_delay;
        let picker = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if picker.inner.debounce_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let settled = picker.inner.store.lock().state().search_query.clone();
            tracing::debug!(query = %settled, "Search input settled");
            *picker.inner.debounced_query.lock() = settled;
            picker.fetch_fresh().await;
        });

        // A superseded schedule exits on its own; keep only the newest handle.
        *self.inner.debounce_task.lock() = Some(task);
    }

    /// Search for `query` right away, skipping the debounce. Any pending
    /// debounced search is superseded.
    pub async fn submit_search(&self, query: &str) {
        self.update(|store| store.set_search_query(query));
        self.inner.debounce_generation.fetch_add(1, Ordering::SeqCst);
        *self.inner.debounced_query.lock() = query.to_string();
        self.fetch_fresh().await;
    }

    /// Fresh fetch of page 1 for the current debounced query.
    pub async fn refresh(&self) {
        self.fetch_fresh().await;
    }

    /// Fetch and append the next page. Dropped (not queued) while a fetch is
    /// in flight or when the last page has been reached.
    pub async fn load_more(&self) {
        let params = self.update(|store| {
            let state = store.state();
            if state.is_loading || !state.has_more {
                return None;
            }
            let next_page = state.page + 1;
            store.set_page(next_page);
            store.set_loading(true);
            let epoch = self.inner.fresh_epoch.load(Ordering::SeqCst);
            Some((self.list_params(next_page), epoch))
        });

        match params {
            Some((params, epoch)) => {
                self.run_list(params, CancelToken::new(), Fetch::Append { epoch })
                    .await;
            }
            None => tracing::debug!("load_more ignored: loading or no more pages"),
        }
    }

    async fn fetch_fresh(&self) {
        let token = CancelToken::new();
        if let Some(previous) = self.inner.fresh_token.lock().replace(token.clone()) {
            previous.cancel();
        }

        let params = self.update(|store| {
            self.inner.fresh_epoch.fetch_add(1, Ordering::SeqCst);
            store.set_page(1);
            store.set_loading(true);
            self.list_params(1)
        });
        self.run_list(params, token, Fetch::Fresh).await;
    }

    fn list_params(&self, page: u32) -> ListParams {
        let query = self.inner.debounced_query.lock().clone();
        let search = Some(query.trim().to_string()).filter(|q| !q.is_empty());
        ListParams {
            search,
            folder_id: self.inner.options.folder_id.clone(),
            page: Some(page),
            limit: Some(self.inner.options.page_size),
        }
    }

    async fn run_list(&self, params: ListParams, token: CancelToken, fetch: Fetch) {
        let result = self.inner.adapter.list(&params, &token).await;

        // A newer fresh request owns the loading flag now.
        if token.is_cancelled() {
            tracing::debug!(page = ?params.page, search = ?params.search, "Discarding superseded listing");
            return;
        }

        match result {
            Ok(page) => {
                tracing::debug!(
                    count = page.items.len(),
                    total = page.total,
                    has_more = page.has_more,
                    append = fetch.is_append(),
                    "Listing loaded"
                );
                self.update(|store| {
                    if fetch.is_append() {
                        store.append_items(page.items);
                    } else {
                        store.set_items(page.items);
                    }
                    if !self.superseded(fetch) {
                        store.set_pagination(page.has_more, page.total);
                    }
                    self.finish_listing(store, fetch, &token);
                });
            }
            Err(e) if e.is_cancellation() => {
                tracing::debug!("Listing cancelled by adapter");
                self.update(|store| self.finish_listing(store, fetch, &token));
            }
            Err(e) => {
                tracing::error!(
                    adapter = self.inner.adapter.name(),
                    page = ?params.page,
                    search = ?params.search,
                    "Failed to load media: {e}"
                );
                self.update(|store| self.finish_listing(store, fetch, &token));
            }
        }
    }

    /// An append is superseded once a fresh request has been issued after
    /// it; its pagination then describes a listing that no longer applies.
    fn superseded(&self, fetch: Fetch) -> bool {
        match fetch {
            Fetch::Fresh => false,
            Fetch::Append { epoch } => self.inner.fresh_epoch.load(Ordering::SeqCst) != epoch,
        }
    }

    /// Runs under the store lock. A fresh request that is still in flight
    /// owns the loading flag, so an append leaves it set.
    fn finish_listing(&self, store: &mut PickerStore, fetch: Fetch, token: &CancelToken) {
        let mut fresh = self.inner.fresh_token.lock();
        match fetch {
            Fetch::Fresh => {
                if fresh.as_ref().is_some_and(|t| t.same_request(token)) {
                    *fresh = None;
                }
                store.set_loading(false);
            }
            Fetch::Append { .. } => {
                if fresh.is_none() {
                    store.set_loading(false);
                }
            }
        }
    }

    // ── Deletion ────────────────────────────────────────────────────

    /// Delete through the adapter. On failure nothing changes and `false` is
    /// returned; there is no retry.
    pub async fn delete_item(&self, id: &str) -> bool {
        match self.inner.adapter.delete(id).await {
            Ok(()) => {
                self.update(|store| store.remove_item(id));
                tracing::info!(id, "Media deleted");
                true
            }
            Err(e) => {
                tracing::error!(id, adapter = self.inner.adapter.name(), "Failed to delete media: {e}");
                false
            }
        }
    }

    // ── Teardown ────────────────────────────────────────────────────

    /// Stop all background work and return the store to its empty state.
    /// Previews of unfinished uploads are released.
    pub fn close(&self) {
        self.inner.debounce_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.inner.debounce_task.lock().take() {
            task.abort();
        }
        if let Some(token) = self.inner.fresh_token.lock().take() {
            token.cancel();
        }
        for task in self.inner.uploads.lock().drain(..) {
            task.abort();
        }
        self.inner.debounced_query.lock().clear();
        self.update(PickerStore::reset);
        tracing::debug!("Media picker closed");
    }
}
