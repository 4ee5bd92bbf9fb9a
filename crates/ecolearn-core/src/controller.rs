// ── State controller ──
//
// Top-level orchestrator for one asset-sync session. Owns the
// authoritative catalog and sequences cache, deduplicator, projection and
// view. Cheaply cloneable; every clone drives the same session.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ecolearn_api::{AssetClient, CardUpload, Endpoint, OneShotResponse, TlsMode, TransportConfig};

use crate::cache::{
    CacheOptions, Clock, FileSnapshot, KEY_ASSETS, KEY_CARDS, KEY_COUNTS, SnapshotStore,
    SystemClock, TtlCache,
};
use crate::config::{SyncConfig, TlsVerification};
use crate::error::CoreError;
use crate::event::{Event, Mutation};
use crate::fetch::FetchDeduplicator;
use crate::model::{AssetCounts, Catalog, Category, Item, ItemId, Upserted};
use crate::projection::{self, ProjectionFn, UNCATEGORIZED};
use crate::source::RemoteSource;
use crate::view::ViewSynchronizer;

const EVENT_CHANNEL_SIZE: usize = 256;

// ── Lifecycle ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Ready,
    Disposed,
}

/// What a `load_all` call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A fetch (or cache hit) was projected and installed.
    Loaded { items: usize },
    /// Data was already loaded and non-empty.
    AlreadyLoaded,
    /// Another call is loading right now.
    InProgress,
}

/// Handle returned by [`Controller::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

// ── Controller ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct CatalogState {
    catalog: Catalog,
    /// Items mutated while a load is running, replayed onto its result.
    journal: Option<Vec<Item>>,
}

struct ControllerInner {
    config: SyncConfig,
    source: Arc<dyn RemoteSource>,
    cache: TtlCache,
    dedup: FetchDeduplicator,
    view: Arc<ViewSynchronizer>,
    projection: ProjectionFn,
    state: Mutex<CatalogState>,
    loading: AtomicBool,
    loaded: AtomicBool,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_subscription: AtomicU64,
    /// Events in the order their changes were applied.
    pending: Mutex<VecDeque<Event>>,
    /// Held by whichever caller is currently delivering `pending`.
    delivering: Mutex<()>,
    event_tx: broadcast::Sender<Event>,
    lifecycle: watch::Sender<Lifecycle>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("lifecycle", &*self.inner.lifecycle.borrow())
            .field("loaded", &self.inner.loaded.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Clears the `loading` flag and journal however the load ends.
struct LoadGuard<'a> {
    inner: &'a ControllerInner,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        lock(&self.inner.state).journal = None;
        self.inner.loading.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Controller {
    /// Start building a controller around `config`.
    pub fn builder(config: SyncConfig) -> ControllerBuilder {
        ControllerBuilder::new(config)
    }

    /// Production wiring: HTTP source, file or memory cache, default view.
    pub fn from_config(config: SyncConfig) -> Result<Self, CoreError> {
        ControllerBuilder::new(config).build()
    }

    /// One-shot: init, run closure, dispose.
    pub async fn oneshot<F, Fut, T>(config: SyncConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let controller = Self::from_config(config)?;
        controller.init()?;
        let result = f(controller.clone()).await;
        controller.dispose();
        result
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &TtlCache {
        &self.inner.cache
    }

    pub fn view(&self) -> &Arc<ViewSynchronizer> {
        &self.inner.view
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Mark the controller ready. Calling it again is harmless; calling
    /// it after `dispose` is an error.
    pub fn init(&self) -> Result<(), CoreError> {
        let mut result = Ok(());
        self.inner.lifecycle.send_if_modified(|state| match *state {
            Lifecycle::Created => {
                *state = Lifecycle::Ready;
                true
            }
            Lifecycle::Ready => false,
            Lifecycle::Disposed => {
                result = Err(CoreError::Disposed);
                false
            }
        });
        if result.is_ok() {
            debug!(api_url = %self.inner.config.api_url, "controller ready");
        }
        result
    }

    /// Stop in-flight waits, flush the cache snapshot and drop every
    /// subscriber. The controller cannot be reused afterwards.
    pub fn dispose(&self) {
        if *self.inner.lifecycle.borrow() == Lifecycle::Disposed {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.cache.flush();
        lock(&self.inner.subscribers).clear();
        lock(&self.inner.pending).clear();
        self.inner.lifecycle.send_replace(Lifecycle::Disposed);
        debug!("controller disposed");
    }

    pub fn lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.inner.lifecycle.subscribe()
    }

    fn ensure_ready(&self) -> Result<(), CoreError> {
        match *self.inner.lifecycle.borrow() {
            Lifecycle::Ready => Ok(()),
            Lifecycle::Created => Err(CoreError::NotReady),
            Lifecycle::Disposed => Err(CoreError::Disposed),
        }
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Load the full catalog through the cache and render it.
    ///
    /// Safe to call from several triggers: a call made while another load
    /// is running, or after a non-empty catalog was loaded, does nothing.
    pub async fn load_all(&self) -> Result<LoadOutcome, CoreError> {
        self.ensure_ready()?;
        if self.inner.loaded.load(Ordering::SeqCst) && !lock(&self.inner.state).catalog.is_empty()
        {
            debug!("load_all: already loaded");
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        if self.inner.loading.swap(true, Ordering::SeqCst) {
            debug!("load_all: load already in flight");
            return Ok(LoadOutcome::InProgress);
        }
        lock(&self.inner.state).journal = Some(Vec::new());
        let _guard = LoadGuard { inner: &self.inner };

        match self.read_through(KEY_ASSETS, Endpoint::AssetRepository).await {
            Ok(payload) => {
                let catalog = (self.inner.projection)(&payload);
                Ok(self.install(catalog).await)
            }
            Err(e) => {
                warn!(error = %e, "catalog load failed");
                self.inner.view.show_error(e.to_string());
                self.notify(&Event::LoadFailed(e.clone()));
                Err(e)
            }
        }
    }

    /// Make `catalog` authoritative, replaying mutations that raced the
    /// load, then render it.
    async fn install(&self, mut catalog: Catalog) -> LoadOutcome {
        let (build, items, groups) = {
            let mut state = lock(&self.inner.state);
            for item in state.journal.take().unwrap_or_default() {
                catalog.upsert(item);
            }
            let items = catalog.item_list();
            let groups: Vec<String> = catalog.groups().map(|g| g.label.clone()).collect();
            state.catalog = catalog;
            self.inner.loaded.store(true, Ordering::SeqCst);
            // Enter `Populating` before releasing the catalog so any later
            // mutation is queued behind this build instead of racing it.
            let build = self.inner.view.begin_full(&items, &groups);
            self.enqueue(Event::Loaded {
                items: items.len(),
                groups: groups.len(),
            });
            (build, items, groups)
        };

        info!(items = items.len(), groups = groups.len(), "catalog loaded");
        self.deliver_pending();

        if let Some(generation) = build {
            self.inner.view.populate(generation, &items).await;
        }
        LoadOutcome::Loaded { items: items.len() }
    }

    /// Cached payload for `key`, or a deduplicated, retried fetch that
    /// stores its result in the cache before returning.
    async fn read_through(&self, key: &'static str, endpoint: Endpoint) -> Result<Value, CoreError> {
        if let Some(hit) = self.inner.cache.get(key) {
            debug!(key, "cache hit");
            return Ok(hit);
        }
        debug!(key, "cache miss");

        let source = Arc::clone(&self.inner.source);
        let cache = self.inner.cache.clone();
        let retry = self.inner.config.retry;
        let fetch = self.inner.dedup.fetch(key, move || async move {
            let payload = retry.run(key, || source.fetch(endpoint)).await?;
            cache.set(key, payload.clone());
            Ok(payload)
        });

        tokio::select! {
            result = fetch => result,
            () = self.inner.cancel.cancelled() => Err(CoreError::Disposed),
        }
    }

    /// Fetch the flat card list (fast path). Does not replace the
    /// authoritative catalog.
    pub async fn load_cards_fast(&self) -> Result<Catalog, CoreError> {
        self.ensure_ready()?;
        let payload = self.read_through(KEY_CARDS, Endpoint::CardsMinimal).await?;
        Ok(projection::project_minimal(&payload))
    }

    /// Fetch per-group counts. Seeds the view counters while no catalog
    /// has been loaded.
    pub async fn load_counts(&self) -> Result<AssetCounts, CoreError> {
        self.ensure_ready()?;
        let payload = self.read_through(KEY_COUNTS, Endpoint::AssetCounts).await?;
        let counts = projection::parse_counts(&payload).ok_or_else(|| CoreError::InvalidPayload {
            message: "asset counts payload has no `counts` object".into(),
        })?;
        if !self.inner.loaded.load(Ordering::SeqCst) {
            self.inner.view.apply_counts(&counts);
        }
        Ok(counts)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Apply a known-item change to the catalog and the view.
    ///
    /// The catalog lock is held across both updates, so concurrent
    /// mutations are serialized and group counters stay consistent.
    pub fn apply_mutation(&self, mutation: Mutation) -> Result<Arc<Item>, CoreError> {
        self.ensure_ready()?;

        let (event, item) = {
            let mut state = lock(&self.inner.state);
            let (mut item, is_update) = match mutation {
                Mutation::Add(item) => (item, false),
                Mutation::Update(item) => (item, true),
            };
            if item.color.is_none() {
                item.color = state
                    .catalog
                    .group(&item.group)
                    .and_then(|g| g.color.clone());
            }

            let journaled = state.journal.is_some().then(|| item.clone());
            let upserted = if is_update {
                let id = item.id.to_string();
                state
                    .catalog
                    .update(item)
                    .ok_or(CoreError::ItemNotFound { id })?
            } else {
                state.catalog.upsert(item)
            };
            if let (Some(journal), Some(item)) = (state.journal.as_mut(), journaled) {
                journal.push(item);
            }

            let (event, item) = match upserted {
                Upserted::Added(item) => {
                    self.inner.view.apply_add(Arc::clone(&item));
                    (Event::Added(Arc::clone(&item)), item)
                }
                Upserted::Updated {
                    item,
                    previous_group,
                } => {
                    self.inner.view.apply_update(Arc::clone(&item));
                    let event = Event::Updated {
                        item: Arc::clone(&item),
                        previous_group,
                    };
                    (event, item)
                }
            };
            // Queued before the catalog lock is released, so event order
            // is mutation order.
            self.enqueue(event.clone());
            (event, item)
        };

        debug!(id = %item.id, event = event.name(), "mutation applied");
        self.deliver_pending();
        Ok(item)
    }

    /// Upload a card image and apply the returned record locally.
    ///
    /// Cached payloads that the upload made stale are dropped; nothing is
    /// re-fetched.
    pub async fn submit(&self, upload: CardUpload) -> Result<Arc<Item>, CoreError> {
        self.ensure_ready()?;
        let name = upload.card_name.clone();
        let category_id = upload.category_id;
        let replace = upload.replace_card_id.clone();

        let response = self.inner.source.submit(upload).await?;
        info!(
            card = %name,
            message = response.message.as_deref().unwrap_or_default(),
            "card upload accepted"
        );

        let keys = [KEY_ASSETS, KEY_CARDS, KEY_COUNTS];
        self.inner.cache.invalidate_keys(&keys);
        self.notify(&Event::Invalidated {
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
        });

        let item = item_from_upload(&response, &name, category_id, replace.as_deref())?;
        let known = lock(&self.inner.state).catalog.get(&item.id).is_some();
        let mutation = if known {
            Mutation::Update(item)
        } else {
            Mutation::Add(item)
        };
        self.apply_mutation(mutation)
    }

    // ── Invalidation ─────────────────────────────────────────────────

    /// Drop one cached payload; the next `load_all` fetches again.
    pub fn invalidate(&self, key: &str) {
        self.inner.cache.invalidate(key);
        self.inner.loaded.store(false, Ordering::SeqCst);
        self.notify(&Event::Invalidated {
            keys: vec![key.to_owned()],
        });
    }

    /// Drop every cached payload, empty the catalog and return the view
    /// to `Empty`. Both are cleared under the catalog lock, so a mutation
    /// before the next load sees the same empty state in each.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        {
            let mut state = lock(&self.inner.state);
            state.catalog = Catalog::new();
            self.inner.loaded.store(false, Ordering::SeqCst);
            self.inner.view.reset();
            self.enqueue(Event::Invalidated { keys: Vec::new() });
        }
        self.deliver_pending();
    }

    // ── Subscribers ──────────────────────────────────────────────────

    /// Register a callback. Callbacks run synchronously, in registration
    /// order. Events arrive in the order their changes were applied; an
    /// event raised from inside a callback is delivered after it returns.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        lock(&self.inner.subscribers).push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.inner.subscribers);
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    /// Async event stream. Lagging receivers miss events rather than
    /// blocking the controller.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.event_tx.subscribe()
    }

    fn notify(&self, event: &Event) {
        self.enqueue(event.clone());
        self.deliver_pending();
    }

    fn enqueue(&self, event: Event) {
        lock(&self.inner.pending).push_back(event);
    }

    /// Deliver queued events one at a time. Only one caller delivers at
    /// once; a caller that finds delivery busy leaves its event to the
    /// current deliverer, which re-checks the queue after letting go.
    fn deliver_pending(&self) {
        loop {
            let guard = match self.inner.delivering.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let Some(event) = lock(&self.inner.pending).pop_front() else {
                    break;
                };
                self.dispatch(&event);
            }
            drop(guard);
            if lock(&self.inner.pending).is_empty() {
                return;
            }
        }
    }

    fn dispatch(&self, event: &Event) {
        // Clone out of the lock so a callback may (un)subscribe.
        let callbacks: Vec<(SubscriptionId, Callback)> = lock(&self.inner.subscribers).clone();
        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(subscription = id.0, event = event.name(), "subscriber panicked");
            }
        }
        let _ = self.inner.event_tx.send(event.clone());
    }

    // ── Read accessors ───────────────────────────────────────────────

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::SeqCst)
    }

    pub fn item(&self, id: &ItemId) -> Option<Arc<Item>> {
        lock(&self.inner.state).catalog.get(id).cloned()
    }

    pub fn items_in_group(&self, label: &str) -> Vec<Arc<Item>> {
        lock(&self.inner.state).catalog.items_in_group(label)
    }

    /// Copy of the authoritative catalog.
    pub fn catalog(&self) -> Catalog {
        lock(&self.inner.state).catalog.clone()
    }
}

/// Build the catalog item for an accepted upload. Prefers the full record
/// when the backend returned one.
fn item_from_upload(
    response: &OneShotResponse,
    name: &str,
    category_id: u32,
    replace: Option<&str>,
) -> Result<Item, CoreError> {
    let label = Category::from_id(category_id)
        .map_or_else(|| UNCATEGORIZED.to_owned(), |c| c.to_string());

    if let Some(Value::Object(record)) = response.card.as_ref() {
        if let Some(mut item) = projection::item_from_record(record, None, None) {
            if item.group == UNCATEGORIZED {
                item.group = label;
            }
            return Ok(item);
        }
    }

    let id = response
        .card_id
        .as_ref()
        .and_then(ItemId::from_json)
        .or_else(|| replace.map(ItemId::from))
        .ok_or_else(|| CoreError::InvalidPayload {
            message: "upload response carries no card id".into(),
        })?;

    let mut item = Item::new(id, name, label);
    item.image_path.clone_from(&response.image_path);
    if let Some(ref code) = response.card_code {
        item.fields.insert("card_code".into(), Value::String(code.clone()));
    }
    Ok(item)
}

// ── Builder ──────────────────────────────────────────────────────────

/// Assembles a [`Controller`] from injected collaborators, falling back to
/// production defaults for any that are not supplied.
pub struct ControllerBuilder {
    config: SyncConfig,
    source: Option<Arc<dyn RemoteSource>>,
    cache: Option<TtlCache>,
    view: Option<Arc<ViewSynchronizer>>,
    projection: ProjectionFn,
    clock: Option<Arc<dyn Clock>>,
    snapshot: Option<Arc<dyn SnapshotStore>>,
}

impl ControllerBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            source: None,
            cache: None,
            view: None,
            projection: projection::project,
            clock: None,
            snapshot: None,
        }
    }

    #[must_use]
    pub fn source(mut self, source: Arc<dyn RemoteSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use a pre-built cache. Overrides `clock` and `snapshot`.
    #[must_use]
    pub fn cache(mut self, cache: TtlCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn view(mut self, view: Arc<ViewSynchronizer>) -> Self {
        self.view = Some(view);
        self
    }

    #[must_use]
    pub fn projection(mut self, projection: ProjectionFn) -> Self {
        self.projection = projection;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn snapshot(mut self, snapshot: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn build(self) -> Result<Controller, CoreError> {
        let config = self.config;

        let source = match self.source {
            Some(source) => source,
            None => Arc::new(http_source(&config)?) as Arc<dyn RemoteSource>,
        };

        let cache = self.cache.unwrap_or_else(|| {
            let snapshot = self.snapshot.or_else(|| {
                config.snapshot_path.as_ref().map(|path| {
                    Arc::new(FileSnapshot::new(path).with_quota(config.snapshot_quota))
                        as Arc<dyn SnapshotStore>
                })
            });
            TtlCache::open(
                CacheOptions {
                    ttl: config.cache_ttl,
                    debounce: config.persist_debounce,
                },
                snapshot,
                self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            )
        });

        let view = self
            .view
            .unwrap_or_else(|| Arc::new(ViewSynchronizer::new(config.chunk_size)));

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (lifecycle, _) = watch::channel(Lifecycle::Created);

        Ok(Controller {
            inner: Arc::new(ControllerInner {
                config,
                source,
                cache,
                dedup: FetchDeduplicator::new(),
                view,
                projection: self.projection,
                state: Mutex::new(CatalogState {
                    catalog: Catalog::new(),
                    journal: None,
                }),
                loading: AtomicBool::new(false),
                loaded: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                pending: Mutex::new(VecDeque::new()),
                delivering: Mutex::new(()),
                event_tx,
                lifecycle,
                cancel: CancellationToken::new(),
            }),
        })
    }
}

fn http_source(config: &SyncConfig) -> Result<AssetClient, CoreError> {
    let transport = TransportConfig {
        tls: match config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    };
    Ok(AssetClient::new(config.api_url.clone(), &transport)?)
}
