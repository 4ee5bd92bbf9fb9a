// ── Gallery and counter synchronization ──
//
// Holds the rendered reflection of the catalog: an ordered list of
// rendering units plus per-group counters. Every change happens under one
// short lock, so a patch or a chunk is never observed half-applied.
// Counters always equal the number of units per group, except after
// `apply_counts`, which seeds them before any unit exists.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tokio::sync::watch;
use tracing::{debug, info, trace};

use super::filter::GalleryFilter;
use super::surface::{
    GallerySnapshot, PatchOutcome, Placeholder, RenderOutcome, RenderUnit, SurfaceState,
};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::model::{AssetCounts, Item, ItemId};

type Predicate = Arc<dyn Fn(&RenderUnit) -> bool + Send + Sync>;

#[derive(Debug)]
enum Patch {
    Add(Arc<Item>),
    Update(Arc<Item>),
}

#[derive(Default)]
struct Surface {
    state: SurfaceState,
    units: Vec<RenderUnit>,
    index: HashMap<ItemId, usize>,
    placeholder: Option<Placeholder>,
    counters: IndexMap<String, usize>,
    total: usize,
    queued: VecDeque<Patch>,
    filter: Option<Predicate>,
    generation: u64,
}

impl Surface {
    fn visible_for(&self, unit: &RenderUnit) -> bool {
        self.filter.as_ref().is_none_or(|f| f(unit))
    }

    fn bump(&mut self, group: &str) {
        *self.counters.entry(group.to_owned()).or_insert(0) += 1;
        self.total += 1;
    }

    fn drop_count(&mut self, group: &str) {
        if let Some(n) = self.counters.get_mut(group) {
            *n = n.saturating_sub(1);
        }
        self.total = self.total.saturating_sub(1);
    }

    fn push_unit(&mut self, mut unit: RenderUnit) {
        unit.visible = self.visible_for(&unit);
        self.bump(&unit.group);
        self.index.insert(unit.id.clone(), self.units.len());
        self.units.push(unit);
    }

    /// Placeholder for the current units and filter. Errors stay until
    /// real content replaces them.
    fn refresh_placeholder(&mut self) {
        if self.units.is_empty() {
            if !matches!(self.placeholder, Some(Placeholder::Error(_))) {
                self.placeholder = Some(Placeholder::Empty);
            }
        } else if self.units.iter().any(|u| u.visible) {
            self.placeholder = None;
        } else {
            self.placeholder = Some(Placeholder::NoMatches);
        }
    }

    fn add(&mut self, unit: RenderUnit) {
        if self.index.contains_key(&unit.id) {
            self.update(unit);
            return;
        }
        if matches!(
            self.placeholder,
            Some(Placeholder::Empty | Placeholder::Error(_))
        ) {
            self.placeholder = None;
        }
        self.push_unit(unit);
        self.refresh_placeholder();
    }

    fn update(&mut self, mut unit: RenderUnit) {
        let Some(&pos) = self.index.get(&unit.id) else {
            self.add(unit);
            return;
        };
        let old_group = self.units[pos].group.clone();
        if old_group != unit.group {
            self.drop_count(&old_group);
            self.bump(&unit.group);
        }
        unit.visible = self.visible_for(&unit);
        self.units[pos] = unit;
        self.refresh_placeholder();
    }

    fn apply(&mut self, patch: Patch) {
        match patch {
            Patch::Add(item) => self.add(RenderUnit::from_item(&item)),
            Patch::Update(item) => self.update(RenderUnit::from_item(&item)),
        }
    }

    /// True only when every unit, in order, already shows its item and
    /// every group has a counter. A reload that renames or moves an item
    /// must rebuild.
    fn is_synced_with(&self, items: &[Arc<Item>], groups: &[String]) -> bool {
        self.state == SurfaceState::Synced
            && self.units.len() == items.len()
            && self.units.iter().zip(items).all(|(unit, item)| unit.shows(item))
            && groups.iter().all(|g| self.counters.contains_key(g))
    }
}

/// Owner of the rendered gallery and group counters.
pub struct ViewSynchronizer {
    surface: Mutex<Surface>,
    chunk_size: usize,
    version: watch::Sender<u64>,
    units_created: AtomicU64,
}

impl std::fmt::Debug for ViewSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let surface = self.lock();
        f.debug_struct("ViewSynchronizer")
            .field("state", &surface.state)
            .field("units", &surface.units.len())
            .field("queued", &surface.queued.len())
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl Default for ViewSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ViewSynchronizer {
    pub fn new(chunk_size: usize) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            surface: Mutex::new(Surface::default()),
            chunk_size: chunk_size.max(1),
            version,
            units_created: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn changed(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn unit_for(&self, item: &Arc<Item>) -> RenderUnit {
        self.units_created.fetch_add(1, Ordering::Relaxed);
        RenderUnit::from_item(item)
    }

    // ── Full render ──────────────────────────────────────────────────

    /// Rebuild the gallery from `items`, registering `groups` as counters
    /// (so empty groups read zero).
    pub async fn render_full(&self, items: &[Arc<Item>], groups: &[String]) -> RenderOutcome {
        match self.begin_full(items, groups) {
            Some(generation) => self.populate(generation, items).await,
            None => RenderOutcome::Skipped,
        }
    }

    /// Synchronous half of a full render: decide whether to build and, if
    /// so, enter `Populating`. From here on patches are queued.
    pub(crate) fn begin_full(&self, items: &[Arc<Item>], groups: &[String]) -> Option<u64> {
        let mut s = self.lock();
        if s.state == SurfaceState::Populating {
            debug!("full render skipped: build already in progress");
            return None;
        }
        if s.is_synced_with(items, groups) {
            debug!(units = s.units.len(), "full render skipped: surface already synced");
            return None;
        }

        s.generation += 1;
        s.units.clear();
        s.index.clear();
        s.counters = groups.iter().map(|g| (g.clone(), 0)).collect();
        s.total = 0;
        s.state = SurfaceState::Populating;
        if !matches!(s.placeholder, Some(Placeholder::Error(_))) || !items.is_empty() {
            s.placeholder = None;
        }
        let generation = s.generation;
        drop(s);
        self.changed();
        Some(generation)
    }

    /// Asynchronous half: append `items` chunk by chunk, then drain any
    /// patches that arrived meanwhile.
    pub(crate) async fn populate(&self, generation: u64, items: &[Arc<Item>]) -> RenderOutcome {
        for (n, chunk) in items.chunks(self.chunk_size).enumerate() {
            let units: Vec<RenderUnit> = chunk.iter().map(|i| self.unit_for(i)).collect();
            {
                let mut s = self.lock();
                if s.generation != generation {
                    debug!(chunk = n, "full render abandoned");
                    return RenderOutcome::Abandoned;
                }
                for unit in units {
                    if s.index.contains_key(&unit.id) {
                        s.update(unit);
                    } else {
                        s.push_unit(unit);
                    }
                }
            }
            trace!(chunk = n, size = chunk.len(), "chunk appended");
            self.changed();
            tokio::task::yield_now().await;
        }

        let mut s = self.lock();
        if s.generation != generation {
            return RenderOutcome::Abandoned;
        }
        let queued = s.queued.len();
        while let Some(patch) = s.queued.pop_front() {
            s.apply(patch);
        }
        s.refresh_placeholder();
        s.state = SurfaceState::Synced;
        let units = s.units.len();
        drop(s);
        self.changed();
        info!(units, queued, "gallery rendered");
        RenderOutcome::Rendered(units)
    }

    // ── Single-item patches ──────────────────────────────────────────

    /// Append one unit for `item` (or update it in place if its id is
    /// already rendered) and bump its group counter.
    pub fn apply_add(&self, item: Arc<Item>) -> PatchOutcome {
        self.patch(Patch::Add(item))
    }

    /// Replace the unit for `item` in place, moving its count between
    /// groups when the group changed. An id with no unit is appended.
    pub fn apply_update(&self, item: Arc<Item>) -> PatchOutcome {
        self.patch(Patch::Update(item))
    }

    fn patch(&self, patch: Patch) -> PatchOutcome {
        let mut s = self.lock();
        if s.state == SurfaceState::Populating {
            debug!(?patch, "patch queued behind running build");
            s.queued.push_back(patch);
            return PatchOutcome::Queued;
        }
        self.units_created.fetch_add(1, Ordering::Relaxed);
        s.apply(patch);
        s.state = SurfaceState::Synced;
        drop(s);
        self.changed();
        PatchOutcome::Applied
    }

    // ── Filtering ────────────────────────────────────────────────────

    /// Show only units matching `predicate`. Returns the visible count.
    ///
    /// The predicate stays active for units added later.
    pub fn apply_filter<F>(&self, predicate: F) -> usize
    where
        F: Fn(&RenderUnit) -> bool + Send + Sync + 'static,
    {
        let mut s = self.lock();
        let predicate: Predicate = Arc::new(predicate);
        let mut visible = 0;
        for unit in &mut s.units {
            unit.visible = predicate(unit);
            visible += usize::from(unit.visible);
        }
        s.filter = Some(predicate);
        if s.state != SurfaceState::Populating {
            s.refresh_placeholder();
        }
        drop(s);
        self.changed();
        visible
    }

    /// Convenience wrapper applying a [`GalleryFilter`].
    pub fn apply_gallery_filter(&self, filter: GalleryFilter) -> usize {
        if filter.is_empty() {
            self.clear_filter();
            return self.lock().units.len();
        }
        self.apply_filter(move |unit| filter.matches(unit))
    }

    pub fn clear_filter(&self) {
        let mut s = self.lock();
        s.filter = None;
        for unit in &mut s.units {
            unit.visible = true;
        }
        if s.state != SurfaceState::Populating {
            s.refresh_placeholder();
        }
        drop(s);
        self.changed();
    }

    // ── Counters, errors, reset ──────────────────────────────────────

    /// Seed counters from the counts endpoint. Used before any catalog
    /// has been rendered; a later full render recounts from units.
    pub fn apply_counts(&self, counts: &AssetCounts) {
        let mut s = self.lock();
        s.counters = counts
            .counts
            .iter()
            .map(|(label, n)| (label.clone(), usize::try_from(*n).unwrap_or(usize::MAX)))
            .collect();
        s.total = usize::try_from(counts.total).unwrap_or(usize::MAX);
        drop(s);
        self.changed();
    }

    /// Show an explicit error instead of a loading state.
    pub fn show_error(&self, message: impl Into<String>) {
        let mut s = self.lock();
        s.placeholder = Some(Placeholder::Error(message.into()));
        if s.state == SurfaceState::Populating {
            s.generation += 1;
            s.state = SurfaceState::Empty;
        }
        drop(s);
        self.changed();
    }

    /// Return to `Empty`, discarding units, counters, queued patches and
    /// any running build. The active filter survives.
    pub fn reset(&self) {
        let mut s = self.lock();
        s.generation += 1;
        s.state = SurfaceState::Empty;
        s.units.clear();
        s.index.clear();
        s.counters.clear();
        s.total = 0;
        s.queued.clear();
        s.placeholder = None;
        drop(s);
        self.changed();
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> SurfaceState {
        self.lock().state
    }

    pub fn snapshot(&self) -> GallerySnapshot {
        let s = self.lock();
        GallerySnapshot {
            state: s.state,
            units: s.units.clone(),
            placeholder: s.placeholder.clone(),
            counters: s.counters.clone(),
            total: s.total,
        }
    }

    /// Version counter that ticks on every visible change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Rendering units constructed since creation.
    pub fn units_created(&self) -> u64 {
        self.units_created.load(Ordering::Relaxed)
    }
}
