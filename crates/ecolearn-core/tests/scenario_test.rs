// End-to-end catalog scenarios against a scripted source.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use ecolearn_api::{CardUpload, Endpoint, OneShotResponse};
use ecolearn_core::{
    Controller, CoreError, Item, ItemId, LoadOutcome, Mutation, RemoteSource, RetryPolicy,
    SurfaceState, SyncConfig, TtlCache,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Repository {
    payload: Value,
    fetches: AtomicUsize,
}

impl RemoteSource for Repository {
    fn fetch(&self, _endpoint: Endpoint) -> BoxFuture<'static, Result<Value, CoreError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let payload = self.payload.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(payload)
        }
        .boxed()
    }

    fn submit(&self, _upload: CardUpload) -> BoxFuture<'static, Result<OneShotResponse, CoreError>> {
        async { Err(CoreError::Internal("uploads are not scripted".into())) }.boxed()
    }
}

const GROUPS: [(&str, &str, usize); 4] = [
    ("Compostable", "green", 12),
    ("Recyclable", "blue", 15),
    ("Non-Recyclable", "gray", 10),
    ("Special Waste", "red", 9),
];

/// 46 cards split 12/15/10/9 across the four categories.
fn repository_payload() -> Value {
    let mut next_id = 1;
    let mut categories = serde_json::Map::new();
    for (label, color, count) in GROUPS {
        let cards: Vec<Value> = (0..count)
            .map(|_| {
                let id = next_id;
                next_id += 1;
                json!({"card_id": id, "card_name": format!("{label} card {id}")})
            })
            .collect();
        categories.insert(label.into(), json!({"bin_color": color, "cards": cards}));
    }
    json!({"status": "success", "total_cards": 46, "categories": categories})
}

fn controller() -> (Controller, Arc<Repository>) {
    let source = Arc::new(Repository {
        payload: repository_payload(),
        fetches: AtomicUsize::new(0),
    });
    let config = SyncConfig {
        chunk_size: 10,
        retry: RetryPolicy::none(),
        ..SyncConfig::default()
    };
    let ctrl = Controller::builder(config)
        .source(Arc::clone(&source) as Arc<dyn RemoteSource>)
        .cache(TtlCache::in_memory(Duration::from_secs(300)))
        .build()
        .unwrap();
    ctrl.init().unwrap();
    (ctrl, source)
}

/// Rendered ids match the catalog and every counter matches its group.
fn assert_view_matches_catalog(ctrl: &Controller) {
    let snap = ctrl.view().snapshot();
    let catalog = ctrl.catalog();

    let mut rendered = snap.ids();
    let mut authoritative: Vec<ItemId> = catalog.items().map(|i| i.id.clone()).collect();
    rendered.sort();
    authoritative.sort();
    assert_eq!(rendered, authoritative);

    for group in catalog.groups() {
        assert_eq!(snap.counter(&group.label), group.len(), "counter for {}", group.label);
    }
    assert_eq!(snap.total, catalog.len());
}

// ── Scenario ────────────────────────────────────────────────────────

#[tokio::test]
async fn forty_six_card_scenario() {
    let (ctrl, _) = controller();

    assert_eq!(ctrl.load_all().await.unwrap(), LoadOutcome::Loaded { items: 46 });
    let snap = ctrl.view().snapshot();
    assert_eq!(snap.state, SurfaceState::Synced);
    assert_eq!(snap.units.len(), 46);
    for (label, _, count) in GROUPS {
        assert_eq!(snap.counter(label), count, "{label}");
    }

    ctrl.apply_mutation(Mutation::Add(Item::new(47, "Test Item", "Compostable")))
        .unwrap();
    let snap = ctrl.view().snapshot();
    assert_eq!(snap.units.len(), 47);
    assert_eq!(snap.counter("Compostable"), 13);
    assert_eq!(snap.counter("Recyclable"), 15);
    assert_eq!(snap.counter("Non-Recyclable"), 10);
    assert_eq!(snap.counter("Special Waste"), 9);

    ctrl.apply_mutation(Mutation::Update(Item::new(47, "Test Item", "Recyclable")))
        .unwrap();
    let snap = ctrl.view().snapshot();
    assert_eq!(snap.units.len(), 47);
    assert_eq!(snap.counter("Compostable"), 12);
    assert_eq!(snap.counter("Recyclable"), 16);
    assert_eq!(snap.units[46].id, ItemId::Int(47));

    assert!(!ctrl.catalog().group("Compostable").unwrap().contains(&ItemId::Int(47)));
    assert!(ctrl.catalog().group("Recyclable").unwrap().contains(&ItemId::Int(47)));
    assert_view_matches_catalog(&ctrl);
}

#[tokio::test]
async fn gallery_preserves_load_order() {
    let (ctrl, _) = controller();
    ctrl.load_all().await.unwrap();

    let expected: Vec<ItemId> = (1..=46).map(ItemId::Int).collect();
    assert_eq!(ctrl.view().snapshot().ids(), expected);
}

#[tokio::test]
async fn concurrent_load_triggers_fetch_once() {
    let (ctrl, source) = controller();

    let (a, b, c) = tokio::join!(ctrl.load_all(), ctrl.load_all(), ctrl.load_all());
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, LoadOutcome::Loaded { .. }))
            .count(),
        1
    );
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(ctrl.view().snapshot().units.len(), 46);
}

#[tokio::test]
async fn mutation_during_load_is_neither_lost_nor_duplicated() {
    let (ctrl, source) = controller();

    let loader = {
        let ctrl = ctrl.clone();
        tokio::spawn(async move { ctrl.load_all().await })
    };
    // Mutate once the fetch is on the wire but before it lands.
    while source.fetches.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(!ctrl.is_loaded());
    ctrl.apply_mutation(Mutation::Add(Item::new(100, "Late Card", "Special Waste")))
        .unwrap();
    loader.await.unwrap().unwrap();

    let snap = ctrl.view().snapshot();
    assert_eq!(snap.units.len(), 47);
    assert_eq!(
        snap.units.iter().filter(|u| u.id == ItemId::Int(100)).count(),
        1
    );
    assert_eq!(snap.counter("Special Waste"), 10);
    assert_view_matches_catalog(&ctrl);
}

#[tokio::test]
async fn patch_sequence_keeps_view_and_catalog_aligned() {
    let (ctrl, _) = controller();
    ctrl.load_all().await.unwrap();

    let moves = [
        (3, "Special Waste"),
        (20, "Compostable"),
        (3, "Recyclable"),
        (46, "Non-Recyclable"),
        (20, "Compostable"),
    ];
    for (id, group) in moves {
        let before = ctrl.view().snapshot();
        let previous = ctrl.item(&ItemId::Int(id)).unwrap().group.clone();

        ctrl.apply_mutation(Mutation::Update(Item::new(id, format!("Card {id}"), group)))
            .unwrap();

        let after = ctrl.view().snapshot();
        let pair_before = before.counter(&previous) + before.counter(group);
        let pair_after = after.counter(&previous) + after.counter(group);
        assert_eq!(pair_before, pair_after, "conservation moving {id} to {group}");
        assert_eq!(after.ids(), before.ids(), "positions unchanged");
        assert_view_matches_catalog(&ctrl);
    }

    for id in 200..205 {
        ctrl.apply_mutation(Mutation::Add(Item::new(id, "New", "Recyclable")))
            .unwrap();
    }
    assert_view_matches_catalog(&ctrl);
    assert_eq!(ctrl.view().snapshot().units.len(), 51);
}

#[tokio::test]
async fn subscribers_see_events_in_order() {
    let (ctrl, _) = controller();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    ctrl.subscribe(move |event| sink.lock().unwrap().push(event.name()));

    ctrl.load_all().await.unwrap();
    ctrl.apply_mutation(Mutation::Add(Item::new(47, "Test Item", "Compostable")))
        .unwrap();
    ctrl.apply_mutation(Mutation::Update(Item::new(47, "Test Item", "Recyclable")))
        .unwrap();
    ctrl.invalidate_all();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["loaded", "add", "update", "invalidated"]
    );
}

#[tokio::test]
async fn filter_after_load_hides_without_rebuilding() {
    let (ctrl, _) = controller();
    ctrl.load_all().await.unwrap();
    let created = ctrl.view().units_created();

    let visible = ctrl.view().apply_gallery_filter(ecolearn_core::GalleryFilter::new(
        Some("Special Waste".into()),
        None,
    ));
    assert_eq!(visible, 9);
    assert_eq!(ctrl.view().units_created(), created);
}
