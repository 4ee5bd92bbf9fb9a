// Controller wired to a real `AssetClient` against wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ecolearn_core::{
    CardUpload, Controller, CoreError, FileSnapshot, Lifecycle, LoadOutcome, RetryPolicy,
    SnapshotStore, SyncConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer) -> SyncConfig {
    SyncConfig {
        api_url: server.uri().parse().unwrap(),
        retry: RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        ..SyncConfig::default()
    }
}

fn ready(config: SyncConfig) -> Controller {
    let ctrl = Controller::from_config(config).unwrap();
    ctrl.init().unwrap();
    ctrl
}

fn repository_body() -> serde_json::Value {
    json!({
        "status": "success",
        "total_cards": 2,
        "categories": {
            "Compostable": {"bin_color": "green", "cards": [
                {"card_id": 1, "card_name": "Banana Peel", "image_path": "/uploads/1.jpg"}
            ]},
            "Recyclable": {"bin_color": "blue", "cards": [
                {"card_id": 2, "card_name": "Can"}
            ]}
        }
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn load_all_fetches_once_and_then_serves_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-repository"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_body()))
        .expect(1)
        .mount(&server)
        .await;

    let ctrl = ready(config(&server));
    assert_eq!(ctrl.load_all().await.unwrap(), LoadOutcome::Loaded { items: 2 });

    // A fresh view over the same cache must not hit the network again.
    ctrl.view().reset();
    ctrl.invalidate("cards");
    assert_eq!(ctrl.load_all().await.unwrap(), LoadOutcome::Loaded { items: 2 });
}

#[tokio::test]
async fn concurrent_count_requests_share_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-counts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_json(json!({
                    "status": "success",
                    "total_cards": 46,
                    "counts": {"Compostable": 12, "Recyclable": 15,
                               "Non-Recyclable": 10, "Special Waste": 9}
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctrl = ready(config(&server));
    let (a, b, c) = tokio::join!(ctrl.load_counts(), ctrl.load_counts(), ctrl.load_counts());

    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(a.total, 46);
    assert_eq!(ctrl.view().snapshot().counter("Recyclable"), 15);
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-repository"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-repository"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_body()))
        .mount(&server)
        .await;

    let ctrl = ready(config(&server));
    assert_eq!(ctrl.load_all().await.unwrap(), LoadOutcome::Loaded { items: 2 });
}

#[tokio::test]
async fn error_envelope_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-repository"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "database unavailable"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctrl = ready(config(&server));
    let err = ctrl.load_all().await.unwrap_err();
    assert_eq!(
        err,
        CoreError::Api {
            message: "database unavailable".into(),
            status: None
        }
    );
    assert!(!ctrl.is_loaded());
}

#[tokio::test]
async fn upload_updates_view_and_drops_cached_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-repository"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/one-shot-learn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Card learned",
            "card_id": 3,
            "card_code": "REC-003",
            "image_path": "/uploads/3.jpg",
            "features_extracted": 480
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctrl = ready(config(&server));
    ctrl.load_all().await.unwrap();

    let item = ctrl
        .submit(CardUpload {
            card_name: "Glass Jar".into(),
            category_id: 2,
            file_name: "jar.jpg".into(),
            image: vec![0xff, 0xd8, 0xff],
            replace_card_id: None,
        })
        .await
        .unwrap();

    assert_eq!(item.group, "Recyclable");
    assert_eq!(item.color.as_deref(), Some("blue"));
    let snap = ctrl.view().snapshot();
    assert_eq!(snap.units.len(), 3);
    assert_eq!(snap.counter("Recyclable"), 2);
    assert!(ctrl.cache().get("assets").is_none());
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-repository"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("cache.json");
    let with_snapshot = SyncConfig {
        snapshot_path: Some(snapshot_path.clone()),
        ..config(&server)
    };

    let first = ready(with_snapshot.clone());
    first.load_all().await.unwrap();
    first.dispose();
    assert!(
        FileSnapshot::new(&snapshot_path)
            .load()
            .unwrap()
            .is_some()
    );

    let second = ready(with_snapshot);
    assert_eq!(second.load_all().await.unwrap(), LoadOutcome::Loaded { items: 2 });
    assert_eq!(second.view().snapshot().units.len(), 2);
}

#[tokio::test]
async fn oneshot_runs_the_closure_and_disposes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/asset-repository"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository_body()))
        .mount(&server)
        .await;

    let (labels, lifecycle) = Controller::oneshot(config(&server), |ctrl| async move {
        ctrl.load_all().await?;
        let labels: Vec<String> = ctrl
            .catalog()
            .groups()
            .map(|g| g.label.clone())
            .collect();
        Ok((labels, ctrl.lifecycle()))
    })
    .await
    .unwrap();

    assert_eq!(labels, vec!["Compostable", "Recyclable"]);
    assert_eq!(*lifecycle.borrow(), Lifecycle::Disposed);
}
