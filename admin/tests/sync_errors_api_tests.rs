use crmsync_admin::{build_router, ErrorResponse};
use crmsync_sync::{SyncErrorLedger, SyncErrorRecord};
use crmsync_types::{EntityId, EntityRef, EntityType};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn company_ref() -> EntityRef {
    EntityRef::new(EntityType::Company, EntityId::new())
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
async fn spawn_test_server(ledger: SyncErrorLedger) -> String {
    let app = build_router(Arc::new(ledger));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

fn seeded() -> (SyncErrorLedger, SyncErrorRecord, SyncErrorRecord) {
    let ledger = SyncErrorLedger::open_in_memory().unwrap();
    let a = ledger.record(&company_ref(), Some("Acme"), "remote rejected request (422): Name must be unique").unwrap();
    let b = ledger.record(&company_ref(), Some("Globex"), "operation timed out").unwrap();
    (ledger, a, b)
}

// ── Listing ──────────────────────────────────────────────────────

#[tokio::test]
async fn list_returns_active_records_as_json() {
    let (ledger, a, b) = seeded();
    let base = spawn_test_server(ledger).await;

    let resp = reqwest::get(format!("{}/api/v1/sync-errors", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("application/json"));

    let body: Vec<SyncErrorRecord> = resp.json().await.unwrap();
    assert_eq!(body, vec![a, b]);
}

#[tokio::test]
async fn list_exposes_every_record_field() {
    let (ledger, a, _) = seeded();
    let base = spawn_test_server(ledger).await;

    let body: serde_json::Value = reqwest::get(format!("{}/api/v1/sync-errors", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let first = body[0].as_object().unwrap();
    for key in [
        "id",
        "entity_id",
        "entity_type",
        "entity_name",
        "error_message",
        "created_at",
        "updated_at",
        "archived_at",
        "resolved_at",
    ] {
        assert!(first.contains_key(key), "missing {key}");
    }
    assert_eq!(first["entity_type"], "company");
    assert_eq!(first["error_message"], a.error_message.as_str());
}

#[tokio::test]
async fn list_all_includes_closed_records() {
    let (ledger, a, b) = seeded();
    ledger.archive(a.id).unwrap();
    let base = spawn_test_server(ledger).await;

    let active: Vec<SyncErrorRecord> = reqwest::get(format!("{}/api/v1/sync-errors", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id]);

    let all: Vec<SyncErrorRecord> = reqwest::get(format!("{}/api/v1/sync-errors?all=true&limit=1", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id]);
}

// ── Archive / resolve ────────────────────────────────────────────

#[tokio::test]
async fn archive_hides_record_from_active_listing() {
    let (ledger, a, _) = seeded();
    let base = spawn_test_server(ledger.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/v1/sync-errors/{}/archive", base, a.id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: SyncErrorRecord = resp.json().await.unwrap();
    assert!(body.archived_at.is_some());

    assert!(ledger.list_active().unwrap().iter().all(|r| r.id != a.id));
}

#[tokio::test]
async fn resolve_returns_updated_record() {
    let (ledger, _, b) = seeded();
    let base = spawn_test_server(ledger).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/v1/sync-errors/{}/resolve", base, b.id))
        .send()
        .await
        .unwrap();
    let body: SyncErrorRecord = resp.json().await.unwrap();
    assert_eq!(body.id, b.id);
    assert!(body.resolved_at.is_some());
    assert!(!body.is_active());
}

#[tokio::test]
async fn unknown_id_returns_404() {
    let (ledger, _, _) = seeded();
    let base = spawn_test_server(ledger).await;
    let client = reqwest::Client::new();

    for action in ["archive", "resolve"] {
        let resp = client
            .post(format!("{}/api/v1/sync-errors/999/{}", base, action))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404, "{action}");
        let body: ErrorResponse = resp.json().await.unwrap();
        assert!(body.error.contains("999"));
    }

    let resp = reqwest::get(format!("{}/api/v1/sync-errors/999", base)).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn get_returns_single_record() {
    let (ledger, a, _) = seeded();
    let base = spawn_test_server(ledger).await;

    let body: SyncErrorRecord = reqwest::get(format!("{}/api/v1/sync-errors/{}", base, a.id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, a);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (ledger, _, _) = seeded();
    let base = spawn_test_server(ledger).await;
    let resp = reqwest::get(format!("{}/api/v1/nonexistent", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}
