use super::*;

use serde_json::json;

use crate::{session::TokenPrincipal, test_support::FakeManagerApi};

fn cache(token: Option<&str>) -> (Arc<FakeManagerApi>, StatusCache) {
    let api = Arc::new(FakeManagerApi::default());
    let principal = Arc::new(TokenPrincipal::new(token.map(str::to_string)));
    let cache = StatusCache::new(api.clone(), principal);
    (api, cache)
}

fn status_with_store_app() -> ManagerStatus {
    serde_json::from_value(json!({
        "status": "ok",
        "connected-profile": "alice",
        "stores": ["s1"],
        "apps": [
            { "id": "s1", "type": "DOCKER_STORE", "name": "alice" },
            { "id": "s2", "type": "DOCKER_STORE", "name": "photos" },
            { "id": "a1", "type": "DOCKER_APP", "name": "notes" }
        ]
    }))
    .expect("status")
}

#[tokio::test]
async fn reload_publishes_status() {
    let (api, cache) = cache(Some("tok"));
    *api.status.lock().expect("status") = Some(status_with_store_app());
    let mut rx = cache.subscribe();

    cache.reload().await;

    assert!(rx.has_changed().expect("sender alive"));
    let view = rx.borrow_and_update().clone();
    assert!(!view.loading);
    assert_eq!(view.error, None);
    assert!(cache.has_app());
    assert!(cache.has_store());
    assert_eq!(
        cache.store_ids(),
        vec![StoreId::new("s1"), StoreId::new("s2")]
    );
    assert_eq!(cache.apps().len(), 3);
}

#[tokio::test]
async fn reload_failure_keeps_message() {
    let (api, cache) = cache(Some("tok"));

    cache.reload().await;

    let view = cache.view();
    assert!(!view.loading);
    assert_eq!(view.status, None);
    assert_eq!(view.error.as_deref(), Some("HTTP 404: not found"));
    assert!(!cache.has_store());
    assert_eq!(api.calls(), vec!["getStatus".to_string()]);
}

#[tokio::test]
async fn reload_success_clears_previous_error() {
    let (api, cache) = cache(Some("tok"));
    cache.reload().await;
    assert!(cache.view().error.is_some());

    *api.status.lock().expect("status") = Some(ManagerStatus::default());
    cache.reload().await;

    let view = cache.view();
    assert_eq!(view.error, None);
    assert_eq!(view.status, Some(ManagerStatus::default()));
    assert!(!cache.has_app());
}

#[tokio::test]
async fn anonymous_reload_resets_without_calling_manager() {
    let (api, cache) = cache(None);
    *api.status.lock().expect("status") = Some(status_with_store_app());

    cache.reload().await;

    assert_eq!(cache.view(), StatusView::default());
    assert!(cache.store_ids().is_empty());
    assert!(api.calls().is_empty());
}
