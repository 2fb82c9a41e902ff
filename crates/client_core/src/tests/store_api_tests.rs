use super::*;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

use crate::session::TokenPrincipal;

#[test]
fn base_url_uses_username_as_subdomain() {
    let url = store_base_url(
        &StoreLocator::new("alice"),
        DEFAULT_STORES_DOMAIN,
        DEFAULT_STORES_SCHEME,
    )
    .expect("url");

    assert_eq!(url.as_str(), "http://alice.s.mbyte.fr/");
}

#[test]
fn base_url_honours_domain_and_scheme() {
    let url = store_base_url(&StoreLocator::new(" bob "), "stores.example.org", "https")
        .expect("url");

    assert_eq!(url.as_str(), "https://bob.stores.example.org/");
    assert_eq!(url.join("/q/health").expect("join").as_str(), "https://bob.stores.example.org/q/health");
}

#[test]
fn blank_username_is_rejected() {
    for username in ["", "   "] {
        let err = store_base_url(&StoreLocator::new(username), DEFAULT_STORES_DOMAIN, "http")
            .expect_err("empty username");

        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Cannot compute store base URL: empty username"
        );
    }
}

async fn health(headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer tok");
    if authorized {
        Json(json!({ "status": "UP" })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "bad token").into_response()
    }
}

async fn spawn_store() -> Url {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/q/health", get(health));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}/")).expect("url")
}

#[tokio::test]
async fn health_sends_bearer_token() {
    let base_url = spawn_store().await;
    let client = StoreClient::new(base_url, Arc::new(TokenPrincipal::new(Some("tok".into()))));

    let health = client.health().await.expect("health");

    assert_eq!(health, json!({ "status": "UP" }));
}

#[tokio::test]
async fn health_failure_reports_status_and_body() {
    let base_url = spawn_store().await;
    let client = StoreClient::new(
        base_url,
        Arc::new(TokenPrincipal::new(Some("wrong".into()))),
    );

    let err = client.health().await.expect_err("unauthorized");

    assert!(matches!(err, ClientError::StoreHealth { status: 401, .. }));
    assert_eq!(err.to_string(), "Store health failed (401): bad token");
}

#[tokio::test]
async fn health_without_token_fails_locally() {
    let base_url = spawn_store().await;
    let client = StoreClient::new(base_url, Arc::new(TokenPrincipal::anonymous()));

    let err = client.health().await.expect_err("no token");

    assert!(matches!(err, ClientError::MissingAccessToken));
}
