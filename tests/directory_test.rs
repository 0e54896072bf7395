// Integration tests for `SessionManager` and `BridgeRegistry` against a
// wiremock directory service.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bondhome::{BondError, BridgeRegistry, DeviceKind, Session, SessionManager};

fn session() -> Session {
    Session {
        api_key: "K".to_string(),
        bridge_token: "T".to_string(),
    }
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_returns_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "K",
            "user": { "bond_token": "T" }
        })))
        .mount(&server)
        .await;

    let sessions = SessionManager::with_base_url(server.uri());
    let session = sessions.login("user@example.com", "pw").await.unwrap();

    assert_eq!(session.api_key, "K");
    assert_eq!(session.bridge_token, "T");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let sessions = SessionManager::with_base_url(server.uri());
    let result = sessions.login("user@example.com", "wrong").await;

    assert!(
        matches!(result, Err(BondError::Auth { .. })),
        "expected Auth error, got: {result:?}"
    );
}

#[tokio::test]
async fn login_malformed_body_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "key": "K" })))
        .mount(&server)
        .await;

    let sessions = SessionManager::with_base_url(server.uri());
    let result = sessions.login("user@example.com", "pw").await;

    assert!(
        matches!(result, Err(BondError::Auth { .. })),
        "expected Auth error, got: {result:?}"
    );
}

// ── Bridge fetch ────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_bridge_decodes_inventory() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bonds/b1"))
        .and(header("Authorization", "Token K"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b1",
            "devices": [{
                "id": "d1",
                "type": "Fan",
                "room": "Office",
                "commands": [
                    {"id": "11", "name": "Speed 1"},
                    {"id": "12", "name": "Speed 2"},
                    {"id": "13", "name": "Speed 3"},
                    {"id": "10", "name": "Power Off"}
                ]
            }]
        })))
        .mount(&server)
        .await;

    let registry = BridgeRegistry::with_base_url(server.uri());
    let bridge = registry
        .fetch_bridge("b1", "10.0.0.5:80", &session())
        .await
        .unwrap();

    assert_eq!(bridge.id, "b1");
    assert_eq!(bridge.address, "10.0.0.5:80");
    assert_eq!(bridge.devices.len(), 1);
    assert_eq!(bridge.devices[0].kind, DeviceKind::Fan);
    assert!(bridge.devices[0].speeds.is_some());
}

#[tokio::test]
async fn unknown_bridge_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bonds/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = BridgeRegistry::with_base_url(server.uri());
    let result = registry.fetch_bridge("nope", "10.0.0.5:80", &session()).await;

    match result {
        Err(BondError::BridgeNotFound(name)) => assert_eq!(name, "nope"),
        other => panic!("expected BridgeNotFound, got: {other:?}"),
    }
}

#[tokio::test]
async fn expired_session_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bonds/b1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let registry = BridgeRegistry::with_base_url(server.uri());
    let result = registry.fetch_bridge("b1", "10.0.0.5:80", &session()).await;

    assert!(
        matches!(result, Err(BondError::Auth { .. })),
        "expected Auth error, got: {result:?}"
    );
}

#[tokio::test]
async fn malformed_inventory_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bonds/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let registry = BridgeRegistry::with_base_url(server.uri());
    let result = registry.fetch_bridge("b1", "10.0.0.5:80", &session()).await;

    assert!(
        matches!(result, Err(BondError::Decode(_))),
        "expected Decode error, got: {result:?}"
    );
}
