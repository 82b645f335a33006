#![allow(clippy::unwrap_used)]
// Integration tests for `PairingClient` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tvbridge_api::{Error, PairingClient, PairingIdentity, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PairingClient) {
    let server = MockServer::start().await;
    let port = server.address().port();
    let client = PairingClient::with_client(
        reqwest::Client::new(),
        "127.0.0.1",
        port,
        port,
        PairingIdentity {
            app_id: "12345".into(),
            device_id: "7e509404-9d7c-46b4-8f6a-e2a9668ad184".into(),
        },
        TransportConfig::default(),
    );
    (server, client)
}

// ── Pairing steps ───────────────────────────────────────────────────

#[tokio::test]
async fn test_start_announces_client() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ws/pairing"))
        .and(query_param("step", "0"))
        .and(query_param("app_id", "12345"))
        .and(query_param("type", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    client.start().await.unwrap();
}

#[tokio::test]
async fn test_start_rejected_when_service_missing() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ws/pairing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, Error::HandshakeRejected { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_show_and_hide_pin_page() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/ws/apps/CloudPINPage"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/ws/apps/CloudPINPage/run"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.show_pin_page().await.unwrap();
    client.hide_pin_page().await;
}

#[tokio::test]
async fn test_confirm_pin_returns_session() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/ws/pairing"))
        .and(query_param("step", "1"))
        .and(body_partial_json(json!({ "auth_Data": { "pin": "1234" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth_data": "{\"auth_type\":\"SPC\",\"request_id\":\"0\",\"session_id\":\"4\"}"
        })))
        .mount(&server)
        .await;

    let session = client.confirm_pin("1234").await.unwrap();
    assert_eq!(session.session_id, "4");
}

#[tokio::test]
async fn test_confirm_pin_without_session_is_wrong_pin() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/ws/pairing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth_data": {} })))
        .mount(&server)
        .await;

    let err = client.confirm_pin("0000").await.unwrap_err();
    assert!(matches!(err, Error::WrongPin), "got {err:?}");
}

#[tokio::test]
async fn test_confirm_pin_forbidden_is_wrong_pin() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/ws/pairing"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.confirm_pin("9999").await.unwrap_err();
    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_confirm_pin_garbage_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/ws/pairing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client.confirm_pin("1234").await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}
