//! HttpConnector retry behavior against a local server.

mod common;

use std::time::Duration;

use aquaguard_connectors::http::{HttpConfig, HttpConnector, HttpError};
use common::scripted_server;
use serde_json::json;

fn connector(url: &str, retries: u32) -> HttpConnector {
    let config = HttpConfig::new(url)
        .api_key("api-key", "test-key")
        .timeout_secs(5)
        .retries(retries, Duration::from_millis(5));
    HttpConnector::new(config).unwrap()
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let (url, server) = scripted_server(vec![
        (503, r#"{"error":"busy"}"#.into()),
        (200, r#"{"ok":true}"#.into()),
    ]);
    let http = connector(&url, 3);

    let response = http.post_json("/chat", &json!({ "ping": 1 })).await.unwrap();
    assert_eq!(response["ok"], true);

    let stats = http.stats();
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.messages_sent, 1);
    assert_eq!(stats.messages_failed, 0);

    let seen = server.join().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|r| r.method == "POST" && r.url == "/chat"));
    assert_eq!(seen[1].api_key.as_deref(), Some("test-key"));
    assert_eq!(seen[1].body, r#"{"ping":1}"#);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (url, server) = scripted_server(vec![(400, r#"{"error":"bad request"}"#.into())]);
    let http = connector(&url, 3);

    let result = http.post_json("", &json!({})).await;
    assert!(matches!(result, Err(HttpError::ServerError { status: 400, .. })));
    assert_eq!(http.stats().retries, 0);
    assert_eq!(http.stats().messages_failed, 1);
    assert_eq!(server.join().unwrap().len(), 1);
}

#[tokio::test]
async fn auth_failures_are_reported() {
    let (url, server) = scripted_server(vec![(401, "denied".into())]);
    let http = connector(&url, 3);

    let result = http.get_json("/models").await;
    assert!(matches!(result, Err(HttpError::Auth(_))));
    assert!(http.stats().last_error.is_some());
    assert_eq!(server.join().unwrap()[0].method, "GET");
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let (url, server) = scripted_server(vec![
        (500, "{}".into()),
        (502, "{}".into()),
        (503, "{}".into()),
    ]);
    let http = connector(&url, 2);

    let result = http.post_json("", &json!({})).await;
    assert!(matches!(result, Err(HttpError::ServerError { status: 503, .. })));

    let stats = http.stats();
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.messages_failed, 1);
    assert_eq!(server.join().unwrap().len(), 3);
}
