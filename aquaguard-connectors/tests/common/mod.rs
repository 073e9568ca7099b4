//! Scripted local HTTP server for connector tests.
#![allow(dead_code)]

use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Header, Response, Server};

/// What the mock server saw for one request.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub url: String,
    pub api_key: Option<String>,
    pub body: String,
}

/// Serve one scripted `(status, body)` reply per incoming request.
///
/// Returns the base URL and a handle yielding the captured requests. The
/// server gives up after a few seconds without traffic so a client that sends
/// fewer requests than scripted cannot hang the test.
pub fn scripted_server(replies: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Captured>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let mut request = match server.recv_timeout(Duration::from_secs(5)) {
                Ok(Some(request)) => request,
                _ => break,
            };

            let mut received = String::new();
            let _ = request.as_reader().read_to_string(&mut received);
            seen.push(Captured {
                method: request.method().to_string(),
                url: request.url().to_string(),
                api_key: request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("api-key"))
                    .map(|h| h.value.as_str().to_string()),
                body: received,
            });

            let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response = Response::from_string(body).with_status_code(status).with_header(content_type);
            let _ = request.respond(response);
        }
        seen
    });

    (format!("http://127.0.0.1:{}", port), handle)
}

/// Chat-completion envelope around `content`.
pub fn completion(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}
