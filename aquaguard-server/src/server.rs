//! HTTP listener and worker pool.
//!
//! A fixed number of worker threads pull requests from one shared
//! `tiny_http` listener. Each request is read, dispatched through
//! [`routes::handle`](crate::routes::handle) and answered with JSON.

use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use tiny_http::{Header, Request, Response, Server};

use crate::error::{ApiError, StartupError};
use crate::routes::{self, ApiResponse, Method};
use crate::state::AppState;

/// Largest request body accepted
pub const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Bound listener, not yet serving
pub struct ApiServer {
    server: Arc<Server>,
    state: Arc<AppState>,
}

/// Running worker pool
pub struct ServerHandle {
    server: Arc<Server>,
    workers: Vec<JoinHandle<()>>,
}

impl ApiServer {
    /// Bind the configured address
    pub fn bind(state: Arc<AppState>) -> Result<Self, StartupError> {
        let addr = state.config().bind.clone();
        let server = Server::http(&addr).map_err(|e| StartupError::Bind { addr, reason: e.to_string() })?;
        Ok(Self { server: Arc::new(server), state })
    }

    /// Port actually bound; useful with port 0
    pub fn port(&self) -> Option<u16> {
        self.server.server_addr().to_ip().map(|addr| addr.port())
    }

    /// Start the worker threads
    pub fn spawn(self) -> Result<ServerHandle, StartupError> {
        let count = self.state.config().workers.max(1);
        let mut workers = Vec::with_capacity(count);

        for index in 0..count {
            let server = Arc::clone(&self.server);
            let state = Arc::clone(&self.state);
            let worker = std::thread::Builder::new()
                .name(format!("aquaguard-http-{}", index))
                .spawn(move || {
                    while let Ok(request) = server.recv() {
                        respond(&state, request);
                    }
                })?;
            workers.push(worker);
        }

        log::info!("Serving on port {:?} with {} workers", self.port(), count);
        Ok(ServerHandle { server: self.server, workers })
    }

    /// Serve until the listener fails
    pub fn run(self) -> Result<(), StartupError> {
        self.spawn()?.join();
        Ok(())
    }
}

impl ServerHandle {
    /// Wait for every worker to exit
    pub fn join(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                log::error!("HTTP worker panicked");
            }
        }
    }

    /// Stop accepting requests and wait for the workers
    pub fn shutdown(self) {
        for _ in &self.workers {
            self.server.unblock();
        }
        self.join();
    }
}

/// Dispatch a request; a handler panic is answered with a 500.
fn dispatch(state: &AppState, method: Method, url: &str, body: &str) -> ApiResponse {
    match panic::catch_unwind(AssertUnwindSafe(|| routes::handle(state, method, url, body))) {
        Ok(response) => response,
        Err(_) => {
            log::error!("Handler panicked on {:?} {}", method, url);
            ApiResponse::from(ApiError::Internal("Request handler failed".into()))
        }
    }
}

fn respond(state: &AppState, mut request: Request) {
    let method = Method::from(request.method());
    let url = request.url().to_string();

    let mut body = String::new();
    if let Err(e) = request.as_reader().take(MAX_BODY_BYTES).read_to_string(&mut body) {
        log::warn!("Unreadable body for {}: {}", url, e);
        body.clear();
    }

    let response = dispatch(state, method, &url, &body);
    log::debug!("{:?} {} -> {}", method, url, response.status);

    let data = serde_json::to_vec(&response.body).unwrap_or_else(|_| b"{}".to_vec());
    let mut reply = Response::from_data(data).with_status_code(response.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        reply = reply.with_header(header);
    }

    if let Err(e) = request.respond(reply) {
        log::warn!("Failed to answer {}: {}", url, e);
    }
}
