//! AquaGuard REST API
//!
//! ## Overview
//!
//! Serves recorded aquaponics telemetry to the dashboard and runs AI
//! forecasts on demand:
//!
//! - **Telemetry**: range queries with optional time-bucket aggregation,
//!   full datasets, latest readings and a replayed "current" feed
//! - **Alerts**: threshold evaluation of posted readings
//! - **Forecasts**: o1-mini and DeepSeek R1 queried concurrently, merged by
//!   confidence, scored against validation data and kept in a history file
//!
//! ## Architecture
//!
//! ```text
//! tiny_http listener ──► worker threads ──► routes::handle ──► AppState
//!                                                 │              ├─ TelemetrySnapshot (immutable)
//!                                                 │              ├─ ReplayCursor (mutex)
//!                                                 │              └─ AnalysisHistory (file-backed)
//!                                                 └─► tokio runtime ──► model connectors
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod history;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{ModelEndpoint, ServerConfig};
pub use error::{ApiError, StartupError};
pub use routes::{handle, ApiResponse, Method};
pub use server::{ApiServer, ServerHandle};
pub use state::AppState;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
