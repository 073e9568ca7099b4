//! Shared server state.
//!
//! One [`AppState`] is shared by every worker thread. The snapshot is
//! immutable; the replay cursor, pause flag and history are the only mutable
//! parts.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use aquaguard_connectors::models::{DEEPSEEK_R1, O1_MINI};
use aquaguard_connectors::{ChatModelClient, EnsembleRunner, ModelConfig, ModelConnector, UnconfiguredModel};
use aquaguard_core::{CurrentTelemetry, ReplayCursor, SinusoidalSource, TelemetrySnapshot};

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::history::AnalysisHistory;

/// State shared by all request workers
pub struct AppState {
    config: ServerConfig,
    snapshot: TelemetrySnapshot,
    cursor: Mutex<ReplayCursor>,
    paused: AtomicBool,
    runner: EnsembleRunner,
    synthetic: SinusoidalSource,
    history: AnalysisHistory,
    runtime: tokio::runtime::Runtime,
}

fn connector(id: &str, config: Option<ModelConfig>) -> Result<Arc<dyn ModelConnector>, StartupError> {
    match config {
        Some(config) => {
            log::info!("Model {} configured at {}", id, config.endpoint);
            Ok(Arc::new(ChatModelClient::new(config)?))
        }
        None => {
            log::warn!("Model {} has no endpoint or API key; it will not be called", id);
            Ok(Arc::new(UnconfiguredModel::new(id)))
        }
    }
}

impl AppState {
    /// State with model clients built from the configuration
    pub fn new(config: ServerConfig, snapshot: TelemetrySnapshot) -> Result<Self, StartupError> {
        let runner = EnsembleRunner::new(
            connector(O1_MINI, config.o1_mini_model())?,
            connector(DEEPSEEK_R1, config.deepseek_r1_model())?,
        );
        Self::with_runner(config, snapshot, runner)
    }

    /// State with an explicit model runner
    pub fn with_runner(
        config: ServerConfig,
        snapshot: TelemetrySnapshot,
        runner: EnsembleRunner,
    ) -> Result<Self, StartupError> {
        let history = match &config.history_path {
            Some(path) => AnalysisHistory::open(path)?,
            None => AnalysisHistory::in_memory(),
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("aquaguard-models")
            .enable_all()
            .build()?;

        Ok(Self {
            cursor: Mutex::new(ReplayCursor::new(&snapshot)),
            paused: AtomicBool::new(false),
            synthetic: SinusoidalSource::new(),
            config,
            snapshot,
            runner,
            history,
            runtime,
        })
    }

    /// Startup configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Recorded datasets
    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// Model pair
    pub fn runner(&self) -> &EnsembleRunner {
        &self.runner
    }

    /// Synthetic data source
    pub fn synthetic(&self) -> &SinusoidalSource {
        &self.synthetic
    }

    /// Analysis history
    pub fn history(&self) -> &AnalysisHistory {
        &self.history
    }

    /// Whether replay is paused
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Pause or resume replay
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        log::info!("Telemetry replay {}", if paused { "paused" } else { "resumed" });
    }

    /// Replay position
    pub fn replay_position(&self) -> usize {
        self.cursor.lock().map(|c| c.position()).unwrap_or(0)
    }

    /// Readings at the replay cursor; the cursor advances unless paused.
    pub fn current(&self) -> Option<CurrentTelemetry> {
        let mut cursor = match self.cursor.lock() {
            Ok(cursor) => cursor,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.is_paused() {
            cursor.current(&self.snapshot)
        } else {
            cursor.advance(&self.snapshot)
        }
    }

    /// Drive a future to completion on the model runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
