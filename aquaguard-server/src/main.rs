//! `aquaguard-server` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use aquaguard_core::{DatasetError, DatasetLoader, TelemetrySnapshot};
use aquaguard_server::{ApiServer, AppState, ModelEndpoint, ServerConfig};
use clap::Parser;

/// AquaGuard telemetry and forecasting API
#[derive(Debug, Parser)]
#[command(name = "aquaguard-server", version, about)]
struct Cli {
    /// Directory holding fish_*.csv and plant_*.csv datasets
    #[arg(long, env = "AQUAGUARD_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Listen address
    #[arg(long, env = "AQUAGUARD_BIND", default_value = aquaguard_server::config::DEFAULT_BIND)]
    bind: String,

    /// Analysis history file [default: <data-dir>/analysis/history.json]
    #[arg(long, env = "AQUAGUARD_HISTORY")]
    history: Option<PathBuf>,

    /// Keep analysis history in memory only
    #[arg(long)]
    no_history_file: bool,

    /// Request worker threads
    #[arg(long, default_value_t = aquaguard_server::config::DEFAULT_WORKERS)]
    workers: usize,

    /// Do not serve synthetic data when a dataset is empty
    #[arg(long)]
    no_synthetic_fallback: bool,

    /// o1-mini chat-completions endpoint
    #[arg(long, env = "O1_MINI_ENDPOINT")]
    o1_mini_endpoint: Option<String>,

    /// o1-mini API key
    #[arg(long, env = "O1_MINI_API_KEY", hide_env_values = true)]
    o1_mini_api_key: Option<String>,

    /// DeepSeek R1 chat-completions endpoint
    #[arg(long, env = "DEEPSEEK_ENDPOINT")]
    deepseek_endpoint: Option<String>,

    /// DeepSeek R1 API key
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    deepseek_api_key: Option<String>,

    /// Model request timeout in seconds
    #[arg(long, default_value_t = 30)]
    model_timeout: u64,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> ServerConfig {
        let history = if self.no_history_file {
            None
        } else {
            Some(
                self.history
                    .clone()
                    .unwrap_or_else(|| self.data_dir.join("analysis").join("history.json")),
            )
        };

        ServerConfig::new(&self.data_dir)
            .bind(&self.bind)
            .history_path(history)
            .workers(self.workers)
            .synthetic_fallback(!self.no_synthetic_fallback)
            .o1_mini(endpoint(&self.o1_mini_endpoint, &self.o1_mini_api_key))
            .deepseek_r1(endpoint(&self.deepseek_endpoint, &self.deepseek_api_key))
            .model_timeout_secs(self.model_timeout)
    }
}

fn endpoint(url: &Option<String>, key: &Option<String>) -> ModelEndpoint {
    ModelEndpoint { endpoint: url.clone(), api_key: key.clone() }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn load_snapshot(config: &ServerConfig) -> anyhow::Result<TelemetrySnapshot> {
    match DatasetLoader::new(&config.data_dir).load() {
        Ok(snapshot) => {
            log::info!("Loaded {} readings from {}", snapshot.total_len(), config.data_dir.display());
            Ok(snapshot)
        }
        Err(DatasetError::NoData(dir)) if config.synthetic_fallback => {
            log::warn!("No datasets found in {}; serving synthetic telemetry", dir);
            Ok(TelemetrySnapshot::default())
        }
        Err(e) => Err(e).context("loading telemetry datasets"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config();
    let snapshot = load_snapshot(&config)?;
    let state = AppState::new(config, snapshot).context("initializing server state")?;

    ApiServer::bind(Arc::new(state))?.run()?;
    Ok(())
}
