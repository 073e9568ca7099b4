//! Shared fixtures for API tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use aquaguard_connectors::models::{DEEPSEEK_R1, O1_MINI};
use aquaguard_connectors::{EnsembleRunner, SyntheticModel, UnconfiguredModel};
use aquaguard_core::DatasetLoader;
use aquaguard_server::{AppState, ServerConfig};

pub const FISH_HEADER: &str =
    "Timestamp,pH Level (pH),Temperature Level (°C),TDS Level (ppm),Turbidity Level (NTU),EC Level (mS/cm)";
pub const PLANT_HEADER: &str = "Timestamp,Pressure Level (kPa),Temperature Level (°C),Humidity Level (%)";

/// Write the four datasets used by the API tests into `dir`.
pub fn write_datasets(dir: &Path) {
    let files = [
        (
            "fish_initial.csv",
            vec![
                FISH_HEADER,
                "2024-03-07T00:00:00Z,7.0,24.0,400,10,1.0",
                "2024-03-07T00:30:00Z,7.2,24.4,410,11,1.1",
                "2024-03-07T01:10:00Z,7.4,25.0,420,12,1.2",
            ],
        ),
        (
            "fish_validate.csv",
            vec![FISH_HEADER, "2024-03-08T01:00:00Z,7.1,24.2,405,10,1.0"],
        ),
        (
            "plant_initial.csv",
            vec![
                PLANT_HEADER,
                "2024-03-07T00:05:00Z,2.5,23.0,66",
                "2024-03-07T01:05:00Z,2.6,23.5,68",
            ],
        ),
        ("plant_validate.csv", vec![PLANT_HEADER]),
    ];

    for (name, lines) in files {
        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(dir.join(name), body).unwrap();
    }
}

/// Config rooted at `dir`, keeping history in memory.
pub fn config(dir: &Path) -> ServerConfig {
    ServerConfig::new(dir).history_path(None).bind("127.0.0.1:0").workers(2)
}

/// State over datasets in `dir`, answering forecasts with synthetic models.
pub fn synthetic_state(dir: &Path) -> AppState {
    write_datasets(dir);
    let snapshot = DatasetLoader::new(dir).load().unwrap();
    let runner = EnsembleRunner::new(
        Arc::new(SyntheticModel::new(O1_MINI)),
        Arc::new(SyntheticModel::new(DEEPSEEK_R1)),
    );
    AppState::with_runner(config(dir), snapshot, runner).unwrap()
}

/// State whose models have no credentials.
pub fn unconfigured_state(dir: &Path, config: ServerConfig) -> AppState {
    write_datasets(dir);
    let snapshot = DatasetLoader::new(dir).load().unwrap();
    let runner = EnsembleRunner::new(
        Arc::new(UnconfiguredModel::new(O1_MINI)),
        Arc::new(UnconfiguredModel::new(DEEPSEEK_R1)),
    );
    AppState::with_runner(config, snapshot, runner).unwrap()
}
