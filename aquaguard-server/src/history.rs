//! Analysis History
//!
//! ## Overview
//!
//! Every prediction request produces an [`AnalysisRecord`]. Records are kept
//! in memory and, when a path is configured, mirrored to a single JSON file
//! so history survives restarts.
//!
//! ## Persistence
//!
//! The whole history is rewritten on each insert: serialized to a sibling
//! temporary file, then renamed over the target. A reader never sees a
//! half-written file. A history file that cannot be parsed at startup is
//! logged and replaced by an empty history on the next insert.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aquaguard_core::{AccuracyReport, ModelPrediction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which models a prediction request asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    /// Both models, confidence-weighted
    #[default]
    Ensemble,
    /// DeepSeek R1 alone
    DeepseekR1,
    /// o1-mini alone
    O1Mini,
}

impl ModelType {
    /// Human-readable model name
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::Ensemble => "DeepSeek R1 + O1 Mini",
            ModelType::DeepseekR1 => "DeepSeek R1",
            ModelType::O1Mini => "O1 Mini",
        }
    }
}

/// Forecast for one sensor group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAnalysis {
    /// Timestamp of the reading the forecast started from
    pub input_timestamp: Option<String>,
    /// Raw answer per model id
    pub models: BTreeMap<String, ModelPrediction>,
    /// Final forecast values
    pub predicted: BTreeMap<String, f64>,
    /// Ensemble weights, in `[o1-mini, deepseek-r1]` order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<[f64; 2]>,
    /// Accuracy against the validation series, when one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracyReport>,
    /// Values came from the synthetic source
    pub fallback: bool,
}

/// Persisted result of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Unique id (UUID v4)
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Requested models
    pub model_type: ModelType,
    /// Display name of the requested models
    pub model_used: String,
    /// Fish tank forecast
    pub fish: Option<GroupAnalysis>,
    /// Plant tray forecast
    pub plant: Option<GroupAnalysis>,
    /// Mean accuracy over both groups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_accuracy: Option<f64>,
    /// Mean reported confidence of the answers used
    pub confidence_score: f64,
    /// At least one group fell back to synthetic values
    pub fallback: bool,
}

/// Listing entry for the history endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Record id
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Requested models
    pub model_type: ModelType,
    /// Display name of the requested models
    pub model_used: String,
    /// Mean reported confidence
    pub confidence_score: f64,
    /// Synthetic fallback was used
    pub fallback: bool,
}

impl From<&AnalysisRecord> for AnalysisSummary {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            id: record.id.clone(),
            created_at: record.created_at,
            model_type: record.model_type,
            model_used: record.model_used.clone(),
            confidence_score: record.confidence_score,
            fallback: record.fallback,
        }
    }
}

/// History storage errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// File could not be read or written
    #[error("History I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    /// Records could not be serialized
    #[error("History serialization error: {0}")]
    Format(String),

    /// A worker panicked while holding the history lock
    #[error("History lock poisoned")]
    Poisoned,
}

fn io_error(path: &Path, e: std::io::Error) -> HistoryError {
    HistoryError::Io { path: path.display().to_string(), reason: e.to_string() }
}

/// Append-only analysis history
#[derive(Debug, Default)]
pub struct AnalysisHistory {
    path: Option<PathBuf>,
    records: Mutex<Vec<AnalysisRecord>>,
}

impl AnalysisHistory {
    /// History that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// History backed by `path`, loading existing records when the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let records = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            match serde_json::from_str::<Vec<AnalysisRecord>>(&text) {
                Ok(records) => records,
                Err(e) => {
                    log::warn!("Ignoring unreadable history file {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        log::info!("Loaded {} analysis records from {}", records.len(), path.display());
        Ok(Self { path: Some(path), records: Mutex::new(records) })
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Store a record and persist the history
    pub fn insert(&self, record: AnalysisRecord) -> Result<(), HistoryError> {
        let mut records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        records.push(record);
        if let Some(path) = &self.path {
            persist(path, &records)?;
        }
        Ok(())
    }

    /// Summaries, newest first
    pub fn list(&self) -> Result<Vec<AnalysisSummary>, HistoryError> {
        let records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        let mut summaries: Vec<AnalysisSummary> = records.iter().map(AnalysisSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    /// Full record by id
    pub fn get(&self, id: &str) -> Result<Option<AnalysisRecord>, HistoryError> {
        let records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// True when no record is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn persist(path: &Path, records: &[AnalysisRecord]) -> Result<(), HistoryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let json = serde_json::to_string_pretty(records).map_err(|e| HistoryError::Format(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, hour: u32) -> AnalysisRecord {
        AnalysisRecord {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 7, hour, 0, 0).unwrap(),
            model_type: ModelType::Ensemble,
            model_used: ModelType::Ensemble.display_name().to_string(),
            fish: Some(GroupAnalysis::default()),
            plant: None,
            overall_accuracy: Some(97.5),
            confidence_score: 0.85,
            fallback: false,
        }
    }

    #[test]
    fn model_type_wire_names() {
        assert_eq!(serde_json::to_string(&ModelType::DeepseekR1).unwrap(), "\"deepseek-r1\"");
        assert_eq!(serde_json::from_str::<ModelType>("\"o1-mini\"").unwrap(), ModelType::O1Mini);
    }

    #[test]
    fn lists_newest_first() {
        let history = AnalysisHistory::in_memory();
        history.insert(record("a", 1)).unwrap();
        history.insert(record("b", 5)).unwrap();

        let ids: Vec<String> = history.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["b", "a"]);
        assert!(history.get("a").unwrap().is_some());
        assert!(history.get("zzz").unwrap().is_none());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis").join("history.json");

        let history = AnalysisHistory::open(&path).unwrap();
        assert!(history.is_empty());
        history.insert(record("persisted", 2)).unwrap();

        let reopened = AnalysisHistory::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("persisted").unwrap(), Some(record("persisted", 2)));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let history = AnalysisHistory::open(&path).unwrap();
        assert!(history.is_empty());
    }
}
