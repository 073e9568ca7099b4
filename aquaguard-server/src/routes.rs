//! Request Routing
//!
//! ## Endpoints
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/health` | service status |
//! | GET | `/api/telemetry/{group}` | readings or aggregated points in range |
//! | GET | `/api/telemetry/{group}/data` | full dataset |
//! | GET | `/api/telemetry/{group}/latest` | most recent reading |
//! | POST | `/api/telemetry/{group}` | threshold check of a posted reading |
//! | GET | `/api/telemetry/current` | replayed fish and plant readings |
//! | POST | `/api/telemetry/pause`, `/resume` | toggle replay |
//! | GET | `/api/telemetry/state` | replay state |
//! | GET | `/api/telemetry/thresholds` | alert tables |
//! | POST | `/api/ai/predict` | new analysis record |
//! | GET | `/api/ai/history` | analysis summaries |
//! | GET | `/api/ai/{id}` | one analysis record |
//!
//! `{group}` is `fish` or `plant`. Errors are `{ "message": ... }` with the
//! matching status code.
//!
//! Dispatch is a pure function of state and request, so it is tested without
//! opening a socket.

use std::collections::HashMap;

use aquaguard_connectors::ModelConnector;
use aquaguard_core::thresholds::violations;
use aquaguard_core::{
    evaluate, parse_timestamp, CurrentTelemetry, DatasetKind, Granularity, Resampled, SensorGroup, SyntheticSource,
    TelemetryReading, ThresholdTable,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::analysis::{Analyzer, PredictRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// Span of a synthetic series when no `startTime` is given
const SYNTHETIC_WINDOW_HOURS: i64 = 24;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// Anything else
    Other,
}

impl From<&tiny_http::Method> for Method {
    fn from(method: &tiny_http::Method) -> Self {
        match method {
            tiny_http::Method::Get => Method::Get,
            tiny_http::Method::Post => Method::Post,
            _ => Method::Other,
        }
    }
}

/// Status and JSON body of a handled request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Self::with_status(200, body)
    }

    fn with_status<T: Serialize>(status: u16, body: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(Self { status, body })
    }
}

impl From<ApiError> for ApiResponse {
    fn from(error: ApiError) -> Self {
        Self { status: error.status(), body: error.body() }
    }
}

/// Split `path?query` and decode the query parameters.
pub fn split_url(url: &str) -> (&str, HashMap<String, String>) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect();
    (path, params)
}

fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Handle one request.
pub fn handle(state: &AppState, method: Method, url: &str, body: &str) -> ApiResponse {
    let (path, params) = split_url(url);
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    let result = match (method, segments.as_slice()) {
        (Method::Get, ["health"]) => health(state),

        (Method::Get, ["api", "telemetry", "current"]) => current(state),
        (Method::Post, ["api", "telemetry", "pause"]) => set_paused(state, true),
        (Method::Post, ["api", "telemetry", "resume"]) => set_paused(state, false),
        (Method::Get, ["api", "telemetry", "state"]) => replay_state(state),
        (Method::Get, ["api", "telemetry", "thresholds"]) => thresholds(),

        (Method::Get, ["api", "telemetry", group]) => sensor_group(group).and_then(|g| range(state, g, &params)),
        (Method::Post, ["api", "telemetry", group]) => sensor_group(group).and_then(|g| ingest(g, body)),
        (Method::Get, ["api", "telemetry", group, "data"]) => {
            sensor_group(group).and_then(|g| dataset(state, g, &params))
        }
        (Method::Get, ["api", "telemetry", group, "latest"]) => sensor_group(group).and_then(|g| latest(state, g)),

        (Method::Post, ["api", "ai", "predict"]) => predict(state, body),
        (Method::Get, ["api", "ai", "history"]) => history(state),
        (Method::Get, ["api", "ai", id]) => analysis(state, id),

        (Method::Other, _) => Err(ApiError::MethodNotAllowed(path.to_string())),
        _ => Err(ApiError::NotFound(format!("No route for {}", path))),
    };

    result.unwrap_or_else(|e| {
        if e.status() >= 500 {
            log::error!("{} failed: {}", path, e);
        }
        ApiResponse::from(e)
    })
}

fn sensor_group(raw: &str) -> Result<SensorGroup, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown sensor group: {}", raw)))
}

fn time_param(params: &HashMap<String, String>, name: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", name, e))),
        None => Ok(None),
    }
}

fn flag_param(params: &HashMap<String, String>, name: &str) -> bool {
    params
        .get(name)
        .map_or(false, |v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

// ============================================================================
// Service
// ============================================================================

fn health(state: &AppState) -> Result<ApiResponse, ApiError> {
    let snapshot = state.snapshot();
    let mut datasets = serde_json::Map::new();
    for group in SensorGroup::ALL {
        for kind in [DatasetKind::Initial, DatasetKind::Validate] {
            datasets.insert(format!("{}_{}", group, kind), json!(snapshot.dataset(group, kind).len()));
        }
    }

    let models: serde_json::Map<String, Value> = state
        .runner()
        .models()
        .into_iter()
        .map(|m| (m.model_id().to_string(), serde_json::to_value(m.stats()).unwrap_or(Value::Null)))
        .collect();

    ApiResponse::ok(&json!({
        "status": "ok",
        "version": crate::VERSION,
        "datasets": datasets,
        "models": models,
        "paused": state.is_paused(),
        "analyses": state.history().len(),
    }))
}

// ============================================================================
// Telemetry
// ============================================================================

fn range(state: &AppState, group: SensorGroup, params: &HashMap<String, String>) -> Result<ApiResponse, ApiError> {
    let start = time_param(params, "startTime")?;
    let end = time_param(params, "endTime")?;
    let granularity = Granularity::from_query(params.get("granularity").map(String::as_str));
    let kind = DatasetKind::from_validation_flag(flag_param(params, "isValidation"));

    let recorded = state.snapshot().dataset(group, kind);
    let series = if recorded.is_empty() && state.config().synthetic_fallback {
        let end_at = end.unwrap_or_else(Utc::now);
        let start_at = match start {
            Some(start) => start,
            None => end_at
                .checked_sub_signed(Duration::hours(SYNTHETIC_WINDOW_HOURS))
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid endTime: {} is out of range", end_at)))?,
        };
        log::debug!("No recorded {} {} data, serving synthetic series", group, kind);
        let synthetic = state.synthetic().series(group, start_at, end_at, granularity);
        Resampled::build(&synthetic, start, end, granularity)
    } else {
        state.snapshot().range(group, kind, start, end, granularity)
    };

    log::debug!("{} range query returned {} entries", group, series.len());
    ApiResponse::ok(&series)
}

fn dataset(state: &AppState, group: SensorGroup, params: &HashMap<String, String>) -> Result<ApiResponse, ApiError> {
    let kind = match params.get("dataset") {
        Some(raw) => raw.parse::<DatasetKind>()?,
        None => DatasetKind::Initial,
    };

    let readings = state.snapshot().dataset(group, kind);
    if readings.is_empty() {
        return Err(ApiError::NotFound(format!("No {} telemetry data found", group)));
    }
    ApiResponse::ok(&readings)
}

fn latest(state: &AppState, group: SensorGroup) -> Result<ApiResponse, ApiError> {
    match state.snapshot().latest(group) {
        Some(reading) => ApiResponse::ok(reading),
        None => Err(ApiError::NotFound("No telemetry data found".into())),
    }
}

fn ingest(group: SensorGroup, body: &str) -> Result<ApiResponse, ApiError> {
    let mut reading: TelemetryReading = serde_json::from_str(body)?;
    if reading.timestamp.is_none() {
        reading.timestamp = Some(Utc::now().to_rfc3339());
    }
    reading.parsed_timestamp()?;

    let alert = evaluate(&reading, group);
    let alerts = violations(&reading, group);
    if alert.violated {
        log::warn!("{}: {} field(s) out of range", alert.title(), alerts.len());
    }

    ApiResponse::with_status(201, &json!({ "reading": reading, "alert": alert, "alerts": alerts }))
}

fn current(state: &AppState) -> Result<ApiResponse, ApiError> {
    let data = match state.current() {
        Some(data) => data,
        None if state.config().synthetic_fallback => {
            let now = Utc::now();
            let synthetic = state.synthetic();
            let fish = synthetic.reading_at(SensorGroup::Fish, now);
            CurrentTelemetry {
                timestamp: fish.timestamp.clone(),
                plant: Some(synthetic.reading_at(SensorGroup::Plant, now)),
                fish,
            }
        }
        None => return Err(ApiError::NotFound("No telemetry data available".into())),
    };

    ApiResponse::ok(&json!({ "success": true, "data": data }))
}

fn set_paused(state: &AppState, paused: bool) -> Result<ApiResponse, ApiError> {
    state.set_paused(paused);
    let message = if paused { "Telemetry paused successfully" } else { "Telemetry resumed successfully" };
    ApiResponse::ok(&json!({ "success": true, "paused": paused, "message": message }))
}

fn replay_state(state: &AppState) -> Result<ApiResponse, ApiError> {
    ApiResponse::ok(&json!({ "paused": state.is_paused(), "position": state.replay_position() }))
}

fn thresholds() -> Result<ApiResponse, ApiError> {
    ApiResponse::ok(&json!({ "fish": ThresholdTable::fish(), "plant": ThresholdTable::plant() }))
}

// ============================================================================
// AI analysis
// ============================================================================

fn predict(state: &AppState, body: &str) -> Result<ApiResponse, ApiError> {
    let request: PredictRequest = if body.trim().is_empty() {
        PredictRequest::default()
    } else {
        serde_json::from_str(body)?
    };

    let analyzer = Analyzer::new(state.runner(), state.synthetic(), state.snapshot());
    let record = state.block_on(analyzer.analyze(&request))?;
    state.history().insert(record.clone())?;

    log::info!(
        "Analysis {} stored ({}, fallback: {})",
        record.id,
        record.model_used,
        record.fallback
    );
    ApiResponse::with_status(201, &record)
}

fn history(state: &AppState) -> Result<ApiResponse, ApiError> {
    ApiResponse::ok(&state.history().list()?)
}

fn analysis(state: &AppState, id: &str) -> Result<ApiResponse, ApiError> {
    match state.history().get(id)? {
        Some(record) => ApiResponse::ok(&record),
        None => Err(ApiError::NotFound(format!("No analysis found with ID: {}", id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_decodes_query() {
        let (path, params) = split_url("/api/telemetry/fish?startTime=2024-03-07T00%3A00%3A00Z&granularity=hour&x");
        assert_eq!(path, "/api/telemetry/fish");
        assert_eq!(params["startTime"], "2024-03-07T00:00:00Z");
        assert_eq!(params["granularity"], "hour");
        assert_eq!(params["x"], "");
    }

    #[test]
    fn decoding_tolerates_bad_escapes() {
        assert_eq!(decode_component("a+b"), "a b");
        assert_eq!(decode_component("100%"), "100%");
        assert_eq!(decode_component("%zz1"), "%zz1");
        assert_eq!(decode_component("%41"), "A");
    }

    #[test]
    fn flags() {
        let (_, params) = split_url("/x?isValidation=true&other=0");
        assert!(flag_param(&params, "isValidation"));
        assert!(!flag_param(&params, "other"));
        assert!(!flag_param(&params, "missing"));
    }
}
