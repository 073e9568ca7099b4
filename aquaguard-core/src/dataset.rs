//! Dataset Snapshot Loading
//!
//! ## Overview
//!
//! The recorded telemetry lives in four CSV files inside one data directory:
//!
//! | File | Group | Dataset |
//! |------|-------|---------|
//! | `fish_initial.csv` | fish | initial |
//! | `fish_validate.csv` | fish | validate |
//! | `plant_initial.csv` | plant | initial |
//! | `plant_validate.csv` | plant | validate |
//!
//! [`DatasetLoader::load`] reads them once into an immutable
//! [`TelemetrySnapshot`] that is then shared read-only by every request.
//! Reloading means building a new snapshot.
//!
//! ## CSV Format
//!
//! ```csv
//! Timestamp,pH Level (pH),Temperature Level (°C),TDS Level (ppm)
//! 2024-03-07 00:00:00,7.12,24.3,412
//! ```
//!
//! Headers are normalized to camelCase field names with
//! [`normalize_header`] and then mapped onto the canonical sensor names by
//! [`field_name`], so `pH Level (pH)` loads as `phLevel` and `TDS Level` as
//! `tdsLevel`, the names thresholds and forecasts use. Cells that parse as finite numbers become numbers,
//! empty cells become null, everything else stays a string. Quoted cells may
//! contain commas and doubled quotes but not line breaks.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::aggregation::Resampled;
use crate::constants::dataset::{DATASET_EXTENSION, SENSOR_FIELDS};
use crate::errors::DatasetError;
use crate::telemetry::{DatasetKind, SensorGroup, TelemetryReading};
use crate::time::Granularity;

/// Statistics for one CSV read
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CsvStats {
    /// Readings produced
    pub rows_read: usize,
    /// Lines seen, header included
    pub lines_processed: usize,
    /// Rows whose cell count did not match the header
    pub parse_errors: usize,
}

/// Normalize a CSV header into a field name.
///
/// Parenthesized text is removed, the rest is trimmed, whitespace-separated
/// words are joined with the following character upper-cased, and the
/// first character is lower-cased.
pub fn normalize_header(header: &str) -> String {
    let mut stripped = String::with_capacity(header.len());
    let mut depth = 0usize;
    for c in header.trim_start_matches('\u{feff}').chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }

    let mut out = String::with_capacity(stripped.len());
    let mut upper_next = false;
    for c in stripped.trim().chars() {
        if c.is_whitespace() {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    let mut chars = out.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => out,
    }
}

/// Field name for a CSV header: the canonical sensor name when the
/// normalized header matches one ignoring case, otherwise the normalized
/// header itself.
pub fn field_name(header: &str) -> String {
    let normalized = normalize_header(header);
    SENSOR_FIELDS
        .iter()
        .find(|field| field.eq_ignore_ascii_case(&normalized))
        .map_or(normalized, |field| field.to_string())
}

fn split_line(line: &str) -> Option<Vec<String>> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if cell.trim().is_empty() => {
                cell.clear();
                quoted = true;
            }
            (',', false) => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }

    if quoted {
        return None;
    }
    cells.push(cell);
    Some(cells)
}

fn parse_cell(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Null;
    }
    match text.parse::<f64>() {
        Ok(number) if number.is_finite() => Value::from(number),
        _ => Value::String(text.to_string()),
    }
}

/// Read readings from CSV text.
pub fn read_csv<R: BufRead>(
    reader: R,
    source_name: &str,
) -> Result<(Vec<TelemetryReading>, CsvStats), DatasetError> {
    let mut stats = CsvStats::default();
    let mut columns: Vec<String> = Vec::new();
    let mut readings = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DatasetError::Io {
            path: source_name.to_string(),
            reason: e.to_string(),
        })?;
        stats.lines_processed += 1;

        if line.trim().is_empty() {
            continue;
        }

        let cells = split_line(&line).ok_or_else(|| DatasetError::Format {
            source_name: source_name.to_string(),
            line: index + 1,
            reason: "Unterminated quoted field",
        })?;

        if columns.is_empty() {
            columns = cells.iter().map(|h| field_name(h)).collect();
            continue;
        }

        if cells.len() != columns.len() {
            stats.parse_errors += 1;
            log_warn!(
                "{} line {}: expected {} cells, found {}",
                source_name,
                index + 1,
                columns.len(),
                cells.len()
            );
        }

        let mut reading = TelemetryReading::untimed();
        for (column, cell) in columns.iter().zip(&cells) {
            match column.as_str() {
                "timestamp" => {
                    let text = cell.trim();
                    reading.timestamp = (!text.is_empty()).then(|| text.to_string());
                }
                "systemId" => {
                    let text = cell.trim();
                    if !text.is_empty() {
                        reading.system_id = text.to_string();
                    }
                }
                _ => {
                    reading.fields.insert(column.clone(), parse_cell(cell));
                }
            }
        }

        readings.push(reading);
        stats.rows_read += 1;
    }

    if columns.is_empty() {
        log_debug!("{} has no header row", source_name);
    }

    Ok((readings, stats))
}

/// Read readings from a CSV file.
pub fn read_csv_file(path: &Path) -> Result<Vec<TelemetryReading>, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let name = path.display().to_string();
    let (readings, stats) = read_csv(BufReader::new(file), &name)?;
    log_debug!(
        "Loaded {} readings from {} ({} malformed rows)",
        stats.rows_read,
        name,
        stats.parse_errors
    );
    Ok(readings)
}

/// Sort readings by timestamp, unparseable ones last, preserving input order
/// among equals.
pub fn sort_by_timestamp(readings: &mut [TelemetryReading]) {
    readings.sort_by_cached_key(|reading| match reading.parsed_timestamp() {
        Ok(at) => (false, Some(at)),
        Err(_) => (true, None),
    });
}

/// Numeric columns of a series, in reading order.
///
/// A reading that lacks a field simply contributes nothing to that column.
pub fn numeric_columns<'a, I>(readings: I) -> BTreeMap<String, Vec<f64>>
where
    I: IntoIterator<Item = &'a TelemetryReading>,
{
    let mut columns: BTreeMap<String, Vec<f64>> = Default::default();
    for reading in readings {
        for (field, value) in reading.numeric_fields() {
            columns.entry(field.to_string()).or_default().push(value);
        }
    }
    columns
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable view of the four recorded datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    datasets: [Vec<TelemetryReading>; 4],
}

fn slot(group: SensorGroup, kind: DatasetKind) -> usize {
    match (group, kind) {
        (SensorGroup::Fish, DatasetKind::Initial) => 0,
        (SensorGroup::Fish, DatasetKind::Validate) => 1,
        (SensorGroup::Plant, DatasetKind::Initial) => 2,
        (SensorGroup::Plant, DatasetKind::Validate) => 3,
    }
}

impl TelemetrySnapshot {
    /// Replace one dataset. Readings are sorted by timestamp.
    pub fn with_dataset(
        mut self,
        group: SensorGroup,
        kind: DatasetKind,
        mut readings: Vec<TelemetryReading>,
    ) -> Self {
        sort_by_timestamp(&mut readings);
        self.datasets[slot(group, kind)] = readings;
        self
    }

    /// Readings of one dataset, ascending by timestamp.
    pub fn dataset(&self, group: SensorGroup, kind: DatasetKind) -> &[TelemetryReading] {
        &self.datasets[slot(group, kind)]
    }

    /// Total number of readings across all datasets.
    pub fn total_len(&self) -> usize {
        self.datasets.iter().map(Vec::len).sum()
    }

    /// True when no dataset holds any reading.
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Readings in `[start, end]`, aggregated when a granularity is given.
    pub fn range(
        &self,
        group: SensorGroup,
        kind: DatasetKind,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        granularity: Option<Granularity>,
    ) -> Resampled {
        Resampled::build(self.dataset(group, kind), start, end, granularity)
    }

    /// Most recent reading of a group's initial dataset.
    pub fn latest(&self, group: SensorGroup) -> Option<&TelemetryReading> {
        let readings = self.dataset(group, DatasetKind::Initial);
        readings
            .iter()
            .rev()
            .find(|r| r.parsed_timestamp().is_ok())
            .or_else(|| readings.last())
    }

    /// Reading closest in time to `at`; the earliest wins a tie.
    pub fn closest(
        &self,
        group: SensorGroup,
        kind: DatasetKind,
        at: DateTime<Utc>,
    ) -> Option<&TelemetryReading> {
        closest_to(self.dataset(group, kind), at)
    }
}

pub(crate) fn closest_to(readings: &[TelemetryReading], at: DateTime<Utc>) -> Option<&TelemetryReading> {
    let mut best: Option<(&TelemetryReading, i64)> = None;
    for reading in readings {
        let Ok(ts) = reading.parsed_timestamp() else { continue };
        let distance = (ts - at).num_milliseconds().saturating_abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((reading, distance));
        }
    }
    best.map(|(reading, _)| reading)
}

// ============================================================================
// Loader
// ============================================================================

/// Loads a [`TelemetrySnapshot`] from a data directory.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    dir: PathBuf,
}

impl DatasetLoader {
    /// Loader for the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of a dataset, e.g. `fish_initial.csv`.
    pub fn file_name(group: SensorGroup, kind: DatasetKind) -> String {
        format!("{}_{}.{}", group, kind, DATASET_EXTENSION)
    }

    /// Read all four datasets.
    ///
    /// Missing files produce empty datasets; unreadable or malformed files
    /// are errors. Fails with [`DatasetError::NoData`] when nothing loads.
    pub fn load(&self) -> Result<TelemetrySnapshot, DatasetError> {
        let mut snapshot = TelemetrySnapshot::default();

        for group in SensorGroup::ALL {
            for kind in [DatasetKind::Initial, DatasetKind::Validate] {
                let path = self.dir.join(Self::file_name(group, kind));
                if !path.is_file() {
                    log_warn!("Dataset {} not found, using empty dataset", path.display());
                    continue;
                }
                let readings = read_csv_file(&path)?;
                snapshot = snapshot.with_dataset(group, kind, readings);
            }
        }

        if snapshot.is_empty() {
            return Err(DatasetError::NoData(self.dir.display().to_string()));
        }
        Ok(snapshot)
    }
}
