//! Dataset Conventions

/// System identifier assigned to readings that do not carry one.
pub const DEFAULT_SYSTEM_ID: &str = "system-001";

/// Replay starts at the first fish reading at or after this instant.
pub const REPLAY_START: &str = "2024-03-07T00:00:00Z";

/// Extension of dataset files inside the data directory.
pub const DATASET_EXTENSION: &str = "csv";

/// Canonical sensor field names. CSV columns that match one of these
/// case-insensitively after header normalization take this spelling.
pub const SENSOR_FIELDS: [&str; 13] = [
    "phLevel",
    "temperatureLevel",
    "tdsLevel",
    "turbidityLevel",
    "ecLevel",
    "pressureLevel",
    "humidityLevel",
    "dissolvedOxygen",
    "ammonia",
    "nitrate",
    "moistureLevel",
    "nutrientLevel",
    "lightLevel",
];
