//! Forecast prompt templates.
//!
//! One template per sensor group. The current reading's values are listed
//! with their units, followed by the JSON shape the model must answer with.

use aquaguard_core::{SensorGroup, TelemetryReading};

/// Field, label and unit for each listed reading value.
type FieldLine = (&'static str, &'static str, &'static str);

const FISH_FIELDS: &[FieldLine] = &[
    ("phLevel", "pH Level", "pH"),
    ("temperatureLevel", "Temperature", "°C"),
    ("tdsLevel", "TDS Level", "ppm"),
    ("turbidityLevel", "Turbidity Level", "NTU"),
    ("ecLevel", "EC Level", "mS/cm"),
];

const PLANT_FIELDS: &[FieldLine] = &[
    ("humidityLevel", "Humidity Level", "%"),
    ("temperatureLevel", "Temperature Level", "°C"),
    ("pressureLevel", "Pressure Level", "kPa"),
];

/// Fields a forecast for the group is expected to contain.
pub fn forecast_fields(group: SensorGroup) -> impl Iterator<Item = &'static str> {
    fields(group).iter().map(|(field, _, _)| *field)
}

fn fields(group: SensorGroup) -> &'static [FieldLine] {
    match group {
        SensorGroup::Fish => FISH_FIELDS,
        SensorGroup::Plant => PLANT_FIELDS,
    }
}

fn subject(group: SensorGroup) -> (&'static str, &'static str) {
    match group {
        SensorGroup::Fish => ("fish tank", "aquaponics system dynamics"),
        SensorGroup::Plant => ("plant tray", "plant growth dynamics"),
    }
}

/// Numeric value of `field`; client-supplied readings may spell it in a
/// different case (`pHLevel`).
fn lookup(reading: &TelemetryReading, field: &str) -> Option<f64> {
    reading.numeric(field).or_else(|| {
        reading
            .numeric_fields()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| value)
    })
}

/// Build the 24-hour forecast prompt for a reading.
///
/// Values missing from the reading are listed as `n/a`.
pub fn forecast_prompt(group: SensorGroup, reading: &TelemetryReading) -> String {
    let (unit_name, dynamics) = subject(group);
    let mut prompt = format!(
        "You are an expert aquaponics AI assistant analyzing {} telemetry data.\n\
         Based on the following current environmental metrics, predict what these values will be in 24 hours:\n\n\
         Current readings:\n",
        unit_name
    );

    for (field, label, unit) in fields(group) {
        match lookup(reading, field) {
            Some(value) => prompt.push_str(&format!("- {}: {} {}\n", label, value, unit)),
            None => prompt.push_str(&format!("- {}: n/a\n", label)),
        }
    }

    prompt.push_str(&format!(
        "\nConsider seasonal patterns, previous trends, and {}.\n\
         Provide your predictions in JSON format with this structure:\n\
         {{\n  \"predicted\": {{\n",
        dynamics
    ));

    let shape: Vec<String> = fields(group)
        .iter()
        .map(|(field, _, _)| format!("    \"{}\": 0.0", field))
        .collect();
    prompt.push_str(&shape.join(",\n"));

    prompt.push_str(
        "\n  },\n  \"explanation\": \"brief explanation of your reasoning\",\n  \"confidenceScore\": 0.0 to 1.0\n}\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fish_prompt_lists_current_values() {
        let reading = TelemetryReading::new("2024-03-07T00:00:00Z")
            .with_value("phLevel", 7.1)
            .with_value("tdsLevel", 420.0);

        let prompt = forecast_prompt(SensorGroup::Fish, &reading);
        assert!(prompt.contains("fish tank telemetry"));
        assert!(prompt.contains("- pH Level: 7.1 pH"));
        assert!(prompt.contains("- TDS Level: 420 ppm"));
        assert!(prompt.contains("- EC Level: n/a"));
        assert!(prompt.contains("\"turbidityLevel\": 0.0"));
        assert!(prompt.contains("confidenceScore"));
    }

    #[test]
    fn plant_prompt_uses_plant_fields() {
        let reading = TelemetryReading::new("2024-03-07T00:00:00Z").with_value("humidityLevel", 66.0);
        let prompt = forecast_prompt(SensorGroup::Plant, &reading);
        assert!(prompt.contains("plant growth dynamics"));
        assert!(prompt.contains("- Humidity Level: 66 %"));
        assert!(!prompt.contains("phLevel"));
        assert_eq!(forecast_fields(SensorGroup::Plant).count(), 3);
    }

    #[test]
    fn field_case_is_ignored() {
        let reading = TelemetryReading::new("2024-03-07T00:00:00Z").with_value("pHLevel", 6.8);
        let prompt = forecast_prompt(SensorGroup::Fish, &reading);
        assert!(prompt.contains("- pH Level: 6.8 pH"));
    }
}
