//! Chat-completion response decoding.
//!
//! Models wrap their answer in prose or reasoning blocks. The completion text
//! is taken from `choices[0].message.content` (or a top-level `content`),
//! `<think>` sections are removed, and the span from the first `{` to the
//! last `}` is parsed as a [`ModelPrediction`].

use aquaguard_core::ModelPrediction;
use serde_json::Value;

use crate::ConnectorError;

/// Completion text of a chat-completion response.
pub fn completion_text(response: &Value) -> Result<&str, ConnectorError> {
    let from_choices = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(Value::as_str);

    from_choices
        .or_else(|| response.get("content").and_then(Value::as_str))
        .ok_or_else(|| ConnectorError::UnexpectedResponse(response.to_string().chars().take(200).collect()))
}

fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Span from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a prediction out of free-form completion text.
pub fn parse_prediction(text: &str) -> Result<ModelPrediction, ConnectorError> {
    let cleaned = strip_reasoning(text);
    let json = extract_json_object(&cleaned).ok_or(ConnectorError::NoJson)?;

    match serde_json::from_str::<ModelPrediction>(json) {
        Ok(prediction) => Ok(prediction),
        // Some deployments double-escape newlines inside the JSON block
        Err(first) => serde_json::from_str(&json.replace("\\n", "\n"))
            .map_err(|_| ConnectorError::InvalidPrediction(first.to_string())),
    }
}
