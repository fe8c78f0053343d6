//! Extraction of structured payloads from model text.

use serde::de::DeserializeOwned;
use tracing::error;

use crate::types::GenerationError;

const FENCE: &str = "```";

/// Returns the contents of the first fenced block, or the trimmed text when
/// there is no complete fence.
pub fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find(FENCE) else {
        return text.trim();
    };
    let body = &text[open + FENCE.len()..];
    let body = body.strip_prefix("json").unwrap_or(body);
    match body.find(FENCE) {
        Some(close) => body[..close].trim(),
        None => text.trim(),
    }
}

/// Parses model output as `T`, tolerating a fence wrapper or prose around
/// the outermost JSON object/array.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    let candidate = strip_code_fence(text);
    let first_err = match serde_json::from_str::<T>(candidate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(inner) = outermost_json(candidate) {
        if let Ok(value) = serde_json::from_str::<T>(inner) {
            return Ok(value);
        }
    }

    error!(raw = %summarize_raw(text), "Failed to parse structured output: {}", first_err);
    Err(GenerationError::MalformedOutput(first_err.to_string()))
}

fn outermost_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Single-line, bounded rendering of upstream text for logs.
pub fn summarize_raw(raw: &str) -> String {
    const MAX_CHARS: usize = 800;
    let compact = raw.replace(['\n', '\r'], " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &compact[..idx]),
        None => compact,
    }
}
