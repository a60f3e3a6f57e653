//! Normalisation of loosely-typed batch payloads into job specs.
//!
//! Rows typically come from a spreadsheet converted to JSON on the client,
//! so numbers and strings are used interchangeably and column names vary.

use serde_json::Value;

use super::types::{JobSpec, ProfileMetadata, ValidationError};

const RESOURCE_KEY_FIELDS: &[&str] = &["profile_id", "profile", "gpm_id"];
const SEARCH_TERM_FIELDS: &[&str] = &["keyword"];
const TITLE_FIELDS: &[&str] = &["playlist_title", "title"];
const NAME_FIELDS: &[&str] = &["name", "profile_name"];

/// Fallback values applied while parsing a batch.
#[derive(Debug, Clone, Copy)]
pub struct IntakeDefaults {
    pub target_count: u32,
    pub concurrency: usize,
    pub max_concurrency: usize,
}

/// A parsed batch ready for submission.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub specs: Vec<JobSpec>,
    pub concurrency: usize,
    pub filename: Option<String>,
    /// Rows dropped because identity or search term was missing.
    pub rejected_rows: usize,
}

/// Parses `{ "rows": [...], "max_workers"?, "target_total"?, "filename"? }`.
pub fn parse_batch(payload: &Value, defaults: &IntakeDefaults) -> Result<BatchRequest, ValidationError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ValidationError::InvalidPayload("expected a JSON object".to_string()))?;

    let rows = match object.get("rows") {
        Some(Value::Array(rows)) if !rows.is_empty() => rows,
        Some(Value::Array(_)) | Some(Value::Null) | None => return Err(ValidationError::EmptyBatch),
        Some(_) => {
            return Err(ValidationError::InvalidPayload(
                "rows must be a list".to_string(),
            ))
        }
    };

    let batch_target = normalize_target(object.get("target_total"), defaults.target_count);
    let concurrency = clamp_concurrency(
        object.get("max_workers"),
        defaults.concurrency,
        defaults.max_concurrency,
    );

    let mut specs = Vec::with_capacity(rows.len());
    let mut rejected_rows = 0;
    for row in rows {
        match parse_row(row, batch_target) {
            Some(spec) => specs.push(spec),
            None => rejected_rows += 1,
        }
    }

    if specs.is_empty() {
        return Err(ValidationError::NoValidRows);
    }

    Ok(BatchRequest {
        specs,
        concurrency,
        filename: object.get("filename").and_then(text),
        rejected_rows,
    })
}

/// Builds a spec from one row, or `None` when identity or keyword is missing.
pub fn parse_row(row: &Value, batch_target: u32) -> Option<JobSpec> {
    let resource_key = first_field(row, RESOURCE_KEY_FIELDS)?;
    let search_term = first_field(row, SEARCH_TERM_FIELDS)?;

    let metadata = ProfileMetadata {
        name: first_field(row, NAME_FIELDS),
        raw_proxy: first_field(row, &["raw_proxy"]),
        profile_path: first_field(row, &["profile_path"]),
        browser_type: first_field(row, &["browser_type"]),
        browser_version: first_field(row, &["browser_version"]),
        note: first_field(row, &["note"]),
    };

    let mut spec = JobSpec::new(resource_key, search_term)
        .with_target_count(normalize_target(row.get("target_total"), batch_target))
        .with_metadata(metadata);
    spec.collection_name = first_field(row, TITLE_FIELDS);
    Some(spec)
}

/// Integer (or numeric string) >= 1, otherwise `fallback`.
pub fn normalize_target(value: Option<&Value>, fallback: u32) -> u32 {
    match value.and_then(as_integer) {
        Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => fallback,
    }
}

/// Clamps a requested worker count to `[1, max]`; unparseable values use `default`.
pub fn clamp_concurrency(value: Option<&Value>, default: usize, max: usize) -> usize {
    let max = max.max(1);
    match value.and_then(as_integer) {
        Some(n) if n < 1 => 1,
        Some(n) => usize::try_from(n).unwrap_or(max).min(max),
        None => default.clamp(1, max),
    }
}

fn first_field(row: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| row.get(*name).and_then(text))
}

/// Non-empty trimmed text from a string or number value.
fn text(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
