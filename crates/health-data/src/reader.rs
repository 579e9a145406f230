//! CSV loading for STORViX telemetry exports.
//!
//! Parses the installed-base export into [`SystemRecord`]s: header row first,
//! numeric-looking cells coerced to numbers, blank rows skipped, and the five
//! scoring columns validated according to a [`MissingFieldPolicy`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use health_core::error::{HealthError, Result};
use health_core::models::{
    FieldValue, MissingFieldPolicy, RecordSet, SystemRecord, FIELD_AVG_SPEED, FIELD_DATE,
    FIELD_MUP, FIELD_PERC_USED, FIELD_SENDING_TELEMETRY, REQUIRED_FIELDS,
};
use regex::Regex;
use tracing::debug;

// ── Public API ────────────────────────────────────────────────────────────────

/// Read and parse the CSV file at `path`.
pub fn load_records(path: &Path, policy: MissingFieldPolicy) -> Result<RecordSet> {
    let text = std::fs::read_to_string(path).map_err(|source| HealthError::Fetch {
        locator: path.display().to_string(),
        source,
    })?;
    parse_records(&text, policy)
}

/// Parse CSV `text` into a [`RecordSet`].
///
/// Input with no header row yields an empty set; scoring such a set later
/// fails with [`HealthError::EmptyPopulation`].
pub fn parse_records(text: &str, policy: MissingFieldPolicy) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(clean_header)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        debug!("CSV input has no header row");
        return Ok(RecordSet::default());
    }

    if let Some(duplicate) = first_duplicate(&headers) {
        return Err(HealthError::parse_at(
            1,
            format!("duplicate column `{duplicate}`"),
        ));
    }

    for required in REQUIRED_FIELDS {
        if !headers.iter().any(|h| h == required) {
            return Err(HealthError::MissingField {
                field: required.to_string(),
                line: None,
            });
        }
    }

    let mut records = Vec::new();
    let mut skipped_blank = 0usize;

    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        if row.iter().all(|cell| cell.trim().is_empty()) {
            skipped_blank += 1;
            continue;
        }
        if row.len() != headers.len() {
            return Err(HealthError::parse_at(
                line,
                format!("expected {} fields, found {}", headers.len(), row.len()),
            ));
        }

        let fields: BTreeMap<String, FieldValue> = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name.clone(), coerce_cell(cell)))
            .collect();

        records.push(build_record(line, fields, policy)?);
    }

    debug!(
        "Parsed {} records ({} blank rows skipped, {} columns)",
        records.len(),
        skipped_blank,
        headers.len()
    );

    Ok(RecordSet::new(headers, records))
}

/// Dynamic typing of a single cell: numbers, `true`/`false`, blank, or text.
///
/// Numbers that overflow to infinity stay text.
pub fn coerce_cell(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FieldValue::Empty;
    }
    if numeric_pattern().is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return FieldValue::Number(n);
            }
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return FieldValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return FieldValue::Bool(false);
    }
    FieldValue::Text(trimmed.to_string())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$").expect("regex is valid")
    })
}

/// Spreadsheet exports sometimes prefix the first header with a BOM.
fn clean_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}

fn first_duplicate(headers: &[String]) -> Option<&str> {
    let mut seen = BTreeSet::new();
    headers
        .iter()
        .filter(|h| !h.is_empty())
        .find(|h| !seen.insert(h.as_str()))
        .map(String::as_str)
}

fn csv_error(err: csv::Error) -> HealthError {
    let line = err.position().map(|p| p.line());
    HealthError::Parse {
        line,
        message: err.to_string(),
    }
}

fn build_record(
    line: u64,
    fields: BTreeMap<String, FieldValue>,
    policy: MissingFieldPolicy,
) -> Result<SystemRecord> {
    let perc_used = numeric_field(&fields, FIELD_PERC_USED, line, policy)?;
    let avg_speed = numeric_field(&fields, FIELD_AVG_SPEED, line, policy)?;
    let mup = numeric_field(&fields, FIELD_MUP, line, policy)?;
    let sending_telemetry = telemetry_field(&fields, line, policy)?;

    // Dates are parsed on demand by the filters; a blank date simply never
    // falls inside a time window.
    let date = fields
        .get(FIELD_DATE)
        .and_then(FieldValue::as_text)
        .unwrap_or_default();

    Ok(SystemRecord {
        line,
        perc_used,
        avg_speed,
        sending_telemetry,
        mup,
        date,
        fields,
    })
}

fn numeric_field(
    fields: &BTreeMap<String, FieldValue>,
    name: &str,
    line: u64,
    policy: MissingFieldPolicy,
) -> Result<f64> {
    match fields.get(name) {
        Some(FieldValue::Number(n)) => Ok(*n),
        Some(FieldValue::Empty) | None => match policy {
            MissingFieldPolicy::Fail => Err(HealthError::missing_at(name, line)),
            MissingFieldPolicy::Zero => {
                debug!("line {}: blank `{}` defaulted to 0", line, name);
                Ok(0.0)
            }
        },
        Some(other) => match policy {
            MissingFieldPolicy::Fail => Err(HealthError::InvalidField {
                field: name.to_string(),
                line,
                value: other.as_text().unwrap_or_default(),
            }),
            MissingFieldPolicy::Zero => {
                debug!("line {}: non-numeric `{}` defaulted to 0", line, name);
                Ok(0.0)
            }
        },
    }
}

fn telemetry_field(
    fields: &BTreeMap<String, FieldValue>,
    line: u64,
    policy: MissingFieldPolicy,
) -> Result<bool> {
    let value = fields.get(FIELD_SENDING_TELEMETRY);
    let parsed = match value {
        Some(FieldValue::Bool(b)) => Some(*b),
        Some(FieldValue::Number(n)) if *n == 1.0 => Some(true),
        Some(FieldValue::Number(n)) if *n == 0.0 => Some(false),
        Some(FieldValue::Text(s)) if s.eq_ignore_ascii_case("yes") => Some(true),
        Some(FieldValue::Text(s)) if s.eq_ignore_ascii_case("no") => Some(false),
        _ => None,
    };
    if let Some(flag) = parsed {
        return Ok(flag);
    }

    match (policy, value) {
        (MissingFieldPolicy::Zero, _) => {
            debug!("line {}: `{}` defaulted to false", line, FIELD_SENDING_TELEMETRY);
            Ok(false)
        }
        (MissingFieldPolicy::Fail, Some(FieldValue::Empty) | None) => {
            Err(HealthError::missing_at(FIELD_SENDING_TELEMETRY, line))
        }
        (MissingFieldPolicy::Fail, Some(other)) => Err(HealthError::InvalidField {
            field: FIELD_SENDING_TELEMETRY.to_string(),
            line,
            value: other.as_text().unwrap_or_default(),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
