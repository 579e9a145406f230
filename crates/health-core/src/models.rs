use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Column names ──────────────────────────────────────────────────────────────

/// Percentage of capacity in use.
pub const FIELD_PERC_USED: &str = "perc_used";
/// Average throughput of the system.
pub const FIELD_AVG_SPEED: &str = "avg_speed";
/// Whether the system is currently reporting telemetry.
pub const FIELD_SENDING_TELEMETRY: &str = "sending_telemetry";
/// Metrics usage pattern.
pub const FIELD_MUP: &str = "MUP";
/// Sample timestamp.
pub const FIELD_DATE: &str = "date";

/// Columns every telemetry export must carry for scoring to work.
pub const REQUIRED_FIELDS: [&str; 5] = [
    FIELD_PERC_USED,
    FIELD_AVG_SPEED,
    FIELD_SENDING_TELEMETRY,
    FIELD_MUP,
    FIELD_DATE,
];

// ── MissingFieldPolicy ────────────────────────────────────────────────────────

/// What the reader does with a blank or mistyped scoring cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// Reject the load with `MissingField` / `InvalidField`.
    #[default]
    Fail,
    /// Substitute `0` (numbers) or `false` (telemetry flag).
    Zero,
}

impl std::str::FromStr for MissingFieldPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "zero" => Ok(Self::Zero),
            other => Err(format!("unknown missing-field policy: {other}")),
        }
    }
}

// ── FieldValue ────────────────────────────────────────────────────────────────

/// A single coerced CSV cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Empty,
}

impl FieldValue {
    /// Numeric view of the cell. Booleans and text are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Textual view of the cell; numbers are rendered back to text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }
}

// ── SystemRecord ──────────────────────────────────────────────────────────────

/// One row of the installed-base telemetry export.
///
/// The five scoring columns are validated and typed at load time; every column
/// of the row (including those five) is also kept in `fields` under its header
/// name so that optional columns remain reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    /// 1-based line number in the source text.
    pub line: u64,
    /// Percentage of capacity in use.
    pub perc_used: f64,
    /// Average throughput.
    pub avg_speed: f64,
    /// Telemetry flag.
    pub sending_telemetry: bool,
    /// Metrics usage pattern.
    pub mup: f64,
    /// Raw timestamp text; parsed on demand.
    pub date: String,
    /// All columns keyed by header name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl SystemRecord {
    /// Raw cell for `name`, if the column exists.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Numeric value of an optional column.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(FieldValue::as_f64)
    }

    /// Text value of an optional column; blank cells yield `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name).and_then(FieldValue::as_text)
    }

    /// Best human-facing identifier: `hostid`, then `name`, then `unit_id`,
    /// then the source line.
    pub fn label(&self) -> String {
        ["hostid", "name", "unit_id"]
            .iter()
            .find_map(|key| self.text(key))
            .unwrap_or_else(|| format!("line {}", self.line))
    }

    /// Timestamp text used for recency checks: `last_date` when present,
    /// otherwise `date`.
    pub fn last_seen_text(&self) -> &str {
        match self.fields.get("last_date") {
            Some(FieldValue::Text(s)) if !s.trim().is_empty() => s.as_str(),
            _ => &self.date,
        }
    }
}

// ── RecordSet ─────────────────────────────────────────────────────────────────

/// Ordered records sharing one header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Header names in source order.
    pub headers: Vec<String>,
    /// Records in source order.
    pub records: Vec<SystemRecord>,
}

impl RecordSet {
    pub fn new(headers: Vec<String>, records: Vec<SystemRecord>) -> Self {
        Self { headers, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SystemRecord> {
        self.records.iter()
    }

    /// Keep the header, replace the rows with those matching `pred`.
    pub fn retain_where<F>(&self, pred: F) -> RecordSet
    where
        F: Fn(&SystemRecord) -> bool,
    {
        RecordSet {
            headers: self.headers.clone(),
            records: self.records.iter().filter(|r| pred(r)).cloned().collect(),
        }
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Traffic-light status attached to each sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Good,
    Warning,
    Critical,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Good => "good",
            Status::Warning => "warning",
            Status::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ── ScoreResult ───────────────────────────────────────────────────────────────

/// The four relative sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub capacity_score: f64,
    pub performance_score: f64,
    pub telemetry_score: f64,
    pub utilization_score: f64,
}

/// Value, status and message for one sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDetail {
    pub value: f64,
    pub status: Status,
    pub message: String,
}

/// Status annotations for each sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDetails {
    pub capacity: MetricDetail,
    pub performance: MetricDetail,
    pub telemetry: MetricDetail,
    pub utilization: MetricDetail,
}

/// Composite health of one system relative to its population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Weighted composite, rounded. Not clamped to 0..=100.
    pub score: i64,
    pub metrics: HealthMetrics,
    pub details: HealthDetails,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
