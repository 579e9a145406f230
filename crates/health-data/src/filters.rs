//! Time-window and attribute filters over a [`RecordSet`].

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::Duration;
use health_core::clock::Clock;
use health_core::models::{RecordSet, SystemRecord};
use health_core::time_utils::TimezoneHandler;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Time window ───────────────────────────────────────────────────────────────

/// Keep records whose `date` falls within the last `days` days.
///
/// The window is `now - days ..= now`, inclusive at both ends. Records whose
/// date cannot be parsed, or lies after `now`, are dropped. A window reaching
/// past the earliest representable date has no lower bound.
pub fn filter_by_time_range(
    set: &RecordSet,
    days: u32,
    clock: &dyn Clock,
    tz: &TimezoneHandler,
) -> RecordSet {
    let now = clock.now();
    let cutoff = now.checked_sub_signed(Duration::days(i64::from(days)));

    let kept = set.retain_where(|record| match tz.parse_timestamp(&record.date) {
        Some(t) => t <= now && cutoff.map_or(true, |c| t >= c),
        None => false,
    });

    debug!(
        "Time window {}d kept {} of {} records (cutoff {})",
        days,
        kept.len(),
        set.len(),
        cutoff.map_or_else(|| "none".to_string(), |c| c.to_rfc3339())
    );
    kept
}

// ── Attribute filters ─────────────────────────────────────────────────────────

/// Telemetry selector for [`RecordFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl FromStr for TelemetryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown telemetry filter: {other}")),
        }
    }
}

/// Company / type / pool / telemetry selection. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub company: Option<String>,
    pub system_type: Option<String>,
    pub pool: Option<String>,
    pub telemetry: TelemetryFilter,
}

impl RecordFilter {
    /// `true` when no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.system_type.is_none()
            && self.pool.is_none()
            && self.telemetry == TelemetryFilter::All
    }

    pub fn matches(&self, record: &SystemRecord) -> bool {
        attribute_matches(record, "company", self.company.as_deref())
            && attribute_matches(record, "type", self.system_type.as_deref())
            && attribute_matches(record, "pool", self.pool.as_deref())
            && match self.telemetry {
                TelemetryFilter::All => true,
                TelemetryFilter::Active => record.sending_telemetry,
                TelemetryFilter::Inactive => !record.sending_telemetry,
            }
    }

    /// Records matching every criterion, in source order.
    pub fn apply(&self, set: &RecordSet) -> RecordSet {
        if self.is_empty() {
            return set.clone();
        }
        let kept = set.retain_where(|r| self.matches(r));
        debug!("Attribute filter kept {} of {} records", kept.len(), set.len());
        kept
    }
}

fn attribute_matches(record: &SystemRecord, column: &str, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => record.text(column).as_deref() == Some(wanted),
    }
}

/// `true` when `host` names this record by `hostid`, `name` or `unit_id`
/// (case-insensitive).
pub fn matches_host(record: &SystemRecord, host: &str) -> bool {
    let host = host.trim();
    ["hostid", "name", "unit_id"]
        .iter()
        .filter_map(|key| record.text(key))
        .any(|value| value.eq_ignore_ascii_case(host))
}

// ── Filter options ────────────────────────────────────────────────────────────

/// Distinct attribute values present in a record set, sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub companies: Vec<String>,
    pub types: Vec<String>,
    pub pools: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(set: &RecordSet) -> Self {
        let distinct = |column: &str| -> Vec<String> {
            set.iter()
                .filter_map(|r| r.text(column))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        Self {
            companies: distinct("company"),
            types: distinct("type"),
            pools: distinct("pool"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
