//! Capacity trend series in a chosen display unit.

use std::fmt;
use std::str::FromStr;

use health_core::formatting::round_to;
use health_core::models::{RecordSet, SystemRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GB per GiB.
const GB_PER_GIB: f64 = 1.073741824;
/// GB per TB, as the dashboard counts it.
const GB_PER_TB: f64 = 1024.0;

// ── CapacityUnit ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapacityUnit {
    #[serde(rename = "GB")]
    Gb,
    #[serde(rename = "GiB")]
    Gib,
    #[serde(rename = "TB")]
    Tb,
    #[default]
    #[serde(rename = "%")]
    Percent,
}

impl CapacityUnit {
    /// Convert a GB figure into this unit. `Percent` leaves it untouched.
    pub fn convert_gb(self, gb: f64) -> f64 {
        match self {
            CapacityUnit::Gb | CapacityUnit::Percent => gb,
            CapacityUnit::Gib => round_to(gb / GB_PER_GIB, 2),
            CapacityUnit::Tb => round_to(gb / GB_PER_TB, 2),
        }
    }
}

impl FromStr for CapacityUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gb" => Ok(Self::Gb),
            "gib" => Ok(Self::Gib),
            "tb" => Ok(Self::Tb),
            "percent" | "%" => Ok(Self::Percent),
            other => Err(format!("unknown capacity unit: {other}")),
        }
    }
}

impl fmt::Display for CapacityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapacityUnit::Gb => "GB",
            CapacityUnit::Gib => "GiB",
            CapacityUnit::Tb => "TB",
            CapacityUnit::Percent => "%",
        })
    }
}

// ── TrendMetric ───────────────────────────────────────────────────────────────

/// Which capacity series to chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendMetric {
    #[default]
    Used,
    Snapshot,
}

impl TrendMetric {
    pub fn title(self) -> &'static str {
        match self {
            TrendMetric::Used => "Used Capacity",
            TrendMetric::Snapshot => "Snapshot Usage",
        }
    }

    fn value(self, record: &SystemRecord, unit: CapacityUnit) -> Option<f64> {
        match (self, unit) {
            (TrendMetric::Used, CapacityUnit::Percent) => Some(record.perc_used),
            (TrendMetric::Used, _) => record.number("used").map(|gb| unit.convert_gb(gb)),
            (TrendMetric::Snapshot, CapacityUnit::Percent) => record.number("perc_snap"),
            (TrendMetric::Snapshot, _) => record
                .number("snap")
                .or_else(|| record.number("used_snap"))
                .map(|gb| unit.convert_gb(gb)),
        }
    }
}

impl FromStr for TrendMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "used" => Ok(Self::Used),
            "snapshot" | "snap" => Ok(Self::Snapshot),
            other => Err(format!("unknown trend metric: {other}")),
        }
    }
}

// ── Series ────────────────────────────────────────────────────────────────────

/// One sample of a capacity series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub host: String,
    pub value: f64,
}

/// Build the `metric` series for `set` in `unit`, in source order.
///
/// Rows lacking the needed column are left out of the series.
pub fn capacity_series(set: &RecordSet, metric: TrendMetric, unit: CapacityUnit) -> Vec<TrendPoint> {
    let points: Vec<TrendPoint> = set
        .iter()
        .filter_map(|r| {
            metric.value(r, unit).map(|value| TrendPoint {
                date: r.date.clone(),
                host: r.label(),
                value,
            })
        })
        .collect();

    if points.len() < set.len() {
        debug!(
            "{} series: {} of {} rows lack a value",
            metric.title(),
            set.len() - points.len(),
            set.len()
        );
    }
    points
}

// ── Tests ─────────────────────────────────────────────────────────────────────
