//! Absolute system-health model.
//!
//! Unlike [`crate::scoring`], every sub-score here is derived from fixed
//! thresholds on the system's own figures, so no population is needed. This is
//! the model the company and system-detail pages display, including a
//! per-metric "impact" relative to a neutral score of 50.

use serde::{Deserialize, Serialize};

use crate::error::{HealthError, Result};
use crate::formatting::format_impact;
use crate::models::{Status, SystemRecord};
use crate::scoring::round_half_up;

// ── Weights ───────────────────────────────────────────────────────────────────

pub const WEIGHT_CAPACITY: f64 = 0.40;
pub const WEIGHT_PERFORMANCE: f64 = 0.20;
pub const WEIGHT_TELEMETRY: f64 = 0.15;
pub const WEIGHT_SNAPSHOTS: f64 = 0.10;
pub const WEIGHT_MUP: f64 = 0.15;

/// Usage percentage up to which capacity and MUP score a full 100.
const USAGE_KNEE: f64 = 55.0;
/// Telemetry interval, in minutes, that earns a full performance score.
const IDEAL_INTERVAL_MINUTES: f64 = 5.0;
/// Neutral score used when computing impacts.
const NEUTRAL: f64 = 50.0;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Raw figure shown next to a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

/// One row of the absolute breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedMetric {
    pub name: String,
    /// Sub-score rounded to one decimal.
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<RawValue>,
    pub unit: String,
    pub status: Status,
    pub message: String,
    /// Signed contribution relative to a neutral score, e.g. `"+12.0 pts"`.
    pub impact: String,
    /// Weight as a percentage of the final score.
    pub weight: f64,
}

/// Final score plus its per-metric breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedScore {
    pub final_score: i64,
    pub metrics: Vec<EnhancedMetric>,
}

// ── Sub-score curves ──────────────────────────────────────────────────────────

/// 100 up to the knee, then linearly down to 0 at 100%.
pub fn usage_curve(percent: f64) -> f64 {
    if percent <= USAGE_KNEE {
        100.0
    } else {
        (100.0 - (percent - USAGE_KNEE) * (100.0 / (100.0 - USAGE_KNEE))).max(0.0)
    }
}

/// Loses 10 points per minute of distance from the ideal telemetry interval.
pub fn interval_curve(avg_time: f64) -> f64 {
    (100.0 - 10.0 * (avg_time - IDEAL_INTERVAL_MINUTES).abs()).max(0.0)
}

/// Free snapshot headroom; systems without snapshots score 0.
pub fn snapshot_curve(used_snap: f64, perc_snap: f64) -> f64 {
    if used_snap > 0.0 {
        (100.0 - perc_snap).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn banded(score: f64, warning_below: f64) -> Status {
    if score < NEUTRAL {
        Status::Critical
    } else if score < warning_below {
        Status::Warning
    } else {
        Status::Good
    }
}

fn one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn require(record: &SystemRecord, name: &str) -> Result<f64> {
    record
        .number(name)
        .ok_or_else(|| HealthError::missing_at(name, record.line))
}

// ── Scoring ───────────────────────────────────────────────────────────────────

/// Score `record` with the absolute model.
///
/// Needs the optional `avg_time`, `used_snap` and `perc_snap` columns; their
/// absence is a [`HealthError::MissingField`].
pub fn score_absolute(record: &SystemRecord) -> Result<EnhancedScore> {
    let perc_used = record.perc_used;
    let avg_time = require(record, "avg_time")?;
    let used_snap = require(record, "used_snap")?;
    let perc_snap = require(record, "perc_snap")?;
    let telemetry = record.sending_telemetry;

    let capacity = usage_curve(perc_used);
    let performance = interval_curve(avg_time);
    let telemetry_score = if telemetry { 100.0 } else { 0.0 };
    let snapshots = snapshot_curve(used_snap, perc_snap);
    let mup = usage_curve(record.mup);
    let utilization = (capacity + snapshots) / 2.0;

    let capacity_message = match (record.number("used"), record.number("avail")) {
        (Some(used), Some(avail)) => format!("{} GB used of {} GB total", used, avail),
        _ => format!("{:.1}% of capacity used", perc_used),
    };

    let metrics = vec![
        EnhancedMetric {
            name: "Capacity".to_string(),
            value: one_decimal(capacity),
            raw_value: Some(RawValue::Number(one_decimal(100.0 - perc_used))),
            unit: "%".to_string(),
            status: banded(capacity, 70.0),
            message: capacity_message,
            impact: format_impact(WEIGHT_CAPACITY * (capacity - NEUTRAL)),
            weight: WEIGHT_CAPACITY * 100.0,
        },
        EnhancedMetric {
            name: "Performance".to_string(),
            value: one_decimal(performance),
            raw_value: None,
            unit: String::new(),
            status: banded(performance, 60.0),
            message: format!("Telemetry every {:.1} minutes", avg_time),
            impact: format_impact(WEIGHT_PERFORMANCE * (performance - NEUTRAL)),
            weight: WEIGHT_PERFORMANCE * 100.0,
        },
        EnhancedMetric {
            name: "Telemetry".to_string(),
            value: telemetry_score,
            raw_value: Some(RawValue::Text(
                if telemetry { "Active" } else { "Inactive" }.to_string(),
            )),
            unit: String::new(),
            status: if telemetry {
                Status::Good
            } else {
                Status::Critical
            },
            message: if telemetry {
                "System is actively sending telemetry data".to_string()
            } else {
                "System is not sending telemetry data".to_string()
            },
            impact: format_impact(WEIGHT_TELEMETRY * (telemetry_score - NEUTRAL)),
            weight: WEIGHT_TELEMETRY * 100.0,
        },
        EnhancedMetric {
            name: "Snapshots".to_string(),
            value: one_decimal(snapshots),
            raw_value: Some(RawValue::Number(used_snap)),
            unit: "GB".to_string(),
            status: banded(snapshots, 70.0),
            message: if used_snap > 0.0 {
                format!("{} GB used for snapshots", used_snap)
            } else {
                "No snapshots found".to_string()
            },
            impact: format_impact(WEIGHT_SNAPSHOTS * (snapshots - NEUTRAL)),
            weight: WEIGHT_SNAPSHOTS * 100.0,
        },
        EnhancedMetric {
            name: "MUP".to_string(),
            value: one_decimal(mup),
            raw_value: Some(RawValue::Number(record.mup)),
            unit: String::new(),
            status: banded(mup, 60.0),
            message: "Resource efficiency based on usage patterns".to_string(),
            impact: format_impact(WEIGHT_MUP * (mup - NEUTRAL)),
            weight: WEIGHT_MUP * 100.0,
        },
        EnhancedMetric {
            name: "Utilization".to_string(),
            value: one_decimal(utilization),
            raw_value: Some(RawValue::Number(one_decimal(utilization))),
            unit: "%".to_string(),
            status: banded(utilization, 70.0),
            message: "Average of Capacity and Snapshots scores".to_string(),
            impact: format_impact(utilization - NEUTRAL),
            weight: 0.0,
        },
    ];

    let final_score = round_half_up(
        WEIGHT_CAPACITY * capacity
            + WEIGHT_PERFORMANCE * performance
            + WEIGHT_TELEMETRY * telemetry_score
            + WEIGHT_SNAPSHOTS * snapshots
            + WEIGHT_MUP * mup,
    );

    Ok(EnhancedScore {
        final_score,
        metrics,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

    fn record(perc_used: f64, telemetry: bool, mup: f64, extra: &[(&str, f64)]) -> SystemRecord {
        SystemRecord {
            line: 3,
            perc_used,
            avg_speed: 200.0,
            sending_telemetry: telemetry,
            mup,
            date: "2024-05-01".to_string(),
            fields: extra
                .iter()
                .map(|(k, v)| (k.to_string(), FieldValue::Number(*v)))
                .collect(),
        }
    }

    fn metric<'a>(score: &'a EnhancedScore, name: &str) -> &'a EnhancedMetric {
        score.metrics.iter().find(|m| m.name == name).unwrap()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum = WEIGHT_CAPACITY + WEIGHT_PERFORMANCE + WEIGHT_TELEMETRY + WEIGHT_SNAPSHOTS + WEIGHT_MUP;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_usage_curve() {
        assert_eq!(usage_curve(10.0), 100.0);
        assert_eq!(usage_curve(55.0), 100.0);
        assert!((usage_curve(77.5) - 50.0).abs() < 1e-9);
        assert!(usage_curve(100.0).abs() < 1e-9);
        assert_eq!(usage_curve(120.0), 0.0);
    }

    #[test]
    fn test_interval_curve() {
        assert_eq!(interval_curve(5.0), 100.0);
        assert_eq!(interval_curve(8.0), 70.0);
        assert_eq!(interval_curve(2.0), 70.0);
        assert_eq!(interval_curve(35.0), 0.0);
    }

    #[test]
    fn test_snapshot_curve() {
        assert_eq!(snapshot_curve(0.0, 10.0), 0.0);
        assert_eq!(snapshot_curve(120.0, 12.0), 88.0);
        assert_eq!(snapshot_curve(120.0, 140.0), 0.0);
        assert_eq!(snapshot_curve(120.0, -5.0), 100.0);
    }

    #[test]
    fn test_healthy_system_scores_high() {
        let rec = record(
            40.0,
            true,
            20.0,
            &[("avg_time", 5.0), ("used_snap", 100.0), ("perc_snap", 10.0)],
        );
        let score = score_absolute(&rec).unwrap();
        // 0.4*100 + 0.2*100 + 0.15*100 + 0.1*90 + 0.15*100 = 99
        assert_eq!(score.final_score, 99);
        assert_eq!(metric(&score, "Capacity").status, Status::Good);
        assert_eq!(metric(&score, "Capacity").impact, "+20.0 pts");
        assert_eq!(metric(&score, "Snapshots").message, "100 GB used for snapshots");
        assert_eq!(metric(&score, "Utilization").value, 95.0);
        assert_eq!(metric(&score, "Utilization").weight, 0.0);
    }

    #[test]
    fn test_degraded_system_statuses() {
        let rec = record(
            90.0,
            false,
            80.0,
            &[("avg_time", 35.0), ("used_snap", 0.0), ("perc_snap", 0.0)],
        );
        let score = score_absolute(&rec).unwrap();
        assert_eq!(metric(&score, "Capacity").status, Status::Critical);
        assert_eq!(metric(&score, "Performance").status, Status::Critical);
        assert_eq!(metric(&score, "Telemetry").status, Status::Critical);
        assert_eq!(metric(&score, "Telemetry").impact, "-7.5 pts");
        assert_eq!(metric(&score, "Snapshots").message, "No snapshots found");
        assert_eq!(metric(&score, "MUP").status, Status::Critical);
        assert_eq!(
            metric(&score, "Telemetry").raw_value,
            Some(RawValue::Text("Inactive".into()))
        );
    }

    #[test]
    fn test_warning_band_differs_per_metric() {
        // Performance 65 is "good" (warning below 60) ...
        let rec = record(
            40.0,
            true,
            20.0,
            &[("avg_time", 8.5), ("used_snap", 10.0), ("perc_snap", 35.0)],
        );
        let score = score_absolute(&rec).unwrap();
        assert_eq!(metric(&score, "Performance").value, 65.0);
        assert_eq!(metric(&score, "Performance").status, Status::Good);
        // ... while Snapshots 65 is "warning" (warning below 70).
        assert_eq!(metric(&score, "Snapshots").value, 65.0);
        assert_eq!(metric(&score, "Snapshots").status, Status::Warning);
    }

    #[test]
    fn test_capacity_message_uses_used_and_avail() {
        let rec = record(
            52.0,
            true,
            0.0,
            &[
                ("avg_time", 5.0),
                ("used_snap", 120.0),
                ("perc_snap", 12.0),
                ("used", 520.0),
                ("avail", 480.0),
            ],
        );
        let score = score_absolute(&rec).unwrap();
        assert_eq!(metric(&score, "Capacity").message, "520 GB used of 480 GB total");
    }

    #[test]
    fn test_missing_optional_column_is_reported() {
        let rec = record(40.0, true, 20.0, &[("avg_time", 5.0)]);
        let err = score_absolute(&rec).unwrap_err();
        match err {
            HealthError::MissingField { field, line } => {
                assert_eq!(field, "used_snap");
                assert_eq!(line, Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
