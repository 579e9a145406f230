//! Relative system-health scoring.
//!
//! A system is scored against the population it belongs to: throughput and
//! usage pattern are expressed as a percentage of the population mean, while
//! capacity and telemetry are absolute.

use serde::{Deserialize, Serialize};

use crate::error::{HealthError, Result};
use crate::models::{HealthDetails, HealthMetrics, MetricDetail, ScoreResult, Status, SystemRecord};

// ── Weights ───────────────────────────────────────────────────────────────────

pub const WEIGHT_CAPACITY: f64 = 0.4;
pub const WEIGHT_PERFORMANCE: f64 = 0.3;
pub const WEIGHT_TELEMETRY: f64 = 0.2;
pub const WEIGHT_UTILIZATION: f64 = 0.1;

/// Capacity scores above this are "optimal".
const CAPACITY_GOOD_ABOVE: f64 = 50.0;
/// Utilization scores above this are "efficient".
const UTILIZATION_GOOD_ABOVE: f64 = 80.0;

// ── PopulationAverages ────────────────────────────────────────────────────────

/// Means over the scoring population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationAverages {
    pub mup: f64,
    pub avg_speed: f64,
    pub perc_used: f64,
}

impl PopulationAverages {
    /// Compute the means over `records`.
    ///
    /// Fails with [`HealthError::EmptyPopulation`] when `records` is empty.
    pub fn from_records<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SystemRecord>,
    {
        let mut count = 0usize;
        let (mut mup, mut speed, mut used) = (0.0, 0.0, 0.0);
        for r in records {
            count += 1;
            mup += r.mup;
            speed += r.avg_speed;
            used += r.perc_used;
        }
        if count == 0 {
            return Err(HealthError::EmptyPopulation);
        }
        let n = count as f64;
        Ok(Self {
            mup: mup / n,
            avg_speed: speed / n,
            perc_used: used / n,
        })
    }
}

// ── Scoring ───────────────────────────────────────────────────────────────────

/// Score `system` against `all_systems`.
///
/// `all_systems` is the population the means are drawn from; it normally
/// contains `system` itself. Fails with [`HealthError::EmptyPopulation`] when it
/// is empty.
pub fn calculate_system_health(
    system: &SystemRecord,
    all_systems: &[SystemRecord],
) -> Result<ScoreResult> {
    let averages = PopulationAverages::from_records(all_systems)?;
    Ok(score_with_averages(system, &averages))
}

/// Score `system` against precomputed population means.
///
/// Use this when scoring every member of a population so the means are only
/// computed once.
pub fn score_with_averages(system: &SystemRecord, averages: &PopulationAverages) -> ScoreResult {
    let metrics = HealthMetrics {
        capacity_score: 100.0 - system.perc_used,
        performance_score: relative_percent(system.avg_speed, averages.avg_speed),
        telemetry_score: if system.sending_telemetry { 100.0 } else { 0.0 },
        utilization_score: relative_percent(system.mup, averages.mup),
    };

    let weighted = metrics.capacity_score * WEIGHT_CAPACITY
        + metrics.performance_score * WEIGHT_PERFORMANCE
        + metrics.telemetry_score * WEIGHT_TELEMETRY
        + metrics.utilization_score * WEIGHT_UTILIZATION;

    let capacity_ok = metrics.capacity_score > CAPACITY_GOOD_ABOVE;
    // NOTE: compares a percentage of the mean against the raw mean speed. The
    // units differ; kept as the dashboard defines it until product confirms.
    let performance_ok = metrics.performance_score > averages.avg_speed;
    let utilization_ok = metrics.utilization_score > UTILIZATION_GOOD_ABOVE;

    let details = HealthDetails {
        capacity: MetricDetail {
            value: metrics.capacity_score,
            status: if capacity_ok { Status::Good } else { Status::Warning },
            message: format!(
                "Capacity usage is {}",
                if capacity_ok { "optimal" } else { "high" }
            ),
        },
        performance: MetricDetail {
            value: metrics.performance_score,
            status: if performance_ok {
                Status::Good
            } else {
                Status::Warning
            },
            message: format!(
                "Performance is {} average",
                if performance_ok { "above" } else { "below" }
            ),
        },
        telemetry: MetricDetail {
            value: metrics.telemetry_score,
            status: if system.sending_telemetry {
                Status::Good
            } else {
                Status::Critical
            },
            message: if system.sending_telemetry {
                "Telemetry active".to_string()
            } else {
                "Telemetry inactive".to_string()
            },
        },
        utilization: MetricDetail {
            value: metrics.utilization_score,
            status: if utilization_ok {
                Status::Good
            } else {
                Status::Warning
            },
            message: format!(
                "Resource utilization is {}",
                if utilization_ok {
                    "efficient"
                } else {
                    "suboptimal"
                }
            ),
        },
    };

    ScoreResult {
        score: round_half_up(weighted),
        metrics,
        details,
    }
}

/// `value / mean * 100`, or `0.0` when the mean is zero.
fn relative_percent(value: f64, mean: f64) -> f64 {
    if mean == 0.0 {
        return 0.0;
    }
    (value / mean) * 100.0
}

/// Round to the nearest integer with halves going toward positive infinity.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

// ── Tests ─────────────────────────────────────────────────────────────────────
