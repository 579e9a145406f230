//! Analysis pipeline for STORViX fleet health.
//!
//! Narrows a parsed [`RecordSet`] to the scoring population, scores every
//! system against it and gathers the fleet views, returning a
//! [`FleetAnalysis`] ready for rendering.

use health_core::clock::Clock;
use health_core::enhanced::{score_absolute, EnhancedScore};
use health_core::error::Result;
use health_core::models::{RecordSet, ScoreResult};
use health_core::scoring::{score_with_averages, PopulationAverages};
use health_core::time_utils::TimezoneHandler;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregator::FleetStats;
use crate::filters::{filter_by_time_range, matches_host, FilterOptions, RecordFilter};
use crate::summary::{FleetSummary, DEFAULT_WINDOW_DAYS};
use crate::trends::{capacity_series, CapacityUnit, TrendMetric, TrendPoint};

// ── Public types ──────────────────────────────────────────────────────────────

/// What to analyse and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Keep only samples dated within the last N days.
    pub time_range_days: Option<u32>,
    /// Attribute selection applied before scoring.
    pub filter: RecordFilter,
    /// Restrict per-system output to one host. Does not change the population.
    pub host: Option<String>,
    /// Recency window for the status summary.
    pub summary_window_days: u32,
    pub trend: TrendMetric,
    pub unit: CapacityUnit,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            time_range_days: None,
            filter: RecordFilter::default(),
            host: None,
            summary_window_days: DEFAULT_WINDOW_DAYS,
            trend: TrendMetric::default(),
            unit: CapacityUnit::default(),
        }
    }
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp of the clock reading used for this run.
    pub generated_at: String,
    /// Time window applied, or `None` for all samples.
    pub time_range_days: Option<u32>,
    /// Rows in the parsed input.
    pub records_loaded: usize,
    /// Rows left after the time window and attribute filters.
    pub population_size: usize,
    /// Systems included in the per-system output.
    pub systems_reported: usize,
    /// Systems that also have an absolute score.
    pub absolute_scores: usize,
    /// Series and unit of [`FleetAnalysis::trends`].
    pub trend_metric: TrendMetric,
    pub trend_unit: CapacityUnit,
    /// Wall-clock seconds spent in the pipeline.
    pub analysis_time_seconds: f64,
}

/// Both health models for one system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub label: String,
    /// Source line of the row.
    pub line: u64,
    pub perc_used: f64,
    pub sending_telemetry: bool,
    pub date: String,
    /// Score relative to the population.
    pub relative: ScoreResult,
    /// Absolute score, when the row carries the columns it needs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute: Option<EnhancedScore>,
}

/// The complete output of [`analyze_fleet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetAnalysis {
    pub systems: Vec<SystemHealth>,
    pub averages: PopulationAverages,
    pub stats: Option<FleetStats>,
    pub summary: FleetSummary,
    pub trends: Vec<TrendPoint>,
    pub filter_options: FilterOptions,
    pub metadata: AnalysisMetadata,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the analysis pipeline over an already parsed record set.
///
/// 1. Apply the time window, if any.
/// 2. Apply the attribute filter; the result is the scoring population.
/// 3. Score every system against the population means.
/// 4. Build fleet statistics, the status summary and the trend series.
///
/// Fails with [`health_core::error::HealthError::EmptyPopulation`] when no
/// records survive the filters.
pub fn analyze_fleet(
    set: &RecordSet,
    options: &AnalysisOptions,
    clock: &dyn Clock,
    tz: &TimezoneHandler,
) -> Result<FleetAnalysis> {
    let started = std::time::Instant::now();
    let now = clock.now();

    // ── Step 1: Time window ───────────────────────────────────────────────────
    let windowed = match options.time_range_days {
        Some(days) => filter_by_time_range(set, days, clock, tz),
        None => set.clone(),
    };

    // ── Step 2: Population ────────────────────────────────────────────────────
    let filter_options = FilterOptions::from_records(&windowed);
    let population = options.filter.apply(&windowed);
    let averages = PopulationAverages::from_records(population.iter())?;
    debug!(
        "Scoring population of {} (mean perc_used {:.2}, avg_speed {:.2}, MUP {:.2})",
        population.len(),
        averages.perc_used,
        averages.avg_speed,
        averages.mup
    );

    // ── Step 3: Per-system scores ─────────────────────────────────────────────
    let selected: Vec<_> = population
        .iter()
        .filter(|r| options.host.as_deref().map_or(true, |h| matches_host(r, h)))
        .collect();
    if let Some(host) = &options.host {
        if selected.is_empty() {
            warn!("No system in the population matches host \"{}\"", host);
        }
    }

    let systems: Vec<SystemHealth> = selected
        .iter()
        .map(|r| {
            let absolute = match score_absolute(r) {
                Ok(score) => Some(score),
                Err(e) => {
                    debug!("{}: no absolute score ({})", r.label(), e);
                    None
                }
            };
            SystemHealth {
                label: r.label(),
                line: r.line,
                perc_used: r.perc_used,
                sending_telemetry: r.sending_telemetry,
                date: r.date.clone(),
                relative: score_with_averages(r, &averages),
                absolute,
            }
        })
        .collect();

    // ── Step 4: Fleet views ───────────────────────────────────────────────────
    let stats = FleetStats::from_records(&population);
    let summary = FleetSummary::build(&population, options.summary_window_days, clock, tz);
    let trend_source = match &options.host {
        Some(host) => population.retain_where(|r| matches_host(r, host)),
        None => population.clone(),
    };
    let trends = capacity_series(&trend_source, options.trend, options.unit);

    let metadata = AnalysisMetadata {
        generated_at: now.to_rfc3339(),
        time_range_days: options.time_range_days,
        records_loaded: set.len(),
        population_size: population.len(),
        systems_reported: systems.len(),
        absolute_scores: systems.iter().filter(|s| s.absolute.is_some()).count(),
        trend_metric: options.trend,
        trend_unit: options.unit,
        analysis_time_seconds: started.elapsed().as_secs_f64(),
    };

    Ok(FleetAnalysis {
        systems,
        averages,
        stats,
        summary,
        trends,
        filter_options,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};
    use health_core::clock::FixedClock;
    use health_core::error::HealthError;
    use health_core::models::MissingFieldPolicy;
    use health_core::scoring::calculate_system_health;

    use crate::filters::TelemetryFilter;
    use crate::reader::parse_records;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
    }

    fn fleet() -> RecordSet {
        let text = "\
hostid,company,type,pool,used,avail,used_snap,perc_snap,avg_time,perc_used,avg_speed,sending_telemetry,MUP,date
h1,Acme,AiRE 3,pool-a,400,600,40,4,5,40,200,True,10,2024-06-14 10:00:00
h2,Acme,AiRE 5,pool-b,750,250,100,10,6,75,100,False,20,2024-06-10 10:00:00
h3,Globex,AiRE 3,pool-a,950,50,10,1,4,95,150,True,30,2024-06-15 11:00:00
h4,Globex,AiRE 3,pool-a,500,500,,,,50,150,True,30,2024-05-01 11:00:00";
        parse_records(text, MissingFieldPolicy::Fail).unwrap()
    }

    fn labels(analysis: &FleetAnalysis) -> Vec<String> {
        analysis.systems.iter().map(|s| s.label.clone()).collect()
    }

    #[test]
    fn test_analyze_fleet_scores_every_system() {
        let set = fleet();
        let analysis =
            analyze_fleet(&set, &AnalysisOptions::default(), &clock(), &TimezoneHandler::default())
                .unwrap();
        assert_eq!(labels(&analysis), vec!["h1", "h2", "h3", "h4"]);
        assert_eq!(analysis.metadata.records_loaded, 4);
        assert_eq!(analysis.metadata.population_size, 4);

        let expected = calculate_system_health(&set.records[0], &set.records).unwrap();
        assert_eq!(analysis.systems[0].relative, expected);
    }

    #[test]
    fn test_absolute_score_only_when_columns_present() {
        let analysis =
            analyze_fleet(&fleet(), &AnalysisOptions::default(), &clock(), &TimezoneHandler::default())
                .unwrap();
        assert!(analysis.systems[0].absolute.is_some());
        assert!(analysis.systems[3].absolute.is_none());
        assert_eq!(analysis.metadata.absolute_scores, 3);
    }

    #[test]
    fn test_time_range_narrows_population() {
        let options = AnalysisOptions {
            time_range_days: Some(7),
            ..Default::default()
        };
        let analysis =
            analyze_fleet(&fleet(), &options, &clock(), &TimezoneHandler::default()).unwrap();
        assert_eq!(labels(&analysis), vec!["h1", "h2", "h3"]);
        assert_eq!(analysis.averages.perc_used, 70.0);
    }

    #[test]
    fn test_host_narrows_output_not_population() {
        let options = AnalysisOptions {
            host: Some("h3".into()),
            ..Default::default()
        };
        let analysis =
            analyze_fleet(&fleet(), &options, &clock(), &TimezoneHandler::default()).unwrap();
        assert_eq!(labels(&analysis), vec!["h3"]);
        assert_eq!(analysis.metadata.population_size, 4);
        assert_eq!(analysis.averages.avg_speed, 150.0);
        assert!(analysis.trends.iter().all(|p| p.host == "h3"));
        assert_eq!(analysis.stats.as_ref().map(|s| s.total_systems), Some(4));
    }

    #[test]
    fn test_attribute_filter_defines_population() {
        let options = AnalysisOptions {
            filter: RecordFilter {
                company: Some("Globex".into()),
                telemetry: TelemetryFilter::Active,
                ..Default::default()
            },
            ..Default::default()
        };
        let analysis =
            analyze_fleet(&fleet(), &options, &clock(), &TimezoneHandler::default()).unwrap();
        assert_eq!(labels(&analysis), vec!["h3", "h4"]);
        assert_eq!(analysis.averages.perc_used, 72.5);
        // Options reflect what was available before the attribute filter.
        assert_eq!(analysis.filter_options.companies, vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_empty_population_is_an_error() {
        let options = AnalysisOptions {
            filter: RecordFilter {
                company: Some("Initech".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = analyze_fleet(&fleet(), &options, &clock(), &TimezoneHandler::default())
            .unwrap_err();
        assert!(matches!(err, HealthError::EmptyPopulation));
    }

    #[test]
    fn test_summary_and_stats_are_populated() {
        let analysis =
            analyze_fleet(&fleet(), &AnalysisOptions::default(), &clock(), &TimezoneHandler::default())
                .unwrap();
        // h4 is older than the 21-day summary window.
        assert_eq!(analysis.summary.total, 3);
        assert_eq!(analysis.stats.map(|s| s.telemetry_active), Some(3));
        assert_eq!(analysis.trends.len(), 4);
    }
}
