//! One-shot health orchestrator.
//!
//! Awaits the resource fetch, then runs parse, time window, attribute filter
//! and analysis synchronously, handing back a [`FleetAnalysis`].

use health_core::clock::Clock;
use health_core::error::{HealthError, Result};
use health_core::models::MissingFieldPolicy;
use health_core::settings::Settings;
use health_core::time_utils::{get_system_timezone, TimezoneHandler};
use health_data::analysis::{analyze_fleet, AnalysisOptions, FleetAnalysis};
use health_data::filters::RecordFilter;
use health_data::reader::parse_records;

use crate::fetcher::fetch_resource;

// ── HealthOrchestrator ────────────────────────────────────────────────────────

/// Fetch-then-analyse coordinator for a single CSV resource.
#[derive(Debug, Clone)]
pub struct HealthOrchestrator {
    /// Path or `file://` URI of the export.
    locator: String,
    /// How the reader treats blank or mistyped scoring cells.
    policy: MissingFieldPolicy,
    /// Filters and view options forwarded to the pipeline.
    options: AnalysisOptions,
    /// Zone used for timestamps without an offset.
    timezone: TimezoneHandler,
}

impl HealthOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        locator: impl Into<String>,
        policy: MissingFieldPolicy,
        options: AnalysisOptions,
        timezone: TimezoneHandler,
    ) -> Self {
        Self {
            locator: locator.into(),
            policy,
            options,
            timezone,
        }
    }

    /// Build an orchestrator from resolved CLI settings.
    ///
    /// Fails with [`HealthError::Config`] when no source is known, the
    /// timezone is not an IANA name, or a flag value cannot be interpreted.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let locator = settings.require_source()?.to_string();
        let policy = settings.missing_field_policy()?;

        let timezone = match settings.timezone.as_str() {
            "auto" => get_system_timezone(),
            name => name.to_string(),
        };
        if !TimezoneHandler::validate_timezone(&timezone) {
            return Err(HealthError::Config(format!("unknown timezone: {timezone}")));
        }

        let options = AnalysisOptions {
            time_range_days: settings.time_range,
            filter: RecordFilter {
                company: settings.company.clone(),
                system_type: settings.system_type.clone(),
                pool: settings.pool.clone(),
                telemetry: settings.telemetry.parse().map_err(HealthError::Config)?,
            },
            host: settings.host.clone(),
            summary_window_days: settings.summary_window,
            trend: settings.trend.parse().map_err(HealthError::Config)?,
            unit: settings.unit.parse().map_err(HealthError::Config)?,
        };

        Ok(Self::new(
            locator,
            policy,
            options,
            TimezoneHandler::new(&timezone),
        ))
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Fetch the resource once and analyse it as of `clock.now()`.
    pub async fn run(&self, clock: &dyn Clock) -> Result<FleetAnalysis> {
        let text = fetch_resource(&self.locator).await?;

        let parse_start = std::time::Instant::now();
        let records = parse_records(&text, self.policy)?;
        tracing::debug!(
            records = records.len(),
            elapsed_ms = parse_start.elapsed().as_millis() as u64,
            "parsed telemetry export"
        );

        let analysis = analyze_fleet(&records, &self.options, clock, &self.timezone)?;
        tracing::info!(
            "Scored {} of {} systems from {}",
            analysis.metadata.systems_reported,
            analysis.metadata.population_size,
            self.locator
        );
        Ok(analysis)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
