use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{HealthError, Result};
use crate::models::MissingFieldPolicy;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Health scoring for STORViX installed-base telemetry
#[derive(Parser, Debug, Clone)]
#[command(
    name = "storvix-health",
    about = "Health scoring for STORViX installed-base telemetry",
    version
)]
pub struct Settings {
    /// CSV resource to score (path or file:// URI)
    #[arg(long, env = "STORVIX_SOURCE")]
    pub source: Option<String>,

    /// View to render
    #[arg(long, default_value = "score", value_parser = ["score", "summary", "stats", "trends"])]
    pub view: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Keep only samples from the last N days
    #[arg(long)]
    pub time_range: Option<u32>,

    /// Recency window for the status summary, in days
    #[arg(long, default_value = "21", value_parser = clap::value_parser!(u32).range(1..=3650))]
    pub summary_window: u32,

    /// Only display this host (scoring still uses the whole filtered set)
    #[arg(long)]
    pub host: Option<String>,

    /// Only include systems of this company
    #[arg(long)]
    pub company: Option<String>,

    /// Only include systems of this type
    #[arg(long = "type")]
    pub system_type: Option<String>,

    /// Only include systems in this pool
    #[arg(long)]
    pub pool: Option<String>,

    /// Telemetry filter
    #[arg(long, default_value = "all", value_parser = ["all", "active", "inactive"])]
    pub telemetry: String,

    /// Handling of blank or mistyped scoring cells
    #[arg(long, default_value = "fail", value_parser = ["fail", "zero"])]
    pub missing_fields: String,

    /// Display unit for the trends view
    #[arg(long, default_value = "percent", value_parser = ["gb", "gib", "tb", "percent"])]
    pub unit: String,

    /// Series for the trends view
    #[arg(long, default_value = "used", value_parser = ["used", "snapshot"])]
    pub trend: String,

    /// Timezone for timestamps without an offset (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.storvix-health/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<String>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".storvix-health").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Write params to `path` via a temp file and rename, creating parents.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!("could not clear {}: {}", config_path.display(), e);
            }
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins; filters and --host are never persisted.
        if settings.source.is_none() {
            settings.source = last.source;
        }
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "time_range") && settings.time_range.is_none() {
            settings.time_range = last.time_range;
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "missing_fields") {
            if let Some(v) = last.missing_fields {
                settings.missing_fields = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!("could not persist settings to {}: {}", config_path.display(), e);
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        settings.log_level = settings.effective_log_level().to_string();
        settings
    }

    /// `--log-level`, overridden by `--debug`.
    ///
    /// Logging flags are never persisted, so this is final straight after
    /// parsing and logging can start before saved settings are touched.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }

    /// The configured CSV locator, or a configuration error when none was
    /// given now or on a previous run.
    pub fn require_source(&self) -> Result<&str> {
        self.source
            .as_deref()
            .ok_or_else(|| HealthError::Config("no --source given and none saved".to_string()))
    }

    /// Parsed `--missing-fields` value.
    pub fn missing_field_policy(&self) -> Result<MissingFieldPolicy> {
        self.missing_fields.parse().map_err(HealthError::Config)
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            source: s.source.clone(),
            view: Some(s.view.clone()),
            format: Some(s.format.clone()),
            time_range: s.time_range,
            timezone: Some(s.timezone.clone()),
            missing_fields: Some(s.missing_fields.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
