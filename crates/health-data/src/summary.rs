//! Fleet status summary: recent systems bucketed by capacity and telemetry.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use health_core::clock::Clock;
use health_core::formatting::percentage;
use health_core::models::{RecordSet, SystemRecord};
use health_core::time_utils::{time_ago, TimezoneHandler};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default recency window, in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 21;

/// A system that has not reported within this many hours is stale.
const STALE_AFTER_HOURS: i64 = 24;

// ── StatusCategory ────────────────────────────────────────────────────────────

/// Summary bucket, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusCategory {
    Critical,
    Alert,
    Attention,
    NoTelemetry,
    Ok,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 5] = [
        StatusCategory::Critical,
        StatusCategory::Alert,
        StatusCategory::Attention,
        StatusCategory::NoTelemetry,
        StatusCategory::Ok,
    ];

    /// Row label used in the summary table.
    pub fn label(self) -> &'static str {
        match self {
            StatusCategory::Critical => "Critical (>90%)",
            StatusCategory::Alert => "Alert (>80%)",
            StatusCategory::Attention => "Attention (>70%)",
            StatusCategory::NoTelemetry => "No Telemetry",
            StatusCategory::Ok => "OK",
        }
    }

    /// Classify a system. Staleness wins over capacity.
    pub fn classify(perc_used: f64, stale: bool) -> Self {
        if stale {
            StatusCategory::NoTelemetry
        } else if perc_used > 90.0 {
            StatusCategory::Critical
        } else if perc_used > 80.0 {
            StatusCategory::Alert
        } else if perc_used > 70.0 {
            StatusCategory::Attention
        } else {
            StatusCategory::Ok
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Summary types ─────────────────────────────────────────────────────────────

/// One system listed under a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMember {
    pub label: String,
    pub company: Option<String>,
    pub pool: Option<String>,
    pub system_type: Option<String>,
    pub perc_used: f64,
    pub used: Option<f64>,
    pub avail: Option<f64>,
    pub last_seen: DateTime<Utc>,
    pub time_ago: String,
    /// `false` when telemetry is off or the last report is stale.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryBucket {
    pub category: StatusCategory,
    pub count: usize,
    /// Share of all summarised systems, one decimal.
    pub percent: f64,
    pub members: Vec<SummaryMember>,
}

/// Bucketed view of the systems seen within the recency window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub total: usize,
    /// One entry per [`StatusCategory`], in [`StatusCategory::ALL`] order.
    pub buckets: Vec<SummaryBucket>,
}

impl FleetSummary {
    /// Summarise `set` as of `clock.now()`.
    ///
    /// Only systems whose last-seen timestamp (`last_date`, else `date`) is
    /// parsable and no older than `window_days` are counted.
    pub fn build(
        set: &RecordSet,
        window_days: u32,
        clock: &dyn Clock,
        tz: &TimezoneHandler,
    ) -> Self {
        let now = clock.now();
        let cutoff = now.checked_sub_signed(Duration::days(i64::from(window_days)));

        let recent: Vec<(&SystemRecord, DateTime<Utc>)> = set
            .iter()
            .filter_map(|r| tz.parse_timestamp(r.last_seen_text()).map(|t| (r, t)))
            .filter(|(_, t)| cutoff.map_or(true, |c| *t >= c))
            .collect();
        let total = recent.len();

        let mut grouped: Vec<Vec<SummaryMember>> = vec![Vec::new(); StatusCategory::ALL.len()];
        for (record, last_seen) in recent {
            let stale =
                !record.sending_telemetry || now - last_seen > Duration::hours(STALE_AFTER_HOURS);
            let category = StatusCategory::classify(record.perc_used, stale);
            grouped[category as usize].push(SummaryMember {
                label: record.label(),
                company: record.text("company"),
                pool: record.text("pool"),
                system_type: record.text("type"),
                perc_used: record.perc_used,
                used: record.number("used"),
                avail: record.number("avail"),
                last_seen,
                time_ago: time_ago(last_seen, now),
                active: !stale,
            });
        }

        let buckets = StatusCategory::ALL
            .iter()
            .zip(grouped)
            .map(|(&category, mut members)| {
                if category == StatusCategory::NoTelemetry {
                    members.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
                } else {
                    members.sort_by(|a, b| b.perc_used.total_cmp(&a.perc_used));
                }
                SummaryBucket {
                    category,
                    count: members.len(),
                    percent: percentage(members.len() as f64, total as f64, 1),
                    members,
                }
            })
            .collect();

        debug!(
            "Summary over {} of {} systems ({}d window)",
            total,
            set.len(),
            window_days
        );

        FleetSummary {
            generated_at: now,
            window_days,
            total,
            buckets,
        }
    }

    pub fn bucket(&self, category: StatusCategory) -> Option<&SummaryBucket> {
        self.buckets.iter().find(|b| b.category == category)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use health_core::clock::FixedClock;
    use health_core::models::MissingFieldPolicy;

    use crate::reader::parse_records;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
    }

    fn fleet() -> RecordSet {
        let text = "\
hostid,company,perc_used,avg_speed,sending_telemetry,MUP,date,last_date
crit,Acme,95,1,True,1,2024-06-15,2024-06-15 10:00:00
crit2,Acme,99,1,True,1,2024-06-15,2024-06-15 09:00:00
alert,Acme,85,1,True,1,2024-06-15,2024-06-15 10:00:00
attn,Acme,71,1,True,1,2024-06-15,2024-06-15 10:00:00
ok,Acme,70,1,True,1,2024-06-15,2024-06-15 10:00:00
off,Acme,50,1,False,1,2024-06-15,2024-06-14 12:00:00
silent,Acme,95,1,True,1,2024-06-15,2024-06-10 12:00:00
old,Acme,50,1,True,1,2024-01-01,2024-01-01 12:00:00
nodate,Acme,50,1,True,1,,";
        parse_records(text, MissingFieldPolicy::Fail).unwrap()
    }

    fn members(summary: &FleetSummary, category: StatusCategory) -> Vec<String> {
        summary
            .bucket(category)
            .map(|b| b.members.iter().map(|m| m.label.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_classify_order() {
        assert_eq!(StatusCategory::classify(95.0, true), StatusCategory::NoTelemetry);
        assert_eq!(StatusCategory::classify(90.5, false), StatusCategory::Critical);
        assert_eq!(StatusCategory::classify(90.0, false), StatusCategory::Alert);
        assert_eq!(StatusCategory::classify(80.0, false), StatusCategory::Attention);
        assert_eq!(StatusCategory::classify(70.0, false), StatusCategory::Ok);
    }

    #[test]
    fn test_window_drops_old_and_undated() {
        let summary = FleetSummary::build(&fleet(), DEFAULT_WINDOW_DAYS, &clock(), &TimezoneHandler::default());
        assert_eq!(summary.total, 7);
        assert_eq!(summary.buckets.len(), 5);
    }

    #[test]
    fn test_buckets_and_sorting() {
        let summary = FleetSummary::build(&fleet(), DEFAULT_WINDOW_DAYS, &clock(), &TimezoneHandler::default());
        assert_eq!(members(&summary, StatusCategory::Critical), vec!["crit2", "crit"]);
        assert_eq!(members(&summary, StatusCategory::Alert), vec!["alert"]);
        assert_eq!(members(&summary, StatusCategory::Attention), vec!["attn"]);
        assert_eq!(members(&summary, StatusCategory::Ok), vec!["ok"]);
        // Most recent first.
        assert_eq!(members(&summary, StatusCategory::NoTelemetry), vec!["off", "silent"]);
    }

    #[test]
    fn test_percentages_and_time_ago() {
        let summary = FleetSummary::build(&fleet(), DEFAULT_WINDOW_DAYS, &clock(), &TimezoneHandler::default());
        let critical = summary.bucket(StatusCategory::Critical).unwrap();
        assert_eq!(critical.count, 2);
        assert_eq!(critical.percent, 28.6);
        assert_eq!(critical.members[1].time_ago, "2 hours ago");

        let stale = summary.bucket(StatusCategory::NoTelemetry).unwrap();
        assert_eq!(stale.members[0].time_ago, "1 day ago");
        assert!(!stale.members[1].active);
    }

    #[test]
    fn test_window_beyond_date_range_keeps_everything_dated() {
        let summary = FleetSummary::build(&fleet(), u32::MAX, &clock(), &TimezoneHandler::default());
        // Every row but "nodate", including the January sample.
        assert_eq!(summary.total, 8);
        assert_eq!(summary.window_days, u32::MAX);
    }

    #[test]
    fn test_empty_summary_has_zero_percentages() {
        let summary = FleetSummary::build(&RecordSet::default(), 21, &clock(), &TimezoneHandler::default());
        assert_eq!(summary.total, 0);
        assert!(summary.buckets.iter().all(|b| b.count == 0 && b.percent == 0.0));
    }

    #[test]
    fn test_category_serializes_camel_case() {
        let json = serde_json::to_string(&StatusCategory::NoTelemetry).unwrap();
        assert_eq!(json, "\"noTelemetry\"");
    }
}
