//! Text and JSON rendering of a [`FleetAnalysis`].

use std::fmt::Write as _;

use anyhow::{bail, Result};
use health_core::formatting::{format_capacity_gb, format_number, format_percent};
use health_data::analysis::{FleetAnalysis, SystemHealth};
use health_data::summary::{FleetSummary, StatusCategory};
use serde_json::json;

/// Render `view` (`score`, `summary`, `stats`, `trends`) as `format`
/// (`text` or `json`).
pub fn render(analysis: &FleetAnalysis, view: &str, format: &str) -> Result<String> {
    match format {
        "json" => render_json(analysis, view),
        "text" => render_text(analysis, view),
        other => bail!("unknown output format: {other}"),
    }
}

// ── JSON ───────────────────────────────────────────────────────────────────────

fn render_json(analysis: &FleetAnalysis, view: &str) -> Result<String> {
    let value = match view {
        "score" => json!({
            "systems": analysis.systems,
            "averages": analysis.averages,
            "metadata": analysis.metadata,
        }),
        "summary" => serde_json::to_value(&analysis.summary)?,
        "stats" => json!({
            "stats": analysis.stats,
            "filterOptions": analysis.filter_options,
        }),
        "trends" => json!({
            "metric": analysis.metadata.trend_metric,
            "unit": analysis.metadata.trend_unit,
            "points": analysis.trends,
        }),
        other => bail!("unknown view: {other}"),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

// ── Text ───────────────────────────────────────────────────────────────────────

fn render_text(analysis: &FleetAnalysis, view: &str) -> Result<String> {
    match view {
        "score" => Ok(score_text(analysis)),
        "summary" => Ok(summary_text(&analysis.summary)),
        "stats" => Ok(stats_text(analysis)),
        "trends" => Ok(trends_text(analysis)),
        other => bail!("unknown view: {other}"),
    }
}

/// Per-system scores, with the full breakdown when only one system is shown.
pub fn score_text(analysis: &FleetAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "STORViX health: {} system(s) shown, population {}",
        analysis.systems.len(),
        analysis.metadata.population_size
    );
    let _ = writeln!(
        out,
        "Population means: perc_used {}, avg_speed {}, MUP {}",
        format_number(analysis.averages.perc_used, 2),
        format_number(analysis.averages.avg_speed, 2),
        format_number(analysis.averages.mup, 2)
    );
    out.push('\n');

    let _ = writeln!(
        out,
        "{:<20} {:>6} {:>9} {:>12} {:>10} {:>12} {:>9}",
        "SYSTEM", "SCORE", "CAPACITY", "PERFORMANCE", "TELEMETRY", "UTILIZATION", "ABSOLUTE"
    );
    for s in &analysis.systems {
        let m = &s.relative.metrics;
        let absolute = s
            .absolute
            .as_ref()
            .map(|a| a.final_score.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<20} {:>6} {:>9.1} {:>12.1} {:>10.1} {:>12.1} {:>9}",
            truncate(&s.label, 20),
            s.relative.score,
            m.capacity_score,
            m.performance_score,
            m.telemetry_score,
            m.utilization_score,
            absolute
        );
    }

    if let [single] = analysis.systems.as_slice() {
        out.push('\n');
        out.push_str(&system_detail_text(single));
    }
    out
}

fn system_detail_text(system: &SystemHealth) -> String {
    let mut out = String::new();
    let d = &system.relative.details;
    let _ = writeln!(out, "{} (line {}, {})", system.label, system.line, system.date);
    for (name, detail) in [
        ("Capacity", &d.capacity),
        ("Performance", &d.performance),
        ("Telemetry", &d.telemetry),
        ("Utilization", &d.utilization),
    ] {
        let _ = writeln!(
            out,
            "  {:<12} {:>8.1}  [{}] {}",
            name, detail.value, detail.status, detail.message
        );
    }

    if let Some(abs) = &system.absolute {
        let _ = writeln!(out, "\nAbsolute score: {}", abs.final_score);
        for metric in &abs.metrics {
            let _ = writeln!(
                out,
                "  {:<12} {:>6.1}  {:>11}  weight {:>2}%  [{}] {}",
                metric.name, metric.value, metric.impact, metric.weight, metric.status, metric.message
            );
        }
    }
    out
}

/// Status report grouped by bucket.
pub fn summary_text(summary: &FleetSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "System Health Report");
    let _ = writeln!(out, "{}", summary.generated_at.format("%B %-d, %Y"));
    let _ = writeln!(out, "Monitored window: last {} days", summary.window_days);
    let _ = writeln!(out, "Total systems analysed: {}", summary.total);
    out.push('\n');

    let _ = writeln!(out, "{:<18} {:>8} {:>11}", "Status", "Systems", "% of Total");
    for bucket in &summary.buckets {
        let _ = writeln!(
            out,
            "{:<18} {:>8} {:>10.1}%",
            bucket.category.label(),
            bucket.count,
            bucket.percent
        );
    }

    for bucket in summary
        .buckets
        .iter()
        .filter(|b| b.category != StatusCategory::Ok && !b.members.is_empty())
    {
        let _ = writeln!(out, "\n{}", bucket.category.label());
        for m in &bucket.members {
            let usage = match (m.used, m.avail) {
                (Some(used), Some(avail)) => format!(
                    " ({} used / {} free)",
                    format_capacity_gb(used),
                    format_capacity_gb(avail)
                ),
                _ => String::new(),
            };
            let _ = writeln!(
                out,
                "  {} ({}) {}{} | last telemetry {} | pool {} | type {} | {}",
                m.company.as_deref().unwrap_or("-"),
                m.label,
                format_percent(m.perc_used),
                usage,
                m.time_ago,
                m.pool.as_deref().unwrap_or("-"),
                m.system_type.as_deref().unwrap_or("-"),
                if m.active { "Active" } else { "Inactive" }
            );
        }
    }
    out
}

/// Fleet totals and breakdowns.
pub fn stats_text(analysis: &FleetAnalysis) -> String {
    let Some(stats) = &analysis.stats else {
        return "No systems to summarise.\n".to_string();
    };
    let mut out = String::new();
    let rows = [
        ("Total systems", stats.total_systems.to_string()),
        ("Total capacity", format_capacity_gb(stats.total_capacity)),
        ("Used capacity", format_capacity_gb(stats.used_capacity)),
        ("Used snapshots", format_capacity_gb(stats.used_snapshots)),
        ("Avg usage per system", format_capacity_gb(stats.avg_usage)),
        ("Avg snapshots per system", format_capacity_gb(stats.avg_snap_usage)),
        ("Avg perc_used", format_percent(stats.avg_perc_used)),
        ("Avg perc_snap", format_percent(stats.avg_perc_snap)),
        ("Avg speed", format_number(stats.avg_speed, 2)),
        ("Avg snapshot interval", format_number(stats.avg_response_time, 2)),
        (
            "Telemetry active",
            format!("{} / {}", stats.telemetry_active, stats.total_systems),
        ),
        ("Healthy (<70%)", stats.capacity.healthy.to_string()),
        ("Warning (70-90%)", stats.capacity.warning.to_string()),
        ("Critical (>=90%)", stats.capacity.critical.to_string()),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "{:<26} {}", label, value);
    }

    for (title, groups) in [
        ("By type", &stats.systems_by_type),
        ("By company", &stats.systems_by_company),
        ("By pool", &stats.systems_by_pool),
    ] {
        let _ = writeln!(out, "\n{title}");
        for (key, count) in groups {
            let _ = writeln!(out, "  {:<24} {}", key, count);
        }
    }
    out
}

/// Capacity series as a dated table.
pub fn trends_text(analysis: &FleetAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({})",
        analysis.metadata.trend_metric.title(),
        analysis.metadata.trend_unit
    );
    if analysis.trends.is_empty() {
        out.push_str("No samples.\n");
        return out;
    }
    for point in &analysis.trends {
        let _ = writeln!(
            out,
            "{:<20} {:<20} {:>12}",
            point.date,
            truncate(&point.host, 20),
            format_number(point.value, 2)
        );
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(width.saturating_sub(1)).collect();
        t.push('~');
        t
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};
    use health_core::clock::FixedClock;
    use health_core::models::MissingFieldPolicy;
    use health_core::time_utils::TimezoneHandler;
    use health_data::analysis::{analyze_fleet, AnalysisOptions};
    use health_data::reader::parse_records;

    fn analysis(host: Option<&str>) -> FleetAnalysis {
        let text = "\
hostid,company,type,pool,used,avail,used_snap,perc_snap,avg_time,perc_used,avg_speed,sending_telemetry,MUP,date
h1,Acme,AiRE 3,pool-a,400,600,40,4,5,40,200,True,10,2024-06-15 10:00:00
h2,Acme,AiRE 5,pool-b,950,50,100,10,6,95,100,True,20,2024-06-15 09:00:00";
        let set = parse_records(text, MissingFieldPolicy::Fail).unwrap();
        let options = AnalysisOptions {
            host: host.map(str::to_string),
            ..Default::default()
        };
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap());
        analyze_fleet(&set, &options, &clock, &TimezoneHandler::default()).unwrap()
    }

    #[test]
    fn test_score_text_lists_systems() {
        let text = render(&analysis(None), "score", "text").unwrap();
        assert!(text.contains("2 system(s) shown, population 2"));
        assert!(text.contains("h1"));
        assert!(text.contains("h2"));
        assert!(!text.contains("Absolute score"));
    }

    #[test]
    fn test_score_text_single_host_shows_breakdown() {
        let text = render(&analysis(Some("h2")), "score", "text").unwrap();
        assert!(text.contains("Capacity usage is high"));
        assert!(text.contains("Absolute score"));
        assert!(text.contains("pts"));
    }

    #[test]
    fn test_score_json_shape() {
        let out = render(&analysis(None), "score", "json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["systems"].as_array().map(Vec::len), Some(2));
        assert!(value["systems"][0]["relative"]["metrics"]["capacityScore"].is_number());
        assert_eq!(value["metadata"]["population_size"], 2);
    }

    #[test]
    fn test_summary_text_has_table_and_details() {
        let text = render(&analysis(None), "summary", "text").unwrap();
        assert!(text.contains("Total systems analysed: 2"));
        assert!(text.contains("Critical (>90%)"));
        assert!(text.contains("Acme (h2) 95.00%"));
        assert!(text.contains("3 hours ago"));
    }

    #[test]
    fn test_summary_json_uses_camel_case_categories() {
        let out = render(&analysis(None), "summary", "json").unwrap();
        assert!(out.contains("\"noTelemetry\""));
    }

    #[test]
    fn test_stats_text() {
        let text = render(&analysis(None), "stats", "text").unwrap();
        assert!(text.contains("Total capacity"));
        assert!(text.contains("2,000 GB"));
        assert!(text.contains("By company"));
    }

    #[test]
    fn test_trends_text_and_json() {
        let data = analysis(None);
        let text = trends_text(&data);
        assert!(text.starts_with("Used Capacity (%)"));
        assert!(text.contains("95.00"));

        let out = render(&data, "trends", "json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["points"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["unit"], "%");
        assert_eq!(value["metric"], "used");
    }

    #[test]
    fn test_unknown_view_and_format_are_errors() {
        assert!(render(&analysis(None), "daily", "text").is_err());
        assert!(render(&analysis(None), "score", "xml").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-hostname", 8), "a-very-~");
    }
}
