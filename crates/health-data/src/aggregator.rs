//! Fleet-wide statistics over a record set.
//!
//! Optional columns (`used`, `avail`, `used_snap`, `perc_snap`, `avg_time`)
//! count as zero when a row lacks them, so means are always taken over the
//! full number of systems.

use std::collections::BTreeMap;

use health_core::formatting::round_to;
use health_core::models::{RecordSet, SystemRecord};
use serde::{Deserialize, Serialize};

/// `perc_used` below this is healthy.
pub const HEALTHY_BELOW: f64 = 70.0;
/// `perc_used` at or above this is critical.
pub const CRITICAL_FROM: f64 = 90.0;

/// Group key for rows with a blank attribute.
const UNKNOWN: &str = "Unknown";

// ── CapacityBuckets ───────────────────────────────────────────────────────────

/// Systems grouped by `perc_used`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityBuckets {
    /// `perc_used < 70`
    pub healthy: usize,
    /// `70 <= perc_used < 90`
    pub warning: usize,
    /// `perc_used >= 90`
    pub critical: usize,
}

impl CapacityBuckets {
    fn add(&mut self, perc_used: f64) {
        if perc_used < HEALTHY_BELOW {
            self.healthy += 1;
        } else if perc_used < CRITICAL_FROM {
            self.warning += 1;
        } else {
            self.critical += 1;
        }
    }
}

// ── FleetStats ────────────────────────────────────────────────────────────────

/// Totals, means and breakdowns for a set of systems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStats {
    pub total_systems: usize,
    /// Σ (used + avail), GB.
    pub total_capacity: f64,
    /// Σ used, GB.
    pub used_capacity: f64,
    /// Σ used_snap, GB.
    pub used_snapshots: f64,
    /// Mean used GB per system.
    pub avg_usage: f64,
    /// Mean snapshot GB per system.
    pub avg_snap_usage: f64,
    pub avg_perc_used: f64,
    pub avg_perc_snap: f64,
    pub avg_speed: f64,
    /// Mean snapshot interval (`avg_time`).
    pub avg_response_time: f64,
    pub telemetry_active: usize,
    pub systems_by_type: BTreeMap<String, usize>,
    pub systems_by_company: BTreeMap<String, usize>,
    pub systems_by_pool: BTreeMap<String, usize>,
    pub capacity: CapacityBuckets,
}

impl FleetStats {
    /// Aggregate `set`; `None` when it has no records.
    ///
    /// Means are rounded to two decimals; sums are left exact.
    pub fn from_records(set: &RecordSet) -> Option<Self> {
        if set.is_empty() {
            return None;
        }

        let mut stats = FleetStats {
            total_systems: set.len(),
            ..Default::default()
        };
        let (mut perc_used, mut perc_snap, mut speed, mut interval) = (0.0, 0.0, 0.0, 0.0);

        for r in set.iter() {
            let used = optional(r, "used");
            stats.used_capacity += used;
            stats.total_capacity += used + optional(r, "avail");
            stats.used_snapshots += optional(r, "used_snap");
            perc_used += r.perc_used;
            perc_snap += optional(r, "perc_snap");
            speed += r.avg_speed;
            interval += optional(r, "avg_time");

            if r.sending_telemetry {
                stats.telemetry_active += 1;
            }
            *stats.systems_by_type.entry(group_key(r, "type")).or_default() += 1;
            *stats.systems_by_company.entry(group_key(r, "company")).or_default() += 1;
            *stats.systems_by_pool.entry(group_key(r, "pool")).or_default() += 1;
            stats.capacity.add(r.perc_used);
        }

        let n = stats.total_systems as f64;
        stats.avg_usage = round_to(stats.used_capacity / n, 2);
        stats.avg_snap_usage = round_to(stats.used_snapshots / n, 2);
        stats.avg_perc_used = round_to(perc_used / n, 2);
        stats.avg_perc_snap = round_to(perc_snap / n, 2);
        stats.avg_speed = round_to(speed / n, 2);
        stats.avg_response_time = round_to(interval / n, 2);

        Some(stats)
    }
}

fn optional(record: &SystemRecord, column: &str) -> f64 {
    record.number(column).unwrap_or(0.0)
}

fn group_key(record: &SystemRecord, column: &str) -> String {
    record.text(column).unwrap_or_else(|| UNKNOWN.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use health_core::models::MissingFieldPolicy;

    use crate::reader::parse_records;

    fn fleet() -> RecordSet {
        let text = "\
hostid,company,type,pool,used,avail,used_snap,perc_snap,avg_time,perc_used,avg_speed,sending_telemetry,MUP,date
h1,Acme,AiRE 3,pool-a,400,600,40,4,5,40,200,true,10,2024-05-01
h2,Acme,AiRE 5,pool-b,750,250,100,10,6,75,100,false,20,2024-05-02
h3,Globex,AiRE 3,,950,50,10,1,4,95,150,true,30,2024-05-03";
        parse_records(text, MissingFieldPolicy::Fail).unwrap()
    }

    #[test]
    fn test_empty_set_has_no_stats() {
        assert!(FleetStats::from_records(&RecordSet::default()).is_none());
    }

    #[test]
    fn test_totals_and_means() {
        let stats = FleetStats::from_records(&fleet()).unwrap();
        assert_eq!(stats.total_systems, 3);
        assert_eq!(stats.total_capacity, 3000.0);
        assert_eq!(stats.used_capacity, 2100.0);
        assert_eq!(stats.used_snapshots, 150.0);
        assert_eq!(stats.avg_usage, 700.0);
        assert_eq!(stats.avg_snap_usage, 50.0);
        assert_eq!(stats.avg_perc_used, 70.0);
        assert_eq!(stats.avg_perc_snap, 5.0);
        assert_eq!(stats.avg_speed, 150.0);
        assert_eq!(stats.avg_response_time, 5.0);
        assert_eq!(stats.telemetry_active, 2);
    }

    #[test]
    fn test_breakdowns_use_unknown_for_blank() {
        let stats = FleetStats::from_records(&fleet()).unwrap();
        assert_eq!(stats.systems_by_type.get("AiRE 3"), Some(&2));
        assert_eq!(stats.systems_by_company.get("Acme"), Some(&2));
        assert_eq!(stats.systems_by_pool.get("Unknown"), Some(&1));
    }

    #[test]
    fn test_capacity_buckets() {
        let stats = FleetStats::from_records(&fleet()).unwrap();
        assert_eq!(
            stats.capacity,
            CapacityBuckets {
                healthy: 1,
                warning: 1,
                critical: 1
            }
        );
    }

    #[test]
    fn test_bucket_edges() {
        let mut buckets = CapacityBuckets::default();
        for p in [69.99, 70.0, 89.99, 90.0] {
            buckets.add(p);
        }
        assert_eq!(buckets.healthy, 1);
        assert_eq!(buckets.warning, 2);
        assert_eq!(buckets.critical, 1);
    }

    #[test]
    fn test_missing_optional_columns_count_as_zero() {
        let text = "perc_used,avg_speed,sending_telemetry,MUP,date\n50,100,true,1,2024-05-01";
        let set = parse_records(text, MissingFieldPolicy::Fail).unwrap();
        let stats = FleetStats::from_records(&set).unwrap();
        assert_eq!(stats.total_capacity, 0.0);
        assert_eq!(stats.avg_response_time, 0.0);
        assert_eq!(stats.systems_by_type.get("Unknown"), Some(&1));
    }
}
