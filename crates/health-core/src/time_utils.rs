use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Naive layouts accepted for telemetry timestamps without an offset.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses telemetry timestamps, resolving offset-less values in a default zone.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    default_tz: Tz,
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self { default_tz: Tz::UTC }
    }
}

impl TimezoneHandler {
    /// Create a handler with the given IANA timezone name as the default.
    ///
    /// Unknown names fall back to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { default_tz: tz }
    }

    /// Parse a telemetry timestamp into UTC.
    ///
    /// Accepted forms:
    /// * RFC 3339 with `Z` or an explicit offset.
    /// * Naive date-times (`T` or space separated), read in the default zone.
    /// * Bare dates `YYYY-MM-DD`, read as UTC midnight.
    ///
    /// Returns `None` for blank or unrecognised input.
    pub fn parse_timestamp(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }

        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                use chrono::TimeZone as _;
                // Ambiguous local times (DST fall-back) resolve to the earlier instant.
                if let Some(dt) = self.default_tz.from_local_datetime(&naive).earliest() {
                    return Some(dt.with_timezone(&Utc));
                }
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }

        debug!("TimezoneHandler: could not parse timestamp \"{}\"", s);
        None
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    /// Expose the configured default timezone.
    pub fn default_tz(&self) -> Tz {
        self.default_tz
    }
}

// ── Relative time ─────────────────────────────────────────────────────────────

/// Render the distance between `then` and `now` the way the fleet summary shows
/// it: whole hours below a day, whole days otherwise.
///
/// `then` values in the future are reported as `"0 hours ago"`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - then).num_seconds().max(0) / 3600;
    if hours < 24 {
        let suffix = if hours == 1 { "" } else { "s" };
        format!("{} hour{} ago", hours, suffix)
    } else {
        let days = hours / 24;
        let suffix = if days == 1 { "" } else { "s" };
        format!("{} day{} ago", days, suffix)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone as _, Timelike};

    // ── validate_timezone ────────────────────────────────────────────────────

    #[test]
    fn test_validate_timezone_valid() {
        assert!(TimezoneHandler::validate_timezone("Europe/Rome"));
        assert!(TimezoneHandler::validate_timezone("UTC"));
    }

    #[test]
    fn test_validate_timezone_invalid() {
        assert!(!TimezoneHandler::validate_timezone("Mars/Olympus"));
        assert!(!TimezoneHandler::validate_timezone(""));
    }

    #[test]
    fn test_new_invalid_timezone_falls_back_to_utc() {
        let handler = TimezoneHandler::new("Invalid/Timezone");
        assert_eq!(handler.default_tz(), Tz::UTC);
    }

    // ── parse_timestamp ──────────────────────────────────────────────────────

    #[test]
    fn test_parse_timestamp_z_suffix() {
        let handler = TimezoneHandler::default();
        let dt = handler.parse_timestamp("2024-05-01T10:30:00Z").unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let handler = TimezoneHandler::default();
        let dt = handler
            .parse_timestamp("2024-05-01T12:00:00+02:00")
            .unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_timestamp_space_separated_in_default_zone() {
        let handler = TimezoneHandler::new("Europe/Rome");
        // Rome is UTC+2 in May.
        let dt = handler.parse_timestamp("2024-05-12 10:00:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 5, 12, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_date_only_is_utc_midnight() {
        let handler = TimezoneHandler::new("Europe/Rome");
        let dt = handler.parse_timestamp("2024-05-20").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_blank_and_garbage() {
        let handler = TimezoneHandler::default();
        assert!(handler.parse_timestamp("").is_none());
        assert!(handler.parse_timestamp("   ").is_none());
        assert!(handler.parse_timestamp("not-a-date").is_none());
        assert!(handler.parse_timestamp("2024-13-45").is_none());
    }

    // ── time_ago ─────────────────────────────────────────────────────────────

    #[test]
    fn test_time_ago_hours() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now - Duration::minutes(30), now), "0 hours ago");
        assert_eq!(time_ago(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(time_ago(now - Duration::hours(5), now), "5 hours ago");
    }

    #[test]
    fn test_time_ago_days() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now - Duration::hours(24), now), "1 day ago");
        assert_eq!(time_ago(now - Duration::hours(80), now), "3 days ago");
    }

    #[test]
    fn test_time_ago_future_is_zero() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now + Duration::hours(3), now), "0 hours ago");
    }

    #[test]
    fn test_get_system_timezone_returns_nonempty_string() {
        assert!(!get_system_timezone().is_empty());
    }
}
