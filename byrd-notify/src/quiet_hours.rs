//! Quiet-hours evaluation in the merchant's own timezone.

use byrd_core::NotificationPreferences;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Whether `at` falls in the `[start, end)` window. Windows may wrap past midnight;
/// `start == end` is an empty window.
pub fn window_contains(start: NaiveTime, end: NaiveTime, at: NaiveTime) -> bool {
    if start == end {
        false
    } else if start < end {
        at >= start && at < end
    } else {
        at >= start || at < end
    }
}

/// Parse an IANA zone name, falling back to UTC for unknown names.
pub fn merchant_zone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(timezone = %name, "Unknown timezone, evaluating quiet hours in UTC");
        Tz::UTC
    })
}

pub fn is_quiet(preferences: &NotificationPreferences, now: DateTime<Utc>) -> bool {
    if !preferences.quiet_hours_enabled {
        return false;
    }
    let local = now.with_timezone(&merchant_zone(&preferences.timezone)).time();
    window_contains(preferences.quiet_hours_start, preferences.quiet_hours_end, local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_same_day_window() {
        assert!(window_contains(hm(13, 0), hm(15, 0), hm(13, 0)));
        assert!(window_contains(hm(13, 0), hm(15, 0), hm(14, 59)));
        assert!(!window_contains(hm(13, 0), hm(15, 0), hm(15, 0)));
        assert!(!window_contains(hm(13, 0), hm(15, 0), hm(9, 0)));
    }

    #[test]
    fn test_wrapping_window() {
        assert!(window_contains(hm(22, 0), hm(8, 0), hm(23, 30)));
        assert!(window_contains(hm(22, 0), hm(8, 0), hm(0, 0)));
        assert!(window_contains(hm(22, 0), hm(8, 0), hm(7, 59)));
        assert!(!window_contains(hm(22, 0), hm(8, 0), hm(8, 0)));
        assert!(!window_contains(hm(22, 0), hm(8, 0), hm(12, 0)));
    }

    #[test]
    fn test_empty_window() {
        assert!(!window_contains(hm(9, 0), hm(9, 0), hm(9, 0)));
    }

    #[test]
    fn test_quiet_hours_use_merchant_timezone() {
        let mut prefs = NotificationPreferences::default_for(Uuid::new_v4());
        prefs.quiet_hours_enabled = true;
        prefs.timezone = "America/New_York".to_string();

        // 03:00 UTC on a January night is 22:00 in New York.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 3, 0, 0).unwrap();
        assert!(is_quiet(&prefs, now));

        // 14:00 UTC is 09:00 local.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 14, 0, 0).unwrap();
        assert!(!is_quiet(&prefs, now));

        prefs.quiet_hours_enabled = false;
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 3, 0, 0).unwrap();
        assert!(!is_quiet(&prefs, now));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        assert_eq!(merchant_zone("Mars/Olympus_Mons"), Tz::UTC);
    }
}
