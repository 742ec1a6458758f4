//! Timezone-aware quiet-hours gating (§4.3, §6).
//!
//! Every watchdog calls [`QuietHoursPolicy::is_quiet`] before any
//! external side effect; work still persists internally but messaging
//! is deferred. Overlapping configured windows resolve by union, not by
//! first-match, so a start-hour straddling midnight composes correctly
//! with a second window on the same policy.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One configured quiet-hours window: `start` and `end` are local hours
/// `0..=23`. `start > end` denotes an overnight window that wraps past
/// midnight (e.g. `23 -> 8`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuietHoursWindow {
    pub enabled: bool,
    pub start_hour: u8,
    pub end_hour: u8,
    pub timezone: String,
}

/// A policy is the union of zero or more windows; any enabled window
/// containing `now` makes the whole policy quiet at that instant.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QuietHoursPolicy {
    pub windows: Vec<QuietHoursWindow>,
}

impl QuietHoursPolicy {
    pub fn single(window: QuietHoursWindow) -> Self {
        Self { windows: vec![window] }
    }

    /// True if `now` falls inside any enabled window's local hours,
    /// honoring overnight wrap. Returns `false` (never suppress) if a
    /// window's timezone string fails to parse — a misconfigured
    /// timezone must not silently block all messaging.
    pub fn is_quiet(&self, now: DateTime<Utc>) -> bool {
        self.windows.iter().any(|w| window_contains(w, now))
    }
}

fn window_contains(window: &QuietHoursWindow, now: DateTime<Utc>) -> bool {
    if !window.enabled {
        return false;
    }
    let Ok(tz): Result<Tz, _> = window.timezone.parse() else {
        return false;
    };
    let local = now.with_timezone(&tz);
    let hour = local.hour_u8();

    if window.start_hour == window.end_hour {
        // A zero-width or full-day window: treat as always-quiet.
        return true;
    }
    if window.start_hour < window.end_hour {
        hour >= window.start_hour && hour < window.end_hour
    } else {
        // Overnight wrap, e.g. 23 -> 8.
        hour >= window.start_hour || hour < window.end_hour
    }
}

trait HourU8 {
    fn hour_u8(&self) -> u8;
}

impl HourU8 for chrono::DateTime<Tz> {
    fn hour_u8(&self) -> u8 {
        use chrono::Timelike;
        self.hour() as u8
    }
}

/// Convenience constructor matching §8 scenario 6's literal policy JSON.
pub fn vancouver_overnight(start_hour: u8, end_hour: u8) -> QuietHoursPolicy {
    QuietHoursPolicy::single(QuietHoursWindow {
        enabled: true,
        start_hour,
        end_hour,
        timezone: "America/Vancouver".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_vancouver(hour: u32) -> DateTime<Utc> {
        // PST is UTC-8 outside DST; use a fixed winter date so the
        // offset is deterministic for the test.
        let tz: Tz = "America/Vancouver".parse().unwrap();
        tz.with_ymd_and_hms(2026, 1, 15, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let policy = vancouver_overnight(23, 8);
        assert!(policy.is_quiet(at_vancouver(2)));
        assert!(policy.is_quiet(at_vancouver(23)));
        assert!(!policy.is_quiet(at_vancouver(9)));
        assert!(!policy.is_quiet(at_vancouver(12)));
    }

    #[test]
    fn disabled_window_never_quiet() {
        let mut policy = vancouver_overnight(23, 8);
        policy.windows[0].enabled = false;
        assert!(!policy.is_quiet(at_vancouver(2)));
    }

    #[test]
    fn union_of_overlapping_windows() {
        let policy = QuietHoursPolicy {
            windows: vec![
                QuietHoursWindow { enabled: true, start_hour: 22, end_hour: 2, timezone: "America/Vancouver".into() },
                QuietHoursWindow { enabled: true, start_hour: 1, end_hour: 6, timezone: "America/Vancouver".into() },
            ],
        };
        // 3am is only covered by the second window.
        assert!(policy.is_quiet(at_vancouver(3)));
        // 23:00 only covered by the first.
        assert!(policy.is_quiet(at_vancouver(23)));
        // 10am covered by neither.
        assert!(!policy.is_quiet(at_vancouver(10)));
    }

    #[test]
    fn bad_timezone_never_suppresses() {
        let policy = QuietHoursPolicy::single(QuietHoursWindow {
            enabled: true,
            start_hour: 23,
            end_hour: 8,
            timezone: "Not/AZone".into(),
        });
        assert!(!policy.is_quiet(Utc::now()));
    }
}
