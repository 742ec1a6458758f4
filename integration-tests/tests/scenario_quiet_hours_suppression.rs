//! Spec scenario 6: at 02:00 local in a window configured
//! `{enabled:true, start:23, end:8, tz:"America/Vancouver"}`, a tick
//! with `force=false` is suppressed; `force=true` overrides it.
//!
//! `GovHandlerImpl`'s tick handlers hard-code `QuietHoursPolicy::default()`
//! (there is no `/policy` field or route to override it per-tick), so
//! this scenario is exercised directly against `gov_core::watchdog::quiet_gate`
//! and `gov_core::quiet_hours`, the pure functions the handler itself
//! calls — the same seam the module's own doc comment names as the
//! reason ticks are cheap to test deterministically.

use chrono::TimeZone;
use chrono_tz::Tz;
use gov_core::quiet_hours::{QuietHoursPolicy, QuietHoursWindow};
use gov_core::watchdog::{quiet_gate, TickOpts};

fn at_vancouver_hour(hour: u32) -> chrono::DateTime<chrono::Utc> {
    let tz: Tz = "America/Vancouver".parse().unwrap();
    tz.with_ymd_and_hms(2026, 1, 15, hour, 0, 0).unwrap().with_timezone(&chrono::Utc)
}

fn scenario_policy() -> QuietHoursPolicy {
    QuietHoursPolicy::single(QuietHoursWindow {
        enabled: true,
        start_hour: 23,
        end_hour: 8,
        timezone: "America/Vancouver".to_string(),
    })
}

#[test]
fn quiet_hours_suppress_a_non_forced_tick_at_2am() {
    let now = at_vancouver_hour(2);
    let gate = quiet_gate(now, TickOpts { dry_run: false, force: false }, &scenario_policy());
    assert!(gate.suppressed);
    assert_eq!(gate.reason, Some("quiet-hours"));
}

#[test]
fn force_overrides_quiet_hours() {
    let now = at_vancouver_hour(2);
    let gate = quiet_gate(now, TickOpts { dry_run: false, force: true }, &scenario_policy());
    assert!(!gate.suppressed);
    assert_eq!(gate.reason, None);
}

#[test]
fn daytime_is_never_suppressed_even_without_force() {
    let now = at_vancouver_hour(14);
    let gate = quiet_gate(now, TickOpts { dry_run: false, force: false }, &scenario_policy());
    assert!(!gate.suppressed);
}
