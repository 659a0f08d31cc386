//! Local-day arithmetic. Day boundaries are local midnights, derived from the
//! UTC offset captured when the attempt started.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Largest representable offset magnitude in minutes. Inputs beyond this are
/// clamped rather than rejected.
const MAX_OFFSET_MINUTES: i32 = 17 * 60;

fn fixed_offset(utc_offset_minutes: i32) -> FixedOffset {
  let clamped = utc_offset_minutes.clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES);
  FixedOffset::east_opt(clamped * 60).unwrap_or_else(|| Utc.fix())
}

/// Local calendar date of `t` under a fixed minute offset.
pub fn local_date(t: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
  t.with_timezone(&fixed_offset(utc_offset_minutes)).date_naive()
}

/// Number of whole local calendar days between the start instant and `now`.
/// Zero while still on the starting date; negative only if clocks ran backwards.
pub fn elapsed_local_days(started_at: DateTime<Utc>, now: DateTime<Utc>, utc_offset_minutes: i32) -> i64 {
  (local_date(now, utc_offset_minutes) - local_date(started_at, utc_offset_minutes)).num_days()
}

/// True once local midnight has closed the given 1-based challenge day.
/// Day `d` occupies the local date `start_date + (d - 1)`, so it is over as
/// soon as `d` whole days have elapsed.
pub fn day_is_over(started_at: DateTime<Utc>, now: DateTime<Utc>, utc_offset_minutes: i32, day: u32) -> bool {
  elapsed_local_days(started_at, now, utc_offset_minutes) >= i64::from(day)
}
