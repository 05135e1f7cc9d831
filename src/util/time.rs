//! Time helpers, in the style of `garage_util::time`: everything is expressed
//! as milliseconds (or nanoseconds where finer resolution matters) since the
//! Unix epoch, so timestamps serialize compactly and compare trivially.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Current time, in milliseconds since the Unix epoch.
pub fn now_msec() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the Unix epoch")
		.as_millis() as u64
}

/// Current time, in nanoseconds since the Unix epoch. Used by the version ID
/// generator (spec §6: "Version ID format").
pub fn now_nsec() -> u128 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the Unix epoch")
		.as_nanos()
}

pub fn msec_to_rfc3339(msec: u64) -> String {
	DateTime::<Utc>::from(UNIX_EPOCH + std::time::Duration::from_millis(msec)).to_rfc3339()
}

pub fn msec_to_datetime(msec: u64) -> DateTime<Utc> {
	DateTime::<Utc>::from(UNIX_EPOCH + std::time::Duration::from_millis(msec))
}

pub fn datetime_to_msec(dt: DateTime<Utc>) -> u64 {
	dt.timestamp_millis().max(0) as u64
}

/// `AddDate` semantics used by `calculate_retention_date` (spec §4.4): adding
/// years/days follows calendar rules (not a fixed 365-day year), matching
/// what S3 Object Lock documents for `DefaultRetention`.
pub fn add_years_days(base: DateTime<Utc>, years: i32, days: i64) -> DateTime<Utc> {
	let with_years = if years != 0 {
		let date = base.date_naive();
		let target_year = date.year() + years;
		// Clamp Feb 29 -> Feb 28 when the target year is not a leap year,
		// instead of silently keeping the original date (which `with_year`
		// does on overflow).
		let clamped = NaiveDate::from_ymd_opt(target_year, date.month(), date.day())
			.unwrap_or_else(|| {
				NaiveDate::from_ymd_opt(target_year, date.month(), date.day() - 1)
					.expect("day-1 is always valid for a month that has at least 29 days")
			});
		Utc.from_utc_datetime(&clamped.and_time(base.time()))
	} else {
		base
	};
	with_years + chrono::Duration::days(days)
}
