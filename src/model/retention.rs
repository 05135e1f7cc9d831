//! Object Lock retention & legal hold configuration (spec.md §3, §4.3).
//!
//! Pure data types only; the predicates and transition rules over them live
//! in `maxiofs_core`'s Retention & Lock Evaluator (spec.md §2 item 5) so this
//! crate stays free of policy decisions, matching the teacher's split
//! between data-model crates and the crates that apply policy on top.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionMode {
	Governance,
	Compliance,
}

/// (mode, retain-until-date) — spec.md §3 "RetentionConfig". `retain_until`
/// is milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
	pub mode: RetentionMode,
	pub retain_until_msec: u64,
}

impl RetentionConfig {
	pub fn new(mode: RetentionMode, retain_until_msec: u64) -> RetentionConfig {
		RetentionConfig {
			mode,
			retain_until_msec,
		}
	}

	/// A non-existent retention is inactive; so is one whose date has
	/// already passed (spec.md §4.3: "A non-existent retention is treated
	/// as inactive (retain-until in the past is also inactive)").
	pub fn is_active(&self, now_msec: u64) -> bool {
		self.retain_until_msec > now_msec
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegalHoldStatus {
	On,
	Off,
}

/// spec.md §3 "LegalHoldConfig".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalHoldConfig {
	pub status: LegalHoldStatus,
}

impl Default for LegalHoldConfig {
	fn default() -> Self {
		LegalHoldConfig {
			status: LegalHoldStatus::Off,
		}
	}
}

impl LegalHoldConfig {
	pub fn on() -> LegalHoldConfig {
		LegalHoldConfig {
			status: LegalHoldStatus::On,
		}
	}

	pub fn off() -> LegalHoldConfig {
		LegalHoldConfig::default()
	}

	pub fn is_on(&self) -> bool {
		matches!(self.status, LegalHoldStatus::On)
	}
}

/// Bucket-level default Object Lock rule (spec.md §3 "Bucket metadata":
/// "default object-lock rule (mode + days|years)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLockDefaultRule {
	pub mode: RetentionMode,
	pub years: i32,
	pub days: i64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retention_is_active_only_strictly_in_the_future() {
		let r = RetentionConfig::new(RetentionMode::Governance, 1_000);
		assert!(r.is_active(999));
		assert!(!r.is_active(1_000));
		assert!(!r.is_active(1_001));
	}
}
