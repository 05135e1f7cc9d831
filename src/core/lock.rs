//! Object Lock Evaluator (spec.md §4.3): pure predicates and transition
//! rules over retention/legal-hold state. No I/O, fully unit-testable
//! without a KV store, grounded in the teacher-adjacent
//! `object-governance::lifecycle::RetentionPolicy` shape, adapted to the S3
//! Object Lock vocabulary spec.md actually specifies.

use maxiofs_model::object::Object;
use maxiofs_model::retention::{LegalHoldConfig, RetentionConfig, RetentionMode};
use maxiofs_util::error::{Error, Result};
use maxiofs_util::time::msec_to_rfc3339;

pub struct LockEvaluator;

impl LockEvaluator {
	/// "`retain-until` must be non-zero and strictly in the future." (spec.md §4.3)
	pub fn validate_retention(cfg: &RetentionConfig, now_msec: u64) -> Result<()> {
		if cfg.retain_until_msec == 0 || cfg.retain_until_msec <= now_msec {
			return Err(Error::InvalidRetentionConfig(
				"retain-until must be non-zero and strictly in the future".into(),
			));
		}
		Ok(())
	}

	/// Legal hold is always a valid ON/OFF toggle; kept as a named
	/// validation step to mirror the `validate(legalHold)` operation
	/// spec.md §4.3 lists alongside `validate(retention)`.
	pub fn validate_legal_hold(_cfg: &LegalHoldConfig) -> Result<()> {
		Ok(())
	}

	/// "Legal hold supersedes retention for delete checks ... COMPLIANCE
	/// always rejects; GOVERNANCE rejects unless a bypassGovernance flag is
	/// set." (spec.md §4.1 DELETE, §4.3)
	pub fn can_delete(obj: &Object, now_msec: u64, bypass_governance: bool) -> Result<()> {
		if obj.legal_hold.is_on() {
			return Err(Error::ObjectUnderLegalHold);
		}
		if let Some(r) = obj.active_retention(now_msec) {
			match r.mode {
				RetentionMode::Compliance => {
					return Err(Error::ComplianceLocked(msec_to_rfc3339(r.retain_until_msec)));
				}
				RetentionMode::Governance => {
					if !bypass_governance {
						return Err(Error::GovernanceLocked(msec_to_rfc3339(r.retain_until_msec)));
					}
				}
			}
		}
		Ok(())
	}

	/// `can_modify_retention(existing, proposed, user, bypass)` (spec.md
	/// §4.3): validates the proposed config, then enforces the shorten/
	/// remove and mode-transition rules against any currently active
	/// retention.
	pub fn can_modify_retention(
		existing: Option<&RetentionConfig>,
		proposed: &RetentionConfig,
		now_msec: u64,
		user_is_admin: bool,
		bypass_governance: bool,
	) -> Result<()> {
		Self::validate_retention(proposed, now_msec)?;

		let active_existing = existing.filter(|r| r.is_active(now_msec));
		if let Some(existing) = active_existing {
			// "COMPLIANCE → GOVERNANCE forbidden" unconditionally, even when
			// the proposed retain-until is later than the current one.
			if existing.mode == RetentionMode::Compliance && proposed.mode != RetentionMode::Compliance {
				return Err(Error::CannotShortenCompliance);
			}
			let shortened_or_removed = proposed.retain_until_msec < existing.retain_until_msec;
			if shortened_or_removed {
				match existing.mode {
					RetentionMode::Compliance => return Err(Error::CannotShortenCompliance),
					RetentionMode::Governance => {
						if !(user_is_admin && bypass_governance) {
							return Err(Error::CannotShortenGovernance);
						}
					}
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use maxiofs_model::retention::LegalHoldStatus;

	fn obj_with_retention(mode: RetentionMode, retain_until_msec: u64) -> Object {
		let mut o = Object::new_implicit_folder("t1/b1", "doc", None, 0);
		o.is_delete_marker = false;
		o.retention = Some(RetentionConfig::new(mode, retain_until_msec));
		o
	}

	#[test]
	fn retention_must_be_strictly_future_and_nonzero() {
		assert!(LockEvaluator::validate_retention(&RetentionConfig::new(RetentionMode::Governance, 0), 0).is_err());
		assert!(LockEvaluator::validate_retention(&RetentionConfig::new(RetentionMode::Governance, 100), 100).is_err());
		assert!(LockEvaluator::validate_retention(&RetentionConfig::new(RetentionMode::Governance, 101), 100).is_ok());
	}

	#[test]
	fn legal_hold_blocks_delete_regardless_of_retention() {
		let mut o = obj_with_retention(RetentionMode::Governance, 1_000_000);
		o.legal_hold = LegalHoldConfig {
			status: LegalHoldStatus::On,
		};
		assert!(matches!(
			LockEvaluator::can_delete(&o, 0, true),
			Err(Error::ObjectUnderLegalHold)
		));
	}

	#[test]
	fn compliance_always_rejects_delete() {
		let o = obj_with_retention(RetentionMode::Compliance, 1_000_000);
		assert!(matches!(
			LockEvaluator::can_delete(&o, 0, true),
			Err(Error::ComplianceLocked(_))
		));
	}

	#[test]
	fn governance_rejects_without_bypass_and_allows_with_it() {
		let o = obj_with_retention(RetentionMode::Governance, 1_000_000);
		assert!(matches!(
			LockEvaluator::can_delete(&o, 0, false),
			Err(Error::GovernanceLocked(_))
		));
		assert!(LockEvaluator::can_delete(&o, 0, true).is_ok());
	}

	#[test]
	fn expired_retention_does_not_block_delete() {
		let o = obj_with_retention(RetentionMode::Compliance, 100);
		assert!(LockEvaluator::can_delete(&o, 1_000, false).is_ok());
	}

	#[test]
	fn compliance_cannot_be_shortened_or_downgraded() {
		let existing = RetentionConfig::new(RetentionMode::Compliance, 2_000);
		let shortened = RetentionConfig::new(RetentionMode::Compliance, 1_000);
		assert!(matches!(
			LockEvaluator::can_modify_retention(Some(&existing), &shortened, 0, true, true),
			Err(Error::CannotShortenCompliance)
		));
		let downgraded = RetentionConfig::new(RetentionMode::Governance, 3_000);
		assert!(matches!(
			LockEvaluator::can_modify_retention(Some(&existing), &downgraded, 0, true, true),
			Err(Error::CannotShortenCompliance)
		));
	}

	#[test]
	fn governance_to_compliance_hardening_is_allowed() {
		let existing = RetentionConfig::new(RetentionMode::Governance, 2_000);
		let hardened = RetentionConfig::new(RetentionMode::Compliance, 3_000);
		assert!(LockEvaluator::can_modify_retention(Some(&existing), &hardened, 0, false, false).is_ok());
	}

	#[test]
	fn governance_shorten_requires_admin_and_bypass() {
		let existing = RetentionConfig::new(RetentionMode::Governance, 2_000);
		let shortened = RetentionConfig::new(RetentionMode::Governance, 1_000);
		assert!(matches!(
			LockEvaluator::can_modify_retention(Some(&existing), &shortened, 0, false, true),
			Err(Error::CannotShortenGovernance)
		));
		assert!(matches!(
			LockEvaluator::can_modify_retention(Some(&existing), &shortened, 0, true, false),
			Err(Error::CannotShortenGovernance)
		));
		assert!(LockEvaluator::can_modify_retention(Some(&existing), &shortened, 0, true, true).is_ok());
	}

	#[test]
	fn extending_is_always_allowed() {
		let existing = RetentionConfig::new(RetentionMode::Governance, 2_000);
		let extended = RetentionConfig::new(RetentionMode::Governance, 5_000);
		assert!(LockEvaluator::can_modify_retention(Some(&existing), &extended, 0, false, false).is_ok());
	}

	#[test]
	fn expired_existing_retention_imposes_no_restriction() {
		let existing = RetentionConfig::new(RetentionMode::Compliance, 100);
		let proposed = RetentionConfig::new(RetentionMode::Governance, 200);
		assert!(LockEvaluator::can_modify_retention(Some(&existing), &proposed, 150, false, false).is_ok());
	}
}
