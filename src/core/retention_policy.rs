//! Retention Policy Manager (spec.md §2 item 9, §4.4): reports, cleanup of
//! expired retentions, and compliance enforcement, built on top of the
//! Object Manager (listing/metadata) and the Lock Evaluator (predicates).
//!
//! Per spec.md §9's restructuring note on the Object-Manager/Retention-
//! Policy-Manager "cyclic-looking" reference: this is really a one-way
//! layering issue, resolved here by having this module depend on
//! `crate::object_manager` and `crate::lock` and never the reverse — the
//! Object Manager has no knowledge this type exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use maxiofs_model::object::Object;
use maxiofs_model::retention::{RetentionConfig, RetentionMode};
use maxiofs_util::error::Result;
use maxiofs_util::time::add_years_days;

use crate::object_manager::ObjectManager;

/// spec.md §4.4 `compliance_report`'s per-object status classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceStatus {
	/// An active retention (any mode) blocks deletion.
	Active,
	/// A retention exists but its `retain-until` has already passed.
	Expired,
	/// Legal hold is ON, independent of any retention state.
	LegalHold,
	/// No retention and no legal hold.
	None,
}

#[derive(Debug, Clone)]
pub struct ObjectComplianceEntry {
	pub key: String,
	pub version_id: Option<String>,
	pub mode: Option<RetentionMode>,
	pub retain_until_msec: Option<u64>,
	pub status: ComplianceStatus,
}

/// spec.md §4.4 `compliance_report(bucket, start, end)`.
#[derive(Debug, Clone)]
pub struct ComplianceReport {
	pub bucket_path: String,
	pub window_start_msec: u64,
	pub window_end_msec: u64,
	pub entries: Vec<ObjectComplianceEntry>,
	pub earliest_retain_until_msec: Option<u64>,
	pub latest_retain_until_msec: Option<u64>,
}

/// spec.md §4.4 `summary(bucket)`: aggregate counts by mode.
#[derive(Debug, Clone, Default)]
pub struct RetentionSummary {
	pub bucket_path: String,
	pub governance_count: usize,
	pub compliance_count: usize,
	pub legal_hold_count: usize,
	pub no_retention_count: usize,
}

pub struct RetentionPolicyManager {
	objects: Arc<ObjectManager>,
}

impl RetentionPolicyManager {
	pub fn new(objects: Arc<ObjectManager>) -> RetentionPolicyManager {
		RetentionPolicyManager { objects }
	}

	/// spec.md §4.4 "calculate_retention_date(base, years, days): AddDate semantics."
	pub fn calculate_retention_date(base: DateTime<Utc>, years: i32, days: i64) -> DateTime<Utc> {
		add_years_days(base, years, days)
	}

	/// spec.md §4.4 "extend(bucket, key, new_date, user): only permitted if
	/// `new_date ≥ current.retain-until`; enforced by lock rules." The
	/// "enforced by lock rules" part is exactly what
	/// [`ObjectManager::put_object_retention`] already does via
	/// [`crate::lock::LockEvaluator::can_modify_retention`] — extension is
	/// never a shorten, so it always passes that check; this method exists
	/// to give callers the named, narrower operation the spec describes
	/// rather than the full `put_object_retention` surface.
	pub async fn extend(&self, bucket_path: &str, key: &str, new_retain_until_msec: u64, user_is_admin: bool, bypass_governance: bool) -> Result<()> {
		let current = self.objects.get_object_retention(bucket_path, key).await.ok();
		let mode = current.map(|c| c.mode).unwrap_or(RetentionMode::Governance);
		let proposed = RetentionConfig::new(mode, new_retain_until_msec);
		self.objects.put_object_retention(bucket_path, key, proposed, user_is_admin, bypass_governance).await
	}

	/// spec.md §4.4 "is_eligible_for_deletion: returns true iff no active
	/// legal hold and no active retention."
	pub fn is_eligible_for_deletion(obj: &Object, now_msec: u64) -> bool {
		!obj.legal_hold.is_on() && obj.active_retention(now_msec).is_none()
	}

	/// spec.md §4.4 "get_expiring(bucket, before_time): enumerate objects
	/// whose retention lies in `(now, before_time)`."
	pub async fn get_expiring(&self, bucket_path: &str, now_msec: u64, before_msec: u64) -> Result<Vec<Object>> {
		let all = self.enumerate_all(bucket_path).await?;
		Ok(all
			.into_iter()
			.filter(|o| {
				o.retention
					.map(|r| r.retain_until_msec > now_msec && r.retain_until_msec < before_msec)
					.unwrap_or(false)
			})
			.collect())
	}

	/// spec.md §4.4 "cleanup_expired(bucket): enumerate and strip retention
	/// from objects whose `retain-until` is in the past; ignore per-object
	/// errors and count successes."
	pub async fn cleanup_expired(&self, bucket_path: &str, now_msec: u64) -> Result<usize> {
		let all = self.enumerate_all(bucket_path).await?;
		let mut cleaned = 0usize;
		for obj in all {
			let expired = obj.retention.map(|r| !r.is_active(now_msec)).unwrap_or(false);
			if !expired {
				continue;
			}
			match self.objects.clear_object_retention(&obj.bucket_path, &obj.key).await {
				Ok(()) => cleaned += 1,
				Err(e) => warn!("cleanup_expired: failed to clear retention on {}/{}: {}", obj.bucket_path, obj.key, e),
			}
		}
		Ok(cleaned)
	}

	/// spec.md §4.4 "summary(bucket): aggregate counts by mode."
	pub async fn summary(&self, bucket_path: &str, now_msec: u64) -> Result<RetentionSummary> {
		let all = self.enumerate_all(bucket_path).await?;
		let mut summary = RetentionSummary {
			bucket_path: bucket_path.to_string(),
			..Default::default()
		};
		for obj in &all {
			if obj.legal_hold.is_on() {
				summary.legal_hold_count += 1;
			}
			match obj.active_retention(now_msec) {
				Some(r) => match r.mode {
					RetentionMode::Governance => summary.governance_count += 1,
					RetentionMode::Compliance => summary.compliance_count += 1,
				},
				None => summary.no_retention_count += 1,
			}
		}
		Ok(summary)
	}

	/// spec.md §4.4 "compliance_report(bucket, start, end): aggregate counts
	/// by mode and emit per-object compliance status (active / expired /
	/// legal_hold / none) plus earliest/latest dates."
	pub async fn compliance_report(&self, bucket_path: &str, now_msec: u64, window_start_msec: u64, window_end_msec: u64) -> Result<ComplianceReport> {
		let all = self.enumerate_all(bucket_path).await?;
		let mut entries = Vec::with_capacity(all.len());
		let mut earliest: Option<u64> = None;
		let mut latest: Option<u64> = None;

		for obj in all {
			// Legal hold supersedes retention for delete-blocking purposes
			// (spec.md §4.3), so it takes priority in the status label too.
			let status = if obj.legal_hold.is_on() {
				ComplianceStatus::LegalHold
			} else {
				match obj.retention {
					Some(r) if r.is_active(now_msec) => ComplianceStatus::Active,
					Some(_) => ComplianceStatus::Expired,
					None => ComplianceStatus::None,
				}
			};
			if let Some(r) = obj.retention {
				earliest = Some(earliest.map_or(r.retain_until_msec, |e| e.min(r.retain_until_msec)));
				latest = Some(latest.map_or(r.retain_until_msec, |l| l.max(r.retain_until_msec)));
			}
			entries.push(ObjectComplianceEntry {
				key: obj.key,
				version_id: obj.version_id,
				mode: obj.retention.map(|r| r.mode),
				retain_until_msec: obj.retention.map(|r| r.retain_until_msec),
				status,
			});
		}

		Ok(ComplianceReport {
			bucket_path: bucket_path.to_string(),
			window_start_msec,
			window_end_msec,
			entries,
			earliest_retain_until_msec: earliest,
			latest_retain_until_msec: latest,
		})
	}

	/// Pages through the whole bucket via the Object Manager's LIST
	/// operation rather than reaching into `MetadataStore` directly, so this
	/// manager only ever depends on the Object Manager, never the metadata
	/// layer underneath it (spec.md §9 layering note).
	async fn enumerate_all(&self, bucket_path: &str) -> Result<Vec<Object>> {
		let mut out = Vec::new();
		let mut marker: Option<String> = None;
		loop {
			let page = self.objects.list(bucket_path, "", None, marker.as_deref(), 1000).await?;
			let truncated = page.truncated;
			let next = page.next_marker.clone();
			out.extend(page.objects);
			if !truncated {
				break;
			}
			marker = next;
			if marker.is_none() {
				break;
			}
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::header::HeaderBag;
	use crate::object_manager::test_support::*;
	use maxiofs_model::retention::{LegalHoldConfig, LegalHoldStatus};

	fn scratch_dir() -> std::path::PathBuf {
		std::env::temp_dir().join(format!("maxiofs-retpol-test-{}", hex::encode(rand::random::<[u8; 8]>())))
	}

	#[tokio::test]
	async fn cleanup_expired_strips_only_lapsed_retentions() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mgr = Arc::new(mgr);
		let policy = RetentionPolicyManager::new(mgr.clone());

		mgr.put("t1/b1", "expired.txt", body(b"x"), &HeaderBag::new(), maxiofs_util::cancel::CancellationToken::never())
			.await
			.unwrap();
		mgr.put_object_retention("t1/b1", "expired.txt", RetentionConfig::new(RetentionMode::Governance, 1_000), true, true)
			.await
			.unwrap_err(); // 1_000 is already in the past relative to "now" (real wall clock), rejected by validate_retention

		// Establish a genuinely active retention first, then simulate its
		// expiry by checking against a `now` far in the future instead of
		// mutating the clock.
		let future = maxiofs_util::time::now_msec() + 10_000;
		mgr.put_object_retention("t1/b1", "expired.txt", RetentionConfig::new(RetentionMode::Governance, future), true, true)
			.await
			.unwrap();

		let cleaned = policy.cleanup_expired("t1/b1", future + 1).await.unwrap();
		assert_eq!(cleaned, 1);
		assert!(mgr.get_object_retention("t1/b1", "expired.txt").await.is_err());
	}

	#[tokio::test]
	async fn summary_counts_by_mode_and_legal_hold() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mgr = Arc::new(mgr);
		let policy = RetentionPolicyManager::new(mgr.clone());

		for key in ["a", "b", "c"] {
			mgr.put("t1/b1", key, body(b"x"), &HeaderBag::new(), maxiofs_util::cancel::CancellationToken::never())
				.await
				.unwrap();
		}
		let future = maxiofs_util::time::now_msec() + 100_000;
		mgr.put_object_retention("t1/b1", "a", RetentionConfig::new(RetentionMode::Governance, future), true, true)
			.await
			.unwrap();
		mgr.put_object_retention("t1/b1", "b", RetentionConfig::new(RetentionMode::Compliance, future), true, true)
			.await
			.unwrap();
		mgr.put_object_legal_hold("t1/b1", "c", LegalHoldConfig { status: LegalHoldStatus::On }).await.unwrap();

		let summary = policy.summary("t1/b1", maxiofs_util::time::now_msec()).await.unwrap();
		assert_eq!(summary.governance_count, 1);
		assert_eq!(summary.compliance_count, 1);
		assert_eq!(summary.legal_hold_count, 1);
		assert_eq!(summary.no_retention_count, 1); // "c" has no retention, only legal hold
	}

	#[tokio::test]
	async fn is_eligible_for_deletion_respects_both_gates() {
		let obj = Object::new_implicit_folder("t1/b1", "k", None, 0);
		assert!(RetentionPolicyManager::is_eligible_for_deletion(&obj, 0));

		let mut held = obj.clone();
		held.is_delete_marker = false;
		held.legal_hold = LegalHoldConfig { status: LegalHoldStatus::On };
		assert!(!RetentionPolicyManager::is_eligible_for_deletion(&held, 0));
	}
}
