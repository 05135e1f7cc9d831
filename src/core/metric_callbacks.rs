//! Metric callback interface (spec.md §6 "Metric callbacks") and an
//! in-memory implementation for tests and single-process bring-up where no
//! external accounting surface is wired in.
//!
//! The external interface is exactly the five functions spec.md names:
//! `IncrementObjectCount`/`DecrementObjectCount` (bucket object_count ±1,
//! bucket total_size ± the given byte delta, in the same call) and
//! `IncrementTenantStorage`/`DecrementTenantStorage` (tenant storage_used ±
//! the given byte delta, no count attached) plus the quota pre-check. The
//! Object Manager composes pairs of these (e.g. decrement-then-increment)
//! to express "count unchanged, size changes" without a sixth primitive —
//! see DESIGN.md.

use std::collections::HashMap;
use std::sync::RwLock;

use maxiofs_util::error::{Error, Result};

pub trait MetricCallbacks: Send + Sync {
	fn increment_object_count(&self, tenant: Option<&str>, bucket: &str, delta_bytes: i64);
	fn decrement_object_count(&self, tenant: Option<&str>, bucket: &str, delta_bytes: i64);
	fn increment_tenant_storage(&self, tenant: &str, delta_bytes: i64);
	fn decrement_tenant_storage(&self, tenant: &str, delta_bytes: i64);
	fn check_tenant_storage_quota(&self, tenant: &str, additional: i64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BucketCounters {
	pub object_count: i64,
	pub total_size: i64,
}

/// Reference `MetricCallbacks` used by the test suite (spec.md §8's
/// quota-rollback scenario needs an accounting surface to assert against)
/// and available to a single-process bring-up with no external tenant
/// registry.
pub struct MemMetricCallbacks {
	buckets: RwLock<HashMap<String, BucketCounters>>,
	tenant_storage: RwLock<HashMap<String, i64>>,
	tenant_quota: RwLock<HashMap<String, i64>>,
}

impl Default for MemMetricCallbacks {
	fn default() -> Self {
		MemMetricCallbacks {
			buckets: RwLock::new(HashMap::new()),
			tenant_storage: RwLock::new(HashMap::new()),
			tenant_quota: RwLock::new(HashMap::new()),
		}
	}
}

impl MemMetricCallbacks {
	pub fn new() -> MemMetricCallbacks {
		MemMetricCallbacks::default()
	}

	pub fn set_tenant_quota(&self, tenant: &str, quota_bytes: i64) {
		self.tenant_quota.write().unwrap().insert(tenant.to_string(), quota_bytes);
	}

	pub fn bucket_counters(&self, bucket: &str) -> BucketCounters {
		self.buckets.read().unwrap().get(bucket).copied().unwrap_or_default()
	}

	pub fn tenant_storage_used(&self, tenant: &str) -> i64 {
		*self.tenant_storage.read().unwrap().get(tenant).unwrap_or(&0)
	}
}

impl MetricCallbacks for MemMetricCallbacks {
	fn increment_object_count(&self, _tenant: Option<&str>, bucket: &str, delta_bytes: i64) {
		let mut buckets = self.buckets.write().unwrap();
		let entry = buckets.entry(bucket.to_string()).or_default();
		entry.object_count += 1;
		entry.total_size += delta_bytes;
	}

	fn decrement_object_count(&self, _tenant: Option<&str>, bucket: &str, delta_bytes: i64) {
		let mut buckets = self.buckets.write().unwrap();
		let entry = buckets.entry(bucket.to_string()).or_default();
		entry.object_count -= 1;
		entry.total_size -= delta_bytes;
	}

	fn increment_tenant_storage(&self, tenant: &str, delta_bytes: i64) {
		let mut storage = self.tenant_storage.write().unwrap();
		*storage.entry(tenant.to_string()).or_insert(0) += delta_bytes;
	}

	fn decrement_tenant_storage(&self, tenant: &str, delta_bytes: i64) {
		let mut storage = self.tenant_storage.write().unwrap();
		*storage.entry(tenant.to_string()).or_insert(0) -= delta_bytes;
	}

	fn check_tenant_storage_quota(&self, tenant: &str, additional: i64) -> Result<()> {
		let quota = *self.tenant_quota.read().unwrap().get(tenant).unwrap_or(&i64::MAX);
		let used = self.tenant_storage_used(tenant);
		if used + additional > quota {
			return Err(Error::StorageQuotaExceeded);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quota_check_rejects_when_over_budget() {
		let cb = MemMetricCallbacks::new();
		cb.set_tenant_quota("t1", 1024 * 1024);
		cb.increment_tenant_storage("t1", 900 * 1024);
		assert!(cb.check_tenant_storage_quota("t1", 200 * 1024).is_err());
		assert!(cb.check_tenant_storage_quota("t1", 100 * 1024).is_ok());
	}

	#[test]
	fn paired_increment_decrement_leaves_count_unchanged() {
		let cb = MemMetricCallbacks::new();
		cb.increment_object_count(None, "t1/b1", 100);
		cb.decrement_object_count(None, "t1/b1", 100);
		cb.increment_object_count(None, "t1/b1", 150);
		let counters = cb.bucket_counters("t1/b1");
		assert_eq!(counters.object_count, 1);
		assert_eq!(counters.total_size, 150);
	}
}
