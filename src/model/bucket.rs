//! Bucket metadata (spec.md §3 "Bucket metadata", §1 "Out of scope: the
//! bucket administrative surface"). This crate only *reads* bucket
//! configuration; creation/deletion/configuration mutation is an external
//! surface, represented here purely as data plus the `BucketDirectory`
//! lookup trait the Object Manager consumes it through.

use async_trait::async_trait;

use maxiofs_util::error::Result;

use crate::retention::ObjectLockDefaultRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersioningStatus {
	Disabled,
	Enabled,
	Suspended,
}

impl VersioningStatus {
	pub fn is_enabled(&self) -> bool {
		matches!(self, VersioningStatus::Enabled)
	}
}

/// spec.md §3: "encryption rules". A bucket opts into encryption by naming
/// a non-empty algorithm (spec.md §4.1 "Encryption decision").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRule {
	pub algorithm: String,
}

impl EncryptionRule {
	pub fn is_active(&self) -> bool {
		!self.algorithm.is_empty()
	}
}

#[derive(Debug, Clone)]
pub struct BucketMeta {
	pub bucket_path: String,
	pub tenant: Option<String>,
	pub versioning: VersioningStatus,
	pub encryption: Option<EncryptionRule>,
	pub object_lock_enabled: bool,
	pub default_retention: Option<ObjectLockDefaultRule>,
}

impl BucketMeta {
	pub fn versioning_enabled(&self) -> bool {
		self.versioning.is_enabled()
	}

	/// spec.md §4.1 "Encryption decision": "iff server config enables it AND
	/// bucket encryption rule exists with a non-empty algorithm."
	pub fn encryption_algorithm(&self) -> Option<&str> {
		self.encryption
			.as_ref()
			.filter(|r| r.is_active())
			.map(|r| r.algorithm.as_str())
	}
}

/// External interface (spec.md §1: "consumed through narrow interfaces
/// (§6)"). The bucket admin surface owns creation/configuration; this crate
/// only reads the result.
#[async_trait]
pub trait BucketDirectory: Send + Sync {
	async fn get_bucket(&self, tenant: Option<&str>, name: &str) -> Result<Option<BucketMeta>>;
}

/// In-memory `BucketDirectory`, for tests and single-process bring-up
/// where no external bucket admin surface is wired in.
pub mod mem {
	use std::collections::HashMap;
	use std::sync::RwLock;

	use super::*;

	#[derive(Default)]
	pub struct MemBucketDirectory {
		buckets: RwLock<HashMap<String, BucketMeta>>,
	}

	impl MemBucketDirectory {
		pub fn new() -> MemBucketDirectory {
			MemBucketDirectory::default()
		}

		pub fn insert(&self, meta: BucketMeta) {
			self.buckets
				.write()
				.unwrap()
				.insert(meta.bucket_path.clone(), meta);
		}
	}

	#[async_trait]
	impl BucketDirectory for MemBucketDirectory {
		async fn get_bucket(&self, tenant: Option<&str>, name: &str) -> Result<Option<BucketMeta>> {
			let bucket_path = match tenant {
				Some(t) => format!("{}/{}", t, name),
				None => name.to_string(),
			};
			Ok(self.buckets.read().unwrap().get(&bucket_path).cloned())
		}
	}
}
