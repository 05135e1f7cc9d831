//! The API-facing `Object` model (spec.md §3 "Object") and the Metadata
//! Adapter that projects it to/from the flat persisted `ObjectRow` (spec.md
//! §2 item 4, §9 restructuring note).
//!
//! Per spec.md §9: "Adapter objects between the API-level `Object` and the
//! KV-level `ObjectMetadata` should not be two full copies of the same
//! record; a single sum type with a persisted projection is cleaner." So
//! `ObjectRow` is the one canonical persisted representation, and `Object`
//! is a pure, lossless projection of it — `Object::from(row)` and
//! `ObjectRow::from(&object)` round-trip exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::retention::{LegalHoldConfig, RetentionConfig};
use crate::tagging::TagSet;

/// Marker left in user metadata on implicit-folder rows (spec.md §3
/// "Ownership & lifecycle": "a marker `x-maxiofs-implicit-folder=true`").
pub const IMPLICIT_FOLDER_MARKER: &str = "x-maxiofs-implicit-folder";

pub const IMPLICIT_FOLDER_CONTENT_TYPE: &str = "application/x-directory";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

/// The latest view of a key within a bucket (spec.md §3 "Object"). Doubles
/// as the "Object descriptor" spec.md §4.1 PUT/GET return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
	pub bucket_path: String,
	pub key: String,
	pub size: u64,
	pub content_type: String,
	pub last_modified_msec: u64,
	pub etag: String,
	pub storage_class: String,
	pub version_id: Option<String>,
	pub user_metadata: BTreeMap<String, String>,
	pub acl_handle: Option<String>,
	pub tags: TagSet,
	pub retention: Option<RetentionConfig>,
	pub legal_hold: LegalHoldConfig,
	/// Owning tenant, used for quota accounting (spec.md §4.1: "When the
	/// tenant is known"). Implied by the spec rather than spelled out as a
	/// field (`SPEC_FULL.md` §4 supplemental field).
	pub owner: Option<String>,
	/// Resolved by Open Question 4 (spec.md §9): an explicit flag rather
	/// than inferring the delete-marker state from `size == 0 && etag == ""`.
	pub is_delete_marker: bool,
}

impl Object {
	pub fn new_delete_marker(
		bucket_path: impl Into<String>,
		key: impl Into<String>,
		version_id: String,
		owner: Option<String>,
		now_msec: u64,
	) -> Object {
		Object {
			bucket_path: bucket_path.into(),
			key: key.into(),
			size: 0,
			content_type: String::new(),
			last_modified_msec: now_msec,
			etag: String::new(),
			storage_class: DEFAULT_STORAGE_CLASS.to_string(),
			version_id: Some(version_id),
			user_metadata: BTreeMap::new(),
			acl_handle: None,
			tags: TagSet::new(),
			retention: None,
			legal_hold: LegalHoldConfig::off(),
			owner,
			is_delete_marker: true,
		}
	}

	pub fn new_implicit_folder(
		bucket_path: impl Into<String>,
		key: impl Into<String>,
		owner: Option<String>,
		now_msec: u64,
	) -> Object {
		let mut user_metadata = BTreeMap::new();
		user_metadata.insert(IMPLICIT_FOLDER_MARKER.to_string(), "true".to_string());
		Object {
			bucket_path: bucket_path.into(),
			key: key.into(),
			size: 0,
			content_type: IMPLICIT_FOLDER_CONTENT_TYPE.to_string(),
			last_modified_msec: now_msec,
			etag: String::new(),
			storage_class: DEFAULT_STORAGE_CLASS.to_string(),
			version_id: None,
			user_metadata,
			acl_handle: None,
			tags: TagSet::new(),
			retention: None,
			legal_hold: LegalHoldConfig::off(),
			owner,
			is_delete_marker: false,
		}
	}

	/// spec.md §3 "Ownership & lifecycle": "An implicit folder is an Object
	/// with key ending in `/`, size 0, MIME `application/x-directory`, and a
	/// marker `x-maxiofs-implicit-folder=true` in user metadata."
	pub fn is_implicit_folder(&self) -> bool {
		self.key.ends_with('/')
			&& self.size == 0
			&& self
				.user_metadata
				.get(IMPLICIT_FOLDER_MARKER)
				.map(|v| v == "true")
				.unwrap_or(false)
	}

	/// Active retention, if any, as of `now_msec` (spec.md §4.3: "A
	/// non-existent retention is treated as inactive").
	pub fn active_retention(&self, now_msec: u64) -> Option<&RetentionConfig> {
		self.retention.as_ref().filter(|r| r.is_active(now_msec))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn delete_marker_has_zero_size_and_empty_etag() {
		let dm = Object::new_delete_marker("t1/b1", "doc", "v1".into(), None, 0);
		assert_eq!(dm.size, 0);
		assert_eq!(dm.etag, "");
		assert!(dm.is_delete_marker);
	}

	#[test]
	fn implicit_folder_is_recognized() {
		let f = Object::new_implicit_folder("t1/b1", "a/", None, 0);
		assert!(f.is_implicit_folder());
		assert_eq!(f.content_type, IMPLICIT_FOLDER_CONTENT_TYPE);
	}
}
