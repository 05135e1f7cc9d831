//! Lightweight per-version rows (spec.md §3 "ObjectVersion").

use serde::{Deserialize, Serialize};

/// "lightweight row keyed by (bucket, key, version-id). Holds version-id,
/// is-latest flag, size, etag, last-modified, storage-class. At most one
/// version per key has `is_latest = true`." (spec.md §3)
///
/// Per `SPEC_FULL.md` §4 (Open Question 4 resolution), delete markers are
/// tagged with an explicit `is_delete_marker` flag rather than inferred
/// solely from `size == 0 && etag == ""`, so a genuine zero-byte object is
/// never mistaken for a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
	pub version_id: String,
	pub is_latest: bool,
	pub size: u64,
	pub etag: String,
	pub last_modified_msec: u64,
	pub storage_class: String,
	pub is_delete_marker: bool,
}
