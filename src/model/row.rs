//! Persisted projections of the API-facing model (spec.md §2 item 4 "Metadata
//! Adapter"). These are the only types serialized into the KV store;
//! `maxiofs_model::store` encodes/decodes them as JSON bytes under the
//! ordered keys `codec` computes.
//!
//! Each row carries a `schema_version` byte so fields can be added with
//! defaults later without a flag day, mirroring the teacher's
//! `mod v05`/`v08`/`v09` migration chain in `object_table.rs` — simplified
//! here to a single current version, since this crate has no prior releases
//! to migrate from yet. The upgrade path is: add a new field with
//! `#[serde(default)]`, bump `CURRENT_OBJECT_SCHEMA_VERSION`, and branch in
//! `ObjectRow::decode` only if an old `schema_version` needs translating —
//! exactly the seam the teacher's `Migrate` trait formalizes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use maxiofs_util::error::{Error, Result};

use crate::multipart::{MultipartUpload, Part};
use crate::object::Object;
use crate::retention::{LegalHoldConfig, RetentionConfig};
use crate::tagging::TagSet;
use crate::version::ObjectVersion;

pub const CURRENT_OBJECT_SCHEMA_VERSION: u8 = 1;

/// Flat persisted form of [`Object`]. `Object::from(row)` /
/// `ObjectRow::from(&object)` are pure, lossless, no-I/O projections — the
/// adapter boundary spec.md §9 asks for, kept explicit so the two can
/// diverge later (e.g. the row gains a field the API doesn't expose yet)
/// without the call sites that only deal in `Object` noticing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRow {
	pub schema_version: u8,
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
	pub owner: Option<String>,
	pub is_delete_marker: bool,
}

impl From<&Object> for ObjectRow {
	fn from(o: &Object) -> ObjectRow {
		ObjectRow {
			schema_version: CURRENT_OBJECT_SCHEMA_VERSION,
			bucket_path: o.bucket_path.clone(),
			key: o.key.clone(),
			size: o.size,
			content_type: o.content_type.clone(),
			last_modified_msec: o.last_modified_msec,
			etag: o.etag.clone(),
			storage_class: o.storage_class.clone(),
			version_id: o.version_id.clone(),
			user_metadata: o.user_metadata.clone(),
			acl_handle: o.acl_handle.clone(),
			tags: o.tags.clone(),
			retention: o.retention,
			legal_hold: o.legal_hold,
			owner: o.owner.clone(),
			is_delete_marker: o.is_delete_marker,
		}
	}
}

impl From<ObjectRow> for Object {
	fn from(r: ObjectRow) -> Object {
		Object {
			bucket_path: r.bucket_path,
			key: r.key,
			size: r.size,
			content_type: r.content_type,
			last_modified_msec: r.last_modified_msec,
			etag: r.etag,
			storage_class: r.storage_class,
			version_id: r.version_id,
			user_metadata: r.user_metadata,
			acl_handle: r.acl_handle,
			tags: r.tags,
			retention: r.retention,
			legal_hold: r.legal_hold,
			owner: r.owner,
			is_delete_marker: r.is_delete_marker,
		}
	}
}

impl ObjectRow {
	pub fn encode(&self) -> Result<Vec<u8>> {
		serde_json::to_vec(self).map_err(|e| Error::Db(format!("failed to encode object row: {}", e)))
	}

	pub fn decode(bytes: &[u8]) -> Result<ObjectRow> {
		serde_json::from_slice(bytes).map_err(|e| Error::Db(format!("failed to decode object row: {}", e)))
	}
}

/// Persisted form of a single version under a versioned key.
///
/// spec.md §3 describes `ObjectVersion` as a "lightweight row" (version-id,
/// is-latest, size, etag, last-modified, storage-class only); but spec.md
/// §4.1 GET ("load that version's row") clearly expects a specific old
/// version to carry everything a full `Object` descriptor needs
/// (content-type, user-metadata, tags, retention, legal-hold). This
/// implementation resolves that by storing a full `ObjectRow` snapshot per
/// version (tagged with `is_latest`) and deriving the spec's lightweight
/// `ObjectVersion` summary from it on demand via [`ObjectVersionRow::summary`]
/// — see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectVersionRow {
	pub is_latest: bool,
	pub row: ObjectRow,
}

impl ObjectVersionRow {
	pub fn encode(&self) -> Result<Vec<u8>> {
		serde_json::to_vec(self).map_err(|e| Error::Db(format!("failed to encode version row: {}", e)))
	}

	pub fn decode(bytes: &[u8]) -> Result<ObjectVersionRow> {
		serde_json::from_slice(bytes).map_err(|e| Error::Db(format!("failed to decode version row: {}", e)))
	}

	/// Project down to the lightweight summary spec.md §3 documents, used
	/// for version-listing display.
	pub fn summary(&self) -> ObjectVersion {
		ObjectVersion {
			version_id: self.row.version_id.clone().unwrap_or_default(),
			is_latest: self.is_latest,
			size: self.row.size,
			etag: self.row.etag.clone(),
			last_modified_msec: self.row.last_modified_msec,
			storage_class: self.row.storage_class.clone(),
			is_delete_marker: self.row.is_delete_marker,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartUploadRow(pub MultipartUpload);

impl MultipartUploadRow {
	pub fn encode(&self) -> Result<Vec<u8>> {
		serde_json::to_vec(self).map_err(|e| Error::Db(format!("failed to encode multipart row: {}", e)))
	}

	pub fn decode(bytes: &[u8]) -> Result<MultipartUploadRow> {
		serde_json::from_slice(bytes).map_err(|e| Error::Db(format!("failed to decode multipart row: {}", e)))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRow(pub Part);

impl PartRow {
	pub fn encode(&self) -> Result<Vec<u8>> {
		serde_json::to_vec(self).map_err(|e| Error::Db(format!("failed to encode part row: {}", e)))
	}

	pub fn decode(bytes: &[u8]) -> Result<PartRow> {
		serde_json::from_slice(bytes).map_err(|e| Error::Db(format!("failed to decode part row: {}", e)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn object_row_roundtrips_through_object() {
		let obj = Object::new_delete_marker("t1/b1", "doc", "v1".into(), Some("t1".into()), 42);
		let row = ObjectRow::from(&obj);
		let back: Object = row.into();
		assert_eq!(back, obj);
	}

	#[test]
	fn object_row_encode_decode_roundtrips() {
		let obj = Object::new_implicit_folder("t1/b1", "a/", None, 7);
		let row = ObjectRow::from(&obj);
		let bytes = row.encode().unwrap();
		let decoded = ObjectRow::decode(&bytes).unwrap();
		assert_eq!(decoded, row);
	}
}
