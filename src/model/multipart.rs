//! Multipart upload state (spec.md §3 "MultipartUpload"/"Part", §4.2).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use maxiofs_util::error::{Error, Result};

pub const MIN_PART_NUMBER: u32 = 1;
pub const MAX_PART_NUMBER: u32 = 10_000;

pub fn validate_part_number(part_number: u32) -> Result<()> {
	if !(MIN_PART_NUMBER..=MAX_PART_NUMBER).contains(&part_number) {
		return Err(Error::InvalidPartNumber(part_number));
	}
	Ok(())
}

/// spec.md §3: "(upload-id, bucket-path, key, initiated, storage-class,
/// user-metadata). Parts are NOT stored inline."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartUpload {
	pub upload_id: String,
	pub bucket_path: String,
	pub key: String,
	pub initiated_msec: u64,
	pub storage_class: String,
	pub content_type: String,
	pub user_metadata: BTreeMap<String, String>,
}

/// spec.md §3: "(upload-id, part-number ∈ [1,10000], size, etag,
/// last-modified). Stored as separate rows for ordered enumeration."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
	pub upload_id: String,
	pub part_number: u32,
	pub size: u64,
	pub etag: String,
	pub last_modified_msec: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn part_number_boundaries() {
		assert!(validate_part_number(1).is_ok());
		assert!(validate_part_number(10_000).is_ok());
		assert!(validate_part_number(0).is_err());
		assert!(validate_part_number(10_001).is_err());
	}
}
