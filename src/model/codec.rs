//! Path & Key Codec (spec.md §2 item 1): deterministic mappings between
//! (tenant, bucket, key, version-id) and blob-store paths / metadata-store
//! keys.
//!
//! Grounded in `garage_model::s3::object_table`'s partition/sort key split
//! (bucket as partition key, object key as sort key), adapted here to a flat
//! ordered byte string since `maxiofs_db::Tree` is a single ordered map
//! rather than a partitioned table.

use maxiofs_util::error::{Error, Result};

/// NUL cannot appear in a bucket path or object key we accept (see
/// [`validate_key`]), so it's a safe separator that preserves the
/// lexicographic ordering LIST depends on (spec.md §4.1 LIST: "fetch ...
/// rows ... in ascending key order").
const SEP: u8 = 0;

/// Canonical blob path for an unversioned object (spec.md §6).
pub fn canonical_blob_path(bucket_path: &str, key: &str) -> String {
	format!("{}/{}", bucket_path, key)
}

/// Blob path for a specific version under a versioned bucket (spec.md §6).
pub fn versioned_blob_path(bucket_path: &str, key: &str, version_id: &str) -> String {
	format!("{}/.versions/{}/{}", bucket_path, key, version_id)
}

/// Resolve the blob path an object/version currently lives at (spec.md
/// §4.1 PUT "Versioning decision" / §4.1 GET "Resolve version").
pub fn object_blob_path(bucket_path: &str, key: &str, version_id: Option<&str>) -> String {
	match version_id {
		Some(v) => versioned_blob_path(bucket_path, key, v),
		None => canonical_blob_path(bucket_path, key),
	}
}

/// Multipart part blob path, 5-digit zero-padded for lexical = numeric
/// ordering (spec.md §4.2 "Upload part").
pub fn multipart_part_path(upload_id: &str, part_number: u32) -> String {
	format!(".maxiofs/multipart/parts/{}/{:05}", upload_id, part_number)
}

/// Root under which all of an upload's part blobs live, for bulk cleanup on
/// abort/complete (spec.md §4.2 "Abort").
pub fn multipart_upload_root(upload_id: &str) -> String {
	format!(".maxiofs/multipart/parts/{}", upload_id)
}

/// Ordered-KV key for the latest-view `Object` row of (bucket, key).
/// Lexicographic order over this function matches ascending key order
/// within one bucket, which is what LIST/SEARCH rely on.
pub fn object_row_key(bucket_path: &str, key: &str) -> Vec<u8> {
	encode_parts(&[bucket_path.as_bytes(), key.as_bytes()])
}

/// Ordered-KV key for one `ObjectVersion` row.
pub fn version_row_key(bucket_path: &str, key: &str, version_id: &str) -> Vec<u8> {
	encode_parts(&[bucket_path.as_bytes(), key.as_bytes(), version_id.as_bytes()])
}

/// Lower/upper bound pair covering every version row of a single (bucket,
/// key), for `get_object_versions`/version cleanup scans.
pub fn version_row_prefix_bounds(bucket_path: &str, key: &str) -> (Vec<u8>, Vec<u8>) {
	let low = encode_parts(&[bucket_path.as_bytes(), key.as_bytes(), &[]]);
	let mut high = low.clone();
	high.push(0xFF);
	(low, high)
}

/// Lower/upper bound pair covering every object row of a bucket, used as the
/// fallback range when LIST is called with an empty prefix.
pub fn bucket_row_bounds(bucket_path: &str) -> (Vec<u8>, Vec<u8>) {
	let low = encode_parts(&[bucket_path.as_bytes(), &[]]);
	let mut high = low.clone();
	high.push(0xFF);
	(low, high)
}

/// Ordered-KV key for a `Part` row.
pub fn part_row_key(upload_id: &str, part_number: u32) -> Vec<u8> {
	format!("{}\0{:05}", upload_id, part_number).into_bytes()
}

pub fn part_row_prefix_bounds(upload_id: &str) -> (Vec<u8>, Vec<u8>) {
	let low = format!("{}\0", upload_id).into_bytes();
	let mut high = low.clone();
	high.push(0xFF);
	(low, high)
}

fn encode_parts(parts: &[&[u8]]) -> Vec<u8> {
	let mut out = Vec::new();
	for (i, p) in parts.iter().enumerate() {
		if i > 0 {
			out.push(SEP);
		}
		out.extend_from_slice(p);
	}
	out
}

/// Splits a `"<tenant>/<bucket>"` or global `"<bucket>"` bucket-path into
/// its tenant (if any) and bucket-name parts (spec.md §3: "`bucket-path` is
/// `"<tenant>/<bucket>"` or `"<bucket>"` for global"). Presence of a `/`
/// marks a tenant-scoped bucket; the bucket name itself never contains one.
pub fn split_bucket_path(bucket_path: &str) -> (Option<&str>, &str) {
	match bucket_path.split_once('/') {
		Some((tenant, bucket)) => (Some(tenant), bucket),
		None => (None, bucket_path),
	}
}

/// Recognizes internal bookkeeping names the Object Manager and Integrity
/// Verifier must both skip during enumeration (spec.md §4.1 LIST: "skip ...
/// internal names prefixed or segmented with `.maxiofs-`").
pub fn is_internal_name(key: &str) -> bool {
	key.split('/').any(|seg| seg.starts_with(".maxiofs-")) || key.starts_with(".maxiofs-")
}

/// Key validation (spec.md §4.1 PUT "Key validation").
pub fn validate_key(key: &str) -> Result<()> {
	if key.is_empty() {
		return Err(Error::InvalidKey("key must not be empty".into()));
	}
	if key.len() > 1024 {
		return Err(Error::InvalidKey(format!(
			"key is {} bytes, maximum is 1024",
			key.len()
		)));
	}
	if key.starts_with('/') {
		return Err(Error::InvalidKey("key must not start with '/'".into()));
	}
	if key.contains("../") || key.contains("/..") || key == ".." {
		return Err(Error::InvalidKey("key must not contain '..' path segments".into()));
	}
	Ok(())
}

/// Every non-trivial prefix of `key` that should have an implicit folder row
/// (spec.md §4.1 "Commit": "ensure implicit-folder rows for every
/// non-trivial prefix of the key"), e.g. `"a/b/c.txt"` yields `["a/", "a/b/"]`.
pub fn parent_prefixes(key: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut idx = 0;
	while let Some(pos) = key[idx..].find('/') {
		let end = idx + pos + 1;
		out.push(key[..end].to_string());
		idx = end;
	}
	// The key itself, if it already ends in '/', is not a "parent" of
	// itself; drop it so callers don't double-create the folder they were
	// asked to PUT explicitly.
	if out.last().map(|s| s.as_str()) == Some(key) {
		out.pop();
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blob_paths_match_spec_layout() {
		assert_eq!(canonical_blob_path("t1/b1", "hello.txt"), "t1/b1/hello.txt");
		assert_eq!(
			versioned_blob_path("t1/b1", "doc", "123.abcd1234"),
			"t1/b1/.versions/doc/123.abcd1234"
		);
		assert_eq!(
			multipart_part_path("deadbeef", 7),
			".maxiofs/multipart/parts/deadbeef/00007"
		);
	}

	#[test]
	fn object_row_key_orders_ascending_by_key() {
		let a = object_row_key("t1/b1", "a");
		let b = object_row_key("t1/b1", "b");
		assert!(a < b);
	}

	#[test]
	fn row_key_does_not_bleed_across_buckets() {
		// "b1/x" < "b10/" lexicographically if we naively concatenated
		// without a separator; the NUL separator prevents that.
		let a = object_row_key("t1/b1", "zzz");
		let (low, high) = bucket_row_bounds("t1/b10");
		assert!(!(a >= low && a < high));
	}

	#[test]
	fn validate_key_rejects_bad_keys() {
		assert!(validate_key("").is_err());
		assert!(validate_key("/abs").is_err());
		assert!(validate_key("a/../b").is_err());
		assert!(validate_key(&"a".repeat(1025)).is_err());
		assert!(validate_key(&"a".repeat(1024)).is_ok());
		assert!(validate_key("ok/key.txt").is_ok());
	}

	#[test]
	fn internal_names_are_recognized() {
		assert!(is_internal_name(".maxiofs-scratch"));
		assert!(is_internal_name("a/.maxiofs-tmp/b"));
		assert!(!is_internal_name("a/normal/b"));
	}

	#[test]
	fn parent_prefixes_enumerates_each_folder_level() {
		assert_eq!(parent_prefixes("a/b/c.txt"), vec!["a/", "a/b/"]);
		assert_eq!(parent_prefixes("top.txt"), Vec::<String>::new());
		assert_eq!(parent_prefixes("a/"), Vec::<String>::new());
		assert_eq!(parent_prefixes("a/b/"), vec!["a/"]);
	}
}
