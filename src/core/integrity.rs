//! Integrity Verifier (spec.md §2 item 10, §4.5): re-hashes stored object
//! bytes and compares against the persisted ETag, the way
//! `garage_block::manager`'s background resync scrubs blocks against their
//! content hash — except here the "content hash" is the object's own
//! plaintext ETag rather than a block's address, since spec.md's objects
//! aren't content-addressed.

use std::sync::Arc;
use std::time::Instant;

use maxiofs_util::async_hash::hash_to_end;
use maxiofs_util::cancel::CancellationToken;
use maxiofs_util::error::{Error, Result};

use crate::object_manager::ObjectManager;

/// Per-key verification outcome (spec.md §4.5 "verify(bucket, key):
/// re-fetch, re-hash, compare").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityStatus {
	Ok,
	/// The re-computed hash and/or size does not match the persisted values.
	Corrupted {
		expected_etag: String,
		actual_etag: String,
		expected_size: u64,
		actual_size: u64,
	},
	/// The object row exists but its blob is gone.
	Missing,
	/// Some other error prevented verification (I/O failure, decrypt failure).
	Error(String),
}

#[derive(Debug, Clone)]
pub struct IntegrityReport {
	pub bucket_path: String,
	pub key: String,
	pub version_id: Option<String>,
	pub status: IntegrityStatus,
}

/// spec.md §4.5 "verify_bucket(bucket): paginate, like LIST, over every
/// current object and verify each."
#[derive(Debug, Clone)]
pub struct BucketIntegrityReport {
	pub bucket_path: String,
	pub entries: Vec<IntegrityReport>,
	pub ok_count: usize,
	pub corrupted_count: usize,
	pub missing_count: usize,
	pub error_count: usize,
	pub truncated: bool,
	pub next_marker: Option<String>,
	pub duration_msec: u64,
}

pub struct IntegrityVerifier {
	objects: Arc<ObjectManager>,
}

impl IntegrityVerifier {
	pub fn new(objects: Arc<ObjectManager>) -> IntegrityVerifier {
		IntegrityVerifier { objects }
	}

	/// spec.md §4.5 "verify(bucket, key, version?): GET the object, re-hash
	/// the plaintext, compare against the persisted ETag." Goes through
	/// [`ObjectManager::get`] rather than the blob store directly so
	/// encrypted objects are verified against their *plaintext* ETag, the
	/// same value callers see from PUT/GET/HEAD.
	pub async fn verify(&self, bucket_path: &str, key: &str, version_id: Option<&str>) -> Result<IntegrityReport> {
		let (object, reader) = match self.objects.get(bucket_path, key, version_id, CancellationToken::never()).await {
			Ok(v) => v,
			Err(Error::NoSuchObject) | Err(Error::NoSuchVersion) => {
				return Ok(IntegrityReport {
					bucket_path: bucket_path.to_string(),
					key: key.to_string(),
					version_id: version_id.map(str::to_string),
					status: IntegrityStatus::Missing,
				})
			}
			Err(e) => {
				return Ok(IntegrityReport {
					bucket_path: bucket_path.to_string(),
					key: key.to_string(),
					version_id: version_id.map(str::to_string),
					status: IntegrityStatus::Error(e.to_string()),
				})
			}
		};

		let status = match hash_to_end(reader).await {
			// spec.md §4.5: "compare against stored ETag and size" — a size
			// mismatch is corruption even if the truncated/extended hash
			// happens to still match.
			Ok((actual_size, actual_etag)) if actual_etag == object.etag && actual_size == object.size => IntegrityStatus::Ok,
			Ok((actual_size, actual_etag)) => IntegrityStatus::Corrupted {
				expected_etag: object.etag.clone(),
				actual_etag,
				expected_size: object.size,
				actual_size,
			},
			Err(e) => IntegrityStatus::Error(e.to_string()),
		};
		self.record_metric(&status);

		Ok(IntegrityReport {
			bucket_path: bucket_path.to_string(),
			key: key.to_string(),
			version_id: object.version_id,
			status,
		})
	}

	fn record_metric(&self, status: &IntegrityStatus) {
		if matches!(status, IntegrityStatus::Corrupted { .. }) {
			self.objects.metrics.integrity_corrupted.add(1, &[]);
		}
	}

	/// spec.md §4.5 "verify_bucket(bucket, marker, max_keys): one LIST page's
	/// worth of objects, each verified in turn; truncation/next_marker mirror
	/// LIST's own pagination contract."
	pub async fn verify_bucket(&self, bucket_path: &str, marker: Option<&str>, max_keys: usize) -> Result<BucketIntegrityReport> {
		let started = Instant::now();
		let page = self.objects.list(bucket_path, "", None, marker, max_keys).await?;

		let mut entries = Vec::with_capacity(page.objects.len());
		let (mut ok, mut corrupted, mut missing, mut errored) = (0usize, 0usize, 0usize, 0usize);
		for obj in &page.objects {
			let report = self.verify(bucket_path, &obj.key, obj.version_id.as_deref()).await?;
			match &report.status {
				IntegrityStatus::Ok => ok += 1,
				IntegrityStatus::Corrupted { .. } => corrupted += 1,
				IntegrityStatus::Missing => missing += 1,
				IntegrityStatus::Error(_) => errored += 1,
			}
			entries.push(report);
		}

		if corrupted > 0 || missing > 0 {
			warn!(
				bucket = bucket_path,
				corrupted, missing, "verify_bucket: integrity problems found"
			);
		}

		Ok(BucketIntegrityReport {
			bucket_path: bucket_path.to_string(),
			entries,
			ok_count: ok,
			corrupted_count: corrupted,
			missing_count: missing,
			error_count: errored,
			truncated: page.truncated,
			next_marker: page.next_marker,
			duration_msec: started.elapsed().as_millis() as u64,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::header::HeaderBag;
	use crate::object_manager::test_support::*;

	fn scratch_dir() -> std::path::PathBuf {
		std::env::temp_dir().join(format!("maxiofs-integrity-test-{}", hex::encode(rand::random::<[u8; 8]>())))
	}

	#[tokio::test]
	async fn verify_reports_ok_for_an_intact_object() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mgr = Arc::new(mgr);
		mgr.put("t1/b1", "k", body(b"hello"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();

		let verifier = IntegrityVerifier::new(mgr);
		let report = verifier.verify("t1/b1", "k", None).await.unwrap();
		assert_eq!(report.status, IntegrityStatus::Ok);
	}

	#[tokio::test]
	async fn verify_reports_missing_for_a_nonexistent_key() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mgr = Arc::new(mgr);
		let verifier = IntegrityVerifier::new(mgr);
		let report = verifier.verify("t1/b1", "nope", None).await.unwrap();
		assert_eq!(report.status, IntegrityStatus::Missing);
	}

	#[tokio::test]
	async fn verify_reports_corrupted_when_the_blob_no_longer_matches_the_stored_etag() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mgr = Arc::new(mgr);
		mgr.put("t1/b1", "k", body(b"hello"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();

		// Rewrite the blob directly underneath the metadata row, simulating
		// bit rot that leaves the persisted ETag untouched.
		mgr.blobs
			.put(
				"t1/b1/k",
				Box::pin(std::io::Cursor::new(b"tampered".to_vec())),
				maxiofs_block::BlobMeta::new().with("size", "8").with("etag", "deadbeefdeadbeefdeadbeefdeadbeef"),
			)
			.await
			.unwrap();

		let verifier = IntegrityVerifier::new(mgr);
		let report = verifier.verify("t1/b1", "k", None).await.unwrap();
		match report.status {
			IntegrityStatus::Corrupted {
				expected_size,
				actual_size,
				..
			} => {
				assert_eq!(expected_size, 5);
				assert_eq!(actual_size, 8);
			}
			other => panic!("expected Corrupted, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn verify_reports_corrupted_on_size_mismatch_even_if_the_hash_matches() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mgr = Arc::new(mgr);
		mgr.put("t1/b1", "k", body(b"hello"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();

		// Truncate the blob to a prefix whose MD5 still happens to be
		// recomputed correctly for the bytes present, but whose length no
		// longer matches the persisted object size.
		mgr.blobs
			.put(
				"t1/b1/k",
				Box::pin(std::io::Cursor::new(b"hell".to_vec())),
				maxiofs_block::BlobMeta::new().with("size", "4").with("etag", "deadbeefdeadbeefdeadbeefdeadbeef"),
			)
			.await
			.unwrap();

		let verifier = IntegrityVerifier::new(mgr);
		let report = verifier.verify("t1/b1", "k", None).await.unwrap();
		assert!(matches!(report.status, IntegrityStatus::Corrupted { .. }));
	}

	#[tokio::test]
	async fn verify_bucket_paginates_like_list() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mgr = Arc::new(mgr);
		for key in ["a", "b", "c"] {
			mgr.put("t1/b1", key, body(b"x"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();
		}
		let verifier = IntegrityVerifier::new(mgr);
		let report = verifier.verify_bucket("t1/b1", None, 2).await.unwrap();
		assert_eq!(report.entries.len(), 2);
		assert!(report.truncated);
		assert_eq!(report.ok_count, 2);
	}
}
