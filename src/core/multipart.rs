//! Multipart Coordinator (spec.md §2 item 7, §4.2): upload session state
//! machine, part concatenation, and the composite-ETag computation, split
//! out from [`crate::object_manager`] the way the teacher spreads a large
//! manager's operations across sibling files rather than growing one file
//! without bound.
//!
//! This implementation resolves Open Question 1 (spec.md §9) by following
//! the spec's *observed behavior*: the composite ETag is `MD5(plaintext)`,
//! not AWS S3's canonical `MD5(concat(part MD5s))-<n>`. This is a
//! deliberate, documented deviation from S3 wire compatibility — see
//! DESIGN.md — not an oversight; a real S3 client that parses the `-n`
//! suffix to skip integrity re-verification will treat this ETag as a
//! single-part object's, which is the accepted trade-off spec.md itself
//! calls out.

use maxiofs_block::BoxAsyncRead;
use maxiofs_model::codec;
use maxiofs_model::multipart::{validate_part_number, MultipartUpload, Part};
use maxiofs_model::object::{Object, DEFAULT_STORAGE_CLASS};
use maxiofs_model::retention::{LegalHoldConfig, RetentionConfig};
use maxiofs_model::row::{ObjectRow, ObjectVersionRow, PartRow};
use maxiofs_model::tagging::TagSet;
use maxiofs_util::async_hash::IncrementalMd5;
use maxiofs_util::error::{Error, Result};
use maxiofs_util::time::{add_years_days, datetime_to_msec, msec_to_datetime, now_msec};

use crate::header::HeaderBag;
use crate::object_manager::ObjectManager;

/// Page of in-progress uploads, mirroring [`crate::object_manager::ListOutcome`]'s
/// truncated/next-marker shape (spec.md §5.7 "ListMultipartUploads").
#[derive(Debug, Clone, Default)]
pub struct MultipartUploadPage {
	pub uploads: Vec<MultipartUpload>,
	pub truncated: bool,
	pub next_marker: Option<String>,
}

impl ObjectManager {
	/// spec.md §4.2 "Initiate".
	pub async fn initiate_multipart_upload(&self, bucket_path: &str, key: &str, headers: &HeaderBag) -> Result<MultipartUpload> {
		codec::validate_key(key)?;
		self.resolve_bucket(bucket_path).await?;
		let (content_type, user_metadata) = headers.extract();

		let mpu = MultipartUpload {
			upload_id: maxiofs_model::gen_upload_id(),
			bucket_path: bucket_path.to_string(),
			key: key.to_string(),
			initiated_msec: now_msec(),
			storage_class: DEFAULT_STORAGE_CLASS.to_string(),
			content_type,
			user_metadata,
		};
		self.metadata.create_multipart_upload(&mpu).await?;
		info!(bucket = bucket_path, key, upload_id = %mpu.upload_id, "initiate multipart upload");
		Ok(mpu)
	}

	/// spec.md §4.2 "Upload part".
	pub async fn upload_part(&self, upload_id: &str, part_number: u32, body: BoxAsyncRead) -> Result<Part> {
		validate_part_number(part_number)?;
		let mpu = self.metadata.get_multipart_upload(upload_id).await?.ok_or(Error::NoSuchUpload)?;

		let scratch_path = self.scratch_path();
		let spooled = self.spool_to_scratch(body, &scratch_path).await;
		let (size, etag) = match spooled {
			Ok(v) => v,
			Err(e) => {
				let _ = tokio::fs::remove_file(&scratch_path).await;
				return Err(e);
			}
		};

		let blob_path = codec::multipart_part_path(upload_id, part_number);
		let reader = self.open_scratch(&scratch_path).await;
		let write_result = match reader {
			Ok(reader) => {
				self.blobs
					.put(&blob_path, reader, maxiofs_block::BlobMeta::new().with("size", size.to_string()).with("etag", etag.clone()))
					.await
					.map(|_| ())
					.map_err(Error::from)
			}
			Err(e) => Err(e),
		};
		let _ = tokio::fs::remove_file(&scratch_path).await;
		write_result?;

		let part = Part {
			upload_id: upload_id.to_string(),
			part_number,
			size,
			etag,
			last_modified_msec: now_msec(),
		};
		self.metadata.put_part(&PartRow(part.clone())).await?;
		debug!(upload_id = %mpu.upload_id, part_number, size, "upload part");
		Ok(part)
	}

	/// spec.md §4.2 "List parts".
	pub async fn list_parts(&self, upload_id: &str) -> Result<Vec<Part>> {
		if self.metadata.get_multipart_upload(upload_id).await?.is_none() {
			return Err(Error::NoSuchUpload);
		}
		Ok(self.metadata.list_parts(upload_id).await?.into_iter().map(|p| p.0).collect())
	}

	/// spec.md §4.2 "Complete": concatenates the referenced parts in
	/// ascending part-number order into the target object, computing the
	/// composite ETag over the combined plaintext in the same pass.
	pub async fn complete_multipart_upload(&self, upload_id: &str, requested_parts: &[(u32, String)]) -> Result<Object> {
		let mpu = self.metadata.get_multipart_upload(upload_id).await?.ok_or(Error::NoSuchUpload)?;
		if requested_parts.is_empty() {
			return Err(Error::message("multipart complete requires at least one part"));
		}
		let (tenant, bucket) = self.resolve_bucket(&mpu.bucket_path).await?;

		// "Part numbers are NOT required to be contiguous; they ARE sorted
		// before concatenation." (spec.md §4.2)
		let mut ordered = requested_parts.to_vec();
		ordered.sort_by_key(|(n, _)| *n);

		let mut blob_paths = Vec::with_capacity(ordered.len());
		let mut total_size: u64 = 0;
		for (part_number, expected_etag) in &ordered {
			let part = self.metadata.get_part(upload_id, *part_number).await?.ok_or(Error::NoSuchPart)?;
			if &part.0.etag != expected_etag {
				return Err(Error::message(format!("part {} etag does not match the uploaded part", part_number)));
			}
			let blob_path = codec::multipart_part_path(upload_id, *part_number);
			if !self.blobs.exists(&blob_path).await.map_err(Error::from)? {
				return Err(Error::NoSuchPart);
			}
			total_size += part.0.size;
			blob_paths.push(blob_path);
		}

		let existing = self.metadata.get_object(&mpu.bucket_path, &mpu.key).await?;
		// "Before combining, consult quota ... fail fast if exceeded." (spec.md §4.2)
		if !bucket.versioning_enabled() {
			if let Some(t) = &tenant {
				let old_size = existing.as_ref().map(|o| o.size).unwrap_or(0);
				let delta = total_size as i64 - old_size as i64;
				if delta > 0 {
					self.metric_cb.check_tenant_storage_quota(t, delta)?;
				}
			}
		}

		let scratch_path = self.scratch_path();
		let concatenated = self.concatenate_parts(&blob_paths, &scratch_path).await;
		let (plaintext_size, composite_etag) = match concatenated {
			Ok(v) => v,
			Err(e) => {
				let _ = tokio::fs::remove_file(&scratch_path).await;
				return Err(e);
			}
		};
		debug_assert_eq!(plaintext_size, total_size);

		let versioning = bucket.versioning_enabled();
		let version_id = if versioning { Some(maxiofs_model::gen_version_id()) } else { None };
		let blob_path = codec::object_blob_path(&mpu.bucket_path, &mpu.key, version_id.as_deref());

		let write_result = self
			.write_object_blob(
				&bucket,
				&blob_path,
				&mpu.content_type,
				&mpu.user_metadata,
				&scratch_path,
				plaintext_size,
				&composite_etag,
				maxiofs_util::cancel::CancellationToken::never(),
			)
			.await;
		let _ = tokio::fs::remove_file(&scratch_path).await;
		write_result?;

		let now = now_msec();
		let retention = bucket.default_retention.map(|rule| {
			let until = add_years_days(msec_to_datetime(now), rule.years, rule.days);
			RetentionConfig::new(rule.mode, datetime_to_msec(until))
		});

		let object = Object {
			bucket_path: mpu.bucket_path.clone(),
			key: mpu.key.clone(),
			size: plaintext_size,
			content_type: mpu.content_type.clone(),
			last_modified_msec: now,
			etag: composite_etag,
			storage_class: mpu.storage_class.clone(),
			version_id: version_id.clone(),
			user_metadata: mpu.user_metadata.clone(),
			acl_handle: None,
			tags: TagSet::new(),
			retention,
			legal_hold: LegalHoldConfig::off(),
			owner: tenant.clone(),
			is_delete_marker: false,
		};
		let row = ObjectRow::from(&object);
		self.metadata.put_object(&row).await?;
		if version_id.is_some() {
			for mut v in self.metadata.get_object_versions(&mpu.bucket_path, &mpu.key).await? {
				if v.is_latest {
					v.is_latest = false;
					self.metadata.put_object_version(&mpu.bucket_path, &mpu.key, &v).await?;
				}
			}
			self.metadata
				.put_object_version(&mpu.bucket_path, &mpu.key, &ObjectVersionRow { is_latest: true, row: row.clone() })
				.await?;
		}

		self.ensure_implicit_folders(&mpu.bucket_path, &mpu.key, tenant.as_deref(), now).await?;
		self.apply_put_metrics(tenant.as_deref(), &mpu.bucket_path, existing.as_ref(), plaintext_size, versioning);

		for blob_path in &blob_paths {
			if let Err(e) = self.blobs.delete(blob_path).await {
				warn!("complete: failed to delete part blob {}: {}", blob_path, e);
			}
		}
		self.metadata.abort_multipart_upload(upload_id).await?;

		info!(bucket = %mpu.bucket_path, key = %mpu.key, upload_id, size = plaintext_size, "complete multipart upload");
		Ok(object)
	}

	/// Streams each part blob's bytes in order into `scratch_path`, hashing
	/// the whole combined plaintext as it's written (spec.md §4.2: "re-hash
	/// the combined stream to compute the composite ETag").
	async fn concatenate_parts(&self, blob_paths: &[String], scratch_path: &std::path::Path) -> Result<(u64, String)> {
		use tokio::io::{AsyncReadExt, AsyncWriteExt};

		if let Some(parent) = scratch_path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let mut file = tokio::fs::File::create(scratch_path).await?;
		let mut hasher = IncrementalMd5::new();
		let mut buf = vec![0u8; 256 * 1024];
		for blob_path in blob_paths {
			let (mut reader, _meta) = self.blobs.get(blob_path).await.map_err(Error::from)?;
			loop {
				let n = reader.read(&mut buf).await?;
				if n == 0 {
					break;
				}
				hasher.update(&buf[..n]);
				file.write_all(&buf[..n]).await?;
			}
		}
		file.sync_all().await?;
		Ok(hasher.finalize())
	}

	/// spec.md §4.2 "Abort": idempotent, removes part blobs then part/upload
	/// rows.
	pub async fn abort_multipart_upload(&self, upload_id: &str) -> Result<()> {
		if self.metadata.get_multipart_upload(upload_id).await?.is_none() {
			return Ok(());
		}
		let parts = self.metadata.list_parts(upload_id).await?;
		for part in &parts {
			let blob_path = codec::multipart_part_path(upload_id, part.0.part_number);
			if let Err(e) = self.blobs.delete(&blob_path).await {
				warn!("abort: failed to delete part blob {}: {}", blob_path, e);
			}
		}
		self.metadata.abort_multipart_upload(upload_id).await?;
		info!(upload_id, "abort multipart upload");
		Ok(())
	}

	/// spec.md §5.7 (supplemental): enumerate in-progress uploads for a
	/// bucket, paginated like LIST.
	pub async fn list_multipart_uploads(&self, bucket_path: &str, marker: Option<&str>, max_keys: usize) -> Result<MultipartUploadPage> {
		let max_keys = if max_keys == 0 { self.config.limits.default_list_page_size as usize } else { max_keys };
		let (uploads, next_marker) = self.metadata.list_multipart_uploads(bucket_path, marker, max_keys).await?;
		Ok(MultipartUploadPage {
			truncated: next_marker.is_some(),
			uploads,
			next_marker,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::object_manager::test_support::*;
	use maxiofs_util::async_hash::md5_hex;

	fn scratch_dir() -> std::path::PathBuf {
		std::env::temp_dir().join(format!("maxiofs-mpu-test-{}", hex::encode(rand::random::<[u8; 8]>())))
	}

	fn part_body(byte: u8, len: usize) -> BoxAsyncRead {
		Box::pin(std::io::Cursor::new(vec![byte; len]))
	}

	#[tokio::test]
	async fn complete_concatenates_parts_in_order_and_sums_sizes() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mpu = mgr.initiate_multipart_upload("t1/b1", "big.bin", &HeaderBag::new()).await.unwrap();

		let p2 = mgr.upload_part(&mpu.upload_id, 2, part_body(b'B', 5 * 1024 * 1024)).await.unwrap();
		let p1 = mgr.upload_part(&mpu.upload_id, 1, part_body(b'A', 5 * 1024 * 1024)).await.unwrap();
		let p3 = mgr.upload_part(&mpu.upload_id, 3, part_body(b'C', 1024)).await.unwrap();

		let listed = mgr.list_parts(&mpu.upload_id).await.unwrap();
		assert_eq!(listed.iter().map(|p| p.part_number).collect::<Vec<_>>(), vec![1, 2, 3]);

		let obj = mgr
			.complete_multipart_upload(&mpu.upload_id, &[(2, p2.etag.clone()), (1, p1.etag.clone()), (3, p3.etag.clone())])
			.await
			.unwrap();
		assert_eq!(obj.size, 5 * 1024 * 1024 + 5 * 1024 * 1024 + 1024);

		let (_desc, mut reader) = mgr.get("t1/b1", "big.bin", None, maxiofs_util::cancel::CancellationToken::never()).await.unwrap();
		let mut out = Vec::new();
		tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out).await.unwrap();
		let mut expected = vec![b'A'; 5 * 1024 * 1024];
		expected.extend(vec![b'B'; 5 * 1024 * 1024]);
		expected.extend(vec![b'C'; 1024]);
		assert_eq!(out, expected);
		assert_eq!(obj.etag, md5_hex(&expected));

		assert!(mgr.list_parts(&mpu.upload_id).await.is_err());
	}

	#[tokio::test]
	async fn part_number_out_of_range_is_rejected() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mpu = mgr.initiate_multipart_upload("t1/b1", "k", &HeaderBag::new()).await.unwrap();
		assert!(mgr.upload_part(&mpu.upload_id, 0, part_body(b'x', 1)).await.is_err());
		assert!(mgr.upload_part(&mpu.upload_id, 10_001, part_body(b'x', 1)).await.is_err());
	}

	#[tokio::test]
	async fn abort_is_idempotent_and_removes_part_blobs() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mpu = mgr.initiate_multipart_upload("t1/b1", "k", &HeaderBag::new()).await.unwrap();
		mgr.upload_part(&mpu.upload_id, 1, part_body(b'x', 16)).await.unwrap();

		mgr.abort_multipart_upload(&mpu.upload_id).await.unwrap();
		assert!(mgr.list_parts(&mpu.upload_id).await.is_err());
		// Idempotent: aborting again is not an error.
		mgr.abort_multipart_upload(&mpu.upload_id).await.unwrap();
	}

	#[tokio::test]
	async fn complete_rejects_mismatched_etag() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let mpu = mgr.initiate_multipart_upload("t1/b1", "k", &HeaderBag::new()).await.unwrap();
		mgr.upload_part(&mpu.upload_id, 1, part_body(b'x', 16)).await.unwrap();
		assert!(mgr.complete_multipart_upload(&mpu.upload_id, &[(1, "deadbeef".to_string())]).await.is_err());
	}
}
