//! Object Manager (spec.md §2 item 6, §4.1): PUT/GET/DELETE/LIST/SEARCH plus
//! the supplemental HEAD/tagging/legal-hold/retention-admin operations.
//! Everything multipart lives in [`crate::multipart`], as an `impl
//! ObjectManager` block in a separate file, the way the teacher splits a
//! large manager's operations across sibling modules rather than one file.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use maxiofs_block::{BlobMeta, BlobStore, BoxAsyncRead, Error as BlobError};
use maxiofs_crypt::{EncryptionHeader, EncryptionService};
use maxiofs_model::bucket::{BucketDirectory, BucketMeta};
use maxiofs_model::codec;
use maxiofs_model::object::{Object, DEFAULT_STORAGE_CLASS};
use maxiofs_model::retention::{LegalHoldConfig, RetentionConfig};
use maxiofs_model::row::{ObjectRow, ObjectVersionRow};
use maxiofs_model::search::SearchQuery;
use maxiofs_model::store::MetadataStore;
use maxiofs_model::tagging::TagSet;
use maxiofs_model::version::ObjectVersion;
use maxiofs_util::async_hash::Md5Reader;
use maxiofs_util::cancel::CancellationToken;
use maxiofs_util::config::Config;
use maxiofs_util::error::{Error, Result};
use maxiofs_util::time::{add_years_days, datetime_to_msec, msec_to_datetime, now_msec};

use crate::header::HeaderBag;
use crate::lock::LockEvaluator;
use crate::metric_callbacks::MetricCallbacks;
use crate::metrics::ObjectManagerMetrics;

/// Common prefixes collected by a delimited LIST/SEARCH (spec.md §4.1).
pub type CommonPrefixes = Vec<String>;

#[derive(Debug, Clone, Default)]
pub struct ListOutcome {
	pub objects: Vec<Object>,
	pub common_prefixes: CommonPrefixes,
	pub truncated: bool,
	pub next_marker: Option<String>,
}

/// What a DELETE actually did: a bucket without versioning permanently
/// removes the object; a versioned bucket's bare-key delete instead lays
/// down a new latest delete-marker version (spec.md §4.1 DELETE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
	Permanent,
	DeleteMarkerCreated { version_id: String },
}

/// The object lifecycle surface (spec.md §2 item 6). Holds only `Arc`s to
/// its collaborators, matching `garage_block::manager::BlockManager`'s
/// shape: a manager is a thin coordinator over injected stores plus its own
/// metrics, never the stores themselves.
pub struct ObjectManager {
	pub(crate) metadata: Arc<dyn MetadataStore>,
	pub(crate) blobs: Arc<dyn BlobStore>,
	pub(crate) buckets: Arc<dyn BucketDirectory>,
	pub(crate) metric_cb: Arc<dyn MetricCallbacks>,
	pub(crate) encryption: Option<Arc<EncryptionService>>,
	pub(crate) config: Arc<Config>,
	pub(crate) metrics: ObjectManagerMetrics,
}

impl ObjectManager {
	pub fn new(
		metadata: Arc<dyn MetadataStore>,
		blobs: Arc<dyn BlobStore>,
		buckets: Arc<dyn BucketDirectory>,
		metric_cb: Arc<dyn MetricCallbacks>,
		encryption: Option<Arc<EncryptionService>>,
		config: Arc<Config>,
	) -> ObjectManager {
		ObjectManager {
			metadata,
			blobs,
			buckets,
			metric_cb,
			encryption,
			config,
			metrics: ObjectManagerMetrics::new(),
		}
	}

	pub(crate) async fn resolve_bucket(&self, bucket_path: &str) -> Result<(Option<String>, BucketMeta)> {
		let (tenant, bucket_name) = codec::split_bucket_path(bucket_path);
		let tenant = tenant.map(str::to_string);
		let bucket = self
			.buckets
			.get_bucket(tenant.as_deref(), bucket_name)
			.await?
			.ok_or(Error::NoSuchBucket)?;
		Ok((tenant, bucket))
	}

	pub(crate) fn should_encrypt(&self, bucket: &BucketMeta) -> bool {
		self.config.encryption.enabled && bucket.encryption_algorithm().is_some() && self.encryption.is_some()
	}

	pub(crate) fn scratch_path(&self) -> PathBuf {
		let name = format!(".maxiofs-scratch-{}", hex::encode(rand::random::<[u8; 8]>()));
		self.config.scratch_dir.join(name)
	}

	/// Spools `body` to `path` while hashing it in the same pass, so the
	/// plaintext ETag and size are both known without buffering the object
	/// in memory (spec.md §4.1 "Spool & hash").
	pub(crate) async fn spool_to_scratch(&self, body: BoxAsyncRead, path: &std::path::Path) -> Result<(u64, String)> {
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let mut hashed = Md5Reader::new(body);
		let mut file = tokio::fs::File::create(path).await?;
		tokio::io::copy(&mut hashed, &mut file).await?;
		file.sync_all().await?;
		let (etag, size) = hashed.finalize();
		Ok((size, etag))
	}

	pub(crate) async fn open_scratch(&self, path: &std::path::Path) -> Result<BoxAsyncRead> {
		let file = tokio::fs::File::open(path).await?;
		Ok(Box::pin(file))
	}

	/// Writes the scratch file to `blob_path`, encrypting in-flight when the
	/// bucket calls for it (spec.md §4.1 "Encryption decision").
	pub(crate) async fn write_object_blob(
		&self,
		bucket: &BucketMeta,
		blob_path: &str,
		content_type: &str,
		user_metadata: &BTreeMap<String, String>,
		scratch_path: &std::path::Path,
		total_size: u64,
		plaintext_etag: &str,
		cancel: CancellationToken,
	) -> Result<()> {
		let mut meta = BlobMeta::new().with("content-type", content_type);
		for (k, v) in user_metadata {
			meta = meta.with(format!("x-amz-meta-{}", k), v.clone());
		}

		if self.should_encrypt(bucket) {
			let reader = self.open_scratch(scratch_path).await?;
			let svc = self
				.encryption
				.as_ref()
				.ok_or_else(|| Error::message("encryption is enabled but no EncryptionService is configured"))?;
			let (cipher_stream, header) = svc.encrypt_stream(reader, cancel);
			meta = meta
				.with("encrypted", "true")
				.with("original-size", total_size.to_string())
				.with("original-etag", plaintext_etag.to_string())
				.with("x-maxiofs-algorithm", header.algorithm)
				.with("x-maxiofs-nonce", header.nonce_base_b64);
			self.blobs.put(blob_path, cipher_stream, meta).await?;
		} else {
			meta = meta
				.with("size", total_size.to_string())
				.with("etag", plaintext_etag.to_string());
			let reader = self.open_scratch(scratch_path).await?;
			self.blobs.put(blob_path, reader, meta).await?;
		}
		Ok(())
	}

	/// Ensures an implicit-folder row exists for every non-trivial prefix of
	/// `key` (spec.md §4.1 "Commit").
	pub(crate) async fn ensure_implicit_folders(&self, bucket_path: &str, key: &str, tenant: Option<&str>, now: u64) -> Result<()> {
		for prefix in codec::parent_prefixes(key) {
			if self.metadata.get_object(bucket_path, &prefix).await?.is_none() {
				let folder = Object::new_implicit_folder(bucket_path, prefix, tenant.map(str::to_string), now);
				self.metadata.put_object(&ObjectRow::from(&folder)).await?;
			}
		}
		Ok(())
	}

	/// Applies the bucket/tenant counter deltas for a committed write
	/// (spec.md §4.1's four PUT cases; see DESIGN.md for the paired-call
	/// resolution of "count unchanged, size changes").
	pub(crate) fn apply_put_metrics(&self, tenant: Option<&str>, bucket_path: &str, existing: Option<&ObjectRow>, new_size: u64, versioning: bool) {
		match (versioning, existing) {
			(true, None) | (false, None) => {
				self.metric_cb.increment_object_count(tenant, bucket_path, new_size as i64);
				if let Some(t) = tenant {
					self.metric_cb.increment_tenant_storage(t, new_size as i64);
				}
			}
			(true, Some(old)) => {
				// A new version always becomes latest; count is unchanged
				// (one object replaces another as "the" latest) but bucket
				// bytes grow by the new version's full size, since the old
				// version's bytes are still retained on disk.
				self.metric_cb.decrement_object_count(tenant, bucket_path, old.size as i64);
				self.metric_cb.increment_object_count(tenant, bucket_path, new_size as i64);
				if let Some(t) = tenant {
					self.metric_cb.increment_tenant_storage(t, new_size as i64);
				}
			}
			(false, Some(old)) => {
				self.metric_cb.decrement_object_count(tenant, bucket_path, old.size as i64);
				self.metric_cb.increment_object_count(tenant, bucket_path, new_size as i64);
				if let Some(t) = tenant {
					if new_size >= old.size {
						self.metric_cb.increment_tenant_storage(t, (new_size - old.size) as i64);
					} else {
						self.metric_cb.decrement_tenant_storage(t, (old.size - new_size) as i64);
					}
				}
			}
		}
	}

	/// spec.md §4.1 "PUT object".
	pub async fn put(&self, bucket_path: &str, key: &str, body: BoxAsyncRead, headers: &HeaderBag, cancel: CancellationToken) -> Result<Object> {
		let started = std::time::Instant::now();
		let result = self.put_inner(bucket_path, key, body, headers, cancel).await;
		self.metrics.put_duration.record(started.elapsed().as_secs_f64(), &crate::metrics::bucket_label(bucket_path));
		result
	}

	async fn put_inner(&self, bucket_path: &str, key: &str, body: BoxAsyncRead, headers: &HeaderBag, cancel: CancellationToken) -> Result<Object> {
		codec::validate_key(key)?;
		let (tenant, bucket) = self.resolve_bucket(bucket_path).await?;
		let (content_type, user_metadata) = headers.extract();

		let scratch_path = self.scratch_path();
		let spooled = self.spool_to_scratch(body, &scratch_path).await;
		let (size, etag) = match spooled {
			Ok(v) => v,
			Err(e) => {
				let _ = tokio::fs::remove_file(&scratch_path).await;
				return Err(e);
			}
		};

		let existing = self.metadata.get_object(bucket_path, key).await?;
		let versioning = bucket.versioning_enabled();
		let version_id = if versioning { Some(maxiofs_model::gen_version_id()) } else { None };
		let blob_path = codec::object_blob_path(bucket_path, key, version_id.as_deref());

		let write_result = self
			.write_object_blob(&bucket, &blob_path, &content_type, &user_metadata, &scratch_path, size, &etag, cancel)
			.await;
		let _ = tokio::fs::remove_file(&scratch_path).await;
		write_result?;

		// Write-then-check-then-rollback (spec.md §4.1 "Quota enforcement"):
		// the plaintext size is only known after spooling, so the blob is
		// already written by the time the quota can be checked. Only
		// unversioned writes are subject to this check, per spec.md's
		// literal wording.
		if !versioning {
			if let Some(t) = &tenant {
				let old_size = existing.as_ref().map(|o| o.size).unwrap_or(0);
				let delta = size as i64 - old_size as i64;
				if delta > 0 {
					if let Err(e) = self.metric_cb.check_tenant_storage_quota(t, delta) {
						self.metrics.quota_rejections.add(1, &[]);
						if let Err(del_err) = self.blobs.delete(&blob_path).await {
							warn!("put: quota rollback failed to delete blob {}: {}", blob_path, del_err);
						}
						return Err(e);
					}
				}
			}
		}

		let now = now_msec();
		let retention = bucket.default_retention.map(|rule| {
			let until = add_years_days(msec_to_datetime(now), rule.years, rule.days);
			RetentionConfig::new(rule.mode, datetime_to_msec(until))
		});

		let object = Object {
			bucket_path: bucket_path.to_string(),
			key: key.to_string(),
			size,
			content_type,
			last_modified_msec: now,
			etag,
			storage_class: DEFAULT_STORAGE_CLASS.to_string(),
			version_id: version_id.clone(),
			user_metadata,
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
			for mut v in self.metadata.get_object_versions(bucket_path, key).await? {
				if v.is_latest {
					v.is_latest = false;
					self.metadata.put_object_version(bucket_path, key, &v).await?;
				}
			}
			self.metadata
				.put_object_version(bucket_path, key, &ObjectVersionRow { is_latest: true, row: row.clone() })
				.await?;
		}

		self.ensure_implicit_folders(bucket_path, key, tenant.as_deref(), now).await?;
		self.apply_put_metrics(tenant.as_deref(), bucket_path, existing.as_ref(), size, versioning);

		self.metrics.put_bytes.add(size, &crate::metrics::bucket_label(bucket_path));
		info!(bucket = bucket_path, key, size, version = version_id.as_deref().unwrap_or(""), "put object");
		Ok(object)
	}

	/// spec.md §4.1 "GET object".
	pub async fn get(&self, bucket_path: &str, key: &str, version_id: Option<&str>, cancel: CancellationToken) -> Result<(Object, BoxAsyncRead)> {
		let started = std::time::Instant::now();
		let result = self.get_inner(bucket_path, key, version_id, cancel).await;
		self.metrics.get_duration.record(started.elapsed().as_secs_f64(), &crate::metrics::bucket_label(bucket_path));
		result
	}

	async fn get_inner(&self, bucket_path: &str, key: &str, version_id: Option<&str>, cancel: CancellationToken) -> Result<(Object, BoxAsyncRead)> {
		codec::validate_key(key)?;
		let row = self.resolve_row(bucket_path, key, version_id).await?;

		let blob_path = codec::object_blob_path(bucket_path, key, row.version_id.as_deref());
		let (reader, blob_meta) = self.blobs.get(&blob_path).await.map_err(|e| match e {
			BlobError::NotFound(_) => Error::NoSuchObject,
			other => other.into(),
		})?;

		let final_reader = if blob_meta.get("encrypted") == Some("true") {
			let header = EncryptionHeader {
				algorithm: blob_meta.get("x-maxiofs-algorithm").unwrap_or_default().to_string(),
				nonce_base_b64: blob_meta.get("x-maxiofs-nonce").unwrap_or_default().to_string(),
			};
			let svc = self
				.encryption
				.as_ref()
				.ok_or_else(|| Error::message("blob is encrypted but no EncryptionService is configured"))?;
			svc.decrypt_stream(reader, header, cancel)?
		} else {
			reader
		};

		self.metrics.get_bytes.add(row.size, &crate::metrics::bucket_label(bucket_path));
		debug!(bucket = bucket_path, key, "get object");
		Ok((row.into(), final_reader))
	}

	/// spec.md §4.1 "HEAD" equivalent: resolves the descriptor without
	/// opening the blob.
	pub async fn head(&self, bucket_path: &str, key: &str, version_id: Option<&str>) -> Result<Object> {
		codec::validate_key(key)?;
		Ok(self.resolve_row(bucket_path, key, version_id).await?.into())
	}

	async fn resolve_row(&self, bucket_path: &str, key: &str, version_id: Option<&str>) -> Result<ObjectRow> {
		match version_id {
			Some(vid) => Ok(self
				.metadata
				.get_object_version(bucket_path, key, vid)
				.await?
				.ok_or(Error::NoSuchVersion)?
				.row),
			None => {
				let row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
				if row.is_delete_marker {
					return Err(Error::NoSuchObject);
				}
				Ok(row)
			}
		}
	}

	/// spec.md §4.1 "DELETE object".
	pub async fn delete(&self, bucket_path: &str, key: &str, version_id: Option<&str>, bypass_governance: bool) -> Result<DeleteOutcome> {
		codec::validate_key(key)?;
		let (tenant, bucket) = self.resolve_bucket(bucket_path).await?;
		let now = now_msec();

		let outcome = match (bucket.versioning_enabled(), version_id) {
			(_, Some(vid)) => self.delete_specific_version(bucket_path, key, vid, tenant.as_deref(), bypass_governance, now).await,
			(true, None) => self.create_delete_marker(bucket_path, key, tenant.as_deref(), now).await,
			(false, None) => self.delete_unversioned(bucket_path, key, tenant.as_deref(), bypass_governance, now).await,
		}?;

		self.metrics.delete_counter.add(1, &crate::metrics::bucket_label(bucket_path));
		Ok(outcome)
	}

	async fn delete_unversioned(&self, bucket_path: &str, key: &str, tenant: Option<&str>, bypass: bool, now: u64) -> Result<DeleteOutcome> {
		let blob_path = codec::canonical_blob_path(bucket_path, key);
		let row = match self.metadata.get_object(bucket_path, key).await? {
			None => {
				// Idempotent: nothing in metadata, but clean up a dangling
				// blob if one somehow exists.
				if self.blobs.exists(&blob_path).await.unwrap_or(false) {
					let _ = self.blobs.delete(&blob_path).await;
				}
				return Ok(DeleteOutcome::Permanent);
			}
			Some(row) => row,
		};

		let obj: Object = row.clone().into();
		LockEvaluator::can_delete(&obj, now, bypass)?;

		let blob_result = self.blobs.delete(&blob_path).await;
		if let Err(e) = &blob_result {
			warn!("delete: blob delete failed for {}/{}: {}", bucket_path, key, e);
		}
		blob_result.map_err(Error::from)?;

		let meta_result = self.metadata.delete_object(bucket_path, key).await;
		if let Err(e) = &meta_result {
			// The blob is gone; counters must still move even though the
			// metadata row is left dangling (spec.md §4.1 DELETE: "the
			// caller is informed of the inconsistency").
			warn!(
				"delete: blob removed but metadata delete failed for {}/{}: {} (counters corrected anyway)",
				bucket_path, key, e
			);
		}
		self.metric_cb.decrement_object_count(tenant, bucket_path, row.size as i64);
		if let Some(t) = tenant {
			self.metric_cb.decrement_tenant_storage(t, row.size as i64);
		}
		Ok(DeleteOutcome::Permanent)
	}

	async fn delete_specific_version(&self, bucket_path: &str, key: &str, version_id: &str, tenant: Option<&str>, bypass: bool, now: u64) -> Result<DeleteOutcome> {
		let version = self
			.metadata
			.get_object_version(bucket_path, key, version_id)
			.await?
			.ok_or(Error::NoSuchVersion)?;

		if !version.row.is_delete_marker {
			let obj: Object = version.row.clone().into();
			LockEvaluator::can_delete(&obj, now, bypass)?;

			let blob_path = codec::versioned_blob_path(bucket_path, key, version_id);
			if let Err(e) = self.blobs.delete(&blob_path).await {
				warn!("delete: blob delete failed for {}/{} v{}: {}", bucket_path, key, version_id, e);
			}
			if let Some(t) = tenant {
				self.metric_cb.decrement_tenant_storage(t, version.row.size as i64);
			}
		}

		self.metadata.delete_object_version(bucket_path, key, version_id).await?;

		if version.is_latest {
			if !version.row.is_delete_marker {
				self.metric_cb.decrement_object_count(tenant, bucket_path, version.row.size as i64);
			}
			let remaining = self.metadata.get_object_versions(bucket_path, key).await?;
			match remaining.into_iter().max_by_key(|v| v.row.last_modified_msec) {
				Some(mut promoted) => {
					promoted.is_latest = true;
					self.metadata.put_object_version(bucket_path, key, &promoted).await?;
					self.metadata.put_object(&promoted.row).await?;
					if !promoted.row.is_delete_marker {
						self.metric_cb.increment_object_count(tenant, bucket_path, promoted.row.size as i64);
					}
				}
				None => {
					self.metadata.delete_object(bucket_path, key).await?;
				}
			}
		}

		Ok(DeleteOutcome::Permanent)
	}

	async fn create_delete_marker(&self, bucket_path: &str, key: &str, tenant: Option<&str>, now: u64) -> Result<DeleteOutcome> {
		let existing = self.metadata.get_object(bucket_path, key).await?;
		let version_id = maxiofs_model::gen_version_id();
		let marker = Object::new_delete_marker(bucket_path, key, version_id.clone(), tenant.map(str::to_string), now);
		let marker_row = ObjectRow::from(&marker);

		for mut v in self.metadata.get_object_versions(bucket_path, key).await? {
			if v.is_latest {
				v.is_latest = false;
				self.metadata.put_object_version(bucket_path, key, &v).await?;
			}
		}
		self.metadata
			.put_object_version(bucket_path, key, &ObjectVersionRow { is_latest: true, row: marker_row.clone() })
			.await?;
		self.metadata.put_object(&marker_row).await?;

		// A delete marker doesn't remove any bytes; it only ever replaces
		// the latest *non-delete-marker* version's contribution to
		// object_count (bytes already counted under the old latest's
		// version stay on disk and stay counted until that version itself
		// is purged).
		if let Some(existing) = existing {
			if !existing.is_delete_marker {
				self.metric_cb.decrement_object_count(tenant, bucket_path, existing.size as i64);
			}
		}
		Ok(DeleteOutcome::DeleteMarkerCreated { version_id })
	}

	/// spec.md §4.1 "LIST objects".
	pub async fn list(&self, bucket_path: &str, prefix: &str, delimiter: Option<&str>, marker: Option<&str>, max_keys: usize) -> Result<ListOutcome> {
		self.list_or_search(bucket_path, prefix, delimiter, marker, max_keys, None).await
	}

	/// spec.md §4.1 "SEARCH objects".
	pub async fn search(&self, bucket_path: &str, prefix: &str, delimiter: Option<&str>, marker: Option<&str>, max_keys: usize, query: &SearchQuery) -> Result<ListOutcome> {
		self.list_or_search(bucket_path, prefix, delimiter, marker, max_keys, Some(query)).await
	}

	/// Lists every stored version of a key, newest first by last-modified,
	/// for version-listing display (spec.md §3 `ObjectVersion`).
	pub async fn list_versions(&self, bucket_path: &str, key: &str) -> Result<Vec<ObjectVersion>> {
		let mut versions = self.metadata.get_object_versions(bucket_path, key).await?;
		versions.sort_by(|a, b| b.row.last_modified_msec.cmp(&a.row.last_modified_msec));
		Ok(versions.iter().map(ObjectVersionRow::summary).collect())
	}

	async fn list_or_search(&self, bucket_path: &str, prefix: &str, delimiter: Option<&str>, marker: Option<&str>, max_keys: usize, query: Option<&SearchQuery>) -> Result<ListOutcome> {
		let max_keys = if max_keys == 0 { self.config.limits.default_list_page_size as usize } else { max_keys };
		// Delimited listing may need to scan far more rows than it ultimately
		// returns (many keys can collapse into one common prefix), so the
		// store-level scan limit is expanded independently of max_keys
		// (spec.md §4.1 "LIST / SEARCH": "scan_limit expanded when a
		// delimiter is in play").
		let scan_limit = if delimiter.is_some() { 100_000 } else { max_keys };

		let (rows, store_next_marker) = match query {
			Some(q) => self.metadata.search_objects(bucket_path, prefix, marker, scan_limit, q).await?,
			None => self.metadata.list_objects(bucket_path, prefix, marker, scan_limit).await?,
		};

		let mut objects = Vec::new();
		let mut prefixes: CommonPrefixes = Vec::new();

		for row in rows {
			if codec::is_internal_name(&row.key) || row.is_delete_marker {
				continue;
			}
			let obj: Object = row.clone().into();
			if obj.is_implicit_folder() {
				continue;
			}

			if let Some(delim) = delimiter {
				let rest = &row.key[prefix.len().min(row.key.len())..];
				if let Some(pos) = rest.find(delim) {
					let common_prefix = format!("{}{}", prefix, &rest[..pos + delim.len()]);
					if prefixes.last().map(|p| p != &common_prefix).unwrap_or(true) {
						prefixes.push(common_prefix);
					}
					continue;
				}
			}
			objects.push(obj);
		}

		let mut truncated = store_next_marker.is_some();
		let (common_prefixes, objects, next_marker) = if prefixes.len() >= max_keys {
			truncated = true;
			let next_marker = prefixes.get(max_keys - 1).cloned();
			prefixes.truncate(max_keys);
			(prefixes, Vec::new(), next_marker)
		} else {
			let remaining = max_keys - prefixes.len();
			if objects.len() > remaining {
				truncated = true;
				let next_marker = objects.get(remaining.saturating_sub(1)).map(|o| o.key.clone());
				objects.truncate(remaining);
				(prefixes, objects, next_marker)
			} else if truncated {
				// The store has more rows past `scan_limit`, but every one we
				// pulled this page either collapsed into a common prefix or
				// was filtered out (internal name, delete marker, implicit
				// folder) without the page itself hitting `max_keys`. Resume
				// from the last emitted object's key (spec.md §4.1: "compute
				// next-marker as the last emitted element's key"), falling
				// back to the store's own marker when nothing was emitted.
				let next_marker = objects.last().map(|o| o.key.clone()).or_else(|| store_next_marker.clone());
				(prefixes, objects, next_marker)
			} else {
				(prefixes, objects, None)
			}
		};

		Ok(ListOutcome {
			objects,
			common_prefixes,
			truncated,
			next_marker,
		})
	}

	/// spec.md §3 "TagSet" get.
	pub async fn get_tagging(&self, bucket_path: &str, key: &str) -> Result<TagSet> {
		let row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
		Ok(row.tags)
	}

	pub async fn put_tagging(&self, bucket_path: &str, key: &str, tags: TagSet) -> Result<()> {
		let mut row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
		row.tags = tags;
		self.metadata.put_object(&row).await
	}

	pub async fn delete_tagging(&self, bucket_path: &str, key: &str) -> Result<()> {
		self.put_tagging(bucket_path, key, TagSet::new()).await
	}

	/// spec.md §4.3 legal hold admin.
	pub async fn get_object_legal_hold(&self, bucket_path: &str, key: &str) -> Result<LegalHoldConfig> {
		let row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
		Ok(row.legal_hold)
	}

	pub async fn put_object_legal_hold(&self, bucket_path: &str, key: &str, cfg: LegalHoldConfig) -> Result<()> {
		LockEvaluator::validate_legal_hold(&cfg)?;
		let mut row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
		row.legal_hold = cfg;
		self.metadata.put_object(&row).await
	}

	/// spec.md §4.3 retention admin, gated through the [`LockEvaluator`].
	pub async fn get_object_retention(&self, bucket_path: &str, key: &str) -> Result<RetentionConfig> {
		let row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
		row.retention.ok_or(Error::NoSuchRetention)
	}

	pub async fn put_object_retention(&self, bucket_path: &str, key: &str, proposed: RetentionConfig, user_is_admin: bool, bypass_governance: bool) -> Result<()> {
		let mut row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
		let now = now_msec();
		LockEvaluator::can_modify_retention(row.retention.as_ref(), &proposed, now, user_is_admin, bypass_governance)?;
		row.retention = Some(proposed);
		self.metadata.put_object(&row).await
	}

	/// Unconditionally clears a retention config, bypassing
	/// [`LockEvaluator::can_modify_retention`]'s shorten/remove rules. Used
	/// only by [`crate::retention_policy::RetentionPolicyManager::cleanup_expired`]
	/// to strip retentions that have already lapsed, which is not a
	/// "shorten" in the policy sense — the retention is already inactive by
	/// the time this runs.
	pub async fn clear_object_retention(&self, bucket_path: &str, key: &str) -> Result<()> {
		let mut row = self.metadata.get_object(bucket_path, key).await?.ok_or(Error::NoSuchObject)?;
		row.retention = None;
		self.metadata.put_object(&row).await
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use maxiofs_model::bucket::mem::MemBucketDirectory;
	use maxiofs_model::bucket::{EncryptionRule, VersioningStatus};
	use maxiofs_model::store::KvMetadataStore;
	use maxiofs_db::mem_adapter::MemDb;

	use crate::metric_callbacks::MemMetricCallbacks;

	pub fn make_config(scratch_dir: std::path::PathBuf) -> Arc<Config> {
		Arc::new(Config {
			scratch_dir,
			encryption: maxiofs_util::config::EncryptionConfig {
				enabled: false,
				master_key_base64: None,
			},
			limits: Default::default(),
		})
	}

	pub fn make_manager(scratch_dir: std::path::PathBuf, versioning: bool, encrypted: bool) -> (ObjectManager, Arc<MemBucketDirectory>, Arc<MemMetricCallbacks>) {
		let db: Arc<dyn maxiofs_db::Db> = Arc::new(MemDb::new());
		let metadata: Arc<dyn MetadataStore> = Arc::new(KvMetadataStore::new(&db).unwrap());
		let blobs: Arc<dyn BlobStore> = Arc::new(maxiofs_block::mem_adapter::MemBlobStore::new());
		let buckets = Arc::new(MemBucketDirectory::new());
		buckets.insert(BucketMeta {
			bucket_path: "t1/b1".to_string(),
			tenant: Some("t1".to_string()),
			versioning: if versioning { VersioningStatus::Enabled } else { VersioningStatus::Disabled },
			encryption: if encrypted {
				Some(EncryptionRule { algorithm: "AES256-GCM".to_string() })
			} else {
				None
			},
			object_lock_enabled: true,
			default_retention: None,
		});
		let metric_cb = Arc::new(MemMetricCallbacks::new());
		metric_cb.set_tenant_quota("t1", i64::MAX);

		let mut config = (*make_config(scratch_dir)).clone();
		config.encryption.enabled = encrypted;
		let config = Arc::new(config);

		let encryption = if encrypted {
			let keys = Arc::new(maxiofs_crypt::MasterKeyManager::new(Box::new(maxiofs_crypt::StaticMasterKeyProvider::generate())));
			Some(Arc::new(EncryptionService::new(keys)))
		} else {
			None
		};

		let manager = ObjectManager::new(metadata, blobs, buckets.clone(), metric_cb.clone() as Arc<dyn MetricCallbacks>, encryption, config);
		(manager, buckets, metric_cb)
	}

	pub fn body(data: &'static [u8]) -> BoxAsyncRead {
		Box::pin(std::io::Cursor::new(data))
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;
	use maxiofs_util::async_hash::md5_hex;

	fn scratch_dir() -> std::path::PathBuf {
		std::env::temp_dir().join(format!("maxiofs-test-{}", hex::encode(rand::random::<[u8; 8]>())))
	}

	#[tokio::test]
	async fn put_then_get_roundtrips_unversioned() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let obj = mgr
			.put("t1/b1", "hello.txt", body(b"hello world"), &HeaderBag::new(), CancellationToken::never())
			.await
			.unwrap();
		assert_eq!(obj.size, 11);
		assert_eq!(obj.etag, md5_hex(b"hello world"));

		let (descriptor, mut reader) = mgr.get("t1/b1", "hello.txt", None, CancellationToken::never()).await.unwrap();
		assert_eq!(descriptor.size, 11);
		let mut out = Vec::new();
		tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out).await.unwrap();
		assert_eq!(out, b"hello world");
	}

	#[tokio::test]
	async fn overwrite_unversioned_replaces_blob_and_nets_byte_delta() {
		let (mgr, _buckets, metric_cb) = make_manager(scratch_dir(), false, false);
		mgr.put("t1/b1", "k", body(b"12345"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();
		mgr.put("t1/b1", "k", body(b"1234567890"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();

		let counters = metric_cb.bucket_counters("t1/b1");
		assert_eq!(counters.object_count, 1);
		assert_eq!(counters.total_size, 10);
		assert_eq!(metric_cb.tenant_storage_used("t1"), 10);
	}

	#[tokio::test]
	async fn encrypted_bucket_roundtrips_transparently() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, true);
		mgr.put("t1/b1", "secret.bin", body(b"top secret payload"), &HeaderBag::new(), CancellationToken::never())
			.await
			.unwrap();
		let (_desc, mut reader) = mgr.get("t1/b1", "secret.bin", None, CancellationToken::never()).await.unwrap();
		let mut out = Vec::new();
		tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out).await.unwrap();
		assert_eq!(out, b"top secret payload");
	}

	#[tokio::test]
	async fn delete_on_unversioned_bucket_is_permanent_and_idempotent() {
		let (mgr, _buckets, metric_cb) = make_manager(scratch_dir(), false, false);
		mgr.put("t1/b1", "k", body(b"data"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();
		let outcome = mgr.delete("t1/b1", "k", None, false).await.unwrap();
		assert_eq!(outcome, DeleteOutcome::Permanent);
		assert!(mgr.get("t1/b1", "k", None, CancellationToken::never()).await.is_err());
		assert_eq!(metric_cb.bucket_counters("t1/b1").object_count, 0);

		// Deleting again is a no-op, not an error.
		assert_eq!(mgr.delete("t1/b1", "k", None, false).await.unwrap(), DeleteOutcome::Permanent);
	}

	#[tokio::test]
	async fn delete_on_versioned_bucket_creates_delete_marker_then_restores_on_removal() {
		let (mgr, _buckets, metric_cb) = make_manager(scratch_dir(), true, false);
		mgr.put("t1/b1", "k", body(b"v1 data"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();
		assert_eq!(metric_cb.bucket_counters("t1/b1").object_count, 1);

		let outcome = mgr.delete("t1/b1", "k", None, false).await.unwrap();
		let marker_version = match outcome {
			DeleteOutcome::DeleteMarkerCreated { version_id } => version_id,
			_ => panic!("expected a delete marker"),
		};
		assert!(mgr.get("t1/b1", "k", None, CancellationToken::never()).await.is_err());
		assert_eq!(metric_cb.bucket_counters("t1/b1").object_count, 0);

		// Removing the delete marker itself restores the prior version as latest.
		mgr.delete("t1/b1", "k", Some(&marker_version), false).await.unwrap();
		let (desc, _) = mgr.get("t1/b1", "k", None, CancellationToken::never()).await.unwrap();
		assert_eq!(desc.size, 7);
		assert_eq!(metric_cb.bucket_counters("t1/b1").object_count, 1);
	}

	#[tokio::test]
	async fn quota_rejection_rolls_back_the_written_blob() {
		let (mgr, _buckets, metric_cb) = make_manager(scratch_dir(), false, false);
		metric_cb.set_tenant_quota("t1", 5);
		let err = mgr
			.put("t1/b1", "too-big.bin", body(b"this is definitely more than five bytes"), &HeaderBag::new(), CancellationToken::never())
			.await
			.unwrap_err();
		assert!(matches!(err, Error::StorageQuotaExceeded));
		assert_eq!(metric_cb.bucket_counters("t1/b1").object_count, 0);
		assert!(mgr.get("t1/b1", "too-big.bin", None, CancellationToken::never()).await.is_err());
	}

	#[tokio::test]
	async fn list_groups_by_delimiter_into_common_prefixes() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		for key in ["a/1.txt", "a/2.txt", "b.txt"] {
			mgr.put("t1/b1", key, body(b"x"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();
		}
		let outcome = mgr.list("t1/b1", "", Some("/"), None, 1000).await.unwrap();
		assert_eq!(outcome.common_prefixes, vec!["a/".to_string()]);
		assert_eq!(outcome.objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(), vec!["b.txt"]);
	}

	#[tokio::test]
	async fn empty_bucket_list_is_not_truncated() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		let outcome = mgr.list("t1/b1", "", None, None, 0).await.unwrap();
		assert!(outcome.objects.is_empty());
		assert!(!outcome.truncated);
		assert_eq!(outcome.next_marker, None);
	}

	#[tokio::test]
	async fn non_delimited_truncated_list_sets_a_resumable_next_marker() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		for key in ["a", "b", "c"] {
			mgr.put("t1/b1", key, body(b"x"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();
		}

		let page1 = mgr.list("t1/b1", "", None, None, 2).await.unwrap();
		assert_eq!(page1.objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
		assert!(page1.truncated);
		assert_eq!(page1.next_marker.as_deref(), Some("b"));

		let page2 = mgr.list("t1/b1", "", None, page1.next_marker.as_deref(), 2).await.unwrap();
		assert!(page2.objects.iter().any(|o| o.key == "c"));
		assert!(!page2.truncated);
	}

	#[tokio::test]
	async fn put_creates_implicit_folder_rows_for_every_prefix() {
		let (mgr, _buckets, _metrics) = make_manager(scratch_dir(), false, false);
		mgr.put("t1/b1", "a/b/c.txt", body(b"x"), &HeaderBag::new(), CancellationToken::never()).await.unwrap();
		assert!(mgr.head("t1/b1", "a/", None).await.unwrap().is_implicit_folder());
		assert!(mgr.head("t1/b1", "a/b/", None).await.unwrap().is_implicit_folder());
	}
}
