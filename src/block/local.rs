//! Local-filesystem `BlobStore`, grounded in `garage_block::manager`'s
//! write-temp-then-rename-then-fsync-directory discipline. Unlike the
//! teacher's block manager, blobs here are addressed by the caller's own
//! logical path (spec.md's `canonical_blob_path`/`versioned_blob_path`/
//! `multipart_part_path`), not a content hash, so there is no fan-out
//! directory scheme to reconstruct: the logical path *is* the directory
//! structure under `data_dir`. Out-of-band metadata lives in a `.meta`
//! sidecar file next to the data.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use opentelemetry::metrics::Meter;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{BlobMeta, BlobStore, BlockManagerMetrics, BoxAsyncRead, Error, Result};

pub struct LocalBlobStore {
	data_dir: PathBuf,
	metrics: BlockManagerMetrics,
}

impl LocalBlobStore {
	pub fn new(data_dir: impl Into<PathBuf>, meter: &Meter) -> LocalBlobStore {
		LocalBlobStore {
			data_dir: data_dir.into(),
			metrics: BlockManagerMetrics::new(meter),
		}
	}

	fn resolve(&self, path: &str) -> Result<PathBuf> {
		if path.split('/').any(|seg| seg == "..") {
			return Err(Error::Message(format!("refusing path with '..' segment: {}", path)));
		}
		Ok(self.data_dir.join(path))
	}

	fn meta_path(data_path: &Path) -> PathBuf {
		let mut p = data_path.as_os_str().to_owned();
		p.push(".meta");
		PathBuf::from(p)
	}

	async fn write_metadata(meta_path: &Path, meta: &BlobMeta) -> Result<()> {
		let encoded = serde_json::to_vec(&meta.headers)
			.map_err(|e| Error::Message(format!("failed to encode blob metadata: {}", e)))?;
		write_file_durably(meta_path, &encoded).await
	}

	async fn read_metadata(meta_path: &Path) -> Result<BlobMeta> {
		let data = fs::read(meta_path).await.map_err(Error::Io)?;
		let headers = serde_json::from_slice(&data)
			.map_err(|e| Error::Message(format!("failed to decode blob metadata: {}", e)))?;
		Ok(BlobMeta { headers })
	}
}

/// Write `data` to `path` by writing to a sibling `.tmp` file, `fsync`-ing
/// it, renaming it into place, then `fsync`-ing the containing directory so
/// the rename itself is durable (http://thedjbway.b0llix.net/qmail/syncdir.html,
/// the same justification the teacher's block manager cites).
async fn write_file_durably(path: &Path, data: &[u8]) -> Result<()> {
	let dir = path.parent().ok_or_else(|| Error::Message("blob path has no parent directory".into()))?;
	fs::create_dir_all(dir).await.map_err(Error::Io)?;

	let mut tmp_name = path.as_os_str().to_owned();
	tmp_name.push(".tmp");
	let tmp_path = PathBuf::from(tmp_name);

	let mut f = fs::File::create(&tmp_path).await.map_err(Error::Io)?;
	f.write_all(data).await.map_err(Error::Io)?;
	f.sync_all().await.map_err(Error::Io)?;
	drop(f);

	fs::rename(&tmp_path, path).await.map_err(Error::Io)?;

	let dir_handle = fs::File::open(dir).await.map_err(Error::Io)?;
	dir_handle.sync_all().await.map_err(Error::Io)?;

	Ok(())
}

/// Same durability discipline as [`write_file_durably`], but streams
/// directly from `reader` into the temp file instead of buffering the whole
/// blob in memory first (spec.md §5: "long streams are broken into
/// producer/consumer pairs ... to avoid buffering an entire object in RAM").
/// Returns the number of bytes written.
async fn stream_file_durably(path: &Path, reader: &mut BoxAsyncRead) -> Result<u64> {
	let dir = path.parent().ok_or_else(|| Error::Message("blob path has no parent directory".into()))?;
	fs::create_dir_all(dir).await.map_err(Error::Io)?;

	let mut tmp_name = path.as_os_str().to_owned();
	tmp_name.push(".tmp");
	let tmp_path = PathBuf::from(tmp_name);

	let mut f = fs::File::create(&tmp_path).await.map_err(Error::Io)?;
	let written = tokio::io::copy(reader, &mut f).await.map_err(Error::Io)?;
	f.sync_all().await.map_err(Error::Io)?;
	drop(f);

	fs::rename(&tmp_path, path).await.map_err(Error::Io)?;

	let dir_handle = fs::File::open(dir).await.map_err(Error::Io)?;
	dir_handle.sync_all().await.map_err(Error::Io)?;

	Ok(written)
}

/// Remove `dir` and each ancestor up to (but not including) `data_dir` as
/// long as they're empty, the way the teacher's block manager sweeps spent
/// block directories clean (spec.md §4.1 permanent-delete: "clean up empty
/// blob-store directories"). Stops at the first non-empty directory, and
/// treats any removal failure as harmless best-effort cleanup.
async fn remove_empty_ancestors(data_dir: &Path, data_path: &Path) {
	let mut dir = match data_path.parent() {
		Some(d) => d.to_path_buf(),
		None => return,
	};
	while dir.starts_with(data_dir) && dir != data_dir {
		// ENOTEMPTY (a sibling blob, or its ".meta"/".tmp" file, still present)
		// stops the sweep; any other error is treated as harmless and also
		// stops it, since there's nothing more this best-effort cleanup can do.
		if fs::remove_dir(&dir).await.is_err() {
			break;
		}
		match dir.parent() {
			Some(parent) => dir = parent.to_path_buf(),
			None => break,
		}
	}
}

#[async_trait]
impl BlobStore for LocalBlobStore {
	async fn put(&self, path: &str, mut reader: BoxAsyncRead, meta: BlobMeta) -> Result<BlobMeta> {
		let data_path = self.resolve(path)?;
		let meta_path = Self::meta_path(&data_path);

		let len = stream_file_durably(&data_path, &mut reader).await?;
		Self::write_metadata(&meta_path, &meta).await?;

		self.metrics.bytes_written.add(len, &[]);
		Ok(meta)
	}

	async fn get(&self, path: &str) -> Result<(BoxAsyncRead, BlobMeta)> {
		let data_path = self.resolve(path)?;
		let meta_path = Self::meta_path(&data_path);

		let f = fs::File::open(&data_path).await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				Error::NotFound(path.to_string())
			} else {
				Error::Io(e)
			}
		})?;
		let len = f.metadata().await.map_err(Error::Io)?.len();
		self.metrics.bytes_read.add(len, &[]);

		let meta = Self::read_metadata(&meta_path).await.unwrap_or_default();
		let reader: BoxAsyncRead = Box::pin(f);
		Ok((reader, meta))
	}

	async fn delete(&self, path: &str) -> Result<()> {
		let data_path = self.resolve(path)?;
		let meta_path = Self::meta_path(&data_path);
		match fs::remove_file(&data_path).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(Error::Io(e)),
		}
		match fs::remove_file(&meta_path).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(Error::Io(e)),
		}
		remove_empty_ancestors(&self.data_dir, &data_path).await;
		Ok(())
	}

	async fn exists(&self, path: &str) -> Result<bool> {
		let data_path = self.resolve(path)?;
		Ok(fs::metadata(&data_path).await.is_ok())
	}

	async fn get_metadata(&self, path: &str) -> Result<BlobMeta> {
		let data_path = self.resolve(path)?;
		if fs::metadata(&data_path).await.is_err() {
			return Err(Error::NotFound(path.to_string()));
		}
		Ok(Self::read_metadata(&Self::meta_path(&data_path))
			.await
			.unwrap_or_default())
	}

	async fn set_metadata(&self, path: &str, meta: BlobMeta) -> Result<()> {
		let data_path = self.resolve(path)?;
		if fs::metadata(&data_path).await.is_err() {
			return Err(Error::NotFound(path.to_string()));
		}
		Self::write_metadata(&Self::meta_path(&data_path), &meta).await
	}

	async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
		let root = self.resolve(prefix).unwrap_or_else(|_| self.data_dir.clone());
		let mut out = Vec::new();
		if fs::metadata(&root).await.is_ok() {
			list_dir(&self.data_dir, &root, recursive, &mut out).await?;
		}
		out.sort();
		Ok(out)
	}
}

fn list_dir<'a>(
	data_dir: &'a Path,
	dir: &'a Path,
	recursive: bool,
	out: &'a mut Vec<String>,
) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
	Box::pin(async move {
		let mut entries = fs::read_dir(dir).await.map_err(Error::Io)?;
		while let Some(entry) = entries.next_entry().await.map_err(Error::Io)? {
			let path = entry.path();
			let file_name = entry.file_name();
			let file_name = file_name.to_string_lossy();
			if file_name.ends_with(".meta") || file_name.ends_with(".tmp") {
				continue;
			}
			let file_type = entry.file_type().await.map_err(Error::Io)?;
			if file_type.is_dir() {
				if recursive {
					list_dir(data_dir, &path, recursive, out).await?;
				}
				continue;
			}
			if let Ok(rel) = path.strip_prefix(data_dir) {
				out.push(rel.to_string_lossy().replace('\\', "/"));
			}
		}
		Ok(())
	})
}
