//! Fully in-memory `BlobStore`, for fast unit tests that don't need real
//! filesystem I/O (spec.md's test-tooling ambient requirement).

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::{BlobMeta, BlobStore, BoxAsyncRead, Error, Result};

#[derive(Default)]
pub struct MemBlobStore {
	blobs: RwLock<BTreeMap<String, (Vec<u8>, BlobMeta)>>,
}

impl MemBlobStore {
	pub fn new() -> MemBlobStore {
		MemBlobStore::default()
	}
}

#[async_trait]
impl BlobStore for MemBlobStore {
	async fn put(&self, path: &str, mut reader: BoxAsyncRead, meta: BlobMeta) -> Result<BlobMeta> {
		let mut buf = Vec::new();
		reader.read_to_end(&mut buf).await.map_err(Error::Io)?;
		self.blobs
			.write()
			.unwrap()
			.insert(path.to_string(), (buf, meta.clone()));
		Ok(meta)
	}

	async fn get(&self, path: &str) -> Result<(BoxAsyncRead, BlobMeta)> {
		let (data, meta) = self
			.blobs
			.read()
			.unwrap()
			.get(path)
			.cloned()
			.ok_or_else(|| Error::NotFound(path.to_string()))?;
		Ok((Box::pin(std::io::Cursor::new(data)), meta))
	}

	async fn delete(&self, path: &str) -> Result<()> {
		self.blobs.write().unwrap().remove(path);
		Ok(())
	}

	async fn exists(&self, path: &str) -> Result<bool> {
		Ok(self.blobs.read().unwrap().contains_key(path))
	}

	async fn get_metadata(&self, path: &str) -> Result<BlobMeta> {
		self.blobs
			.read()
			.unwrap()
			.get(path)
			.map(|(_, meta)| meta.clone())
			.ok_or_else(|| Error::NotFound(path.to_string()))
	}

	async fn set_metadata(&self, path: &str, meta: BlobMeta) -> Result<()> {
		let mut blobs = self.blobs.write().unwrap();
		let entry = blobs
			.get_mut(path)
			.ok_or_else(|| Error::NotFound(path.to_string()))?;
		entry.1 = meta;
		Ok(())
	}

	async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
		let blobs = self.blobs.read().unwrap();
		let mut out: Vec<String> = blobs
			.keys()
			.filter(|k| k.starts_with(prefix))
			.filter(|k| {
				if recursive {
					true
				} else {
					let rest = k.strip_prefix(prefix).unwrap_or(k);
					let rest = rest.strip_prefix('/').unwrap_or(rest);
					!rest.contains('/')
				}
			})
			.cloned()
			.collect();
		out.sort();
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn put_get_delete_roundtrip() {
		let store = MemBlobStore::new();
		let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(b"abc".to_vec()));
		store.put("k", reader, BlobMeta::new()).await.unwrap();
		assert!(store.exists("k").await.unwrap());

		let (mut r, _meta) = store.get("k").await.unwrap();
		let mut buf = Vec::new();
		r.read_to_end(&mut buf).await.unwrap();
		assert_eq!(buf, b"abc");

		store.delete("k").await.unwrap();
		assert!(!store.exists("k").await.unwrap());
	}

	#[tokio::test]
	async fn list_non_recursive_stops_at_one_level() {
		let store = MemBlobStore::new();
		for key in ["b/one", "b/two", "b/sub/three"] {
			let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(b"x".to_vec()));
			store.put(key, reader, BlobMeta::new()).await.unwrap();
		}
		let shallow = store.list("b", false).await.unwrap();
		assert_eq!(shallow, vec!["b/one".to_string(), "b/two".to_string()]);
	}
}
