//! Opaque blob storage backend for the MaxIOFS object storage core (spec.md
//! §6, "Consumed interface: Blob Store").
//!
//! `BlobStore` is the trait boundary the Object Manager, Multipart
//! Coordinator and Integrity Verifier are written against. `local::LocalBlobStore`
//! is a local-filesystem reference implementation grounded in
//! `garage_block::manager`'s write-temp-then-rename-then-fsync-directory
//! discipline, generalized from content-addressed immutable blocks to
//! arbitrary string paths with their own out-of-band metadata. `mem_adapter`
//! provides a fully in-memory implementation for fast unit tests.

#[macro_use]
extern crate tracing;

pub mod local;
pub mod mem_adapter;
mod metrics;

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub use metrics::BlockManagerMetrics;

pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, err_derive::Error)]
pub enum Error {
	#[error(display = "blob not found: {}", _0)]
	NotFound(String),
	#[error(display = "blob I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),
	#[error(display = "{}", _0)]
	Message(String),
}

impl From<Error> for maxiofs_util::error::Error {
	fn from(e: Error) -> Self {
		match e {
			Error::NotFound(_) => maxiofs_util::error::Error::Missing,
			other => maxiofs_util::error::Error::Blob(other.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// Out-of-band metadata carried alongside a blob's bytes: content-type, the
/// plaintext size/etag pair (populated even when the blob is stored
/// encrypted, per spec.md §4.1 "Encryption decision"), and any
/// encryption-related headers the Encryption Service attaches (spec.md §5.3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobMeta {
	pub headers: BTreeMap<String, String>,
}

impl BlobMeta {
	pub fn new() -> BlobMeta {
		BlobMeta::default()
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> BlobMeta {
		self.headers.insert(key.into(), value.into());
		self
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.headers.get(key).map(|s| s.as_str())
	}
}

#[async_trait]
pub trait BlobStore: Send + Sync {
	async fn put(&self, path: &str, reader: BoxAsyncRead, meta: BlobMeta) -> Result<BlobMeta>;
	async fn get(&self, path: &str) -> Result<(BoxAsyncRead, BlobMeta)>;
	async fn delete(&self, path: &str) -> Result<()>;
	async fn exists(&self, path: &str) -> Result<bool>;
	async fn get_metadata(&self, path: &str) -> Result<BlobMeta>;
	async fn set_metadata(&self, path: &str, meta: BlobMeta) -> Result<()>;
	async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>>;
}
