//! Engine-agnostic ordered key/value store abstraction, mirroring `garage_db`'s
//! `Db`/`Tree`/`Transaction` trait design: callers open named `Tree`s once at
//! startup and treat them as independent ordered byte-string maps, without
//! caring which storage engine backs them.
//!
//! Only the trait boundary and an in-memory reference implementation live
//! here. Real engine backends (sled/lmdb/sqlite, as `garage_db` supports) are
//! out of scope for this crate; `maxiofs_model`'s `MetadataStore` is built
//! against the trait alone.

#[macro_use]
extern crate tracing;

pub mod mem_adapter;

use std::ops::Bound;
use std::sync::Arc;

pub type Value = Vec<u8>;

#[derive(Debug, err_derive::Error)]
pub enum Error {
	#[error(display = "key/value store error: {}", _0)]
	Message(String),
}

impl From<String> for Error {
	fn from(s: String) -> Error {
		Error::Message(s)
	}
}

impl From<&str> for Error {
	fn from(s: &str) -> Error {
		Error::Message(s.into())
	}
}

impl From<Error> for maxiofs_util::error::Error {
	fn from(e: Error) -> Self {
		maxiofs_util::error::Error::Db(e.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;

pub type ValueIter<'a> = Box<dyn Iterator<Item = Result<(Value, Value)>> + Send + 'a>;

/// A single ordered byte-string to byte-string map, analogous to a sled
/// `Tree`, an LMDB database, or a SQLite table keyed on a blob primary key.
pub trait ITree: Send + Sync {
	fn get(&self, key: &[u8]) -> Result<Option<Value>>;
	fn insert(&self, key: &[u8], value: &[u8]) -> Result<Option<Value>>;
	fn remove(&self, key: &[u8]) -> Result<Option<Value>>;
	fn len(&self) -> Result<usize>;
	fn iter(&self) -> Result<ValueIter<'_>>;
	fn range(&self, low: Bound<Value>, high: Bound<Value>) -> Result<ValueIter<'_>>;
}

pub type Tree = Arc<dyn ITree>;

/// A set of writes against one or more `Tree`s that are made visible together:
/// if the closure passed to `Db::transaction` returns `Err`, every write it
/// made through this handle is undone.
///
/// This is deliberately coarse-grained compared to `garage_db`'s real
/// transaction support (which leans on each engine's native ACID
/// transactions): spec.md's Open Question 2 resolves cross-row atomicity as
/// "fixed write order, reconciled by `cleanup_expired`, no distributed
/// transaction", so all this needs to provide is all-or-nothing visibility
/// for a handful of writes issued from a single call site, not true MVCC or
/// cross-thread isolation.
pub trait Transaction {
	fn get(&self, tree: &Tree, key: &[u8]) -> Result<Option<Value>>;
	fn insert(&mut self, tree: &Tree, key: &[u8], value: &[u8]) -> Result<Option<Value>>;
	fn remove(&mut self, tree: &Tree, key: &[u8]) -> Result<Option<Value>>;
}

/// An engine-agnostic key/value store.
pub trait Db: Send + Sync {
	fn open_tree(&self, name: &str) -> Result<Tree>;
	fn list_trees(&self) -> Result<Vec<String>>;

	/// Run `f` against a fresh `Transaction` handle. On `Ok`, `f`'s writes
	/// stay; on `Err`, they are rolled back and the error is propagated.
	fn transaction(
		&self,
		f: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
	) -> Result<()>;
}
