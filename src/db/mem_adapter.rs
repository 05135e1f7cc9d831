//! In-memory reference implementation of the [`Db`](crate::Db) trait, backed
//! by a `BTreeMap` per tree behind a `RwLock`. Used by the test suite
//! throughout the workspace and as a development fallback where no real
//! engine backend is wired in.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use crate::{Db, ITree, Result, Transaction, Tree, Value, ValueIter};

#[derive(Default)]
struct MemTreeInner {
	map: BTreeMap<Value, Value>,
}

pub struct MemTree {
	inner: RwLock<MemTreeInner>,
}

impl MemTree {
	fn new() -> Arc<MemTree> {
		Arc::new(MemTree {
			inner: RwLock::new(MemTreeInner::default()),
		})
	}
}

impl ITree for MemTree {
	fn get(&self, key: &[u8]) -> Result<Option<Value>> {
		Ok(self.inner.read().unwrap().map.get(key).cloned())
	}

	fn insert(&self, key: &[u8], value: &[u8]) -> Result<Option<Value>> {
		Ok(self
			.inner
			.write()
			.unwrap()
			.map
			.insert(key.to_vec(), value.to_vec()))
	}

	fn remove(&self, key: &[u8]) -> Result<Option<Value>> {
		Ok(self.inner.write().unwrap().map.remove(key))
	}

	fn len(&self) -> Result<usize> {
		Ok(self.inner.read().unwrap().map.len())
	}

	fn iter(&self) -> Result<ValueIter<'_>> {
		let snapshot: Vec<(Value, Value)> = self
			.inner
			.read()
			.unwrap()
			.map
			.iter()
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect();
		Ok(Box::new(snapshot.into_iter().map(Ok)))
	}

	fn range(&self, low: Bound<Value>, high: Bound<Value>) -> Result<ValueIter<'_>> {
		let snapshot: Vec<(Value, Value)> = self
			.inner
			.read()
			.unwrap()
			.map
			.range((low, high))
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect();
		Ok(Box::new(snapshot.into_iter().map(Ok)))
	}
}

/// An in-memory, process-local `Db`. Trees are created lazily on first
/// `open_tree` and persist only for the lifetime of this value.
#[derive(Default)]
pub struct MemDb {
	trees: RwLock<BTreeMap<String, Tree>>,
}

impl MemDb {
	pub fn new() -> MemDb {
		MemDb::default()
	}
}

impl Db for MemDb {
	fn open_tree(&self, name: &str) -> Result<Tree> {
		if let Some(tree) = self.trees.read().unwrap().get(name) {
			return Ok(tree.clone());
		}
		let mut trees = self.trees.write().unwrap();
		let tree = trees
			.entry(name.to_string())
			.or_insert_with(|| MemTree::new() as Tree)
			.clone();
		Ok(tree)
	}

	fn list_trees(&self) -> Result<Vec<String>> {
		Ok(self.trees.read().unwrap().keys().cloned().collect())
	}

	fn transaction(&self, f: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>) -> Result<()> {
		let mut tx = MemTransaction { undo_log: Vec::new() };
		let result = f(&mut tx);
		if result.is_err() {
			tx.rollback();
		}
		result
	}
}

enum UndoOp {
	/// Key did not exist before; remove it on rollback.
	Insert(Tree, Value),
	/// Key held `old_value` before; restore it on rollback.
	Overwrite(Tree, Value, Value),
	/// Key held `old_value` before a removal; restore it on rollback.
	Remove(Tree, Value, Value),
}

struct MemTransaction {
	undo_log: Vec<UndoOp>,
}

impl MemTransaction {
	fn rollback(&mut self) {
		for op in self.undo_log.drain(..).rev() {
			match op {
				UndoOp::Insert(tree, key) => {
					let _ = tree.remove(&key);
				}
				UndoOp::Overwrite(tree, key, old) => {
					let _ = tree.insert(&key, &old);
				}
				UndoOp::Remove(tree, key, old) => {
					let _ = tree.insert(&key, &old);
				}
			}
		}
	}
}

impl Transaction for MemTransaction {
	fn get(&self, tree: &Tree, key: &[u8]) -> Result<Option<Value>> {
		tree.get(key)
	}

	fn insert(&mut self, tree: &Tree, key: &[u8], value: &[u8]) -> Result<Option<Value>> {
		let previous = tree.insert(key, value)?;
		match &previous {
			Some(old) => self
				.undo_log
				.push(UndoOp::Overwrite(tree.clone(), key.to_vec(), old.clone())),
			None => self
				.undo_log
				.push(UndoOp::Insert(tree.clone(), key.to_vec())),
		}
		Ok(previous)
	}

	fn remove(&mut self, tree: &Tree, key: &[u8]) -> Result<Option<Value>> {
		let previous = tree.remove(key)?;
		if let Some(old) = &previous {
			self.undo_log
				.push(UndoOp::Remove(tree.clone(), key.to_vec(), old.clone()));
		}
		Ok(previous)
	}
}
