//! Object tag sets (spec.md §3 "TagSet": "ordered sequence of (key,value);
//! ≤10 entries").

use serde::{Deserialize, Serialize};

use maxiofs_util::error::{Error, Result};

pub const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet(Vec<(String, String)>);

impl TagSet {
	pub fn new() -> TagSet {
		TagSet::default()
	}

	pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<TagSet> {
		if pairs.len() > MAX_TAGS {
			return Err(Error::TooManyTags);
		}
		Ok(TagSet(pairs))
	}

	pub fn as_slice(&self) -> &[(String, String)] {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_more_than_ten_tags() {
		let pairs: Vec<(String, String)> = (0..11).map(|i| (format!("k{}", i), "v".into())).collect();
		assert!(matches!(TagSet::from_pairs(pairs), Err(Error::TooManyTags)));
	}

	#[test]
	fn accepts_exactly_ten_tags() {
		let pairs: Vec<(String, String)> = (0..10).map(|i| (format!("k{}", i), "v".into())).collect();
		assert!(TagSet::from_pairs(pairs).is_ok());
	}
}
