//! Server-side search filter applied at the KV layer before the delimiter
//! step (spec.md §4.1 "LIST / SEARCH": "Search variant applies an additional
//! filter (size range, content-type prefix matches, etc.)").

use crate::row::ObjectRow;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
	pub min_size: Option<u64>,
	pub max_size: Option<u64>,
	pub content_type_prefix: Option<String>,
}

impl SearchQuery {
	pub fn matches(&self, row: &ObjectRow) -> bool {
		if let Some(min) = self.min_size {
			if row.size < min {
				return false;
			}
		}
		if let Some(max) = self.max_size {
			if row.size > max {
				return false;
			}
		}
		if let Some(prefix) = &self.content_type_prefix {
			if !row.content_type.starts_with(prefix.as_str()) {
				return false;
			}
		}
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::object::Object;

	#[test]
	fn filters_by_size_range_and_content_type() {
		let mut obj = Object::new_implicit_folder("t1/b1", "k", None, 0);
		obj.size = 500;
		obj.content_type = "image/png".to_string();
		let row = ObjectRow::from(&obj);

		assert!(SearchQuery {
			min_size: Some(100),
			max_size: Some(1000),
			content_type_prefix: Some("image/".into()),
		}
		.matches(&row));

		assert!(!SearchQuery {
			min_size: Some(600),
			..Default::default()
		}
		.matches(&row));

		assert!(!SearchQuery {
			content_type_prefix: Some("video/".into()),
			..Default::default()
		}
		.matches(&row));
	}
}
