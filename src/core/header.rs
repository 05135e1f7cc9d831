//! HTTP-like header bag and extraction (spec.md §4.1 PUT "Header extraction").

use std::collections::BTreeMap;

use maxiofs_model::object::DEFAULT_CONTENT_TYPE;

const META_PREFIX: &str = "x-amz-meta-";

/// Caller-supplied request headers. Only `Content-Type` and
/// `x-amz-meta-`-prefixed entries are meaningful to the Object Manager;
/// everything else is accepted here but ignored by [`HeaderBag::extract`].
#[derive(Debug, Clone, Default)]
pub struct HeaderBag(BTreeMap<String, String>);

impl HeaderBag {
	pub fn new() -> HeaderBag {
		HeaderBag::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
		self.0.insert(name.into(), value.into());
		self
	}

	/// "Only `Content-Type` and headers prefixed `x-amz-meta-` are captured;
	/// the meta prefix is stripped and the remainder lowercased. Default
	/// content-type is `application/octet-stream`." (spec.md §4.1)
	pub fn extract(&self) -> (String, BTreeMap<String, String>) {
		let mut content_type = None;
		let mut user_metadata = BTreeMap::new();
		for (name, value) in &self.0 {
			let lower = name.to_ascii_lowercase();
			if lower == "content-type" {
				content_type = Some(value.clone());
			} else if let Some(rest) = lower.strip_prefix(META_PREFIX) {
				user_metadata.insert(rest.to_string(), value.clone());
			}
		}
		(content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()), user_metadata)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_content_type_and_meta_headers_only() {
		let mut headers = HeaderBag::new();
		headers
			.insert("Content-Type", "text/plain")
			.insert("X-Amz-Meta-Author", "alice")
			.insert("X-Amz-Meta-Project", "maxiofs")
			.insert("X-Ignored", "nope");
		let (content_type, meta) = headers.extract();
		assert_eq!(content_type, "text/plain");
		assert_eq!(meta.get("author").map(String::as_str), Some("alice"));
		assert_eq!(meta.get("project").map(String::as_str), Some("maxiofs"));
		assert_eq!(meta.len(), 2);
	}

	#[test]
	fn defaults_content_type_when_absent() {
		let headers = HeaderBag::new();
		let (content_type, meta) = headers.extract();
		assert_eq!(content_type, DEFAULT_CONTENT_TYPE);
		assert!(meta.is_empty());
	}
}
