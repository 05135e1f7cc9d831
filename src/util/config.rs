//! Process-wide configuration, in the manner of `garage_util::config::Config`:
//! a plain `serde`-deserializable struct loaded from a TOML file on disk.
//!
//! This is distinct from the *bucket-level* configuration (versioning,
//! encryption-required, default retention) that spec §6 treats as an
//! externally-owned interface; this struct only covers the defaults this
//! process itself needs to boot: where to spool uploads, how encryption keys
//! are sourced, and the scan/part-size limits the Object Manager and
//! Multipart Coordinator fall back to when a caller doesn't specify one.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ErrContext, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Directory used to spool request bodies while computing their ETag
	/// before handing them to the blob store (spec §4.1).
	#[serde(default = "default_scratch_dir")]
	pub scratch_dir: PathBuf,

	#[serde(default)]
	pub encryption: EncryptionConfig,

	#[serde(default)]
	pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionConfig {
	/// Whether objects are encrypted at rest by default when a bucket does
	/// not specify its own policy.
	#[serde(default)]
	pub enabled: bool,

	/// Base64-encoded 256-bit master key. Mutually exclusive with sourcing a
	/// key from an injected `MasterKeyProvider` (spec §5.3) at runtime; this
	/// field only covers the simple single-key deployment case.
	pub master_key_base64: Option<String>,
}

impl Default for EncryptionConfig {
	fn default() -> Self {
		EncryptionConfig {
			enabled: false,
			master_key_base64: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
	/// Default page size for LIST/SEARCH when the caller does not specify
	/// one (spec §4.1, "List objects").
	#[serde(default = "default_list_page_size")]
	pub default_list_page_size: u32,

	/// Multipart part size bounds, in bytes (spec §4.2).
	#[serde(default = "default_min_part_size")]
	pub min_part_size: u64,
	#[serde(default = "default_max_part_size")]
	pub max_part_size: u64,
	#[serde(default = "default_max_parts")]
	pub max_parts: u32,
}

impl Default for LimitsConfig {
	fn default() -> Self {
		LimitsConfig {
			default_list_page_size: default_list_page_size(),
			min_part_size: default_min_part_size(),
			max_part_size: default_max_part_size(),
			max_parts: default_max_parts(),
		}
	}
}

fn default_scratch_dir() -> PathBuf {
	PathBuf::from("/tmp/maxiofs/scratch")
}

fn default_list_page_size() -> u32 {
	1000
}

fn default_min_part_size() -> u64 {
	5 * 1024 * 1024
}

fn default_max_part_size() -> u64 {
	5 * 1024 * 1024 * 1024
}

fn default_max_parts() -> u32 {
	10_000
}

impl Config {
	/// Parse a `Config` from an already-loaded TOML string.
	pub fn parse_toml(data: &str) -> Result<Config> {
		toml::from_str(data).err_context("invalid configuration")
	}

	/// Read and parse a `Config` from a file on disk.
	pub fn load(path: impl AsRef<Path>) -> Result<Config> {
		let data = std::fs::read_to_string(path.as_ref()).err_context(format!(
			"failed to read config file {}",
			path.as_ref().display()
		))?;
		Self::parse_toml(&data)
	}
}
