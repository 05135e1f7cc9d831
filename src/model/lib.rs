//! Core data model for the MaxIOFS object storage core (spec.md §2 items
//! 1, 2, 4; §3).
//!
//! This crate owns the shapes everything else agrees on — `Object`,
//! `ObjectVersion`, `MultipartUpload`, `Part`, retention/legal-hold/tag
//! configuration, bucket metadata — plus the Path & Key Codec, the Version
//! ID Generator (re-exported from `maxiofs_util::ids`, since it's a pure
//! primitive with no model-specific dependencies), the Metadata Adapter
//! (`row`), and the `MetadataStore` trait boundary onto `maxiofs_db`.

#[macro_use]
extern crate tracing;

pub mod bucket;
pub mod codec;
pub mod multipart;
pub mod object;
pub mod retention;
pub mod row;
pub mod search;
pub mod store;
pub mod tagging;
pub mod version;

pub use maxiofs_util::ids::{gen_upload_id, gen_version_id};
