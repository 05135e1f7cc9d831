//! The heart of the MaxIOFS object storage core (spec.md §2 items 6-9):
//! the Object Manager (put/get/delete/list/search, plus the supplemental
//! head/tagging/legal-hold/retention admin operations), the Multipart
//! Coordinator, the Object Lock Evaluator, the Retention Policy Manager, and
//! the Integrity Verifier.
//!
//! Everything here is written against trait boundaries
//! (`maxiofs_model::MetadataStore`, `maxiofs_block::BlobStore`,
//! `maxiofs_model::BucketDirectory`, `MetricCallbacks`) so the whole crate
//! runs against the in-memory reference adapters in tests, with no real I/O.

#[macro_use]
extern crate tracing;

pub mod header;
pub mod integrity;
pub mod lock;
pub mod metric_callbacks;
pub mod metrics;
pub mod multipart;
pub mod object_manager;
pub mod retention_policy;

pub use header::HeaderBag;
pub use integrity::{BucketIntegrityReport, IntegrityReport, IntegrityStatus, IntegrityVerifier};
pub use lock::LockEvaluator;
pub use metric_callbacks::MetricCallbacks;
pub use multipart::MultipartUploadPage;
pub use object_manager::{CommonPrefixes, DeleteOutcome, ListOutcome, ObjectManager};
pub use retention_policy::{ComplianceReport, ComplianceStatus, ObjectComplianceEntry, RetentionPolicyManager, RetentionSummary};

pub use maxiofs_util::error::{Error, Result};
