//! Error taxonomy shared across all MaxIOFS core crates.
//!
//! Variants are grouped the way spec §7 groups them (validation, not-found,
//! conflict/policy, capacity, integrity, internal) so callers can match on
//! kind rather than parse message strings.

use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
	// ---- validation ----
	#[error(display = "Invalid key: {}", _0)]
	InvalidKey(String),
	#[error(display = "Invalid retention configuration: {}", _0)]
	InvalidRetentionConfig(String),
	#[error(display = "Invalid legal hold configuration: {}", _0)]
	InvalidLegalHold(String),
	#[error(display = "Too many tags (max 10)")]
	TooManyTags,
	#[error(display = "Invalid part number {} (must be in [1, 10000])", _0)]
	InvalidPartNumber(u32),

	// ---- not found ----
	#[error(display = "No such object")]
	NoSuchObject,
	#[error(display = "No such version")]
	NoSuchVersion,
	#[error(display = "No such bucket")]
	NoSuchBucket,
	#[error(display = "No such upload")]
	NoSuchUpload,
	#[error(display = "No such part")]
	NoSuchPart,
	#[error(display = "No retention configuration set")]
	NoSuchRetention,

	// ---- conflict / policy ----
	#[error(display = "Object is under legal hold")]
	ObjectUnderLegalHold,
	#[error(display = "Object is locked by a COMPLIANCE retention until {}", _0)]
	ComplianceLocked(String),
	#[error(display = "Object is locked by a GOVERNANCE retention until {} (bypass required)", _0)]
	GovernanceLocked(String),
	#[error(display = "Cannot shorten or remove a COMPLIANCE retention")]
	CannotShortenCompliance,
	#[error(display = "Cannot shorten or remove a GOVERNANCE retention without admin bypass")]
	CannotShortenGovernance,
	#[error(display = "Insufficient permissions")]
	InsufficientPermissions,

	// ---- capacity ----
	#[error(display = "Tenant storage quota exceeded")]
	StorageQuotaExceeded,

	// ---- integrity (informational, not necessarily fatal) ----
	#[error(display = "Object is corrupted: {}", _0)]
	Corrupted(String),
	#[error(display = "Blob is missing")]
	Missing,
	#[error(display = "Composite ETag, integrity check skipped")]
	CompositeSkipped,

	// ---- internal ----
	#[error(display = "I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),
	#[error(display = "Metadata store error: {}", _0)]
	Db(String),
	#[error(display = "Blob store error: {}", _0)]
	Blob(String),
	#[error(display = "Encryption error: {}", _0)]
	Encryption(String),
	#[error(display = "{}", _0)]
	Message(String),
}

impl Error {
	pub fn message<M: Into<String>>(msg: M) -> Self {
		Error::Message(msg.into())
	}

	/// True for errors that should never trigger a compensating rollback
	/// retry loop (i.e. the request is simply wrong, not transiently failed).
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			Error::InvalidKey(_)
				| Error::InvalidRetentionConfig(_)
				| Error::InvalidLegalHold(_)
				| Error::TooManyTags
				| Error::InvalidPartNumber(_)
				| Error::NoSuchObject
				| Error::NoSuchVersion
				| Error::NoSuchBucket
				| Error::NoSuchUpload
				| Error::NoSuchPart
				| Error::NoSuchRetention
				| Error::ObjectUnderLegalHold
				| Error::ComplianceLocked(_)
				| Error::GovernanceLocked(_)
				| Error::CannotShortenCompliance
				| Error::CannotShortenGovernance
				| Error::InsufficientPermissions
				| Error::StorageQuotaExceeded
		)
	}
}

impl From<String> for Error {
	fn from(v: String) -> Error {
		Error::Message(v)
	}
}

impl From<&str> for Error {
	fn from(v: &str) -> Error {
		Error::Message(v.into())
	}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Helper trait mirrored on `Option`/`Result` to attach a message the way
/// the teacher's codebase does (`.ok_or_message("...")`).
pub trait OkOrMessage {
	type S;
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<Self::S>;
}

impl<S> OkOrMessage for Option<S> {
	type S = S;
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<S> {
		self.ok_or_else(|| Error::Message(message.into()))
	}
}

impl<S, E: std::fmt::Display> OkOrMessage for std::result::Result<S, E> {
	type S = S;
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<S> {
		self.map_err(|e| Error::Message(format!("{}: {}", message.into(), e)))
	}
}

/// Attach additional context to an error, preserving the original as the
/// message's tail (mirrors `garage_util::error::Error::err_context`).
pub trait ErrContext {
	type S;
	fn err_context<M: Into<String>>(self, context: M) -> Result<Self::S>;
}

impl<S, E: std::fmt::Display> ErrContext for std::result::Result<S, E> {
	type S = S;
	fn err_context<M: Into<String>>(self, context: M) -> Result<S> {
		self.map_err(|e| Error::Message(format!("{}: {}", context.into(), e)))
	}
}
