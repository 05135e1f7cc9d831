//! Streaming MD5 helpers.
//!
//! The PUT path (spec §4.1) computes the plaintext ETag and size in the same
//! pass that spools the body to scratch, instead of buffering the whole
//! object; this module provides the `AsyncRead` wrapper that makes that
//! possible, in the spirit of `garage_util::async_hash`'s `async_blake2sum`.

use std::pin::Pin;
use std::task::{Context, Poll};

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, ReadBuf};

/// Wraps an `AsyncRead`, transparently feeding every byte read through MD5.
/// After the wrapped reader reaches EOF, call `finalize()` to get the
/// lower-case hex digest and total byte count.
pub struct Md5Reader<R> {
	inner: R,
	hasher: Md5,
	size: u64,
}

impl<R: AsyncRead + Unpin> Md5Reader<R> {
	pub fn new(inner: R) -> Self {
		Self {
			inner,
			hasher: Md5::new(),
			size: 0,
		}
	}

	/// Number of bytes observed so far.
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Consume the reader and produce the lower-case hex MD5 plus total size.
	/// Should only be called once the underlying stream has been fully
	/// drained (i.e. after a `read` returned 0 bytes).
	pub fn finalize(self) -> (String, u64) {
		(hex::encode(self.hasher.finalize()), self.size)
	}
}

impl<R: AsyncRead + Unpin> AsyncRead for Md5Reader<R> {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<std::io::Result<()>> {
		let this = self.get_mut();
		let before = buf.filled().len();
		let res = Pin::new(&mut this.inner).poll_read(cx, buf);
		if let Poll::Ready(Ok(())) = &res {
			let filled = &buf.filled()[before..];
			this.hasher.update(filled);
			this.size += filled.len() as u64;
		}
		res
	}
}

/// Drain an `AsyncRead` to completion, returning `(size, lower-case hex md5)`.
/// Used by the Integrity Verifier (spec §4.5) to re-hash stored objects.
pub async fn hash_to_end<R: AsyncRead + Unpin>(reader: R) -> std::io::Result<(u64, String)> {
	use tokio::io::AsyncReadExt;

	let mut hasher = Md5Reader::new(reader);
	let mut buf = [0u8; 64 * 1024];
	loop {
		let n = hasher.read(&mut buf).await?;
		if n == 0 {
			break;
		}
	}
	let (hex, size) = hasher.finalize();
	Ok((size, hex))
}

/// One-shot MD5 of an in-memory buffer, lower-case hex.
pub fn md5_hex(data: &[u8]) -> String {
	let mut hasher = Md5::new();
	hasher.update(data);
	hex::encode(hasher.finalize())
}

/// A running MD5 hash fed chunk-by-chunk across several independent source
/// streams, for the Multipart Coordinator's part concatenation (spec §4.2
/// "Complete": "re-hash the combined stream to compute the composite
/// ETag"), where no single `AsyncRead` spans every part.
#[derive(Default)]
pub struct IncrementalMd5 {
	hasher: Md5,
	size: u64,
}

impl IncrementalMd5 {
	pub fn new() -> IncrementalMd5 {
		IncrementalMd5::default()
	}

	pub fn update(&mut self, chunk: &[u8]) {
		self.hasher.update(chunk);
		self.size += chunk.len() as u64;
	}

	pub fn finalize(self) -> (String, u64) {
		(hex::encode(self.hasher.finalize()), self.size)
	}
}
