//! Streaming authenticated encryption for the MaxIOFS object storage core
//! (spec.md §2 item 3, §4.1 "Encryption decision", §5.3 of `SPEC_FULL.md`).
//!
//! Objects are encrypted (when enabled) in fixed-size framed chunks, each
//! independently authenticated with AES-256-GCM, the way the teacher's block
//! manager frames blocks for transport rather than treating the whole object
//! as a single AEAD message — this bounds memory and lets decryption start
//! before the tail of the object has arrived. Each chunk's nonce is a random
//! per-object 4-byte base plus a big-endian chunk counter, so chunk order is
//! bound into the nonce and reordering an attacker-observed stream fails
//! authentication.

#[macro_use]
extern crate tracing;

use std::convert::TryInto;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use zeroize::Zeroize;

use maxiofs_util::cancel::CancellationToken;

pub type BoxAsyncRead = std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send>>;

/// Plaintext bytes per authenticated frame. Chosen to match the blob store's
/// natural I/O granularity (spec.md §5: "long streams are broken into
/// producer/consumer pairs").
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Algorithm tag recorded in blob metadata (spec.md §6, "encryption marker
/// keys in blob metadata").
pub const ALGORITHM_TAG: &str = "AES256-GCM";

#[derive(Debug, err_derive::Error)]
pub enum Error {
	#[error(display = "encryption failed: {}", _0)]
	Encrypt(String),
	#[error(display = "decryption failed (ciphertext may be corrupt or truncated): {}", _0)]
	Decrypt(String),
	#[error(display = "invalid master key: {}", _0)]
	InvalidKey(String),
	#[error(display = "I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),
}

impl From<Error> for maxiofs_util::error::Error {
	fn from(e: Error) -> Self {
		maxiofs_util::error::Error::Encryption(e.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// Seam for sourcing the process-wide master key. The simple deployment case
/// (`StaticMasterKeyProvider`) reads a base64 key from config; a future KMS
/// integration would implement this trait without touching the rest of the
/// crate (spec.md §9 discipline: don't guess the integration, leave the
/// seam as a trait).
pub trait MasterKeyProvider: Send + Sync {
	fn master_key(&self) -> &[u8; 32];
}

/// A 256-bit key held in memory for the lifetime of the process, zeroized on
/// drop. Either loaded from config or freshly generated at boot.
pub struct StaticMasterKeyProvider([u8; 32]);

impl StaticMasterKeyProvider {
	pub fn from_base64(encoded: &str) -> Result<StaticMasterKeyProvider> {
		let bytes = base64::engine::general_purpose::STANDARD
			.decode(encoded)
			.map_err(|e| Error::InvalidKey(format!("not valid base64: {}", e)))?;
		let key: [u8; 32] = bytes
			.try_into()
			.map_err(|v: Vec<u8>| Error::InvalidKey(format!("expected 32 bytes, got {}", v.len())))?;
		Ok(StaticMasterKeyProvider(key))
	}

	/// Generate a fresh random key. Useful for tests and single-node
	/// bring-up where no key has been provisioned yet.
	pub fn generate() -> StaticMasterKeyProvider {
		let mut key = [0u8; 32];
		rand::thread_rng().fill_bytes(&mut key);
		StaticMasterKeyProvider(key)
	}
}

impl Drop for StaticMasterKeyProvider {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

impl MasterKeyProvider for StaticMasterKeyProvider {
	fn master_key(&self) -> &[u8; 32] {
		&self.0
	}
}

/// Process-wide key manager (spec.md §5, "Shared resources": "the master
/// encryption key is held in a process-wide key manager; read-only after
/// initialization"). Downstream services hold only an `Arc` and read
/// references, never a mutable one.
pub struct MasterKeyManager {
	provider: Box<dyn MasterKeyProvider>,
}

impl MasterKeyManager {
	pub fn new(provider: Box<dyn MasterKeyProvider>) -> MasterKeyManager {
		MasterKeyManager { provider }
	}

	pub fn key(&self) -> &[u8; 32] {
		self.provider.master_key()
	}
}

/// Header carried in blob metadata alongside an encrypted object (spec.md
/// §6): the nonce base plus the algorithm tag. `original_size`/`original_etag`
/// are filled in by the caller (the Object Manager), since the service
/// itself only ever sees ciphertext framing, not the plaintext digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
	pub algorithm: String,
	pub nonce_base_b64: String,
}

fn build_nonce(base: [u8; 4], counter: u64) -> [u8; 12] {
	let mut nonce = [0u8; 12];
	nonce[..4].copy_from_slice(&base);
	nonce[4..].copy_from_slice(&counter.to_be_bytes());
	nonce
}

/// Authenticated streaming encrypt/decrypt bound to the process master key
/// (spec.md §2 item 3).
pub struct EncryptionService {
	keys: std::sync::Arc<MasterKeyManager>,
}

impl EncryptionService {
	pub fn new(keys: std::sync::Arc<MasterKeyManager>) -> EncryptionService {
		EncryptionService { keys }
	}

	/// Wraps `plain` in an encrypting adapter: reading from the returned
	/// stream yields the framed ciphertext. The nonce base is generated
	/// immediately (it doesn't depend on content) so it can be recorded in
	/// blob metadata by the caller before the stream is fully drained.
	pub fn encrypt_stream(
		&self,
		mut plain: BoxAsyncRead,
		cancel: CancellationToken,
	) -> (BoxAsyncRead, EncryptionHeader) {
		let mut nonce_base = [0u8; 4];
		rand::thread_rng().fill_bytes(&mut nonce_base);
		let header = EncryptionHeader {
			algorithm: ALGORITHM_TAG.to_string(),
			nonce_base_b64: base64::engine::general_purpose::STANDARD.encode(nonce_base),
		};

		let key = *self.keys.key();
		let (mut tx, rx) = tokio::io::duplex(CHUNK_SIZE * 2);

		tokio::spawn(async move {
			let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
			let mut counter: u64 = 0;
			let mut buf = vec![0u8; CHUNK_SIZE];
			let mut cancel = cancel;
			loop {
				if cancel.is_cancelled() {
					debug!("encrypt_stream: cancelled, stopping producer");
					break;
				}
				let n = match plain.read(&mut buf).await {
					Ok(0) => break,
					Ok(n) => n,
					Err(e) => {
						warn!("encrypt_stream: read from plaintext source failed: {}", e);
						break;
					}
				};
				let nonce = build_nonce(nonce_base, counter);
				let ciphertext = match cipher.encrypt(Nonce::from_slice(&nonce), &buf[..n]) {
					Ok(c) => c,
					Err(e) => {
						error!("encrypt_stream: AEAD seal failed: {}", e);
						break;
					}
				};
				counter += 1;
				let len_prefix = (ciphertext.len() as u32).to_le_bytes();
				if tx.write_all(&len_prefix).await.is_err() {
					// Consumer dropped the pipe; nothing left to authenticate against.
					break;
				}
				if tx.write_all(&ciphertext).await.is_err() {
					break;
				}
			}
			let _ = tx.shutdown().await;
		});

		(Box::pin(rx), header)
	}

	/// Wraps `cipher` in a decrypting adapter, verifying each frame's AEAD
	/// tag before releasing its plaintext. Runs the decode loop on a
	/// background task joined to the returned pipe, per spec.md §4.1 ("a
	/// background producer wired to the request's cancellation signal so
	/// that an abandoned reader terminates the producer deterministically").
	pub fn decrypt_stream(
		&self,
		mut cipher_reader: BoxAsyncRead,
		header: EncryptionHeader,
		cancel: CancellationToken,
	) -> Result<BoxAsyncRead> {
		let nonce_base: [u8; 4] = base64::engine::general_purpose::STANDARD
			.decode(&header.nonce_base_b64)
			.map_err(|e| Error::InvalidKey(format!("bad nonce base: {}", e)))?
			.try_into()
			.map_err(|_| Error::InvalidKey("nonce base must be 4 bytes".into()))?;
		if header.algorithm != ALGORITHM_TAG {
			return Err(Error::Decrypt(format!(
				"unsupported algorithm tag: {}",
				header.algorithm
			)));
		}

		let key = *self.keys.key();
		let (mut tx, rx) = tokio::io::duplex(CHUNK_SIZE * 2);

		tokio::spawn(async move {
			let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
			let mut counter: u64 = 0;
			let mut cancel = cancel;
			loop {
				if cancel.is_cancelled() {
					debug!("decrypt_stream: cancelled, stopping producer");
					break;
				}
				let mut len_buf = [0u8; 4];
				match cipher_reader.read_exact(&mut len_buf).await {
					Ok(()) => {}
					Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
					Err(e) => {
						warn!("decrypt_stream: failed reading frame length: {}", e);
						break;
					}
				}
				let frame_len = u32::from_le_bytes(len_buf) as usize;
				let mut frame = vec![0u8; frame_len];
				if let Err(e) = cipher_reader.read_exact(&mut frame).await {
					warn!("decrypt_stream: truncated frame: {}", e);
					break;
				}
				let nonce = build_nonce(nonce_base, counter);
				let plaintext = match cipher.decrypt(Nonce::from_slice(&nonce), frame.as_slice()) {
					Ok(p) => p,
					Err(e) => {
						error!("decrypt_stream: AEAD verification failed: {}", e);
						break;
					}
				};
				counter += 1;
				// A closed pipe here means the consumer went away (spec.md
				// §4.1: "closed-pipe errors ... must be swallowed").
				if tx.write_all(&plaintext).await.is_err() {
					break;
				}
			}
			let _ = tx.shutdown().await;
		});

		Ok(Box::pin(rx))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	fn service() -> EncryptionService {
		let keys = Arc::new(MasterKeyManager::new(Box::new(StaticMasterKeyProvider::generate())));
		EncryptionService::new(keys)
	}

	async fn drain(mut r: BoxAsyncRead) -> Vec<u8> {
		let mut buf = Vec::new();
		r.read_to_end(&mut buf).await.unwrap();
		buf
	}

	#[tokio::test]
	async fn roundtrip_small_payload() {
		let svc = service();
		let plain: BoxAsyncRead = Box::pin(std::io::Cursor::new(b"hello, maxiofs".to_vec()));
		let (cipher, header) = svc.encrypt_stream(plain, CancellationToken::never());
		let cipher_bytes = drain(cipher).await;
		assert_ne!(cipher_bytes, b"hello, maxiofs".to_vec());

		let decrypted = svc
			.decrypt_stream(
				Box::pin(std::io::Cursor::new(cipher_bytes)),
				header,
				CancellationToken::never(),
			)
			.unwrap();
		let out = drain(decrypted).await;
		assert_eq!(out, b"hello, maxiofs".to_vec());
	}

	#[tokio::test]
	async fn roundtrip_spans_multiple_chunks() {
		let svc = service();
		let data = vec![0x42u8; CHUNK_SIZE * 3 + 17];
		let plain: BoxAsyncRead = Box::pin(std::io::Cursor::new(data.clone()));
		let (cipher, header) = svc.encrypt_stream(plain, CancellationToken::never());
		let cipher_bytes = drain(cipher).await;

		let decrypted = svc
			.decrypt_stream(
				Box::pin(std::io::Cursor::new(cipher_bytes)),
				header,
				CancellationToken::never(),
			)
			.unwrap();
		let out = drain(decrypted).await;
		assert_eq!(out, data);
	}

	#[tokio::test]
	async fn tampered_ciphertext_fails_to_decrypt() {
		let svc = service();
		let plain: BoxAsyncRead = Box::pin(std::io::Cursor::new(b"authenticate me".to_vec()));
		let (cipher, header) = svc.encrypt_stream(plain, CancellationToken::never());
		let mut cipher_bytes = drain(cipher).await;
		let last = cipher_bytes.len() - 1;
		cipher_bytes[last] ^= 0xFF;

		let decrypted = svc
			.decrypt_stream(
				Box::pin(std::io::Cursor::new(cipher_bytes)),
				header,
				CancellationToken::never(),
			)
			.unwrap();
		let out = drain(decrypted).await;
		// AEAD failure breaks the producer loop; the consumer simply sees
		// a short (here, empty) read rather than an error propagated
		// through the pipe.
		assert!(out.is_empty());
	}

	#[tokio::test]
	async fn from_base64_rejects_wrong_length() {
		let err = StaticMasterKeyProvider::from_base64("dG9vc2hvcnQ=").unwrap_err();
		assert!(matches!(err, Error::InvalidKey(_)));
	}
}
