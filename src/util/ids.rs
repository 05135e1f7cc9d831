//! Identifier generation: multipart upload ids and object version ids.
//!
//! Mirrors the role `garage_util::data::gen_uuid` plays in the teacher crate,
//! but follows the formats spec §6 actually calls for rather than a UUIDv4.

use rand::RngCore;

use crate::time::now_nsec;

/// `<unix-nanoseconds>.<8-hex-chars-of-random>`; degrades to just the
/// nanosecond timestamp if the OS RNG fails (spec §6, "Version ID format").
pub fn gen_version_id() -> String {
	let nsec = now_nsec();
	match gen_random_hex(4) {
		Some(hex) => format!("{}.{}", nsec, hex),
		None => format!("{}", nsec),
	}
}

/// 128-bit hex multipart upload id (spec §4.2, "Generate a 128-bit hex upload-id").
pub fn gen_upload_id() -> String {
	let mut buf = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut buf);
	hex::encode(buf)
}

fn gen_random_hex(n_bytes: usize) -> Option<String> {
	let mut buf = vec![0u8; n_bytes];
	rand::thread_rng().try_fill_bytes(&mut buf).ok()?;
	Some(hex::encode(buf))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn version_ids_are_unique_and_well_formed() {
		let a = gen_version_id();
		let b = gen_version_id();
		assert_ne!(a, b);
		let parts: Vec<&str> = a.split('.').collect();
		assert_eq!(parts.len(), 2);
		assert_eq!(parts[1].len(), 8);
		assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn upload_ids_are_32_hex_chars() {
		let id = gen_upload_id();
		assert_eq!(id.len(), 32);
		assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
	}
}
