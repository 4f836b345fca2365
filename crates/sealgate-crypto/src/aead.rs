// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-GCM payload encryption.
//!
//! The tag is 128 bits and appended to the ciphertext, the nonce is 96 bits.
//! [`seal`] always draws its own nonce: there is no public way to encrypt
//! under a caller-chosen nonce, so a session key can never be reused with a
//! repeated nonce by this crate.

use std::fmt;

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng, Payload},
	Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::secret::REDACTED;

/// Session key size in bytes (256 bits for AES-256).
pub const SESSION_KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// A symmetric key negotiated for a single request.
///
/// Zeroized on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct SessionKey(Zeroizing<[u8; SESSION_KEY_SIZE]>);

impl SessionKey {
	/// Build a session key from raw bytes, checking the length.
	pub fn from_slice(bytes: &[u8]) -> Result<Self> {
		if bytes.len() != SESSION_KEY_SIZE {
			return Err(CryptoError::InvalidKeySize {
				expected: SESSION_KEY_SIZE,
				actual: bytes.len(),
			});
		}
		let mut key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
		key.copy_from_slice(bytes);
		Ok(Self(key))
	}

	pub fn expose(&self) -> &[u8; SESSION_KEY_SIZE] {
		&self.0
	}

	fn cipher(&self) -> Aes256Gcm {
		Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.0.as_slice()))
	}
}

impl fmt::Debug for SessionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SessionKey").field(&REDACTED).finish()
	}
}

/// Ciphertext (tag appended) together with the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
	pub nonce: [u8; NONCE_SIZE],
	pub ciphertext: Vec<u8>,
}

/// Generate a fresh random session key.
pub fn generate_session_key() -> SessionKey {
	let mut key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	SessionKey(key)
}

/// Generate a random 96-bit nonce.
///
/// At 2^32 encryptions under one key the collision probability of random
/// nonces reaches 2^-32. Session keys live for one request, far below that.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
	let mut nonce = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce);
	nonce
}

/// Encrypt `plaintext` under `key` with a freshly generated nonce.
pub fn seal(key: &SessionKey, plaintext: &[u8], aad: Option<&[u8]>) -> Result<SealedPayload> {
	let nonce = generate_nonce();
	let ciphertext = key
		.cipher()
		.encrypt(
			Nonce::from_slice(&nonce),
			Payload {
				msg: plaintext,
				aad: aad.unwrap_or_default(),
			},
		)
		.map_err(|e| CryptoError::Encryption(format!("payload encryption failed: {e}")))?;

	Ok(SealedPayload { nonce, ciphertext })
}

/// Decrypt and authenticate `ciphertext` (tag appended).
///
/// Any tag mismatch, including one caused by a wrong nonce or wrong
/// associated data, is reported as [`CryptoError::Authentication`] and no
/// plaintext is returned.
pub fn open(
	key: &SessionKey,
	nonce: &[u8],
	ciphertext: &[u8],
	aad: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>> {
	if nonce.len() != NONCE_SIZE {
		return Err(CryptoError::InvalidNonceSize {
			expected: NONCE_SIZE,
			actual: nonce.len(),
		});
	}

	let plaintext = key
		.cipher()
		.decrypt(
			Nonce::from_slice(nonce),
			Payload {
				msg: ciphertext,
				aad: aad.unwrap_or_default(),
			},
		)
		.map_err(|_| CryptoError::Authentication)?;

	Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::HashSet;

	#[test]
	fn session_keys_are_unique() {
		let a = generate_session_key();
		let b = generate_session_key();
		assert_ne!(a.expose(), b.expose());
	}

	#[test]
	fn session_key_debug_is_redacted() {
		let key = SessionKey::from_slice(&[0x41; SESSION_KEY_SIZE]).unwrap();
		let debug = format!("{key:?}");
		assert!(debug.contains(REDACTED));
		assert!(!debug.contains("65"));
	}

	#[test]
	fn session_key_rejects_wrong_length() {
		assert!(matches!(
			SessionKey::from_slice(&[0u8; 16]),
			Err(CryptoError::InvalidKeySize {
				expected: 32,
				actual: 16
			})
		));
	}

	#[test]
	fn ciphertext_carries_tag() {
		let key = generate_session_key();
		let sealed = seal(&key, b"hello", None).unwrap();
		assert_eq!(sealed.ciphertext.len(), 5 + TAG_SIZE);
	}

	#[test]
	fn empty_plaintext_round_trips() {
		let key = generate_session_key();
		let sealed = seal(&key, b"", None).unwrap();
		let opened = open(&key, &sealed.nonce, &sealed.ciphertext, None).unwrap();
		assert!(opened.is_empty());
	}

	#[test]
	fn wrong_key_fails_authentication() {
		let key = generate_session_key();
		let other = generate_session_key();
		let sealed = seal(&key, b"payload", None).unwrap();
		assert!(matches!(
			open(&other, &sealed.nonce, &sealed.ciphertext, None),
			Err(CryptoError::Authentication)
		));
	}

	#[test]
	fn missing_aad_fails_authentication() {
		let key = generate_session_key();
		let sealed = seal(&key, b"payload", Some(b"context")).unwrap();
		assert!(matches!(
			open(&key, &sealed.nonce, &sealed.ciphertext, None),
			Err(CryptoError::Authentication)
		));
	}

	#[test]
	fn short_nonce_is_rejected_before_decrypting() {
		let key = generate_session_key();
		let sealed = seal(&key, b"payload", None).unwrap();
		assert!(matches!(
			open(&key, &sealed.nonce[..8], &sealed.ciphertext, None),
			Err(CryptoError::InvalidNonceSize { .. })
		));
	}

	#[test]
	fn truncated_ciphertext_fails() {
		let key = generate_session_key();
		assert!(matches!(
			open(&key, &[0u8; NONCE_SIZE], &[1, 2, 3], None),
			Err(CryptoError::Authentication)
		));
	}

	#[test]
	fn nonces_do_not_repeat_under_load() {
		let key = generate_session_key();
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let key = key.clone();
				std::thread::spawn(move || {
					(0..2_000)
						.map(|_| seal(&key, b"x", None).unwrap().nonce)
						.collect::<Vec<_>>()
				})
			})
			.collect();

		let mut seen = HashSet::new();
		for handle in handles {
			for nonce in handle.join().unwrap() {
				assert!(seen.insert(nonce), "nonce repeated");
			}
		}
		assert_eq!(seen.len(), 16_000);
	}

	proptest! {
		#[test]
		fn round_trip(
			plaintext in proptest::collection::vec(any::<u8>(), 0..1024),
			aad in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..64)),
		) {
			let key = generate_session_key();
			let sealed = seal(&key, &plaintext, aad.as_deref()).unwrap();
			let opened = open(&key, &sealed.nonce, &sealed.ciphertext, aad.as_deref()).unwrap();
			prop_assert_eq!(opened.as_slice(), plaintext.as_slice());
		}

		#[test]
		fn flipping_any_ciphertext_bit_fails(
			plaintext in proptest::collection::vec(any::<u8>(), 1..256),
			bit in any::<usize>(),
		) {
			let key = generate_session_key();
			let mut sealed = seal(&key, &plaintext, None).unwrap();
			let bit = bit % (sealed.ciphertext.len() * 8);
			sealed.ciphertext[bit / 8] ^= 1 << (bit % 8);
			prop_assert!(matches!(
				open(&key, &sealed.nonce, &sealed.ciphertext, None),
				Err(CryptoError::Authentication)
			));
		}

		#[test]
		fn flipping_any_nonce_bit_fails(bit in 0usize..(NONCE_SIZE * 8)) {
			let key = generate_session_key();
			let mut sealed = seal(&key, b"{\"hello\":\"world\"}", None).unwrap();
			sealed.nonce[bit / 8] ^= 1 << (bit % 8);
			prop_assert!(open(&key, &sealed.nonce, &sealed.ciphertext, None).is_err());
		}

		#[test]
		fn flipping_any_aad_bit_fails(
			aad in proptest::collection::vec(any::<u8>(), 1..64),
			bit in any::<usize>(),
		) {
			let key = generate_session_key();
			let sealed = seal(&key, b"payload", Some(&aad)).unwrap();
			let mut tampered = aad.clone();
			let bit = bit % (tampered.len() * 8);
			tampered[bit / 8] ^= 1 << (bit % 8);
			prop_assert!(open(&key, &sealed.nonce, &sealed.ciphertext, Some(&tampered)).is_err());
		}
	}
}
