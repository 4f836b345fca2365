// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RSA-OAEP key wrapping.
//!
//! OAEP uses SHA-256 for both the label hash and MGF1, matching the WebCrypto
//! `RSA-OAEP` / `SHA-256` parameters browsers use.

use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::aead::SessionKey;
use crate::error::{CryptoError, Result};

/// Wrap raw key bytes under `public_key`.
pub fn wrap_key(public_key: &RsaPublicKey, key: &[u8]) -> Result<Vec<u8>> {
	public_key
		.encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
		.map_err(|e| CryptoError::Wrap(format!("RSA-OAEP encryption failed: {e}")))
}

/// Unwrap key bytes with `private_key`.
///
/// Every failure is the same [`CryptoError::Unwrap`].
pub fn unwrap_key(private_key: &RsaPrivateKey, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
	private_key
		.decrypt(Oaep::new::<Sha256>(), wrapped)
		.map(Zeroizing::new)
		.map_err(|_| CryptoError::Unwrap)
}

/// Unwrap a 256-bit session key. A payload of any other length is an unwrap
/// failure, indistinguishable from a padding error.
pub fn unwrap_session_key(private_key: &RsaPrivateKey, wrapped: &[u8]) -> Result<SessionKey> {
	let raw = unwrap_key(private_key, wrapped)?;
	SessionKey::from_slice(&raw).map_err(|_| CryptoError::Unwrap)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::aead::generate_session_key;
	use crate::keypair::test_support::{other_keypair, shared_keypair};

	#[test]
	fn wrap_round_trip() {
		let keypair = shared_keypair();
		let key = generate_session_key();
		let wrapped = wrap_key(keypair.public_key(), key.expose()).unwrap();
		assert_eq!(wrapped.len(), 256);

		let unwrapped = unwrap_session_key(keypair.private_key(), &wrapped).unwrap();
		assert_eq!(unwrapped.expose(), key.expose());
	}

	#[test]
	fn wrapping_is_randomized() {
		let keypair = shared_keypair();
		let key = generate_session_key();
		let a = wrap_key(keypair.public_key(), key.expose()).unwrap();
		let b = wrap_key(keypair.public_key(), key.expose()).unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn mismatched_pair_fails_with_opaque_error() {
		let key = generate_session_key();
		let wrapped = wrap_key(shared_keypair().public_key(), key.expose()).unwrap();
		assert!(matches!(
			unwrap_session_key(other_keypair().private_key(), &wrapped),
			Err(CryptoError::Unwrap)
		));
	}

	#[test]
	fn tampered_wrap_fails() {
		let key = generate_session_key();
		let mut wrapped = wrap_key(shared_keypair().public_key(), key.expose()).unwrap();
		wrapped[17] ^= 0x01;
		assert!(matches!(
			unwrap_key(shared_keypair().private_key(), &wrapped),
			Err(CryptoError::Unwrap)
		));
	}

	#[test]
	fn wrong_length_payload_is_an_unwrap_failure() {
		let wrapped = wrap_key(shared_keypair().public_key(), &[9u8; 16]).unwrap();
		assert_eq!(
			unwrap_key(shared_keypair().private_key(), &wrapped).unwrap().len(),
			16
		);
		assert!(matches!(
			unwrap_session_key(shared_keypair().private_key(), &wrapped),
			Err(CryptoError::Unwrap)
		));
	}

	#[test]
	fn garbage_input_fails() {
		assert!(matches!(
			unwrap_key(shared_keypair().private_key(), b"short"),
			Err(CryptoError::Unwrap)
		));
	}
}
