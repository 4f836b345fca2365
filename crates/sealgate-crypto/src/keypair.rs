// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RSA keypair generation.

use std::fmt;

use rand::rngs::OsRng;
use rsa::{traits::PublicKeyParts, RsaPrivateKey, RsaPublicKey};

use crate::error::{CryptoError, Result};
use crate::pem;
use crate::secret::{SecretString, REDACTED};

/// Smallest modulus accepted for wrapping keys.
pub const MIN_RSA_BITS: usize = 2048;

/// An RSA keypair used to wrap session keys.
#[derive(Clone)]
pub struct KeyPair {
	private: RsaPrivateKey,
	public: RsaPublicKey,
}

impl KeyPair {
	pub fn from_private_key(private: RsaPrivateKey) -> Self {
		let public = private.to_public_key();
		Self { private, public }
	}

	pub fn public_key(&self) -> &RsaPublicKey {
		&self.public
	}

	pub fn private_key(&self) -> &RsaPrivateKey {
		&self.private
	}

	/// Modulus size in bits.
	pub fn bits(&self) -> usize {
		self.public.size() * 8
	}

	/// SPKI `PUBLIC KEY` PEM.
	pub fn public_key_pem(&self) -> Result<String> {
		pem::encode_public_key(&self.public)
	}

	/// PKCS#8 `PRIVATE KEY` PEM.
	pub fn private_key_pem(&self) -> Result<SecretString> {
		pem::encode_private_key(&self.private)
	}
}

impl fmt::Debug for KeyPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyPair")
			.field("bits", &self.bits())
			.field("private", &REDACTED)
			.finish()
	}
}

/// Generate a fresh RSA keypair of `bits` bits.
///
/// This is CPU-heavy (hundreds of milliseconds for 2048 bits); async callers
/// should run it on a blocking thread.
pub fn generate_keypair(bits: usize) -> Result<KeyPair> {
	if bits < MIN_RSA_BITS {
		return Err(CryptoError::KeyGeneration(format!(
			"modulus of {bits} bits is below the minimum of {MIN_RSA_BITS}"
		)));
	}

	let private = RsaPrivateKey::new(&mut OsRng, bits)
		.map_err(|e| CryptoError::KeyGeneration(format!("RSA key generation failed: {e}")))?;

	tracing::debug!(bits, "generated RSA keypair");
	Ok(KeyPair::from_private_key(private))
}
