// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sealgate_crypto::{generate_keypair, KeyPair, MIN_RSA_BITS};

/// Produces keypairs for rotation. Called on a blocking thread.
pub trait KeyGenerator: Send + Sync + 'static {
	fn generate(&self) -> sealgate_crypto::Result<KeyPair>;
}

/// Fresh RSA keys of a fixed modulus size.
#[derive(Debug, Clone, Copy)]
pub struct RsaKeyGenerator {
	bits: usize,
}

impl RsaKeyGenerator {
	pub fn new(bits: usize) -> Self {
		Self { bits }
	}
}

impl Default for RsaKeyGenerator {
	fn default() -> Self {
		Self::new(MIN_RSA_BITS)
	}
}

impl KeyGenerator for RsaKeyGenerator {
	fn generate(&self) -> sealgate_crypto::Result<KeyPair> {
		generate_keypair(self.bits)
	}
}

/// Hands out the same keypair on every call.
///
/// Records rotated with it still get distinct kids. Only meant for tests,
/// where generating RSA keys per rotation is too slow.
#[derive(Debug, Clone)]
pub struct StaticKeyGenerator {
	keypair: KeyPair,
}

impl StaticKeyGenerator {
	pub fn new(keypair: KeyPair) -> Self {
		Self { keypair }
	}
}

impl KeyGenerator for StaticKeyGenerator {
	fn generate(&self) -> sealgate_crypto::Result<KeyPair> {
		Ok(self.keypair.clone())
	}
}
