// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PEM encoding for RSA keys.
//!
//! Public keys are SPKI (`PUBLIC KEY`), private keys PKCS#8 (`PRIVATE KEY`),
//! both with 64-column LF-terminated base64 bodies. Decoding ignores the
//! armor lines and any whitespace, so a bare base64 DER body, a body with
//! CRLF line endings, or a key pasted onto a single line are all accepted.

use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::secret::SecretString;

pub fn encode_public_key(key: &RsaPublicKey) -> Result<String> {
	key.to_public_key_pem(LineEnding::LF)
		.map_err(|e| CryptoError::Encoding(format!("public key PEM encoding failed: {e}")))
}

pub fn encode_private_key(key: &RsaPrivateKey) -> Result<SecretString> {
	let pem = key
		.to_pkcs8_pem(LineEnding::LF)
		.map_err(|e| CryptoError::Encoding(format!("private key PEM encoding failed: {e}")))?;
	Ok(SecretString::new(pem.as_str().to_owned()))
}

pub fn decode_public_key(pem: &str) -> Result<RsaPublicKey> {
	let der = strip_armor(pem)?;
	RsaPublicKey::from_public_key_der(&der)
		.map_err(|e| CryptoError::Encoding(format!("invalid public key: {e}")))
}

pub fn decode_private_key(pem: &str) -> Result<RsaPrivateKey> {
	let der = Zeroizing::new(strip_armor(pem)?);
	RsaPrivateKey::from_pkcs8_der(&der)
		.map_err(|e| CryptoError::Encoding(format!("invalid private key: {e}")))
}

/// Drop `-----BEGIN ...-----`/`-----END ...-----` markers and whitespace, then
/// decode the remaining base64 body.
fn strip_armor(pem: &str) -> Result<Vec<u8>> {
	let mut body = String::with_capacity(pem.len());
	let mut rest = pem;
	while let Some(start) = rest.find("-----") {
		body.push_str(&rest[..start]);
		let after = &rest[start + 5..];
		let end = after
			.find("-----")
			.ok_or_else(|| CryptoError::Encoding("unterminated PEM marker".to_string()))?;
		rest = &after[end + 5..];
	}
	body.push_str(rest);
	body.retain(|c| !c.is_whitespace());

	if body.is_empty() {
		return Err(CryptoError::Encoding("empty PEM body".to_string()));
	}

	STANDARD
		.decode(body.as_bytes())
		.map_err(|e| CryptoError::Encoding(format!("invalid PEM body: {e}")))
}
