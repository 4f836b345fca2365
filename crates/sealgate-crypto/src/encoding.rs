// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport-safe binary encoding for envelope fields.
//!
//! Everything this service emits is unpadded base64url. Decoding is lenient:
//! clients built on different platforms send the URL-safe or the standard
//! alphabet, with or without `=` padding, so both are accepted as long as a
//! single value does not mix alphabets.

use base64::{
	alphabet,
	engine::{general_purpose::URL_SAFE_NO_PAD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
	Engine,
};

use crate::error::{CryptoError, Result};

const LENIENT: GeneralPurposeConfig =
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
	URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url or standard base64, padded or not.
pub fn decode(value: &str) -> Result<Vec<u8>> {
	let value = value.trim();
	let url_safe = value.contains(['-', '_']);
	let standard = value.contains(['+', '/']);

	let engine = match (url_safe, standard) {
		(true, true) => {
			return Err(CryptoError::Encoding(
				"mixed base64 alphabets in one value".to_string(),
			))
		}
		(false, true) => &STANDARD_LENIENT,
		_ => &URL_SAFE_LENIENT,
	};

	engine
		.decode(value)
		.map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}

/// Decode a value that must be exactly `N` bytes long.
pub fn decode_array<const N: usize>(value: &str) -> Result<[u8; N]> {
	let bytes = decode(value)?;
	<[u8; N]>::try_from(bytes.as_slice())
		.map_err(|_| CryptoError::Encoding(format!("expected {N} bytes, got {}", bytes.len())))
}
