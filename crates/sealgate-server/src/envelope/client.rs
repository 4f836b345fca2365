// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The client half of the protocol: build a request envelope for a published
//! key and open the response envelope that comes back.

use sealgate_crypto::{aead, encoding, pem, wrap, SessionKey};

use super::replay::bind_replay_fields;
use super::wire::{RequestEnvelope, ResponseEnvelope};

/// A request envelope and the session key needed to open its response.
#[derive(Debug)]
pub struct SealedRequest {
	pub envelope: RequestEnvelope,
	pub session_key: SessionKey,
}

/// Wrap a fresh session key under `public_key_pem` and seal `plaintext`.
pub fn seal_request(
	kid: &str,
	public_key_pem: &str,
	plaintext: &[u8],
	aad: Option<&[u8]>,
) -> sealgate_crypto::Result<SealedRequest> {
	seal(kid, public_key_pem, plaintext, aad, None)
}

/// Like [`seal_request`], for servers with replay protection enabled.
///
/// `nonce` and `ts` travel in the clear and are authenticated through the
/// associated data, so the server rejects an envelope whose replay fields
/// were rewritten.
pub fn seal_request_with_replay(
	kid: &str,
	public_key_pem: &str,
	plaintext: &[u8],
	aad: Option<&[u8]>,
	nonce: &str,
	ts: i64,
) -> sealgate_crypto::Result<SealedRequest> {
	seal(kid, public_key_pem, plaintext, aad, Some((nonce, ts)))
}

fn seal(
	kid: &str,
	public_key_pem: &str,
	plaintext: &[u8],
	aad: Option<&[u8]>,
	replay: Option<(&str, i64)>,
) -> sealgate_crypto::Result<SealedRequest> {
	let public_key = pem::decode_public_key(public_key_pem)?;
	let session_key = aead::generate_session_key();

	let cek = wrap::wrap_key(&public_key, session_key.expose())?;
	let sealed = match replay {
		Some((nonce, ts)) => {
			let bound = bind_replay_fields(aad, nonce, ts);
			aead::seal(&session_key, plaintext, Some(bound.as_slice()))?
		}
		None => aead::seal(&session_key, plaintext, aad)?,
	};

	Ok(SealedRequest {
		envelope: RequestEnvelope {
			kid: kid.to_string(),
			cek: encoding::encode(cek),
			iv: encoding::encode(sealed.nonce),
			ct: encoding::encode(&sealed.ciphertext),
			aad: aad.map(|aad| encoding::encode(aad)),
			nonce: replay.map(|(nonce, _)| nonce.to_string()),
			ts: replay.map(|(_, ts)| ts),
		},
		session_key,
	})
}

/// Decrypt a response envelope with the session key of its request.
pub fn open_response(
	session_key: &SessionKey,
	envelope: &ResponseEnvelope,
) -> sealgate_crypto::Result<Vec<u8>> {
	let iv = encoding::decode(&envelope.iv)?;
	let ct = encoding::decode(&envelope.ct)?;
	let plaintext = aead::open(session_key, &iv, &ct, None)?;
	Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
	use super::*;
	use sealgate_crypto::{generate_keypair, CryptoError, KeyPair, MIN_RSA_BITS};
	use std::sync::OnceLock;

	fn keypair() -> &'static KeyPair {
		static KEYPAIR: OnceLock<KeyPair> = OnceLock::new();
		KEYPAIR.get_or_init(|| generate_keypair(MIN_RSA_BITS).unwrap())
	}

	#[test]
	fn sealed_request_opens_with_the_private_key() {
		let kp = keypair();
		let sealed = seal_request("K1", &kp.public_key_pem().unwrap(), b"{\"a\":1}", Some(b"ctx")).unwrap();
		let decoded = sealed.envelope.decode().unwrap();

		let key = wrap::unwrap_session_key(kp.private_key(), &decoded.cek).unwrap();
		assert_eq!(key.expose(), sealed.session_key.expose());

		let plaintext = aead::open(&key, &decoded.iv, &decoded.ct, decoded.aad.as_deref()).unwrap();
		assert_eq!(plaintext.as_slice(), b"{\"a\":1}");
	}

	#[test]
	fn replay_fields_are_sealed_into_the_associated_data() {
		let kp = keypair();
		let sealed = seal_request_with_replay(
			"K1",
			&kp.public_key_pem().unwrap(),
			b"{}",
			Some(b"ctx"),
			"n-1",
			1_700_000_000_000,
		)
		.unwrap();
		assert_eq!(sealed.envelope.nonce.as_deref(), Some("n-1"));
		assert_eq!(sealed.envelope.ts, Some(1_700_000_000_000));

		let decoded = sealed.envelope.decode().unwrap();
		let key = wrap::unwrap_session_key(kp.private_key(), &decoded.cek).unwrap();

		let bound = bind_replay_fields(Some(b"ctx"), "n-1", 1_700_000_000_000);
		assert!(aead::open(&key, &decoded.iv, &decoded.ct, Some(bound.as_slice())).is_ok());

		let rewritten = bind_replay_fields(Some(b"ctx"), "n-2", 1_700_000_000_000);
		assert!(aead::open(&key, &decoded.iv, &decoded.ct, Some(rewritten.as_slice())).is_err());
		assert!(aead::open(&key, &decoded.iv, &decoded.ct, Some(b"ctx")).is_err());
	}

	#[test]
	fn response_round_trip() {
		let key = aead::generate_session_key();
		let envelope = ResponseEnvelope::seal(&key, b"pong").unwrap();
		assert_eq!(open_response(&key, &envelope).unwrap(), b"pong");

		let other = aead::generate_session_key();
		assert!(matches!(
			open_response(&other, &envelope),
			Err(CryptoError::Authentication)
		));
	}
}
