// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use sealgate_crypto::SessionKey;

/// Carries the negotiated session key from the request stage to the
/// response stage of one request.
///
/// The middleware owns one of these per request future and never shares it.
/// [`SessionKey`] zeroizes its bytes on drop, so the key is wiped on every
/// exit path, including early returns and cancellation of the future.
#[derive(Default)]
pub struct SessionKeyContext {
	key: Option<SessionKey>,
}

impl SessionKeyContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store the key, wiping any previous one.
	pub fn set(&mut self, key: SessionKey) {
		self.key = Some(key);
	}

	pub fn get(&self) -> Option<&SessionKey> {
		self.key.as_ref()
	}

	pub fn take(&mut self) -> Option<SessionKey> {
		self.key.take()
	}

	pub fn is_set(&self) -> bool {
		self.key.is_some()
	}

	pub fn clear(&mut self) {
		self.key = None;
	}
}

impl fmt::Debug for SessionKeyContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionKeyContext")
			.field("is_set", &self.is_set())
			.finish()
	}
}
