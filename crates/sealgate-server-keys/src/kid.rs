// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sealgate_crypto::encoding;
use uuid::Uuid;

/// Length of a generated kid: 16 bytes as unpadded base64url.
pub const KID_LEN: usize = 22;

/// A fresh random key identifier: a v4 UUID as unpadded base64url.
pub fn generate_kid() -> String {
	encoding::encode(Uuid::new_v4().as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	#[test]
	fn kids_are_compact_and_url_safe() {
		let kid = generate_kid();
		assert_eq!(kid.len(), KID_LEN);
		assert!(kid
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
	}

	#[test]
	fn kids_do_not_repeat() {
		let kids: HashSet<_> = (0..10_000).map(|_| generate_kid()).collect();
		assert_eq!(kids.len(), 10_000);
	}
}
