// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Optional anti-replay enforcement on the envelope `nonce` and `ts` fields.
//!
//! A request is fresh when its timestamp lies within the window of server time
//! and its `(kid, nonce)` pair has not been accepted before. While the guard is
//! enabled, `nonce` and `ts` are folded into the associated data checked by
//! AES-GCM (see [`bind_replay_fields`]), so rewriting either field on a
//! captured envelope fails authentication. Pairs are only recorded after the
//! payload authenticated, so forged envelopes cannot burn nonces of legitimate
//! clients.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sealgate_server_keys::{Clock, SystemClock};
use tracing::warn;

use super::error::EnvelopeError;

const MAX_NONCE_LEN: usize = 128;
const BINDING_LABEL: &[u8] = b"sealgate-replay-v1";

/// Associated data that authenticates the replay fields along with the
/// client's own `aad`.
///
/// Every part is length-prefixed so no two `(aad, nonce, ts)` triples share
/// an encoding.
pub fn bind_replay_fields(aad: Option<&[u8]>, nonce: &str, ts: i64) -> Vec<u8> {
	let aad = aad.unwrap_or_default();
	let mut bound = Vec::with_capacity(BINDING_LABEL.len() + aad.len() + nonce.len() + 24);
	bound.extend_from_slice(BINDING_LABEL);
	bound.extend_from_slice(&(aad.len() as u64).to_be_bytes());
	bound.extend_from_slice(aad);
	bound.extend_from_slice(&(nonce.len() as u64).to_be_bytes());
	bound.extend_from_slice(nonce.as_bytes());
	bound.extend_from_slice(&ts.to_be_bytes());
	bound
}

pub struct ReplayGuard {
	window_ms: i64,
	max_entries: usize,
	clock: Arc<dyn Clock>,
	seen: Mutex<SeenNonces>,
}

#[derive(Default)]
struct SeenNonces {
	expiries: HashMap<(String, String), i64>,
	order: VecDeque<(i64, (String, String))>,
}

impl ReplayGuard {
	pub fn new(window: Duration, max_entries: usize) -> Self {
		Self {
			window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
			max_entries: max_entries.max(1),
			clock: Arc::new(SystemClock),
			seen: Mutex::new(SeenNonces::default()),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	fn now_ms(&self) -> i64 {
		self.clock.now().timestamp_millis()
	}

	/// Reject envelopes without replay fields or with a stale timestamp.
	pub fn check_fresh(&self, nonce: Option<&str>, ts: Option<i64>) -> Result<(), EnvelopeError> {
		let nonce = nonce.filter(|n| !n.is_empty()).ok_or(EnvelopeError::Replay("missing nonce"))?;
		if nonce.len() > MAX_NONCE_LEN {
			return Err(EnvelopeError::Replay("nonce too long"));
		}
		let ts = ts.ok_or(EnvelopeError::Replay("missing timestamp"))?;
		if (self.now_ms() - ts).abs() > self.window_ms {
			return Err(EnvelopeError::Replay("timestamp outside window"));
		}
		Ok(())
	}

	/// Remember an accepted `(kid, nonce)` pair, failing if it was seen
	/// before.
	pub fn record(&self, kid: &str, nonce: &str, ts: i64) -> Result<(), EnvelopeError> {
		let now = self.now_ms();
		let key = (kid.to_string(), nonce.to_string());
		let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

		seen.prune(now);

		if let Some(expiry) = seen.expiries.get(&key) {
			if *expiry > now {
				return Err(EnvelopeError::Replay("nonce reused"));
			}
		}

		if seen.expiries.len() >= self.max_entries {
			warn!(
				max_entries = self.max_entries,
				"replay cache full, evicting oldest nonce"
			);
			seen.evict_oldest();
		}

		let expiry = ts.saturating_add(self.window_ms);
		seen.expiries.insert(key.clone(), expiry);
		seen.order.push_back((expiry, key));
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.seen
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.expiries
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl SeenNonces {
	fn prune(&mut self, now: i64) {
		while let Some(expiry) = self.order.front().map(|(expiry, _)| *expiry) {
			if expiry > now {
				break;
			}
			self.evict_oldest();
		}
	}

	fn evict_oldest(&mut self) {
		if let Some((expiry, key)) = self.order.pop_front() {
			if self.expiries.get(&key) == Some(&expiry) {
				self.expiries.remove(&key);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};
	use sealgate_server_keys::ManualClock;

	fn guard(max_entries: usize) -> (ReplayGuard, Arc<ManualClock>, i64) {
		let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
		let clock = Arc::new(ManualClock::new(start));
		let guard = ReplayGuard::new(Duration::from_secs(300), max_entries).with_clock(clock.clone());
		(guard, clock, start.timestamp_millis())
	}

	#[test]
	fn requires_nonce_and_timestamp() {
		let (guard, _, now) = guard(10);
		assert!(guard.check_fresh(None, Some(now)).is_err());
		assert!(guard.check_fresh(Some(""), Some(now)).is_err());
		assert!(guard.check_fresh(Some("n1"), None).is_err());
		assert!(guard.check_fresh(Some("n1"), Some(now)).is_ok());
	}

	#[test]
	fn rejects_timestamps_outside_window() {
		let (guard, _, now) = guard(10);
		assert!(guard.check_fresh(Some("n"), Some(now - 300_000)).is_ok());
		assert!(guard.check_fresh(Some("n"), Some(now - 300_001)).is_err());
		assert!(guard.check_fresh(Some("n"), Some(now + 300_001)).is_err());
	}

	#[test]
	fn rejects_oversized_nonce() {
		let (guard, _, now) = guard(10);
		let nonce = "x".repeat(MAX_NONCE_LEN + 1);
		assert!(guard.check_fresh(Some(&nonce), Some(now)).is_err());
	}

	#[test]
	fn second_use_of_a_nonce_is_rejected() {
		let (guard, _, now) = guard(10);
		guard.record("K1", "n1", now).unwrap();
		assert!(matches!(
			guard.record("K1", "n1", now),
			Err(EnvelopeError::Replay("nonce reused"))
		));
		guard.record("K2", "n1", now).unwrap();
	}

	#[test]
	fn entries_expire_with_the_window() {
		let (guard, clock, now) = guard(10);
		guard.record("K1", "n1", now).unwrap();
		clock.advance(chrono::Duration::seconds(301));
		guard.record("K1", "n2", now + 301_000).unwrap();
		assert_eq!(guard.len(), 1);
	}

	#[test]
	fn binding_depends_on_every_field() {
		let base = bind_replay_fields(Some(b"ctx"), "n1", 1_000);
		assert_eq!(base, bind_replay_fields(Some(b"ctx"), "n1", 1_000));
		assert_ne!(base, bind_replay_fields(Some(b"ctx"), "n2", 1_000));
		assert_ne!(base, bind_replay_fields(Some(b"ctx"), "n1", 1_001));
		assert_ne!(base, bind_replay_fields(None, "n1", 1_000));
	}

	#[test]
	fn binding_is_unambiguous_across_field_boundaries() {
		assert_ne!(
			bind_replay_fields(Some(b"ab"), "c", 0),
			bind_replay_fields(Some(b"a"), "bc", 0)
		);
		assert_eq!(
			bind_replay_fields(None, "n", 0),
			bind_replay_fields(Some(b""), "n", 0)
		);
	}

	#[test]
	fn capacity_is_bounded() {
		let (guard, _, now) = guard(3);
		for i in 0..10 {
			guard.record("K1", &format!("n{i}"), now).unwrap();
		}
		assert_eq!(guard.len(), 3);
		assert!(guard.record("K1", "n9", now).is_err());
	}
}
