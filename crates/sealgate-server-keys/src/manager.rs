// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Selection, resolution and rotation of the asymmetric wrapping keys.
//!
//! A key is usable while `expires_at > now + expiry_buffer`. The buffer keeps
//! a client from wrapping a session key under a key that expires before the
//! request reaches the server.

use chrono::{DateTime, Duration, Utc};
use rsa::RsaPrivateKey;
use sealgate_crypto::pem;
use sealgate_server_db::{DbError, KeyRecord, KeyStore};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{KeyError, Result};
use crate::generator::KeyGenerator;
use crate::kid::generate_kid;
use crate::policy::RotationPolicy;

pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 300;

/// A usable private key, parsed and ready to unwrap session keys.
pub struct ResolvedKey {
	pub kid: String,
	pub expires_at: DateTime<Utc>,
	private_key: RsaPrivateKey,
}

impl ResolvedKey {
	pub fn private_key(&self) -> &RsaPrivateKey {
		&self.private_key
	}
}

impl fmt::Debug for ResolvedKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedKey")
			.field("kid", &self.kid)
			.field("expires_at", &self.expires_at)
			.finish_non_exhaustive()
	}
}

pub struct KeyLifecycleManager {
	store: Arc<dyn KeyStore>,
	generator: Arc<dyn KeyGenerator>,
	clock: Arc<dyn Clock>,
	policy: RotationPolicy,
	expiry_buffer: Duration,
	rotation_lock: Mutex<()>,
	resolved: RwLock<HashMap<String, Arc<ResolvedKey>>>,
	rotations: AtomicU64,
}

impl KeyLifecycleManager {
	pub fn new(store: Arc<dyn KeyStore>, generator: Arc<dyn KeyGenerator>) -> Self {
		Self {
			store,
			generator,
			clock: Arc::new(SystemClock),
			policy: RotationPolicy::default(),
			expiry_buffer: Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECS),
			rotation_lock: Mutex::new(()),
			resolved: RwLock::new(HashMap::new()),
			rotations: AtomicU64::new(0),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn with_expiry_buffer(mut self, expiry_buffer: Duration) -> Self {
		self.expiry_buffer = expiry_buffer;
		self
	}

	pub fn expiry_buffer(&self) -> Duration {
		self.expiry_buffer
	}

	pub fn policy(&self) -> &RotationPolicy {
		&self.policy
	}

	/// Number of keys this manager has written since start.
	pub fn rotation_count(&self) -> u64 {
		self.rotations.load(Ordering::Relaxed)
	}

	fn cutoff(&self) -> DateTime<Utc> {
		self.clock.now() + self.expiry_buffer
	}

	/// The newest usable key, rotating first if there is none.
	#[instrument(skip(self))]
	pub async fn get_active_key(&self) -> Result<KeyRecord> {
		if let Some(active) = self.store.get_latest_active_key(self.cutoff()).await? {
			return Ok(active);
		}

		info!("no active key, rotating");
		self.rotate_if_needed().await
	}

	/// The newest usable key, without rotating.
	pub async fn peek_active_key(&self) -> Result<Option<KeyRecord>> {
		Ok(self.store.get_latest_active_key(self.cutoff()).await?)
	}

	/// Look up a usable key by kid.
	///
	/// Unknown and expired kids both yield [`KeyError::KeyNotFound`].
	#[instrument(skip(self))]
	pub async fn resolve_by_kid(&self, kid: &str) -> Result<KeyRecord> {
		self.store
			.get_key_by_kid(kid, self.cutoff())
			.await?
			.ok_or(KeyError::KeyNotFound)
	}

	/// Like [`resolve_by_kid`](Self::resolve_by_kid), returning the parsed
	/// private key. Parsed keys are cached until they expire.
	#[instrument(skip(self))]
	pub async fn resolve_private_key(&self, kid: &str) -> Result<Arc<ResolvedKey>> {
		let cutoff = self.cutoff();

		if let Some(cached) = self.resolved.read().await.get(kid) {
			if cached.expires_at > cutoff {
				return Ok(Arc::clone(cached));
			}
		}

		let record = self.resolve_by_kid(kid).await?;
		let private_key = pem::decode_private_key(record.private_key_pem.expose())?;
		let resolved = Arc::new(ResolvedKey {
			kid: record.kid,
			expires_at: record.expires_at,
			private_key,
		});

		let mut cache = self.resolved.write().await;
		cache.retain(|_, k| k.expires_at > cutoff);
		cache.insert(kid.to_string(), Arc::clone(&resolved));
		Ok(resolved)
	}

	/// Return the active key, creating one only if none exists.
	///
	/// Callers are serialized on a lock and the store insert is conditional, so
	/// racing callers (in this process or another one sharing the store) end up
	/// with a single active key.
	#[instrument(skip(self))]
	pub async fn rotate_if_needed(&self) -> Result<KeyRecord> {
		let _guard = self.rotation_lock.lock().await;

		let cutoff = self.cutoff();
		if let Some(active) = self.store.get_latest_active_key(cutoff).await? {
			debug!(kid = %active.kid, "active key present, rotation not needed");
			return Ok(active);
		}

		let record = self.new_record().await?;
		match self.store.create_key_if_none_active(&record, cutoff).await {
			Ok(true) => {
				self.rotations.fetch_add(1, Ordering::Relaxed);
				info!(kid = %record.kid, expires_at = %record.expires_at, "rotated key");
				Ok(record)
			}
			Ok(false) | Err(DbError::Conflict(_)) => {
				warn!("concurrent rotation detected, using the key that won");
				self.store
					.get_latest_active_key(cutoff)
					.await?
					.ok_or(KeyError::RotationConflict)
			}
			Err(e) => {
				warn!(error = %e, "failed to persist rotated key");
				Err(e.into())
			}
		}
	}

	/// Create a new key even though one is active. The new key becomes the
	/// active one; older keys stay resolvable until they expire.
	#[instrument(skip(self))]
	pub async fn force_rotate(&self) -> Result<KeyRecord> {
		let _guard = self.rotation_lock.lock().await;

		let record = self.new_record().await?;
		self.store.create_key(&record).await?;
		self.rotations.fetch_add(1, Ordering::Relaxed);
		info!(kid = %record.kid, expires_at = %record.expires_at, "forced key rotation");
		Ok(record)
	}

	async fn new_record(&self) -> Result<KeyRecord> {
		let now = self.clock.now();
		let expires_at = self.policy.expiry_for(now, self.expiry_buffer)?;

		let generator = Arc::clone(&self.generator);
		let keypair = tokio::task::spawn_blocking(move || generator.generate())
			.await
			.map_err(|e| KeyError::Internal(format!("key generation task failed: {e}")))?
			.map_err(|e| {
				warn!(error = %e, "key generation failed");
				KeyError::Crypto(e)
			})?;

		Ok(KeyRecord {
			kid: generate_kid(),
			public_key_pem: keypair.public_key_pem()?,
			private_key_pem: keypair.private_key_pem()?,
			created_at: now,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::generator::StaticKeyGenerator;
	use chrono::TimeZone;
	use sealgate_crypto::{generate_keypair, CryptoError, KeyPair, MIN_RSA_BITS};
	use sealgate_server_db::{create_pool, run_migrations, InMemoryKeyStore, KeyRepository};
	use std::sync::atomic::AtomicBool;
	use std::sync::OnceLock;

	fn shared_keypair() -> KeyPair {
		static KEYPAIR: OnceLock<KeyPair> = OnceLock::new();
		KEYPAIR
			.get_or_init(|| generate_keypair(MIN_RSA_BITS).unwrap())
			.clone()
	}

	fn t0() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
	}

	struct Harness {
		manager: Arc<KeyLifecycleManager>,
		store: Arc<dyn KeyStore>,
		clock: Arc<ManualClock>,
	}

	fn harness_with(store: Arc<dyn KeyStore>, generator: Arc<dyn KeyGenerator>) -> Harness {
		let clock = Arc::new(ManualClock::new(t0()));
		let manager = Arc::new(
			KeyLifecycleManager::new(Arc::clone(&store), generator).with_clock(clock.clone()),
		);
		Harness {
			manager,
			store,
			clock,
		}
	}

	fn harness() -> Harness {
		harness_with(
			Arc::new(InMemoryKeyStore::new()),
			Arc::new(StaticKeyGenerator::new(shared_keypair())),
		)
	}

	async fn sqlite_store() -> Arc<dyn KeyStore> {
		let pool = create_pool("sqlite::memory:", 1).await.unwrap();
		run_migrations(&pool).await.unwrap();
		Arc::new(KeyRepository::new(pool))
	}

	/// Fails the first call, then delegates.
	struct FailOnceGenerator {
		failed: AtomicBool,
		inner: StaticKeyGenerator,
	}

	impl KeyGenerator for FailOnceGenerator {
		fn generate(&self) -> sealgate_crypto::Result<KeyPair> {
			if !self.failed.swap(true, Ordering::SeqCst) {
				return Err(CryptoError::KeyGeneration("entropy unavailable".into()));
			}
			self.inner.generate()
		}
	}

	#[tokio::test]
	async fn first_request_rotates_then_reuses() {
		let h = harness();
		let first = h.manager.get_active_key().await.unwrap();
		let second = h.manager.get_active_key().await.unwrap();

		assert_eq!(first.kid, second.kid);
		assert_eq!(first.created_at, t0());
		assert_eq!(first.expires_at, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
		assert!(first.public_key_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
		assert_eq!(h.manager.rotation_count(), 1);
	}

	#[tokio::test]
	async fn rotate_if_needed_is_idempotent() {
		let h = harness();
		let a = h.manager.rotate_if_needed().await.unwrap();
		let b = h.manager.rotate_if_needed().await.unwrap();
		assert_eq!(a.kid, b.kid);
		assert_eq!(h.store.count_active_keys(t0()).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn concurrent_rotation_yields_one_active_key() {
		for store in [
			Arc::new(InMemoryKeyStore::new()) as Arc<dyn KeyStore>,
			sqlite_store().await,
		] {
			let h = harness_with(store, Arc::new(StaticKeyGenerator::new(shared_keypair())));

			let tasks: Vec<_> = (0..16)
				.map(|_| {
					let manager = Arc::clone(&h.manager);
					tokio::spawn(async move { manager.rotate_if_needed().await.unwrap().kid })
				})
				.collect();
			let kids: Vec<String> = futures::future::join_all(tasks)
				.await
				.into_iter()
				.map(|r| r.unwrap())
				.collect();

			assert!(kids.iter().all(|k| k == &kids[0]));
			assert_eq!(h.store.count_active_keys(t0()).await.unwrap(), 1);
			assert_eq!(h.manager.rotation_count(), 1);
		}
	}

	#[tokio::test]
	async fn managers_sharing_a_store_do_not_double_rotate() {
		let store = sqlite_store().await;
		let generator: Arc<dyn KeyGenerator> = Arc::new(StaticKeyGenerator::new(shared_keypair()));
		let a = harness_with(Arc::clone(&store), Arc::clone(&generator));
		let b = harness_with(Arc::clone(&store), generator);

		let (ka, kb) = tokio::join!(a.manager.rotate_if_needed(), b.manager.rotate_if_needed());
		assert_eq!(ka.unwrap().kid, kb.unwrap().kid);
		assert_eq!(store.count_active_keys(t0()).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn key_inside_expiry_buffer_is_neither_active_nor_resolvable() {
		let h = harness();
		let old = h.manager.get_active_key().await.unwrap();

		// Four minutes before expiry: inside the five minute buffer.
		h.clock.set(old.expires_at - Duration::minutes(4));
		assert!(matches!(
			h.manager.resolve_by_kid(&old.kid).await,
			Err(KeyError::KeyNotFound)
		));

		let fresh = h.manager.get_active_key().await.unwrap();
		assert_ne!(fresh.kid, old.kid);
		assert_eq!(fresh.expires_at, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
		assert_eq!(h.manager.rotation_count(), 2);
	}

	#[tokio::test]
	async fn key_just_outside_buffer_still_resolves() {
		let h = harness();
		let key = h.manager.get_active_key().await.unwrap();
		h.clock.set(key.expires_at - Duration::minutes(6));
		assert_eq!(h.manager.resolve_by_kid(&key.kid).await.unwrap().kid, key.kid);
	}

	#[tokio::test]
	async fn unknown_and_expired_kids_fail_the_same_way() {
		let h = harness();
		let key = h.manager.get_active_key().await.unwrap();
		let unknown = h.manager.resolve_by_kid("never-issued").await.unwrap_err();

		h.clock.set(key.expires_at + Duration::days(1));
		let expired = h.manager.resolve_by_kid(&key.kid).await.unwrap_err();

		assert!(matches!(unknown, KeyError::KeyNotFound));
		assert!(matches!(expired, KeyError::KeyNotFound));
		assert_eq!(unknown.to_string(), expired.to_string());
	}

	#[tokio::test]
	async fn force_rotate_supersedes_but_keeps_old_key_resolvable() {
		let h = harness();
		let old = h.manager.get_active_key().await.unwrap();

		h.clock.advance(Duration::seconds(1));
		let new = h.manager.force_rotate().await.unwrap();
		assert_ne!(old.kid, new.kid);

		assert_eq!(h.manager.get_active_key().await.unwrap().kid, new.kid);
		assert_eq!(h.manager.resolve_by_kid(&old.kid).await.unwrap().kid, old.kid);
	}

	#[tokio::test]
	async fn generation_failure_is_reported_and_next_caller_retries() {
		let h = harness_with(
			Arc::new(InMemoryKeyStore::new()),
			Arc::new(FailOnceGenerator {
				failed: AtomicBool::new(false),
				inner: StaticKeyGenerator::new(shared_keypair()),
			}),
		);

		assert!(matches!(
			h.manager.get_active_key().await,
			Err(KeyError::Crypto(CryptoError::KeyGeneration(_)))
		));
		assert!(h.manager.peek_active_key().await.unwrap().is_none());

		let key = h.manager.get_active_key().await.unwrap();
		assert_eq!(h.manager.peek_active_key().await.unwrap().unwrap().kid, key.kid);
	}

	#[tokio::test]
	async fn resolved_private_key_matches_published_public_key() {
		let h = harness();
		let key = h.manager.get_active_key().await.unwrap();
		let resolved = h.manager.resolve_private_key(&key.kid).await.unwrap();

		let public = pem::decode_public_key(&key.public_key_pem).unwrap();
		assert_eq!(resolved.private_key().to_public_key(), public);

		let again = h.manager.resolve_private_key(&key.kid).await.unwrap();
		assert!(Arc::ptr_eq(&resolved, &again));
	}

	#[tokio::test]
	async fn cached_private_key_still_honours_expiry() {
		let h = harness();
		let key = h.manager.get_active_key().await.unwrap();
		h.manager.resolve_private_key(&key.kid).await.unwrap();

		h.clock.set(key.expires_at);
		assert!(matches!(
			h.manager.resolve_private_key(&key.kid).await,
			Err(KeyError::KeyNotFound)
		));
	}
}
