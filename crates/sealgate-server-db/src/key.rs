// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Asymmetric key records.
//!
//! A record is written once by the key lifecycle manager and never updated.
//! Lookups take a `cutoff` and only return records whose `expires_at` lies
//! strictly after it; callers decide how much grace to build into the cutoff.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings, so SQL string
//! comparison orders them chronologically.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sealgate_crypto::SecretString;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::error::{DbError, Result};

/// One RSA keypair as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
	pub kid: String,
	pub public_key_pem: String,
	pub private_key_pem: SecretString,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl KeyRecord {
	/// True when the record is still valid at `cutoff`.
	pub fn is_valid_at(&self, cutoff: DateTime<Utc>) -> bool {
		self.expires_at > cutoff
	}
}

#[async_trait]
pub trait KeyStore: Send + Sync {
	/// Insert a new record. A duplicate `kid` is a [`DbError::Conflict`].
	async fn create_key(&self, record: &KeyRecord) -> Result<()>;

	/// Insert `record` only if no record expires after `cutoff`, atomically.
	/// Returns `false` when another active record already exists.
	async fn create_key_if_none_active(&self, record: &KeyRecord, cutoff: DateTime<Utc>) -> Result<bool>;

	/// Look up `kid`, returning it only if it expires after `cutoff`.
	async fn get_key_by_kid(&self, kid: &str, cutoff: DateTime<Utc>) -> Result<Option<KeyRecord>>;

	/// The most recently created record that expires after `cutoff`.
	async fn get_latest_active_key(&self, cutoff: DateTime<Utc>) -> Result<Option<KeyRecord>>;

	/// Number of records that expire after `cutoff`.
	async fn count_active_keys(&self, cutoff: DateTime<Utc>) -> Result<i64>;
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::InvalidRecord(format!("{column}: {e}")))
}

fn validate(record: &KeyRecord) -> Result<()> {
	if record.expires_at <= record.created_at {
		return Err(DbError::InvalidRecord(
			"expires_at must be after created_at".to_string(),
		));
	}
	Ok(())
}

type KeyRow = (String, String, String, String, String);

fn record_from_row((kid, public_key_pem, private_key_pem, created_at, expires_at): KeyRow) -> Result<KeyRecord> {
	Ok(KeyRecord {
		created_at: parse_timestamp("created_at", &created_at)?,
		expires_at: parse_timestamp("expires_at", &expires_at)?,
		kid,
		public_key_pem,
		private_key_pem: SecretString::new(private_key_pem),
	})
}

/// SQLite-backed key store.
#[derive(Clone)]
pub struct KeyRepository {
	pool: SqlitePool,
}

impl KeyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, record), fields(kid = %record.kid))]
	pub async fn create_key(&self, record: &KeyRecord) -> Result<()> {
		validate(record)?;

		sqlx::query(
			r#"
			INSERT INTO crypto_keys (kid, public_key, private_key, created_at, expires_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(&record.kid)
		.bind(&record.public_key_pem)
		.bind(record.private_key_pem.expose())
		.bind(format_timestamp(record.created_at))
		.bind(format_timestamp(record.expires_at))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "key"))?;

		tracing::debug!(expires_at = %record.expires_at, "key record created");
		Ok(())
	}

	#[tracing::instrument(skip(self, record), fields(kid = %record.kid))]
	pub async fn create_key_if_none_active(
		&self,
		record: &KeyRecord,
		cutoff: DateTime<Utc>,
	) -> Result<bool> {
		validate(record)?;

		let result = sqlx::query(
			r#"
			INSERT INTO crypto_keys (kid, public_key, private_key, created_at, expires_at)
			SELECT ?, ?, ?, ?, ?
			WHERE NOT EXISTS (SELECT 1 FROM crypto_keys WHERE expires_at > ?)
			"#,
		)
		.bind(&record.kid)
		.bind(&record.public_key_pem)
		.bind(record.private_key_pem.expose())
		.bind(format_timestamp(record.created_at))
		.bind(format_timestamp(record.expires_at))
		.bind(format_timestamp(cutoff))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "key"))?;

		Ok(result.rows_affected() == 1)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_key_by_kid(
		&self,
		kid: &str,
		cutoff: DateTime<Utc>,
	) -> Result<Option<KeyRecord>> {
		let row = sqlx::query_as::<_, KeyRow>(
			r#"
			SELECT kid, public_key, private_key, created_at, expires_at
			FROM crypto_keys
			WHERE kid = ? AND expires_at > ?
			"#,
		)
		.bind(kid)
		.bind(format_timestamp(cutoff))
		.fetch_optional(&self.pool)
		.await?;

		row.map(record_from_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_latest_active_key(&self, cutoff: DateTime<Utc>) -> Result<Option<KeyRecord>> {
		let row = sqlx::query_as::<_, KeyRow>(
			r#"
			SELECT kid, public_key, private_key, created_at, expires_at
			FROM crypto_keys
			WHERE expires_at > ?
			ORDER BY created_at DESC, id DESC
			LIMIT 1
			"#,
		)
		.bind(format_timestamp(cutoff))
		.fetch_optional(&self.pool)
		.await?;

		row.map(record_from_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn count_active_keys(&self, cutoff: DateTime<Utc>) -> Result<i64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crypto_keys WHERE expires_at > ?")
			.bind(format_timestamp(cutoff))
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}

#[async_trait]
impl KeyStore for KeyRepository {
	async fn create_key(&self, record: &KeyRecord) -> Result<()> {
		self.create_key(record).await
	}

	async fn create_key_if_none_active(&self, record: &KeyRecord, cutoff: DateTime<Utc>) -> Result<bool> {
		self.create_key_if_none_active(record, cutoff).await
	}

	async fn get_key_by_kid(&self, kid: &str, cutoff: DateTime<Utc>) -> Result<Option<KeyRecord>> {
		self.get_key_by_kid(kid, cutoff).await
	}

	async fn get_latest_active_key(&self, cutoff: DateTime<Utc>) -> Result<Option<KeyRecord>> {
		self.get_latest_active_key(cutoff).await
	}

	async fn count_active_keys(&self, cutoff: DateTime<Utc>) -> Result<i64> {
		self.count_active_keys(cutoff).await
	}
}

/// Process-local key store. Keys vanish on restart.
#[derive(Default)]
pub struct InMemoryKeyStore {
	records: RwLock<Vec<KeyRecord>>,
}

impl InMemoryKeyStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
	async fn create_key(&self, record: &KeyRecord) -> Result<()> {
		validate(record)?;

		let mut records = self.records.write().await;
		if records.iter().any(|r| r.kid == record.kid) {
			return Err(DbError::Conflict("key already exists".to_string()));
		}
		records.push(record.clone());
		Ok(())
	}

	async fn create_key_if_none_active(&self, record: &KeyRecord, cutoff: DateTime<Utc>) -> Result<bool> {
		validate(record)?;

		let mut records = self.records.write().await;
		if records.iter().any(|r| r.is_valid_at(cutoff)) {
			return Ok(false);
		}
		if records.iter().any(|r| r.kid == record.kid) {
			return Err(DbError::Conflict("key already exists".to_string()));
		}
		records.push(record.clone());
		Ok(true)
	}

	async fn get_key_by_kid(&self, kid: &str, cutoff: DateTime<Utc>) -> Result<Option<KeyRecord>> {
		let records = self.records.read().await;
		Ok(
			records
				.iter()
				.find(|r| r.kid == kid && r.is_valid_at(cutoff))
				.cloned(),
		)
	}

	async fn get_latest_active_key(&self, cutoff: DateTime<Utc>) -> Result<Option<KeyRecord>> {
		let records = self.records.read().await;
		// Later insertion wins ties on created_at, like `id DESC` in SQL.
		Ok(
			records
				.iter()
				.enumerate()
				.filter(|(_, r)| r.is_valid_at(cutoff))
				.max_by_key(|(index, r)| (r.created_at, *index))
				.map(|(_, r)| r.clone()),
		)
	}

	async fn count_active_keys(&self, cutoff: DateTime<Utc>) -> Result<i64> {
		let records = self.records.read().await;
		Ok(records.iter().filter(|r| r.is_valid_at(cutoff)).count() as i64)
	}
}
