// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Invalid record: {0}")]
	InvalidRecord(String),
}

impl DbError {
	/// Map a unique-constraint violation to [`DbError::Conflict`].
	pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
		match &err {
			sqlx::Error::Database(db) if db.is_unique_violation() => {
				DbError::Conflict(format!("{what} already exists"))
			}
			_ => DbError::Sqlx(err),
		}
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
