// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Single-use channel connect codes with a short TTL. Consuming a code marks
//! it used in the same statement that checks expiry, so a code can be
//! redeemed at most once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::repository::{ConnectCodeRepository, StoreError};

pub struct SqliteConnectCodeRepository {
    pool: SqlitePool,
}

impl SqliteConnectCodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectCodeRepository for SqliteConnectCodeRepository {
    async fn create(
        &self,
        code: &str,
        tenant_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO telegram_connect_codes (code, tenant_id, expires_at) VALUES (?, ?, ?)",
        )
        .bind(code)
        .bind(tenant_id)
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let row = sqlx::query(
            "UPDATE telegram_connect_codes
             SET used_at = ?
             WHERE code = ? AND used_at IS NULL AND expires_at > ?
             RETURNING tenant_id",
        )
        .bind(now.to_rfc3339())
        .bind(code)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("tenant_id")))
    }
}
