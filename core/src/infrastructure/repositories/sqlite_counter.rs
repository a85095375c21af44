// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rate-limit counters. The increment is a single upsert with `RETURNING`,
//! atomic under concurrency: no lost updates, and the sum of returned values
//! equals the final stored value.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use crate::domain::repository::{CounterRepository, StoreError};

pub struct SqliteCounterRepository {
    pool: SqlitePool,
}

impl SqliteCounterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterRepository for SqliteCounterRepository {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (key, value, window_start, updated_at)
            VALUES (?, 1, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                value = value + 1,
                updated_at = excluded.updated_at
            RETURNING value
            "#,
        )
        .bind(key)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<i64, StoreError> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM counters WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or(0))
    }
}
