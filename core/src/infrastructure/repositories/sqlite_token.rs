// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Token-to-agent bindings. Plaintext tokens never reach this module; rows
//! are keyed by the SHA-256 digest. Binding is first-write-wins: rebinding a
//! digest to a different agent is a conflict.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::repository::{StoreError, TokenRepository};

pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn bind(&self, token_hash: &str, agent_id: &str) -> Result<(), StoreError> {
        let existing = self.lookup(token_hash).await?;
        match existing {
            Some(bound) if bound != agent_id => Err(StoreError::Conflict(format!(
                "token already bound to a different agent ({bound})"
            ))),
            Some(_) => Ok(()),
            None => {
                sqlx::query(
                    "INSERT OR IGNORE INTO token_agent_bindings
                     (token_hash, agent_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(token_hash)
                .bind(agent_id)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
                // A concurrent bind may have won the insert; verify.
                match self.lookup(token_hash).await? {
                    Some(bound) if bound != agent_id => Err(StoreError::Conflict(format!(
                        "token already bound to a different agent ({bound})"
                    ))),
                    _ => Ok(()),
                }
            }
        }
    }

    async fn lookup(&self, token_hash: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT agent_id FROM token_agent_bindings WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("agent_id")))
    }

    async fn touch(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE token_agent_bindings SET last_used_at = ? WHERE token_hash = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::Database;

    async fn repo() -> SqliteTokenRepository {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        SqliteTokenRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_first_bind_wins() {
        let repo = repo().await;
        repo.bind("hash-1", "agent-a").await.unwrap();
        assert_eq!(repo.lookup("hash-1").await.unwrap().as_deref(), Some("agent-a"));

        // Re-binding to the same agent is fine.
        repo.bind("hash-1", "agent-a").await.unwrap();

        // Different agent must fail.
        let err = repo.bind("hash-1", "agent-b").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let repo = repo().await;
        assert!(repo.lookup("nope").await.unwrap().is_none());
        // Touching an unbound token is a no-op.
        repo.touch("nope").await.unwrap();
    }
}
