// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SQLite Store
//!
//! Wraps `sqlx::SqlitePool` in a thin `Database` newtype injected into all
//! repository implementations. WAL mode for concurrent readers with a single
//! writer; the store is the only synchronization point in the process.
//!
//! Migrations are numbered statement lists tracked in `schema_version`;
//! every missing migration is applied inside a transaction before the first
//! request is served.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::domain::repository::StoreError;

/// One migration: a schema version and the statements that produce it.
struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    statements: &[
        "CREATE TABLE IF NOT EXISTS tenants (
            tenant_id TEXT PRIMARY KEY,
            plan TEXT NOT NULL DEFAULT 'starter',
            status TEXT NOT NULL DEFAULT 'active',
            default_intent_id TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS api_keys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id TEXT NOT NULL,
            key_hash TEXT NOT NULL UNIQUE,
            name TEXT,
            created_at TEXT NOT NULL,
            last_used_at TEXT,
            FOREIGN KEY (tenant_id) REFERENCES tenants(tenant_id)
        )",
        "CREATE TABLE IF NOT EXISTS intents (
            intent_id TEXT PRIMARY KEY,
            tenant_id TEXT,
            objective TEXT NOT NULL,
            scope TEXT NOT NULL,
            constraints TEXT NOT NULL,
            risk_level TEXT NOT NULL,
            approved_by_user INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS audit_events (
            event_id TEXT PRIMARY KEY,
            decision_id TEXT NOT NULL,
            tenant_id TEXT,
            agent_id TEXT,
            intent_id TEXT,
            action_tool TEXT NOT NULL,
            action_op TEXT NOT NULL,
            action_params TEXT NOT NULL,
            action_estimated_risk TEXT,
            action_computed_risk TEXT NOT NULL,
            context TEXT NOT NULL,
            verdict TEXT NOT NULL,
            reason_code TEXT NOT NULL,
            explanation TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            latency_ms REAL NOT NULL DEFAULT 0
        )",
        "CREATE TABLE IF NOT EXISTS decisions (
            decision_id TEXT PRIMARY KEY,
            action_fingerprint TEXT NOT NULL,
            verdict TEXT NOT NULL,
            reason_code TEXT NOT NULL,
            explanation TEXT NOT NULL,
            safe_alternative TEXT,
            escalation TEXT,
            intent_id TEXT,
            agent_id TEXT,
            timestamp TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS credentials (
            credential_id TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            tenant_id TEXT NOT NULL DEFAULT '',
            credential_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            encrypted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_used_at TEXT,
            last_error TEXT,
            PRIMARY KEY (credential_id, tenant_id)
        )",
        "CREATE TABLE IF NOT EXISTS token_agent_bindings (
            token_hash TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_used_at TEXT
        )",
        "CREATE TABLE IF NOT EXISTS counters (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL DEFAULT 0,
            window_start TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS telegram_connect_codes (
            code TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            used_at TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_events(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_audit_agent_id ON audit_events(agent_id)",
        "CREATE INDEX IF NOT EXISTS idx_audit_intent_id ON audit_events(intent_id)",
        "CREATE INDEX IF NOT EXISTS idx_audit_verdict ON audit_events(verdict)",
        "CREATE INDEX IF NOT EXISTS idx_decisions_fingerprint ON decisions(action_fingerprint)",
        "CREATE INDEX IF NOT EXISTS idx_intents_tenant ON intents(tenant_id, updated_at)",
    ],
}];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the store at `path`. Failure here is fatal
    /// at startup.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot open {path:?}: {e}")))?;

        Ok(Self { pool })
    }

    /// In-memory store for tests. A single pooled connection keeps the
    /// database alive for the pool's lifetime.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration newer than the recorded schema version. Each
    /// migration runs in its own transaction.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        let current = current.unwrap_or(0);

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let mut tx = self.pool.begin().await?;
            for statement in migration.statements {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(migration.version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!("Applied schema migration {}", migration.version);
        }

        Ok(())
    }

    /// Latest applied schema version, 0 when none.
    pub async fn schema_version(&self) -> Result<i64, StoreError> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let v1 = db.schema_version().await.unwrap();
        db.migrate().await.unwrap();
        let v2 = db.schema_version().await.unwrap();
        assert_eq!(v1, v2);
        assert!(v1 >= 1);
    }

    #[tokio::test]
    async fn test_all_required_tables_exist() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        for table in [
            "tenants",
            "intents",
            "audit_events",
            "decisions",
            "credentials",
            "token_agent_bindings",
            "counters",
            "telegram_connect_codes",
            "schema_version",
        ] {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(db.pool())
            .await
            .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
