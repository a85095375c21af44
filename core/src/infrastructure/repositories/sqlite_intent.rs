// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Intent rows. Scope and constraints are stored as JSON TEXT; `save` is an
//! upsert that preserves `created_at` and bumps `updated_at`.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::intent::{Intent, RiskLevel};
use crate::domain::repository::{IntentRepository, StoreError};

use super::parse_ts;

pub struct SqliteIntentRepository {
    pool: SqlitePool,
}

impl SqliteIntentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Intent, StoreError> {
        let scope_raw: String = row.get("scope");
        let constraints_raw: String = row.get("constraints");
        let risk_raw: String = row.get("risk_level");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(Intent {
            intent_id: row.get("intent_id"),
            tenant_id: row.get("tenant_id"),
            objective: row.get("objective"),
            scope: serde_json::from_str(&scope_raw)?,
            constraints: serde_json::from_str(&constraints_raw)?,
            risk_level: RiskLevel::parse(&risk_raw)
                .ok_or_else(|| StoreError::Serialization(format!("bad risk level '{risk_raw}'")))?,
            approved_by_user: row.get::<i64, _>("approved_by_user") != 0,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        })
    }
}

#[async_trait]
impl IntentRepository for SqliteIntentRepository {
    async fn save(&self, intent: &Intent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO intents (
                intent_id, tenant_id, objective, scope, constraints,
                risk_level, approved_by_user, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (intent_id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                objective = excluded.objective,
                scope = excluded.scope,
                constraints = excluded.constraints,
                risk_level = excluded.risk_level,
                approved_by_user = excluded.approved_by_user,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&intent.intent_id)
        .bind(&intent.tenant_id)
        .bind(&intent.objective)
        .bind(serde_json::to_string(&intent.scope)?)
        .bind(serde_json::to_string(&intent.constraints)?)
        .bind(intent.risk_level.as_str())
        .bind(intent.approved_by_user as i64)
        .bind(intent.created_at.to_rfc3339())
        .bind(intent.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, intent_id: &str) -> Result<Option<Intent>, StoreError> {
        let row = sqlx::query("SELECT * FROM intents WHERE intent_id = ?")
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::from_row(&r)).transpose()
    }

    async fn latest(&self, tenant_id: Option<&str>) -> Result<Option<Intent>, StoreError> {
        let row = match tenant_id {
            Some(tenant) => {
                sqlx::query(
                    "SELECT * FROM intents WHERE tenant_id = ? ORDER BY updated_at DESC LIMIT 1",
                )
                .bind(tenant)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM intents ORDER BY updated_at DESC LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        row.map(|r| Self::from_row(&r)).transpose()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM intents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::Constraints;
    use crate::infrastructure::db::Database;
    use chrono::Utc;
    use std::collections::BTreeMap;

    async fn repo() -> SqliteIntentRepository {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        SqliteIntentRepository::new(db.pool().clone())
    }

    fn sample(intent_id: &str, tenant: Option<&str>) -> Intent {
        let mut scope = BTreeMap::new();
        scope.insert("email".to_string(), vec!["read".to_string()]);
        Intent {
            intent_id: intent_id.to_string(),
            tenant_id: tenant.map(str::to_string),
            objective: "Read email".to_string(),
            scope,
            constraints: Constraints::default(),
            risk_level: RiskLevel::Low,
            approved_by_user: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let repo = repo().await;
        let intent = sample("intent_a", Some("tenant_1"));
        repo.save(&intent).await.unwrap();

        let loaded = repo.get("intent_a").await.unwrap().unwrap();
        assert_eq!(loaded.objective, "Read email");
        assert_eq!(loaded.tenant_id.as_deref(), Some("tenant_1"));
        assert!(loaded.allows("email", "read"));

        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = repo().await;
        let intent = sample("intent_a", None);
        repo.save(&intent).await.unwrap();
        repo.save(&intent).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_scopes_by_tenant() {
        let repo = repo().await;
        let mut first = sample("intent_a", Some("tenant_1"));
        first.updated_at = Utc::now() - chrono::Duration::seconds(60);
        repo.save(&first).await.unwrap();
        repo.save(&sample("intent_b", Some("tenant_2"))).await.unwrap();

        let latest = repo.latest(Some("tenant_1")).await.unwrap().unwrap();
        assert_eq!(latest.intent_id, "intent_a");

        let any = repo.latest(None).await.unwrap().unwrap();
        assert_eq!(any.intent_id, "intent_b");

        assert!(repo.latest(Some("tenant_3")).await.unwrap().is_none());
    }
}
