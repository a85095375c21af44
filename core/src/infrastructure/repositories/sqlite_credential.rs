// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Credential rows. Tenant scoping is strict: a `None` tenant matches only
//! global rows (stored as the empty string), never another tenant's rows.
//! There is deliberately no list-by-value or bulk dump operation.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::credential::Credential;
use crate::domain::repository::{CredentialRepository, StoreError};

use super::{parse_ts, parse_ts_opt};

pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Credential, StoreError> {
        let payload_raw: String = row.get("payload");
        let tenant_raw: String = row.get("tenant_id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        let last_used_at: Option<String> = row.get("last_used_at");

        Ok(Credential {
            credential_id: row.get("credential_id"),
            tool_name: row.get("tool_name"),
            tenant_id: (!tenant_raw.is_empty()).then_some(tenant_raw),
            credential_type: row.get("credential_type"),
            payload: serde_json::from_str(&payload_raw)?,
            encrypted: row.get::<i64, _>("encrypted") != 0,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
            last_used_at: parse_ts_opt(last_used_at)?,
            last_error: row.get("last_error"),
        })
    }
}

/// Global rows use the empty string internally so the (id, tenant) primary
/// key and upserts behave; the empty string never leaks out of this module.
fn tenant_key(tenant_id: Option<&str>) -> &str {
    tenant_id.unwrap_or("")
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credentials (
                credential_id, tool_name, tenant_id, credential_type,
                payload, encrypted, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (credential_id, tenant_id) DO UPDATE SET
                tool_name = excluded.tool_name,
                credential_type = excluded.credential_type,
                payload = excluded.payload,
                encrypted = excluded.encrypted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&credential.credential_id)
        .bind(&credential.tool_name)
        .bind(tenant_key(credential.tenant_id.as_deref()))
        .bind(&credential.credential_type)
        .bind(credential.payload.to_string())
        .bind(credential.encrypted as i64)
        .bind(credential.created_at.to_rfc3339())
        .bind(credential.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, credential_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM credentials WHERE credential_id = ?")
            .bind(credential_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(
        &self,
        credential_id: &str,
        tool_name: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Result<Option<Credential>, StoreError> {
        let mut sql =
            String::from("SELECT * FROM credentials WHERE credential_id = ? AND tenant_id = ?");
        if tool_name.is_some() {
            sql.push_str(" AND tool_name = ?");
        }
        sql.push_str(" ORDER BY rowid DESC LIMIT 1");

        let mut q = sqlx::query(&sql)
            .bind(credential_id)
            .bind(tenant_key(tenant_id));
        if let Some(tool) = tool_name {
            q = q.bind(tool);
        }
        let row = q.fetch_optional(&self.pool).await?;
        row.map(|r| Self::from_row(&r)).transpose()
    }

    async fn get_for_tool(
        &self,
        tool_name: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM credentials WHERE tool_name = ? AND tenant_id = ?
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(tool_name)
        .bind(tenant_key(tenant_id))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::from_row(&r)).transpose()
    }

    async fn touch(&self, credential_id: &str, tenant_id: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE credentials SET last_used_at = ? WHERE credential_id = ? AND tenant_id = ?",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(credential_id)
        .bind(tenant_key(tenant_id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_status(
        &self,
        credential_id: &str,
        tenant_id: Option<&str>,
        success: bool,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        if success {
            sqlx::query(
                "UPDATE credentials SET last_used_at = ?, last_error = NULL
                 WHERE credential_id = ? AND tenant_id = ?",
            )
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(credential_id)
            .bind(tenant_key(tenant_id))
            .execute(&self.pool)
            .await?;
        } else {
            // A failed call records last_error but never clears last_used_at:
            // the credential stays usable.
            sqlx::query(
                "UPDATE credentials SET last_error = ?
                 WHERE credential_id = ? AND tenant_id = ?",
            )
            .bind(error.unwrap_or("unknown error"))
            .bind(credential_id)
            .bind(tenant_key(tenant_id))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::Database;
    use chrono::Utc;
    use serde_json::json;

    async fn repo() -> SqliteCredentialRepository {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        SqliteCredentialRepository::new(db.pool().clone())
    }

    fn sample(id: &str, tenant: Option<&str>) -> Credential {
        Credential {
            credential_id: id.to_string(),
            tool_name: "clawdbot".to_string(),
            tenant_id: tenant.map(str::to_string),
            credential_type: "gateway".to_string(),
            payload: json!({"base_url": "http://127.0.0.1:18789", "auth_mode": "token", "secret": "s"}),
            encrypted: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_used_at: None,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn test_save_get_delete_roundtrip() {
        let repo = repo().await;
        repo.save(&sample("clawdbot_gateway", None)).await.unwrap();

        let loaded = repo
            .get("clawdbot_gateway", Some("clawdbot"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.tenant_id, None);
        assert!(loaded.encrypted);

        assert!(repo.delete("clawdbot_gateway").await.unwrap());
        assert!(!repo.delete("clawdbot_gateway").await.unwrap());
        assert!(repo
            .get("clawdbot_gateway", None, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_strict_tenant_match() {
        let repo = repo().await;
        repo.save(&sample("cred", Some("tenant_1"))).await.unwrap();

        // Global lookup must not see tenant rows and vice versa.
        assert!(repo.get("cred", None, None).await.unwrap().is_none());
        assert!(repo.get("cred", None, Some("tenant_2")).await.unwrap().is_none());
        assert!(repo.get("cred", None, Some("tenant_1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_preserves_identity() {
        let repo = repo().await;
        repo.save(&sample("cred", None)).await.unwrap();
        let mut updated = sample("cred", None);
        updated.payload = json!({"base_url": "http://10.0.0.2:18789", "secret": "new"});
        repo.save(&updated).await.unwrap();

        let loaded = repo.get("cred", None, None).await.unwrap().unwrap();
        assert_eq!(loaded.payload["secret"], "new");
    }

    #[tokio::test]
    async fn test_failure_sets_last_error_but_keeps_credential_usable() {
        let repo = repo().await;
        repo.save(&sample("cred", None)).await.unwrap();
        repo.record_status("cred", None, true, None).await.unwrap();

        let ok = repo.get("cred", None, None).await.unwrap().unwrap();
        assert!(ok.last_used_at.is_some());
        assert!(ok.last_error.is_none());

        repo.record_status("cred", None, false, Some("downstream 500"))
            .await
            .unwrap();
        let failed = repo.get("cred", None, None).await.unwrap().unwrap();
        assert_eq!(failed.last_error.as_deref(), Some("downstream 500"));
        // last_used_at survives the failure: connected stays true.
        assert!(failed.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_get_for_tool_picks_most_recent() {
        let repo = repo().await;
        let mut old = sample("cred_old", None);
        old.updated_at = Utc::now() - chrono::Duration::seconds(120);
        repo.save(&old).await.unwrap();
        repo.save(&sample("cred_new", None)).await.unwrap();

        let picked = repo.get_for_tool("clawdbot", None).await.unwrap().unwrap();
        assert_eq!(picked.credential_id, "cred_new");
    }
}
