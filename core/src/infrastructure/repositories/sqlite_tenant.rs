// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tenant rows and tenant-scoped API keys. API keys are stored as SHA-256
//! digests only.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::repository::{StoreError, TenantRepository};
use crate::domain::tenant::{Tenant, TenantStatus};

use super::parse_ts;

pub struct SqliteTenantRepository {
    pool: SqlitePool,
}

impl SqliteTenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant, StoreError> {
        let status_raw: String = row.get("status");
        let created_at: String = row.get("created_at");
        Ok(Tenant {
            tenant_id: row.get("tenant_id"),
            plan: row.get("plan"),
            status: TenantStatus::parse(&status_raw).ok_or_else(|| {
                StoreError::Serialization(format!("bad tenant status '{status_raw}'"))
            })?,
            default_intent_id: row.get("default_intent_id"),
            created_at: parse_ts(&created_at)?,
        })
    }
}

#[async_trait]
impl TenantRepository for SqliteTenantRepository {
    async fn create(&self, tenant: &Tenant) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tenants (tenant_id, plan, status, default_intent_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&tenant.tenant_id)
        .bind(&tenant.plan)
        .bind(tenant.status.as_str())
        .bind(&tenant.default_intent_id)
        .bind(tenant.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query("SELECT * FROM tenants WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::from_row(&r)).transpose()
    }

    async fn set_default_intent(
        &self,
        tenant_id: &str,
        intent_id: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tenants SET default_intent_id = ? WHERE tenant_id = ?")
            .bind(intent_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("tenant {tenant_id}")));
        }
        Ok(())
    }

    async fn get_default_intent(&self, tenant_id: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT default_intent_id FROM tenants WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| r.get("default_intent_id")))
    }

    async fn get_by_api_key_hash(&self, key_hash: &str) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query(
            "SELECT t.* FROM tenants t
             JOIN api_keys k ON k.tenant_id = t.tenant_id
             WHERE k.key_hash = ?",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        if row.is_some() {
            sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE key_hash = ?")
                .bind(chrono::Utc::now().to_rfc3339())
                .bind(key_hash)
                .execute(&self.pool)
                .await?;
        }
        row.map(|r| Self::from_row(&r)).transpose()
    }

    async fn create_api_key(
        &self,
        tenant_id: &str,
        key_hash: &str,
        name: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO api_keys (tenant_id, key_hash, name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(tenant_id)
        .bind(key_hash)
        .bind(name)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
