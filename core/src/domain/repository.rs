// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Repository Traits
//!
//! Storage seams for every persistent aggregate. The SQLite implementations
//! live in `infrastructure::repositories`; the domain only sees these traits
//! and [`StoreError`].
//!
//! One repository per aggregate root. The Store exclusively owns all
//! persistent rows; every other component calls typed operations through
//! these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::audit::{AuditEvent, AuditQuery, DecisionRecord};
use super::credential::Credential;
use super::intent::Intent;
use super::tenant::Tenant;

/// Store failure kinds. `Unavailable` is fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db)
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                StoreError::Conflict(db.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait IntentRepository: Send + Sync {
    /// Upsert an intent; bumps `updated_at`, preserves `created_at`.
    async fn save(&self, intent: &Intent) -> Result<(), StoreError>;

    async fn get(&self, intent_id: &str) -> Result<Option<Intent>, StoreError>;

    /// Most recently updated intent, optionally scoped to a tenant.
    async fn latest(&self, tenant_id: Option<&str>) -> Result<Option<Intent>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Write the audit event and its decision record in one transaction.
    /// A failure rolls back both rows.
    async fn save_event(
        &self,
        event: &AuditEvent,
        record: &DecisionRecord,
    ) -> Result<(), StoreError>;

    async fn query_events(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>, StoreError>;

    async fn query_decisions(&self, query: &AuditQuery)
        -> Result<Vec<DecisionRecord>, StoreError>;

    async fn get_decision(&self, decision_id: &str)
        -> Result<Option<DecisionRecord>, StoreError>;

    /// Decisions recorded for `fingerprint` after `since` (loop detection).
    async fn count_recent_decisions(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError>;

    /// Audit events recorded for `agent_id` after `since` (rate guard).
    async fn count_recent_actions(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Idempotent upsert; preserves `created_at` on replace.
    async fn save(&self, credential: &Credential) -> Result<(), StoreError>;

    async fn delete(&self, credential_id: &str) -> Result<bool, StoreError>;

    /// Strict tenant match: `tenant_id = None` matches only global rows.
    async fn get(
        &self,
        credential_id: &str,
        tool_name: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Result<Option<Credential>, StoreError>;

    /// Most recent credential for a tool within a tenant scope.
    async fn get_for_tool(
        &self,
        tool_name: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<Credential>, StoreError>;

    async fn touch(&self, credential_id: &str, tenant_id: Option<&str>) -> Result<(), StoreError>;

    /// Record invoke outcome. A failure sets `last_error` but never marks
    /// the credential unusable.
    async fn record_status(
        &self,
        credential_id: &str,
        tenant_id: Option<&str>,
        success: bool,
        error: Option<&str>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Atomic increment; returns the new value. No lost updates under
    /// concurrency.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    async fn get(&self, key: &str) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Bind a token digest to an agent. Binding is first-write-wins: a
    /// subsequent bind with a different agent fails with `Conflict`.
    async fn bind(&self, token_hash: &str, agent_id: &str) -> Result<(), StoreError>;

    async fn lookup(&self, token_hash: &str) -> Result<Option<String>, StoreError>;

    async fn touch(&self, token_hash: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create(&self, tenant: &Tenant) -> Result<(), StoreError>;

    async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError>;

    async fn set_default_intent(
        &self,
        tenant_id: &str,
        intent_id: &str,
    ) -> Result<(), StoreError>;

    async fn get_default_intent(&self, tenant_id: &str) -> Result<Option<String>, StoreError>;

    /// Tenant for a hashed API key, if the key row exists.
    async fn get_by_api_key_hash(&self, key_hash: &str) -> Result<Option<Tenant>, StoreError>;

    async fn create_api_key(
        &self,
        tenant_id: &str,
        key_hash: &str,
        name: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// Single-use connect codes for channel binding. Issuance endpoints are out
/// of scope; the store operations exist for the channel-binding flow.
#[async_trait]
pub trait ConnectCodeRepository: Send + Sync {
    async fn create(
        &self,
        code: &str,
        tenant_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Consume a code: returns the tenant it belongs to when the code exists,
    /// is unused and not expired; marks it used.
    async fn consume(&self, code: &str, now: DateTime<Utc>)
        -> Result<Option<String>, StoreError>;
}
