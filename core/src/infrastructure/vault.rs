// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Credential Vault
//!
//! Thin typed facade over the credential rows. Write-only at the HTTP
//! surface: `set` and `delete` are reachable from handlers, while
//! `get_for_execution` is called exclusively by connectors at execution time
//! and returns an in-memory [`CredentialHandle`] that never crosses a
//! request boundary.
//!
//! With `CREDENTIALS_STRICT` enabled the vault fails closed: a missing row
//! raises [`VaultError::CredentialMissing`] and no environment fallback is
//! consulted. Without strict mode, a configured development fallback may
//! stand in for the downstream bot-gateway and search credentials.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::domain::credential::{Credential, CredentialHandle};
use crate::domain::repository::{CredentialRepository, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Maps to HTTP 503, never rewrapped as 500.
    #[error("Credential missing for tool '{0}'. Configure via POST /credentials/set.")]
    CredentialMissing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Development fallback credentials sourced from the environment at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvFallback {
    pub clawdbot_gateway_url: Option<String>,
    pub clawdbot_gateway_token: Option<String>,
}

impl EnvFallback {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            clawdbot_gateway_url: config.clawdbot_gateway_url.clone(),
            clawdbot_gateway_token: config.clawdbot_gateway_token.clone(),
        }
    }
}

pub struct Vault {
    credentials: Arc<dyn CredentialRepository>,
    strict: bool,
    fallback: EnvFallback,
}

impl Vault {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        strict: bool,
        fallback: EnvFallback,
    ) -> Self {
        Self {
            credentials,
            strict,
            fallback,
        }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Idempotent upsert of a credential payload.
    pub async fn set(
        &self,
        credential_id: &str,
        tool_name: &str,
        tenant_id: Option<&str>,
        credential_type: &str,
        payload: Value,
        encrypted: bool,
    ) -> Result<(), VaultError> {
        let now = Utc::now();
        let credential = Credential {
            credential_id: credential_id.to_string(),
            tool_name: tool_name.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            credential_type: credential_type.to_string(),
            payload,
            encrypted,
            created_at: now,
            updated_at: now,
            last_used_at: None,
            last_error: None,
        };
        self.credentials.save(&credential).await?;
        Ok(())
    }

    pub async fn delete(&self, credential_id: &str) -> Result<bool, VaultError> {
        Ok(self.credentials.delete(credential_id).await?)
    }

    /// Resolve the credential a connector should execute with. Lookup order:
    /// explicit credential id within the tenant scope, then the most recent
    /// credential for the tool in that scope, then (non-strict only) the
    /// environment fallback.
    pub async fn get_for_execution(
        &self,
        tool_name: &str,
        tenant_id: Option<&str>,
        credential_id: Option<&str>,
    ) -> Result<CredentialHandle, VaultError> {
        if let Some(id) = credential_id {
            if let Some(credential) = self
                .credentials
                .get(id, Some(tool_name), tenant_id)
                .await?
            {
                return Ok(handle_from(credential));
            }
            // Tenant-suffixed ids written by the connect flow.
            if let Some(tenant) = tenant_id {
                let scoped = format!("{id}_{tenant}");
                if let Some(credential) = self
                    .credentials
                    .get(&scoped, Some(tool_name), tenant_id)
                    .await?
                {
                    return Ok(handle_from(credential));
                }
            }
        }

        if let Some(credential) = self.credentials.get_for_tool(tool_name, tenant_id).await? {
            return Ok(handle_from(credential));
        }
        // Tenant rows take priority, but a global row still serves a tenant.
        if tenant_id.is_some() {
            if let Some(credential) = self.credentials.get_for_tool(tool_name, None).await? {
                return Ok(handle_from(credential));
            }
        }

        if self.strict {
            return Err(VaultError::CredentialMissing(tool_name.to_string()));
        }

        if tool_name == "clawdbot" {
            if let (Some(url), Some(token)) = (
                &self.fallback.clawdbot_gateway_url,
                &self.fallback.clawdbot_gateway_token,
            ) {
                return Ok(CredentialHandle {
                    credential_id: "env_fallback".to_string(),
                    tool_name: tool_name.to_string(),
                    tenant_id: tenant_id.map(str::to_string),
                    payload: json!({
                        "base_url": url,
                        "auth_mode": "token",
                        "secret": token,
                    }),
                });
            }
        }

        Err(VaultError::CredentialMissing(tool_name.to_string()))
    }
}

fn handle_from(credential: Credential) -> CredentialHandle {
    CredentialHandle {
        credential_id: credential.credential_id,
        tool_name: credential.tool_name,
        tenant_id: credential.tenant_id,
        payload: credential.payload,
    }
}
