// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Credentials
//!
//! Stored credentials are write-only at the API surface: `payload_blob` is
//! never returned over HTTP. Connectors receive a short-lived, in-memory
//! [`CredentialHandle`] at execution time and the handle never crosses a
//! request boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub credential_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub credential_type: String,
    /// Opaque payload; possibly encrypted at rest.
    pub payload: Value,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Decrypted, request-scoped view of a credential handed to a connector.
#[derive(Debug, Clone)]
pub struct CredentialHandle {
    pub credential_id: String,
    pub tool_name: String,
    pub tenant_id: Option<String>,
    pub payload: Value,
}

impl CredentialHandle {
    /// Downstream proxy credentials. The current shape is
    /// `{base_url, auth_mode, secret}`; the legacy
    /// `{gateway_url, gateway_token}` shape is still accepted.
    pub fn gateway_credentials(&self) -> Option<GatewayCredentials> {
        let data = &self.payload;
        let base_url = data
            .get("base_url")
            .or_else(|| data.get("gateway_url"))
            .or_else(|| data.get("url"))
            .and_then(Value::as_str)
            .map(|s| s.trim_end_matches('/').to_string())?;
        let secret = data
            .get("secret")
            .or_else(|| data.get("token"))
            .or_else(|| data.get("password"))
            .or_else(|| data.get("gateway_token"))
            .and_then(Value::as_str)
            .map(str::to_string)?;
        if base_url.is_empty() || secret.is_empty() {
            return None;
        }
        let auth_mode = match data.get("auth_mode").and_then(Value::as_str) {
            Some("token") => AuthMode::Token,
            _ => AuthMode::Password,
        };
        Some(GatewayCredentials {
            base_url,
            auth_mode,
            secret,
        })
    }

    /// Plain API key credentials (`api_key` or `subscription_token`).
    pub fn api_key(&self) -> Option<String> {
        self.payload
            .get("api_key")
            .or_else(|| self.payload.get("subscription_token"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Password,
    Token,
}

/// Parsed downstream bot-gateway credentials.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub base_url: String,
    pub auth_mode: AuthMode,
    pub secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle(payload: Value) -> CredentialHandle {
        CredentialHandle {
            credential_id: "clawdbot_gateway".to_string(),
            tool_name: "clawdbot".to_string(),
            tenant_id: None,
            payload,
        }
    }

    #[test]
    fn test_current_payload_shape() {
        let creds = handle(json!({
            "base_url": "http://127.0.0.1:18789/",
            "auth_mode": "token",
            "secret": "s3cret"
        }))
        .gateway_credentials()
        .unwrap();
        assert_eq!(creds.base_url, "http://127.0.0.1:18789");
        assert_eq!(creds.auth_mode, AuthMode::Token);
        assert_eq!(creds.secret, "s3cret");
    }

    #[test]
    fn test_legacy_payload_shape_accepted() {
        let creds = handle(json!({
            "gateway_url": "http://gateway.internal:18789",
            "gateway_token": "legacy-token"
        }))
        .gateway_credentials()
        .unwrap();
        assert_eq!(creds.base_url, "http://gateway.internal:18789");
        assert_eq!(creds.secret, "legacy-token");
        assert_eq!(creds.auth_mode, AuthMode::Password);
    }

    #[test]
    fn test_incomplete_payload_rejected() {
        assert!(handle(json!({"base_url": "http://x"})).gateway_credentials().is_none());
        assert!(handle(json!({"secret": "s"})).gateway_credentials().is_none());
    }
}
