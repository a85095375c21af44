// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Remote Bot Proxy
//!
//! Forwards `clawdbot.invoke` actions to the downstream bot gateway's
//! `/tools/invoke` endpoint. This connector is the reason agents cannot
//! reach the downstream directly: only this process holds the credentials.
//!
//! Both auth modes send `Authorization: Bearer <secret>` on the wire; the
//! downstream accepts that format for password and token credentials alike.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::credential::CredentialHandle;
use crate::domain::repository::CredentialRepository;

use super::{Connector, ConnectorError, ExecutionContext, ExecutionOutcome};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Inner tools whose effect can be confirmed from the downstream response.
const CONFIRMABLE_TOOLS: &[&str] = &["sessions_create", "sessions_update", "message"];

pub struct ClawdbotConnector {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialRepository>,
}

impl ClawdbotConnector {
    pub fn new(credentials: Arc<dyn CredentialRepository>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            client,
            credentials,
        }
    }

    async fn record_status(
        &self,
        handle: &CredentialHandle,
        success: bool,
        error: Option<&str>,
    ) {
        if handle.credential_id == "env_fallback" {
            return;
        }
        if let Err(e) = self
            .credentials
            .record_status(
                &handle.credential_id,
                handle.tenant_id.as_deref(),
                success,
                error,
            )
            .await
        {
            warn!("Failed to record credential status: {e}");
        }
    }
}

#[async_trait]
impl Connector for ClawdbotConnector {
    fn tool_name(&self) -> &str {
        "clawdbot"
    }

    async fn execute(
        &self,
        op: &str,
        params: &Value,
        credential: Option<&CredentialHandle>,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionOutcome, ConnectorError> {
        if op != "invoke" {
            return Err(ConnectorError::UnsupportedOp {
                tool: "clawdbot".to_string(),
                op: op.to_string(),
            });
        }

        let handle = credential.ok_or_else(|| {
            ConnectorError::NotConfigured("clawdbot credentials missing".to_string())
        })?;
        let creds = handle.gateway_credentials().ok_or_else(|| {
            ConnectorError::NotConfigured("clawdbot credential payload incomplete".to_string())
        })?;

        let mut payload = json!({
            "tool": params.get("tool").cloned().unwrap_or(Value::Null),
            "action": params.get("action").cloned().unwrap_or_else(|| json!("json")),
            "args": params.get("args").cloned().unwrap_or_else(|| json!({})),
        });
        if let Some(session_key) = params.get("sessionKey").filter(|v| !v.is_null()) {
            payload["sessionKey"] = session_key.clone();
        }

        let url = format!("{}/tools/invoke", creds.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&creds.secret)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let detail = if e.is_connect() || e.is_timeout() {
                    "downstream gateway unreachable"
                } else {
                    "downstream request failed"
                };
                self.record_status(handle, false, Some(detail)).await;
                return Err(ConnectorError::DownstreamUnavailable(detail.to_string()));
            }
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_client_error() || status.is_server_error() {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("downstream error")
                .to_string();
            self.record_status(handle, false, Some(&detail)).await;
            return Err(ConnectorError::Downstream {
                status: status.as_u16(),
                detail,
            });
        }

        if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            self.record_status(handle, true, None).await;
            let result = body.get("result").cloned().unwrap_or_else(|| json!({}));
            let observed = json!({"tool": payload["tool"], "result": result});
            let observation = self.observe(op, &observed);
            return Ok(ExecutionOutcome::success(result).with_observation(observation));
        }

        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Unknown downstream error")
            .to_string();
        self.record_status(handle, false, Some(&error)).await;
        Ok(ExecutionOutcome::failure(error))
    }

    fn observe(&self, _op: &str, result: &Value) -> Option<Value> {
        // Confirmable inner tools get a verification marker.
        let inner = result.get("tool").and_then(Value::as_str)?;
        CONFIRMABLE_TOOLS
            .contains(&inner)
            .then(|| json!({"verified": true, "tool": inner}))
    }
}
