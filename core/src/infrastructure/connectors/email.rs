// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Email Connector
//!
//! Sandboxed: drafts and sends are written as JSON envelopes under the
//! sandbox directory instead of leaving the machine. The agent cannot send
//! email directly because it never holds delivery credentials; this
//! connector is the only execution path.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::credential::CredentialHandle;

use super::{Connector, ConnectorError, ExecutionContext, ExecutionOutcome};

pub struct EmailConnector {
    sandbox_dir: PathBuf,
}

impl EmailConnector {
    pub fn new(sandbox_dir: PathBuf) -> Self {
        Self { sandbox_dir }
    }

    fn envelope(params: &Value, id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "recipients": params.get("recipients").cloned().unwrap_or_else(|| json!([])),
            "subject": params.get("subject").cloned().unwrap_or_else(|| json!("")),
            "body": params.get("body").cloned().unwrap_or_else(|| json!("")),
            "created_at": Utc::now().to_rfc3339(),
            "status": status,
        })
    }

    async fn write_envelope(
        &self,
        subdir: Option<&str>,
        file_name: &str,
        envelope: &Value,
    ) -> Result<String, ConnectorError> {
        let dir = match subdir {
            Some(sub) => self.sandbox_dir.join(sub),
            None => self.sandbox_dir.clone(),
        };
        tokio::fs::create_dir_all(&dir).await?;
        let bytes = serde_json::to_vec_pretty(envelope)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(dir.join(file_name), bytes).await?;
        // Only the sandbox-relative location is reported back.
        Ok(match subdir {
            Some(sub) => format!("{sub}/{file_name}"),
            None => file_name.to_string(),
        })
    }
}

#[async_trait]
impl Connector for EmailConnector {
    fn tool_name(&self) -> &str {
        "email"
    }

    async fn execute(
        &self,
        op: &str,
        params: &Value,
        _credential: Option<&CredentialHandle>,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionOutcome, ConnectorError> {
        match op {
            "draft" => {
                let draft_id = format!("draft_{}", uuid::Uuid::new_v4().simple());
                let envelope = Self::envelope(params, &draft_id, "draft");
                let location = self
                    .write_envelope(None, &format!("{draft_id}.json"), &envelope)
                    .await?;
                let result = json!({
                    "success": true,
                    "draft_id": draft_id,
                    "location": location,
                });
                let observation = self.observe(op, &result);
                Ok(ExecutionOutcome::success(result).with_observation(observation))
            }
            "send" => {
                let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
                let envelope = Self::envelope(params, &message_id, "sent");
                let location = self
                    .write_envelope(Some("sent"), &format!("{message_id}.json"), &envelope)
                    .await?;
                let recipients = params
                    .get("recipients")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or(0);
                let result = json!({
                    "success": true,
                    "message_id": message_id,
                    "location": location,
                    "recipient_count": recipients,
                });
                let observation = self.observe(op, &result);
                Ok(ExecutionOutcome::success(result).with_observation(observation))
            }
            "read" | "summarize" => {
                // Read path returns the sandbox inventory.
                let mut items = Vec::new();
                if let Ok(mut entries) = tokio::fs::read_dir(&self.sandbox_dir).await {
                    while let Ok(Some(entry)) = entries.next_entry().await {
                        if entry.path().extension().is_some_and(|e| e == "json") {
                            items.push(entry.file_name().to_string_lossy().to_string());
                        }
                    }
                }
                items.sort();
                Ok(ExecutionOutcome::success(json!({"success": true, "messages": items})))
            }
            other => Err(ConnectorError::UnsupportedOp {
                tool: "email".to_string(),
                op: other.to_string(),
            }),
        }
    }

    fn observe(&self, op: &str, result: &Value) -> Option<Value> {
        if op != "send" {
            return None;
        }
        match result.get("message_id").and_then(Value::as_str) {
            Some(message_id) => Some(json!({
                "verified": true,
                "message_id": message_id,
                "note": "Message envelope created; ID confirmed.",
            })),
            None => Some(json!({"verified": false, "note": "No message_id in result."})),
        }
    }
}
