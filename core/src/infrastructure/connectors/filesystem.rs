// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Filesystem Connector
//!
//! Sandboxed file operations. Every requested path is normalized against the
//! sandbox root before any I/O; a resolved path escaping the root is refused
//! before touching the disk.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::credential::CredentialHandle;

use super::{Connector, ConnectorError, ExecutionContext, ExecutionOutcome};

pub struct FilesystemConnector {
    sandbox_dir: PathBuf,
}

impl FilesystemConnector {
    pub fn new(sandbox_dir: PathBuf) -> Self {
        Self { sandbox_dir }
    }

    /// Resolve a request path inside the sandbox. Absolute prefixes are
    /// stripped and any parent traversal refuses the whole operation.
    fn resolve(&self, raw: &str) -> Result<PathBuf, ConnectorError> {
        let trimmed = raw.trim_start_matches(['/', '\\']);
        let relative = Path::new(trimmed);
        let mut clean = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                _ => return Err(ConnectorError::PathOutsideSandbox(raw.to_string())),
            }
        }
        if clean.as_os_str().is_empty() {
            return Err(ConnectorError::PathOutsideSandbox(raw.to_string()));
        }
        Ok(self.sandbox_dir.join(clean))
    }

    fn relative(&self, full: &Path) -> String {
        full.strip_prefix(&self.sandbox_dir)
            .unwrap_or(full)
            .to_string_lossy()
            .to_string()
    }
}

#[async_trait]
impl Connector for FilesystemConnector {
    fn tool_name(&self) -> &str {
        "filesystem"
    }

    async fn execute(
        &self,
        op: &str,
        params: &Value,
        _credential: Option<&CredentialHandle>,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionOutcome, ConnectorError> {
        let raw_path = params.get("path").and_then(Value::as_str).unwrap_or("");
        let path = self.resolve(raw_path)?;
        let display = self.relative(&path);

        match op {
            "read_file" => match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    let size = content.len();
                    Ok(ExecutionOutcome::success(json!({
                        "success": true,
                        "path": display,
                        "content": content,
                        "size": size,
                    })))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Ok(ExecutionOutcome::failure(format!("File not found: {display}")))
                }
                Err(e) => Err(e.into()),
            },
            "write_file" => {
                let content = params.get("content").and_then(Value::as_str).unwrap_or("");
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, content).await?;
                let result = json!({
                    "success": true,
                    "path": display,
                    "size": content.len(),
                });
                let observation = self.observe(op, &result);
                Ok(ExecutionOutcome::success(result).with_observation(observation))
            }
            "delete_file" => match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(ExecutionOutcome::success(json!({
                    "success": true,
                    "path": display,
                }))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Ok(ExecutionOutcome::failure(format!("File not found: {display}")))
                }
                Err(e) => Err(e.into()),
            },
            other => Err(ConnectorError::UnsupportedOp {
                tool: "filesystem".to_string(),
                op: other.to_string(),
            }),
        }
    }

    fn observe(&self, op: &str, result: &Value) -> Option<Value> {
        if op != "write_file" {
            return None;
        }
        result.get("path").and_then(Value::as_str).map(|path| {
            json!({
                "verified": true,
                "path": path,
                "note": "File written inside sandbox.",
            })
        })
    }
}
