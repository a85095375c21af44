// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Connectors
//!
//! A connector executes ALLOW/DEGRADE actions against a backend. Every
//! connector satisfies the same capability: `{execute, observe}`. Dispatch
//! goes through a [`ConnectorRegistry`] keyed by tool name; this is the
//! single choke-point between a decision and a side effect.
//!
//! After a successful execution each connector runs its own `observe` hook;
//! the resulting observation block is read-only and travels back inside the
//! response's `execution` object.

mod clawdbot;
mod email;
mod filesystem;
mod search;

pub use clawdbot::ClawdbotConnector;
pub use email::EmailConnector;
pub use filesystem::FilesystemConnector;
pub use search::BraveSearchConnector;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::credential::CredentialHandle;

/// Request-scoped execution context handed to connectors.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub tenant_id: Option<String>,
    pub agent_id: Option<String>,
}

/// What a connector returns: downstream outcome plus an optional
/// post-execution observation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<Value>,
}

impl ExecutionOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            observation: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
            observation: None,
        }
    }

    pub fn with_observation(mut self, observation: Option<Value>) -> Self {
        self.observation = observation;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Downstream could not be reached at all. Maps to HTTP 503.
    #[error("Downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    /// Downstream answered with an error status. Maps to HTTP 502.
    #[error("Downstream error ({status}): {detail}")]
    Downstream { status: u16, detail: String },

    /// Sandboxed path resolution escaped the sandbox root.
    #[error("Path outside sandbox: {0}")]
    PathOutsideSandbox(String),

    #[error("Unsupported operation '{op}' for tool '{tool}'")]
    UnsupportedOp { tool: String, op: String },

    #[error("Connector not configured: {0}")]
    NotConfigured(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The contract every connector satisfies.
#[async_trait]
pub trait Connector: Send + Sync {
    fn tool_name(&self) -> &str;

    async fn execute(
        &self,
        op: &str,
        params: &Value,
        credential: Option<&CredentialHandle>,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutcome, ConnectorError>;

    /// Lightweight "did this work?" verification after successful execution.
    fn observe(&self, _op: &str, _result: &Value) -> Option<Value> {
        None
    }
}

/// Dynamic dispatch over connectors, keyed by tool name.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors
            .insert(connector.tool_name().to_string(), connector);
    }

    pub fn get(&self, tool: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(tool).cloned()
    }

    pub fn tools(&self) -> Vec<String> {
        let mut tools: Vec<String> = self.connectors.keys().cloned().collect();
        tools.sort();
        tools
    }
}
