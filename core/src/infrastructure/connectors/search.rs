// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Brave Search connector. The gateway holds the subscription token; agents
//! request searches through `/execute` and never see the key.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::credential::CredentialHandle;

use super::{Connector, ConnectorError, ExecutionContext, ExecutionOutcome};

const BASE_URL: &str = "https://api.search.brave.com/res/v1/web/search";

pub struct BraveSearchConnector {
    client: reqwest::Client,
    base_url: String,
}

impl BraveSearchConnector {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self { client, base_url }
    }
}

impl Default for BraveSearchConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for BraveSearchConnector {
    fn tool_name(&self) -> &str {
        "brave_search"
    }

    async fn execute(
        &self,
        op: &str,
        params: &Value,
        credential: Option<&CredentialHandle>,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionOutcome, ConnectorError> {
        if op != "search" {
            return Err(ConnectorError::UnsupportedOp {
                tool: "brave_search".to_string(),
                op: op.to_string(),
            });
        }

        let api_key = credential
            .and_then(CredentialHandle::api_key)
            .ok_or_else(|| {
                ConnectorError::NotConfigured("brave_search API key missing".to_string())
            })?;

        let q = params.get("q").and_then(Value::as_str).unwrap_or("");
        let count = params
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .clamp(1, 20);

        let mut request = self
            .client
            .get(&self.base_url)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .query(&[("q", q), ("count", &count.to_string())]);
        if let Some(country) = params.get("country").and_then(Value::as_str) {
            request = request.query(&[("country", country)]);
        }
        if let Some(freshness) = params.get("freshness").and_then(Value::as_str) {
            request = request.query(&[("freshness", freshness)]);
        }

        let response = request.send().await.map_err(|e| {
            ConnectorError::DownstreamUnavailable(if e.is_connect() || e.is_timeout() {
                "search API unreachable".to_string()
            } else {
                "search request failed".to_string()
            })
        })?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_client_error() || status.is_server_error() {
            return Err(ConnectorError::Downstream {
                status: status.as_u16(),
                detail: "search API error".to_string(),
            });
        }

        let results = body
            .get("web")
            .and_then(|w| w.get("results"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        Ok(ExecutionOutcome::success(json!({
            "success": true,
            "query": q,
            "results": results,
        })))
    }
}
