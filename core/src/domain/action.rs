// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Actions
//!
//! An [`Action`] is a concrete request to invoke `(tool, op, params)`. The
//! caller-supplied `estimated_risk` is advisory only; the Governor recomputes
//! risk server-side and that computed value is the only one consulted.
//!
//! The action fingerprint used for loop detection is
//! `sha256(tool | op | canonical_json(params) | intent_id)` where
//! `canonical_json` recursively sorts object keys. This canonical form is the
//! documented serialization for fingerprinting.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::intent::RiskLevel;

/// A concrete tool invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub tool: String,
    pub op: String,
    #[serde(default = "empty_object")]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_risk: Option<RiskLevel>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Action {
    pub fn new(tool: impl Into<String>, op: impl Into<String>, params: Value) -> Self {
        Self {
            tool: tool.into(),
            op: op.into(),
            params,
            estimated_risk: None,
        }
    }

    /// Canonical hash of this action under an intent, for loop detection.
    pub fn fingerprint(&self, intent_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.tool.as_bytes());
        hasher.update(b"|");
        hasher.update(self.op.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical_json(&self.params).as_bytes());
        hasher.update(b"|");
        hasher.update(intent_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Recipient list for send-class ops. Accepts an array of strings or a
    /// comma-separated string, matching what agents actually send.
    pub fn recipients(&self) -> Vec<String> {
        match self.params.get("recipients") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Serialize a JSON value with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                out.push('{');
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String((*key).clone()).to_string());
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }
    let mut out = String::new();
    write(value, &mut out);
    out
}
