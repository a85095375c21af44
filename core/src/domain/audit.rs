// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Audit Trail Types
//!
//! Every decided request produces exactly one [`AuditEvent`] and one
//! [`DecisionRecord`], written together in a single transaction. Audit rows
//! are append-only; decision rows are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decision::{ReasonCode, Verdict};
use super::intent::{AuditLevel, RiskLevel};

/// Snapshot of the action as decided, possibly redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub tool: String,
    pub op: String,
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_risk: Option<RiskLevel>,
    pub computed_risk: RiskLevel,
}

/// One append-only audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub decision_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    pub action: ActionSnapshot,
    /// Context at decision time. Must not duplicate `intent_id`.
    pub context: Value,
    pub verdict: Verdict,
    pub reason_code: ReasonCode,
    pub explanation: String,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
}

/// Quick-lookup decision row, keyed by `decision_id` and indexed by the
/// action fingerprint for loop detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: String,
    pub action_fingerprint: String,
    pub verdict: Verdict,
    pub reason_code: ReasonCode,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_alternative: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Filters for `GET /audit/query` and `GET /decisions/query`.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub agent_id: Option<String>,
    pub verdict: Option<Verdict>,
    pub intent_id: Option<String>,
    pub limit: u32,
}

impl AuditQuery {
    pub const MAX_LIMIT: u32 = 1000;
    pub const DEFAULT_LIMIT: u32 = 100;
}

/// Redact an action parameter snapshot for standard-level audits: structure
/// is preserved, leaf values are not.
pub fn redact_params(params: &Value) -> Value {
    match params {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_params(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_params).collect()),
        Value::String(_) => Value::String("[redacted]".to_string()),
        other => other.clone(),
    }
}

/// Snapshot params at the level the intent's constraints request.
pub fn snapshot_params(params: &Value, level: AuditLevel) -> Value {
    match level {
        AuditLevel::Detailed => params.clone(),
        AuditLevel::Standard => redact_params(params),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redaction_preserves_structure() {
        let params = json!({
            "subject": "quarterly numbers",
            "recipients": ["a@x.io"],
            "count": 3,
            "urgent": true
        });
        let redacted = redact_params(&params);
        assert_eq!(redacted["subject"], "[redacted]");
        assert_eq!(redacted["recipients"][0], "[redacted]");
        assert_eq!(redacted["count"], 3);
        assert_eq!(redacted["urgent"], true);
    }

    #[test]
    fn test_detailed_level_keeps_params() {
        let params = json!({"body": "secret"});
        assert_eq!(snapshot_params(&params, AuditLevel::Detailed), params);
        assert_eq!(
            snapshot_params(&params, AuditLevel::Standard)["body"],
            "[redacted]"
        );
    }
}
