// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Intent Contracts
//!
//! An [`Intent`] is a tenant-scoped contract describing what an agent is
//! permitted to do: a tool→ops scope map, a set of well-known constraints,
//! a declared risk posture, and whether a human approved it. Intents are
//! created via `POST /intent/set` or by applying a policy pack; they are
//! never deleted, only superseded.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Risk posture of an intent or a computed action risk.
///
/// Ordering is meaningful: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the action the auditor snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    #[default]
    Standard,
    /// Capture full params in the audit snapshot.
    Detailed,
}

/// Well-known constraint keys recognized by the Governor.
///
/// Unknown keys are preserved round-trip in `extra` so that older intents
/// stored with additional keys keep their payload intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// `send` ops are downgraded to `draft`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub drafts_only: bool,

    /// Maximum recipients for send-class ops; exceeding escalates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recipients: Option<u32>,

    /// Inner tools permitted through `clawdbot.invoke`. `None` = no filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_clawdbot_tools: Option<Vec<String>>,

    /// Inner tools blocked through `clawdbot.invoke`. Takes precedence over
    /// `allowed_clawdbot_tools`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_clawdbot_tools: Vec<String>,

    /// Ops with computed risk >= high escalate for confirmation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub confirm_irreversible: bool,

    /// Block actions outside 09:00-18:00.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub work_hours_only: bool,

    /// Computed risk levels that escalate unless pre-approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalate_risk_levels: Option<Vec<RiskLevel>>,

    /// Block ops/params that look like external data sharing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_external_sharing: bool,

    /// `detailed` captures full params in audit snapshots.
    #[serde(default, skip_serializing_if = "is_default_audit_level")]
    pub audit_level: AuditLevel,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn is_default_audit_level(level: &AuditLevel) -> bool {
    *level == AuditLevel::Standard
}

/// A tenant-scoped contract of permissible tools, ops and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub intent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub objective: String,
    /// tool name -> set of allowed operations
    pub scope: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub constraints: Constraints,
    pub risk_level: RiskLevel,
    pub approved_by_user: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Intent {
    /// Whether `tool.op` falls inside this intent's scope.
    pub fn allows(&self, tool: &str, op: &str) -> bool {
        self.scope
            .get(tool)
            .map(|ops| ops.iter().any(|o| o == op))
            .unwrap_or(false)
    }

    /// Minimal non-approved intent admitting only `tool.op`, used when no
    /// intent can be resolved for a request. Only read-class ops get a scope;
    /// everything else is left out-of-scope so the Governor blocks it.
    pub fn synthesized(tenant_id: Option<String>, tool: &str, op: &str, now: DateTime<Utc>) -> Self {
        let mut scope = BTreeMap::new();
        if is_read_op(op) {
            scope.insert(tool.to_string(), vec![op.to_string()]);
        }
        Self {
            intent_id: format!("intent_synthesized_{}", uuid::Uuid::new_v4().simple()),
            tenant_id,
            objective: "Default intent".to_string(),
            scope,
            constraints: Constraints::default(),
            risk_level: RiskLevel::Medium,
            approved_by_user: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Read-class ops carry no side effects and may be allowed under a
/// non-approved intent.
pub fn is_read_op(op: &str) -> bool {
    const READ_PREFIXES: &[&str] = &["read", "get", "list", "view", "search", "summarize", "query"];
    let op = op.to_ascii_lowercase();
    READ_PREFIXES.iter().any(|p| op == *p || op.starts_with(*p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::parse("CRITICAL"), Some(RiskLevel::Critical));
        assert_eq!(RiskLevel::parse("nope"), None);
    }

    #[test]
    fn test_constraints_roundtrip_preserves_unknown_keys() {
        let json = serde_json::json!({
            "drafts_only": true,
            "max_recipients": 3,
            "custom_flag": "kept"
        });
        let constraints: Constraints = serde_json::from_value(json).unwrap();
        assert!(constraints.drafts_only);
        assert_eq!(constraints.max_recipients, Some(3));
        assert_eq!(constraints.extra.get("custom_flag").unwrap(), "kept");

        let back = serde_json::to_value(&constraints).unwrap();
        assert_eq!(back.get("custom_flag").unwrap(), "kept");
    }

    #[test]
    fn test_scope_check() {
        let mut scope = BTreeMap::new();
        scope.insert("email".to_string(), vec!["read".to_string(), "draft".to_string()]);
        let intent = Intent {
            intent_id: "intent_test".to_string(),
            tenant_id: None,
            objective: "Handle email".to_string(),
            scope,
            constraints: Constraints::default(),
            risk_level: RiskLevel::Low,
            approved_by_user: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(intent.allows("email", "read"));
        assert!(!intent.allows("email", "send"));
        assert!(!intent.allows("shell", "run"));
    }

    #[test]
    fn test_synthesized_intent_scopes_only_read_ops() {
        let now = Utc::now();
        let read = Intent::synthesized(None, "email", "read", now);
        assert!(read.allows("email", "read"));
        assert!(!read.approved_by_user);

        let send = Intent::synthesized(None, "email", "send", now);
        assert!(!send.allows("email", "send"));
    }

    #[test]
    fn test_is_read_op() {
        assert!(is_read_op("read"));
        assert!(is_read_op("read_file"));
        assert!(is_read_op("list_messages"));
        assert!(is_read_op("search"));
        assert!(!is_read_op("send"));
        assert!(!is_read_op("invoke"));
        assert!(!is_read_op("delete_file"));
    }
}
