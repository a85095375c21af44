// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decisions
//!
//! The Governor's output: a [`Verdict`] plus a deterministic [`ReasonCode`],
//! a human-readable explanation, and (depending on the verdict) a safe
//! alternative or an escalation question. Decisions are immutable once
//! persisted.
//!
//! Invariants enforced by construction:
//! - `reason_code == Approved` iff `verdict == Allow`
//! - `safe_alternative` is present iff `verdict == Degrade`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::intent::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow,
    Degrade,
    Escalate,
    Block,
    Pause,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Degrade => "DEGRADE",
            Self::Escalate => "ESCALATE",
            Self::Block => "BLOCK",
            Self::Pause => "PAUSE",
        }
    }

    /// Only ALLOW and DEGRADE verdicts may reach a connector.
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Allow | Self::Degrade)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ALLOW" => Some(Self::Allow),
            "DEGRADE" => Some(Self::Degrade),
            "ESCALATE" => Some(Self::Escalate),
            "BLOCK" => Some(Self::Block),
            "PAUSE" => Some(Self::Pause),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed enum explaining a verdict, strictly determined by the verdict plus
/// the triggering rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Approved,
    DegradedToSafeAlternative,
    NeedConfirmation,
    IntentNotApproved,
    ScopeViolation,
    RiskTooHigh,
    DataExfil,
    OutOfHours,
    LoopDetected,
    RateLimit,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::DegradedToSafeAlternative => "DEGRADED_TO_SAFE_ALTERNATIVE",
            Self::NeedConfirmation => "NEED_CONFIRMATION",
            Self::IntentNotApproved => "INTENT_NOT_APPROVED",
            Self::ScopeViolation => "SCOPE_VIOLATION",
            Self::RiskTooHigh => "RISK_TOO_HIGH",
            Self::DataExfil => "DATA_EXFIL",
            Self::OutOfHours => "OUT_OF_HOURS",
            Self::LoopDetected => "LOOP_DETECTED",
            Self::RateLimit => "RATE_LIMIT",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable option attached to an escalation question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationOption {
    pub id: String,
    pub label: String,
}

impl EscalationOption {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

/// Confirmation question carried by ESCALATE decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub question: String,
    pub options: Vec<EscalationOption>,
}

/// Downgraded action offered instead of the requested one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeAlternative {
    pub tool: String,
    pub op: String,
    pub params: Value,
}

/// The Governor's verdict plus reasoning for a specific (intent, action,
/// context). `decision_id` is assigned at persistence time by the Auditor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason_code: ReasonCode,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_alternative: Option<SafeAlternative>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Escalation>,
    /// Server-side computed risk, retained for the audit trail.
    pub computed_risk: RiskLevel,
}

impl Decision {
    pub fn allow(explanation: impl Into<String>, computed_risk: RiskLevel) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason_code: ReasonCode::Approved,
            explanation: explanation.into(),
            safe_alternative: None,
            escalation: None,
            computed_risk,
        }
    }

    pub fn degrade(
        explanation: impl Into<String>,
        safe_alternative: SafeAlternative,
        computed_risk: RiskLevel,
    ) -> Self {
        Self {
            verdict: Verdict::Degrade,
            reason_code: ReasonCode::DegradedToSafeAlternative,
            explanation: explanation.into(),
            safe_alternative: Some(safe_alternative),
            escalation: None,
            computed_risk,
        }
    }

    pub fn escalate(
        reason_code: ReasonCode,
        explanation: impl Into<String>,
        escalation: Escalation,
        computed_risk: RiskLevel,
    ) -> Self {
        debug_assert!(matches!(
            reason_code,
            ReasonCode::NeedConfirmation | ReasonCode::IntentNotApproved
        ));
        Self {
            verdict: Verdict::Escalate,
            reason_code,
            explanation: explanation.into(),
            safe_alternative: None,
            escalation: Some(escalation),
            computed_risk,
        }
    }

    pub fn block(
        reason_code: ReasonCode,
        explanation: impl Into<String>,
        computed_risk: RiskLevel,
    ) -> Self {
        debug_assert!(matches!(
            reason_code,
            ReasonCode::ScopeViolation
                | ReasonCode::RiskTooHigh
                | ReasonCode::DataExfil
                | ReasonCode::OutOfHours
        ));
        Self {
            verdict: Verdict::Block,
            reason_code,
            explanation: explanation.into(),
            safe_alternative: None,
            escalation: None,
            computed_risk,
        }
    }

    pub fn pause(
        reason_code: ReasonCode,
        explanation: impl Into<String>,
        computed_risk: RiskLevel,
    ) -> Self {
        debug_assert!(matches!(
            reason_code,
            ReasonCode::LoopDetected | ReasonCode::RateLimit
        ));
        Self {
            verdict: Verdict::Pause,
            reason_code,
            explanation: explanation.into(),
            safe_alternative: None,
            escalation: None,
            computed_risk,
        }
    }
}

/// Generate a fresh decision identifier.
pub fn new_decision_id() -> String {
    format!("dec-{}", uuid::Uuid::new_v4())
}
