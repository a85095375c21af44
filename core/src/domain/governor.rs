// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Governor
//!
//! Pure, deterministic policy evaluation:
//! `(Intent, Action, Context, Inputs) -> Decision`. No I/O happens here; the
//! wall clock and the loop/rate counters are injected through
//! [`GovernorInputs`] so the same inputs always reproduce the same decision.
//!
//! ## Evaluation pipeline
//!
//! ```text
//! compute risk -> scope (risk dominates) -> drafts_only degrade
//!   -> clawdbot tool allow/block lists -> work hours -> exfiltration
//!   -> max_recipients -> confirm_irreversible -> escalate_risk_levels
//!   -> approval gate -> loop detection -> rate guard -> ALLOW
//! ```
//!
//! Scope is checked before any constraint: an out-of-scope `send` blocks
//! with `SCOPE_VIOLATION` (or `RISK_TOO_HIGH` at critical risk) even when
//! `drafts_only` is set; only in-scope sends degrade to drafts.

use chrono::{DateTime, Timelike, Utc};
use serde_json::Value;

use super::action::{canonical_json, Action};
use super::decision::{
    Decision, Escalation, EscalationOption, ReasonCode, SafeAlternative,
};
use super::intent::{is_read_op, Intent, RiskLevel};

/// Literal substrings that mark a command or parameter set as destructive.
const DANGEROUS_PARAM_PATTERNS: &[&str] = &["rm -rf", "DROP TABLE", "; rm ", "mkfs", "dd if="];

/// Op/param substrings that indicate data leaving the tenant boundary.
const EXTERNAL_SHARING_PATTERNS: &[&str] = &["export", "upload", "share", "send_to", "external"];

/// Ops that address recipients.
const SEND_CLASS_OPS: &[&str] = &["send", "create_event", "create_issue"];

/// Approval token that clears a pending escalation on retry.
const APPROVAL_ALLOW_ONCE: &str = "allow_once";

/// Request-scoped context the caller resolved before evaluation.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    pub agent_id: Option<String>,
    pub tenant_id: Option<String>,
    pub session_id: Option<String>,
    /// Approval tokens carried over from a previous ESCALATE round.
    pub approvals: Vec<String>,
}

impl DecisionContext {
    fn approved_once(&self) -> bool {
        self.approvals.iter().any(|a| a == APPROVAL_ALLOW_ONCE)
    }
}

/// Everything the Governor needs that would otherwise require I/O.
#[derive(Debug, Clone)]
pub struct GovernorInputs {
    pub now: DateTime<Utc>,
    /// Decisions already recorded for this action fingerprint inside the
    /// loop-detection window.
    pub recent_fingerprint_count: u32,
    /// Actions this principal performed in the last minute.
    pub actions_last_minute: u32,
}

/// Tunable policy knobs, loaded once from configuration.
#[derive(Debug, Clone)]
pub struct GovernorPolicy {
    pub loop_detection_threshold: u32,
    pub loop_detection_window_seconds: u64,
    pub max_actions_per_minute: u32,
    pub work_hours_start: u32,
    pub work_hours_end: u32,
}

impl Default for GovernorPolicy {
    fn default() -> Self {
        Self {
            loop_detection_threshold: 5,
            loop_detection_window_seconds: 10,
            max_actions_per_minute: 30,
            work_hours_start: 9,
            work_hours_end: 18,
        }
    }
}

/// Deterministic policy evaluation engine.
#[derive(Debug, Clone, Default)]
pub struct Governor {
    policy: GovernorPolicy,
}

impl Governor {
    pub fn new(policy: GovernorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GovernorPolicy {
        &self.policy
    }

    /// Evaluate an action against an intent. Never fails; every outcome is a
    /// [`Decision`] value.
    pub fn evaluate(
        &self,
        intent: &Intent,
        action: &Action,
        context: &DecisionContext,
        inputs: &GovernorInputs,
    ) -> Decision {
        let constraints = &intent.constraints;

        // Risk is computed first; it is consulted by several later rules and
        // recorded in the audit trail regardless of the verdict.
        let (computed_risk, dangerous_params) = self.compute_risk(intent, action);

        // Scope check; a critical risk dominates the scope reason.
        if !intent.allows(&action.tool, &action.op) {
            if computed_risk == RiskLevel::Critical {
                return Decision::block(
                    ReasonCode::RiskTooHigh,
                    format!(
                        "Dangerous operation blocked: {}.{} (also out of scope)",
                        action.tool, action.op
                    ),
                    computed_risk,
                );
            }
            let allowed = intent
                .scope
                .get(&action.tool)
                .cloned()
                .unwrap_or_default();
            return Decision::block(
                ReasonCode::ScopeViolation,
                format!(
                    "Action {}.{} not in scope. Allowed: {:?}",
                    action.tool, action.op, allowed
                ),
                computed_risk,
            );
        }

        // Destructive commands are blocked outright even when in scope.
        if dangerous_params {
            return Decision::block(
                ReasonCode::RiskTooHigh,
                format!("Dangerous command pattern detected in {}.{}", action.tool, action.op),
                computed_risk,
            );
        }

        // drafts_only downgrades in-scope send ops to drafts.
        if constraints.drafts_only && action.op == "send" {
            return Decision::degrade(
                "Intent requires drafts_only, degrading send to draft",
                SafeAlternative {
                    tool: action.tool.clone(),
                    op: "draft".to_string(),
                    params: action.params.clone(),
                },
                computed_risk,
            );
        }

        // Inner-tool filtering for the bot-gateway proxy. The block list
        // takes precedence over the allow list.
        if action.tool == "clawdbot" && action.op == "invoke" {
            let inner = action
                .params
                .get("tool")
                .and_then(Value::as_str)
                .unwrap_or("");
            if constraints.blocked_clawdbot_tools.iter().any(|t| t == inner) {
                return Decision::block(
                    ReasonCode::ScopeViolation,
                    format!("Clawdbot tool '{inner}' is explicitly blocked by this intent"),
                    computed_risk,
                );
            }
            if let Some(allowed) = &constraints.allowed_clawdbot_tools {
                if !allowed.iter().any(|t| t == inner) {
                    return Decision::block(
                        ReasonCode::ScopeViolation,
                        format!(
                            "Clawdbot tool '{inner}' not in allowed list. Allowed: {allowed:?}"
                        ),
                        computed_risk,
                    );
                }
            }
        }

        if constraints.work_hours_only && !self.is_work_hours(inputs.now) {
            return Decision::block(
                ReasonCode::OutOfHours,
                format!(
                    "Action requested outside work hours (current: {:02}:00, work hours: {}-{})",
                    inputs.now.hour(),
                    self.policy.work_hours_start,
                    self.policy.work_hours_end
                ),
                computed_risk,
            );
        }

        if constraints.no_external_sharing && is_external_sharing(action) {
            return Decision::block(
                ReasonCode::DataExfil,
                format!("External sharing detected in {} operation", action.op),
                computed_risk,
            );
        }

        if let Some(max) = constraints.max_recipients {
            let count = action.recipients().len() as u32;
            if count > max && !context.approved_once() {
                return Decision::escalate(
                    ReasonCode::NeedConfirmation,
                    format!(
                        "Recipient count ({count}) exceeds max ({max}). Requires confirmation."
                    ),
                    Escalation {
                        question: format!(
                            "Send to {count} recipients? (max allowed: {max})"
                        ),
                        options: vec![
                            EscalationOption::new("allow_once", "Allow once"),
                            EscalationOption::new("draft_only", "Save as draft only"),
                            EscalationOption::new("keep_blocking", "Keep blocking"),
                        ],
                    },
                    computed_risk,
                );
            }
        }

        if constraints.confirm_irreversible
            && computed_risk >= RiskLevel::High
            && !context.approved_once()
        {
            return Decision::escalate(
                ReasonCode::NeedConfirmation,
                format!(
                    "Irreversible operation requires confirmation (risk: {computed_risk})"
                ),
                confirm_escalation(),
                computed_risk,
            );
        }

        if let Some(levels) = &constraints.escalate_risk_levels {
            if levels.contains(&computed_risk) && !context.approved_once() {
                return Decision::escalate(
                    ReasonCode::NeedConfirmation,
                    format!(
                        "Risk level {computed_risk} requires user confirmation"
                    ),
                    confirm_escalation(),
                    computed_risk,
                );
            }
        }

        // Approval gate: a non-approved intent only admits read ops at low risk.
        if !intent.approved_by_user
            && (!is_read_op(&action.op) || computed_risk >= RiskLevel::Medium)
        {
            return Decision::escalate(
                ReasonCode::IntentNotApproved,
                "Intent has not been approved by the user; side effects require approval",
                Escalation {
                    question: "This intent has not been approved. Approve this action?".to_string(),
                    options: vec![
                        EscalationOption::new("allow_once", "Allow once"),
                        EscalationOption::new("keep_blocking", "Keep blocking"),
                    ],
                },
                computed_risk,
            );
        }

        if inputs.recent_fingerprint_count >= self.policy.loop_detection_threshold {
            return Decision::pause(
                ReasonCode::LoopDetected,
                format!(
                    "Loop detected: {}.{} repeated {}+ times in {}s",
                    action.tool,
                    action.op,
                    self.policy.loop_detection_threshold,
                    self.policy.loop_detection_window_seconds
                ),
                computed_risk,
            );
        }

        if inputs.actions_last_minute >= self.policy.max_actions_per_minute {
            return Decision::pause(
                ReasonCode::RateLimit,
                format!(
                    "Rate limit exceeded: {} actions per minute",
                    self.policy.max_actions_per_minute
                ),
                computed_risk,
            );
        }

        Decision::allow(
            "Action approved: within scope, constraints satisfied, risk acceptable",
            computed_risk,
        )
    }

    /// Server-side risk computation. Returns the escalated risk and whether a
    /// destructive command pattern was the cause.
    fn compute_risk(&self, intent: &Intent, action: &Action) -> (RiskLevel, bool) {
        let mut risk = action.estimated_risk.unwrap_or(RiskLevel::Low);
        let mut dangerous = false;

        if action.tool == "shell" && action.op == "run" {
            risk = RiskLevel::Critical;
        }

        let serialized = canonical_json(&action.params);
        if DANGEROUS_PARAM_PATTERNS.iter().any(|p| serialized.contains(p)) {
            risk = RiskLevel::Critical;
            dangerous = true;
        }

        if action.tool == "filesystem"
            && matches!(action.op.as_str(), "delete" | "delete_file" | "write" | "write_file")
            && path_escapes_sandbox(&action.params)
        {
            risk = RiskLevel::Critical;
        }

        let recipients = action.recipients().len() as u32;
        if SEND_CLASS_OPS.contains(&action.op.as_str()) {
            match intent.constraints.max_recipients {
                None if recipients > 1 => risk = RiskLevel::Critical,
                Some(max) if recipients > max => risk = risk.max(RiskLevel::High),
                _ => {}
            }
        }

        (risk, dangerous)
    }

    fn is_work_hours(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        hour >= self.policy.work_hours_start && hour < self.policy.work_hours_end
    }
}

fn confirm_escalation() -> Escalation {
    Escalation {
        question: "This operation requires confirmation. Proceed?".to_string(),
        options: vec![
            EscalationOption::new("allow_once", "Allow once"),
            EscalationOption::new("keep_blocking", "Keep blocking"),
        ],
    }
}

/// A filesystem target is inside the declared sandbox only when it is a
/// plain relative path with no parent traversal.
fn path_escapes_sandbox(params: &Value) -> bool {
    let path = params.get("path").and_then(Value::as_str).unwrap_or("");
    if path.is_empty() {
        return false;
    }
    path.starts_with('/')
        || path.starts_with('\\')
        || path.contains(':')
        || path.split(['/', '\\']).any(|c| c == "..")
}

fn is_external_sharing(action: &Action) -> bool {
    let op = action.op.to_ascii_lowercase();
    if EXTERNAL_SHARING_PATTERNS.iter().any(|p| op.contains(p)) {
        return true;
    }
    let params = canonical_json(&action.params).to_ascii_lowercase();
    EXTERNAL_SHARING_PATTERNS.iter().any(|p| params.contains(p))
}
