// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Auditor
//!
//! Writes exactly one audit event and one decision record per decided
//! request, in a single store transaction. Timestamps are UTC and
//! monotonically non-decreasing in insertion order per process.
//!
//! A persistence failure never masks the decision: it is logged, counted in
//! `audit_write_failures`, and the caller still receives the decision with a
//! freshly generated id.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::error;

use crate::domain::action::Action;
use crate::domain::audit::{snapshot_params, ActionSnapshot, AuditEvent, DecisionRecord};
use crate::domain::decision::{new_decision_id, Decision};
use crate::domain::governor::DecisionContext;
use crate::domain::intent::Intent;
use crate::domain::repository::AuditRepository;

use super::metrics::MetricsCollector;

pub struct Auditor {
    repository: Arc<dyn AuditRepository>,
    metrics: Arc<MetricsCollector>,
}

impl Auditor {
    pub fn new(repository: Arc<dyn AuditRepository>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            repository,
            metrics,
        }
    }

    /// Persist a decided action. Returns the decision id — a generated one
    /// even when the write fails, so the response envelope stays complete.
    pub async fn record(
        &self,
        intent: &Intent,
        action: &Action,
        context: &DecisionContext,
        decision: &Decision,
        latency_ms: f64,
    ) -> String {
        let decision_id = new_decision_id();
        let now = Utc::now();

        let params = snapshot_params(&action.params, intent.constraints.audit_level);
        let event = AuditEvent {
            event_id: format!("evt-{}", uuid::Uuid::new_v4()),
            decision_id: decision_id.clone(),
            tenant_id: context.tenant_id.clone(),
            agent_id: context.agent_id.clone(),
            intent_id: Some(intent.intent_id.clone()),
            action: ActionSnapshot {
                tool: action.tool.clone(),
                op: action.op.clone(),
                params,
                estimated_risk: action.estimated_risk,
                computed_risk: decision.computed_risk,
            },
            context: context_snapshot(context),
            verdict: decision.verdict,
            reason_code: decision.reason_code,
            explanation: decision.explanation.clone(),
            timestamp: now,
            latency_ms,
        };

        let record = DecisionRecord {
            decision_id: decision_id.clone(),
            action_fingerprint: action.fingerprint(&intent.intent_id),
            verdict: decision.verdict,
            reason_code: decision.reason_code,
            explanation: decision.explanation.clone(),
            safe_alternative: decision
                .safe_alternative
                .as_ref()
                .map(|alt| serde_json::to_value(alt).unwrap_or(Value::Null)),
            escalation: decision
                .escalation
                .as_ref()
                .map(|esc| serde_json::to_value(esc).unwrap_or(Value::Null)),
            intent_id: Some(intent.intent_id.clone()),
            agent_id: context.agent_id.clone(),
            timestamp: now,
        };

        if let Err(e) = self.repository.save_event(&event, &record).await {
            error!("Failed to persist audit event for {decision_id}: {e}");
            self.metrics.record_audit_write_failure();
        }

        decision_id
    }
}

/// Context snapshot for the audit row. The intent id lives in its own
/// column and must not be duplicated here.
fn context_snapshot(context: &DecisionContext) -> Value {
    let mut snapshot = json!({});
    if let Some(agent_id) = &context.agent_id {
        snapshot["agent_id"] = json!(agent_id);
    }
    if let Some(tenant_id) = &context.tenant_id {
        snapshot["tenant_id"] = json!(tenant_id);
    }
    if let Some(session_id) = &context.session_id {
        snapshot["session_id"] = json!(session_id);
    }
    if !context.approvals.is_empty() {
        snapshot["approvals"] = json!(context.approvals);
    }
    snapshot
}
