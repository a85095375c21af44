// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Service
//!
//! The handler core behind `/execute` and `/clawdbot/invoke`:
//!
//! 1. resolve the governing intent,
//! 2. gather loop/rate inputs from the store,
//! 3. run the Governor (pure),
//! 4. persist the decision through the Auditor,
//! 5. dispatch executable verdicts to the matching connector.
//!
//! The connector is contacted only for ALLOW/DEGRADE verdicts, and only when
//! the intent was approved (or the degrade produced a read/draft
//! alternative). A BLOCK never reaches the downstream.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::domain::action::Action;
use crate::domain::decision::{Decision, Verdict};
use crate::domain::governor::{DecisionContext, Governor, GovernorInputs};
use crate::domain::intent::{is_read_op, Intent};
use crate::domain::repository::{AuditRepository, IntentRepository, StoreError, TenantRepository};
use crate::infrastructure::connectors::{
    ConnectorError, ConnectorRegistry, ExecutionContext,
};
use crate::infrastructure::vault::{Vault, VaultError};

use super::auditor::Auditor;
use super::metrics::MetricsCollector;

/// Tools whose connectors require a vault credential before execution.
fn requires_credential(tool: &str) -> bool {
    matches!(tool, "clawdbot" | "brave_search")
}

/// Pipeline failure kinds surfaced to the HTTP error mapper. Decisions are
/// never errors; only infrastructure failures appear here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    CredentialMissing(String),

    #[error("{0}")]
    DownstreamUnavailable(String),

    #[error("Downstream error ({status}): {detail}")]
    Downstream { status: u16, detail: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The `execution` block of the decision envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionBlock {
    pub tool: String,
    pub op: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<Value>,
}

/// Input to one decided request.
#[derive(Debug, Clone)]
pub struct DecideRequest {
    pub action: Action,
    /// Explicit intent id (header or body), if any.
    pub intent_id: Option<String>,
    pub context: DecisionContext,
    /// Explicit credential selection for the proxy path.
    pub credential_id: Option<String>,
}

/// Outcome of one decided request.
#[derive(Debug, Clone)]
pub struct DecisionOutput {
    pub decision: Decision,
    pub decision_id: String,
    pub intent_id: String,
    pub execution: Option<ExecutionBlock>,
}

pub struct DecisionService {
    governor: Governor,
    intents: Arc<dyn IntentRepository>,
    tenants: Arc<dyn TenantRepository>,
    audit: Arc<dyn AuditRepository>,
    auditor: Auditor,
    vault: Arc<Vault>,
    connectors: Arc<ConnectorRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl DecisionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        governor: Governor,
        intents: Arc<dyn IntentRepository>,
        tenants: Arc<dyn TenantRepository>,
        audit: Arc<dyn AuditRepository>,
        auditor: Auditor,
        vault: Arc<Vault>,
        connectors: Arc<ConnectorRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            governor,
            intents,
            tenants,
            audit,
            auditor,
            vault,
            connectors,
            metrics,
        }
    }

    /// Resolve the governing intent: explicit id -> tenant default ->
    /// latest for tenant -> synthesized minimal intent.
    async fn resolve_intent(
        &self,
        request: &DecideRequest,
    ) -> Result<Intent, StoreError> {
        if let Some(intent_id) = &request.intent_id {
            if let Some(intent) = self.intents.get(intent_id).await? {
                return Ok(intent);
            }
        }

        let tenant_id = request.context.tenant_id.as_deref();
        if let Some(tenant) = tenant_id {
            if let Some(default_id) = self.tenants.get_default_intent(tenant).await? {
                if let Some(intent) = self.intents.get(&default_id).await? {
                    return Ok(intent);
                }
            }
        }

        if let Some(intent) = self.intents.latest(tenant_id).await? {
            return Ok(intent);
        }

        Ok(Intent::synthesized(
            tenant_id.map(str::to_string),
            &request.action.tool,
            &request.action.op,
            Utc::now(),
        ))
    }

    /// Decide an action and, when the verdict allows it, execute it.
    pub async fn decide_and_execute(
        &self,
        request: DecideRequest,
    ) -> Result<DecisionOutput, PipelineError> {
        let intent = self.resolve_intent(&request).await?;

        let now = Utc::now();
        let fingerprint = request.action.fingerprint(&intent.intent_id);
        let loop_window = self.governor.policy().loop_detection_window_seconds as i64;
        let recent_fingerprint_count = self
            .audit
            .count_recent_decisions(&fingerprint, now - Duration::seconds(loop_window))
            .await?;
        let actions_last_minute = match &request.context.agent_id {
            Some(agent_id) => {
                self.audit
                    .count_recent_actions(agent_id, now - Duration::seconds(60))
                    .await?
            }
            None => 0,
        };

        let started = Instant::now();
        let decision = self.governor.evaluate(
            &intent,
            &request.action,
            &request.context,
            &GovernorInputs {
                now,
                recent_fingerprint_count,
                actions_last_minute,
            },
        );
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.metrics
            .record_decision(decision.verdict, decision.reason_code, latency_ms);

        let decision_id = self
            .auditor
            .record(&intent, &request.action, &request.context, &decision, latency_ms)
            .await;

        info!(
            verdict = decision.verdict.as_str(),
            reason = decision.reason_code.as_str(),
            tool = %request.action.tool,
            op = %request.action.op,
            "decision recorded"
        );

        let execution = if self.should_execute(&intent, &decision) {
            Some(self.execute(&request, &intent, &decision).await?)
        } else {
            None
        };

        Ok(DecisionOutput {
            decision,
            decision_id,
            intent_id: intent.intent_id,
            execution,
        })
    }

    /// An unapproved intent never executes, with one exception: a DEGRADE
    /// whose safe alternative is itself a read or draft op.
    fn should_execute(&self, intent: &Intent, decision: &Decision) -> bool {
        if !decision.verdict.is_executable() {
            return false;
        }
        if intent.approved_by_user {
            return true;
        }
        match (&decision.verdict, &decision.safe_alternative) {
            (Verdict::Degrade, Some(alt)) => alt.op == "draft" || is_read_op(&alt.op),
            _ => false,
        }
    }

    async fn execute(
        &self,
        request: &DecideRequest,
        intent: &Intent,
        decision: &Decision,
    ) -> Result<ExecutionBlock, PipelineError> {
        // DEGRADE executes the safe alternative, not the requested op.
        let (tool, op, params) = match &decision.safe_alternative {
            Some(alt) => (alt.tool.clone(), alt.op.clone(), alt.params.clone()),
            None => (
                request.action.tool.clone(),
                request.action.op.clone(),
                request.action.params.clone(),
            ),
        };

        // Credentials resolve before any dispatch so strict mode fails
        // closed without touching a connector.
        let tenant_id = request
            .context
            .tenant_id
            .as_deref()
            .or(intent.tenant_id.as_deref());
        let credential = if requires_credential(&tool) {
            match self
                .vault
                .get_for_execution(&tool, tenant_id, request.credential_id.as_deref())
                .await
            {
                Ok(handle) => Some(handle),
                Err(VaultError::CredentialMissing(tool)) => {
                    return Err(PipelineError::CredentialMissing(format!(
                        "Credential missing for tool '{tool}'. Configure via POST /credentials/set."
                    )));
                }
                Err(VaultError::Store(e)) => return Err(e.into()),
            }
        } else {
            None
        };

        let Some(connector) = self.connectors.get(&tool) else {
            return Ok(ExecutionBlock {
                tool,
                op,
                ok: false,
                result: None,
                error: Some("No connector registered for this tool".to_string()),
                observation: None,
            });
        };

        let ctx = ExecutionContext {
            tenant_id: tenant_id.map(str::to_string),
            agent_id: request.context.agent_id.clone(),
        };

        match connector.execute(&op, &params, credential.as_ref(), &ctx).await {
            Ok(outcome) => Ok(ExecutionBlock {
                tool,
                op,
                ok: outcome.ok,
                result: outcome.result,
                error: outcome.error,
                observation: outcome.observation,
            }),
            Err(ConnectorError::DownstreamUnavailable(detail)) => {
                Err(PipelineError::DownstreamUnavailable(detail))
            }
            Err(ConnectorError::Downstream { status, detail }) => {
                Err(PipelineError::Downstream { status, detail })
            }
            Err(ConnectorError::NotConfigured(detail)) => {
                Err(PipelineError::CredentialMissing(detail))
            }
            // Sandbox refusals and unsupported ops are soft failures inside
            // the execution block; the decision itself stands.
            Err(other) => Ok(ExecutionBlock {
                tool,
                op,
                ok: false,
                result: None,
                error: Some(other.to_string()),
                observation: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::ReasonCode;
    use crate::domain::governor::GovernorPolicy;
    use crate::domain::intent::{Constraints, RiskLevel};
    use crate::infrastructure::connectors::{Connector, ExecutionOutcome};
    use crate::infrastructure::db::Database;
    use crate::infrastructure::repositories::{
        SqliteAuditRepository, SqliteCredentialRepository, SqliteIntentRepository,
        SqliteTenantRepository,
    };
    use crate::infrastructure::vault::{EnvFallback, Vault};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts executions so tests can assert the downstream is never
    /// contacted for blocked verdicts.
    struct CountingConnector {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        fn tool_name(&self) -> &str {
            "email"
        }

        async fn execute(
            &self,
            _op: &str,
            _params: &Value,
            _credential: Option<&crate::domain::credential::CredentialHandle>,
            _ctx: &ExecutionContext,
        ) -> Result<ExecutionOutcome, ConnectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExecutionOutcome::success(json!({"sent": true})))
        }
    }

    struct Harness {
        service: DecisionService,
        intents: Arc<SqliteIntentRepository>,
        audit: Arc<SqliteAuditRepository>,
        calls: Arc<AtomicUsize>,
    }

    async fn harness(strict: bool) -> Harness {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let intents = Arc::new(SqliteIntentRepository::new(db.pool().clone()));
        let tenants = Arc::new(SqliteTenantRepository::new(db.pool().clone()));
        let audit = Arc::new(SqliteAuditRepository::new(db.pool().clone()));
        let credentials = Arc::new(SqliteCredentialRepository::new(db.pool().clone()));
        let metrics = Arc::new(MetricsCollector::new());
        let vault = Arc::new(Vault::new(credentials, strict, EnvFallback::default()));

        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(CountingConnector {
            calls: calls.clone(),
        }));

        let auditor = Auditor::new(audit.clone(), metrics.clone());
        let service = DecisionService::new(
            Governor::new(GovernorPolicy::default()),
            intents.clone(),
            tenants,
            audit.clone(),
            auditor,
            vault,
            Arc::new(registry),
            metrics,
        );
        Harness {
            service,
            intents,
            audit,
            calls,
        }
    }

    fn approved_intent(id: &str) -> Intent {
        let mut scope = BTreeMap::new();
        scope.insert(
            "email".to_string(),
            vec!["read".to_string(), "send".to_string()],
        );
        Intent {
            intent_id: id.to_string(),
            tenant_id: None,
            objective: "Handle email".to_string(),
            scope,
            constraints: Constraints::default(),
            risk_level: RiskLevel::Low,
            approved_by_user: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(action: Action, intent_id: Option<&str>) -> DecideRequest {
        DecideRequest {
            action,
            intent_id: intent_id.map(str::to_string),
            context: DecisionContext {
                agent_id: Some("agent-test".to_string()),
                ..Default::default()
            },
            credential_id: None,
        }
    }

    #[tokio::test]
    async fn test_allow_executes_and_audits() {
        let h = harness(false).await;
        h.intents.save(&approved_intent("intent_1")).await.unwrap();

        let output = h
            .service
            .decide_and_execute(request(
                Action::new("email", "send", json!({"recipients": ["a@x.io"]})),
                Some("intent_1"),
            ))
            .await
            .unwrap();

        assert_eq!(output.decision.verdict, Verdict::Allow);
        let execution = output.execution.unwrap();
        assert!(execution.ok);
        assert_eq!(execution.tool, "email");
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        // Exactly one audit row and one decision row exist.
        let events = h
            .audit
            .query_events(&crate::domain::audit::AuditQuery {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(h
            .audit
            .get_decision(&output.decision_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_block_never_contacts_connector() {
        let h = harness(false).await;
        h.intents.save(&approved_intent("intent_1")).await.unwrap();

        let output = h
            .service
            .decide_and_execute(request(
                Action::new("shell", "run", json!({"cmd": "rm -rf /"})),
                Some("intent_1"),
            ))
            .await
            .unwrap();

        assert_eq!(output.decision.verdict, Verdict::Block);
        assert_eq!(output.decision.reason_code, ReasonCode::RiskTooHigh);
        assert!(output.execution.is_none());
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);

        // The audit event still exists with the computed risk.
        let events = h
            .audit
            .query_events(&crate::domain::audit::AuditQuery {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action.computed_risk, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn test_unknown_intent_id_synthesizes_minimal_intent() {
        let h = harness(false).await;

        // Read op under a synthesized intent: ALLOW, but not executed
        // (the synthesized intent is not approved).
        let output = h
            .service
            .decide_and_execute(request(
                Action::new("email", "read", json!({})),
                Some("missing_intent"),
            ))
            .await
            .unwrap();
        assert_eq!(output.decision.verdict, Verdict::Allow);
        assert!(output.execution.is_none());
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);

        // A send op under a synthesized intent is out of scope.
        let output = h
            .service
            .decide_and_execute(request(
                Action::new("email", "send", json!({"recipients": ["a@x.io"]})),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(output.decision.verdict, Verdict::Block);
        assert_eq!(output.decision.reason_code, ReasonCode::ScopeViolation);
    }

    #[tokio::test]
    async fn test_loop_detection_over_persisted_decisions() {
        let h = harness(false).await;
        h.intents.save(&approved_intent("intent_1")).await.unwrap();
        let action = Action::new("email", "read", json!({"folder": "inbox"}));

        for i in 0..5 {
            let output = h
                .service
                .decide_and_execute(request(action.clone(), Some("intent_1")))
                .await
                .unwrap();
            assert_eq!(output.decision.verdict, Verdict::Allow, "call {i} should allow");
        }
        let sixth = h
            .service
            .decide_and_execute(request(action, Some("intent_1")))
            .await
            .unwrap();
        assert_eq!(sixth.decision.verdict, Verdict::Pause);
        assert_eq!(sixth.decision.reason_code, ReasonCode::LoopDetected);
        assert!(sixth.execution.is_none());
    }

    #[tokio::test]
    async fn test_strict_credentials_fail_closed_before_downstream() {
        let h = harness(true).await;
        let mut intent = approved_intent("intent_1");
        intent
            .scope
            .insert("clawdbot".to_string(), vec!["invoke".to_string()]);
        h.intents.save(&intent).await.unwrap();

        let err = h
            .service
            .decide_and_execute(request(
                Action::new("clawdbot", "invoke", json!({"tool": "sessions_list"})),
                Some("intent_1"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::CredentialMissing(_)));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }
}
