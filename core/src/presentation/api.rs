// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP Surface
//!
//! The axum router plus every handler. Decisions are successful HTTP
//! responses (200) carrying a verdict; only infrastructure failures produce
//! non-2xx statuses, mapped by [`super::error::ApiError`].

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header::HeaderValue, HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{middleware as axum_middleware, Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::decision_service::{DecideRequest, DecisionService, ExecutionBlock};
use crate::application::metrics::MetricsCollector;
use crate::application::policy::PolicyService;
use crate::application::rate_limiter::RateLimiter;
use crate::config::GatewayConfig;
use crate::domain::action::Action;
use crate::domain::audit::AuditQuery;
use crate::domain::decision::{Escalation, ReasonCode, SafeAlternative, Verdict};
use crate::domain::governor::DecisionContext;
use crate::domain::intent::{Constraints, Intent, RiskLevel};
use crate::domain::planner;
use crate::domain::policy_pack;
use crate::domain::repository::{
    AuditRepository, CredentialRepository, IntentRepository, TenantRepository, TokenRepository,
};
use crate::infrastructure::network_gating::validate_network_gating;
use crate::infrastructure::vault::Vault;

use super::error::ApiError;
use super::middleware::{self, AuthInfo};

/// Process-wide application state: one store handle, one configuration
/// snapshot, both initialized at startup and never mutated thereafter.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub decision_service: Arc<DecisionService>,
    pub policy_service: Arc<PolicyService>,
    pub intents: Arc<dyn IntentRepository>,
    pub tenants: Arc<dyn TenantRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub vault: Arc<Vault>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsCollector>,
}

/// Build the full router with the middleware stack:
/// CORS -> auth -> rate limit -> validation -> handler.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/version", get(version))
        .route("/intent/set", post(intent_set))
        .route("/intent/get", get(intent_get))
        .route("/execute", post(execute))
        .route("/clawdbot/invoke", post(clawdbot_invoke))
        .route("/edon/invoke", post(clawdbot_invoke))
        .route("/audit/query", get(audit_query))
        .route("/decisions/query", get(decisions_query))
        .route("/decisions/:decision_id", get(decision_get))
        .route("/credentials/set", post(credentials_set))
        .route("/credentials/:credential_id", delete(credentials_delete))
        .route("/policy-packs", get(policy_packs_list))
        .route("/policy-packs/:name/apply", post(policy_pack_apply))
        .route("/integrations/clawdbot/connect", post(clawdbot_connect))
        .route("/account/integrations", get(account_integrations))
        .route("/metrics", get(metrics_json))
        .route("/metrics/prometheus", get(metrics_prometheus))
        .route("/benchmark/trust-spec", get(trust_spec))
        .route("/plan", post(plan))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::validate,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ))
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(Any)
    }
}

// ---------------------------------------------------------------------------
// Decision envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DecisionEnvelope {
    verdict: Verdict,
    decision_id: String,
    reason_code: ReasonCode,
    explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    safe_alternative: Option<SafeAlternative>,
    #[serde(skip_serializing_if = "Option::is_none")]
    escalation: Option<Escalation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution: Option<ExecutionBlock>,
    intent_id: String,
    timestamp: String,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Tenant resolution: authenticated tenant first, `X-Tenant-ID` as a
/// development convenience when no tenant-scoped key was used.
fn resolve_tenant(auth: &AuthInfo, headers: &HeaderMap) -> Option<String> {
    auth.tenant
        .as_ref()
        .map(|t| t.tenant_id.clone())
        .or_else(|| header_string(headers, "X-Tenant-ID"))
}

// ---------------------------------------------------------------------------
// Health / version
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let active_intents = state.intents.count().await?;
    Ok(Json(json!({
        "ok": true,
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.metrics.uptime_seconds(),
        "governor": {
            "active_intents": active_intents,
        },
    })))
}

async fn version() -> Json<Value> {
    let git_sha = std::env::var("GIT_SHA")
        .or_else(|_| std::env::var("EDON_GIT_SHA"))
        .unwrap_or_else(|_| "unknown".to_string());
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "git_sha": git_sha,
    }))
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IntentSetRequest {
    intent_id: Option<String>,
    objective: String,
    scope: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    constraints: Constraints,
    #[serde(default = "default_risk_level")]
    risk_level: String,
    #[serde(default)]
    approved_by_user: bool,
}

fn default_risk_level() -> String {
    "medium".to_string()
}

async fn intent_set(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Json(request): Json<IntentSetRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.objective.trim().is_empty() {
        return Err(ApiError::Validation("objective cannot be empty".to_string()));
    }
    let risk_level = RiskLevel::parse(&request.risk_level)
        .ok_or_else(|| ApiError::Validation(format!("Invalid risk_level: {}", request.risk_level)))?;

    let intent_id = request
        .intent_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("intent_{}", &uuid::Uuid::new_v4().simple().to_string()[..16]));

    let now = Utc::now();
    let intent = Intent {
        intent_id: intent_id.clone(),
        tenant_id: resolve_tenant(&auth, &headers),
        objective: request.objective,
        scope: request.scope,
        constraints: request.constraints,
        risk_level,
        approved_by_user: request.approved_by_user,
        created_at: now,
        updated_at: now,
    };
    state.intents.save(&intent).await?;

    Ok(Json(json!({
        "intent_id": intent_id,
        "created_at": now.to_rfc3339(),
        "status": "active",
    })))
}

#[derive(Debug, Deserialize)]
struct IntentGetQuery {
    intent_id: Option<String>,
}

async fn intent_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Query(query): Query<IntentGetQuery>,
) -> Result<Json<Value>, ApiError> {
    let intent = match &query.intent_id {
        Some(intent_id) => state.intents.get(intent_id).await?,
        None => {
            let tenant = resolve_tenant(&auth, &headers);
            state.intents.latest(tenant.as_deref()).await?
        }
    };
    let intent = intent.ok_or_else(|| ApiError::NotFound("Intent not found".to_string()))?;

    Ok(Json(json!({
        "intent_id": intent.intent_id,
        "objective": intent.objective,
        "scope": intent.scope,
        "constraints": intent.constraints,
        "risk_level": intent.risk_level,
        "approved_by_user": intent.approved_by_user,
        "created_at": intent.created_at.to_rfc3339(),
    })))
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    action: Value,
    intent_id: Option<String>,
    agent_id: String,
    #[serde(default)]
    approvals: Vec<String>,
}

async fn execute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<DecisionEnvelope>, ApiError> {
    if request.agent_id.trim().is_empty() {
        return Err(ApiError::Validation("agent_id is required".to_string()));
    }
    let tool = request
        .action
        .get("tool")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Invalid action payload: missing tool".to_string()))?;
    let op = request
        .action
        .get("op")
        .and_then(Value::as_str)
        .filter(|o| !o.is_empty())
        .ok_or_else(|| ApiError::Validation("Invalid action payload: missing op".to_string()))?;

    let estimated_risk = request
        .action
        .get("estimated_risk")
        .and_then(Value::as_str)
        .and_then(RiskLevel::parse);

    let mut action = Action::new(
        tool,
        op,
        request
            .action
            .get("params")
            .cloned()
            .unwrap_or_else(|| json!({})),
    );
    action.estimated_risk = estimated_risk;

    // Token binding wins over the caller-declared agent id.
    let agent_id = auth
        .bound_agent_id
        .clone()
        .unwrap_or_else(|| request.agent_id.trim().to_string());

    let output = state
        .decision_service
        .decide_and_execute(DecideRequest {
            action,
            intent_id: header_string(&headers, "X-Intent-ID").or(request.intent_id),
            context: DecisionContext {
                agent_id: Some(agent_id),
                tenant_id: resolve_tenant(&auth, &headers),
                session_id: header_string(&headers, "X-Session-ID"),
                approvals: request.approvals,
            },
            credential_id: None,
        })
        .await?;

    Ok(Json(DecisionEnvelope {
        verdict: output.decision.verdict,
        decision_id: output.decision_id,
        reason_code: output.decision.reason_code,
        explanation: output.decision.explanation,
        safe_alternative: output.decision.safe_alternative,
        escalation: output.decision.escalation,
        execution: output.execution,
        intent_id: output.intent_id,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// Bot-gateway proxy
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ClawdbotInvokeRequest {
    tool: String,
    #[serde(default = "default_invoke_action")]
    action: String,
    #[serde(default)]
    args: Value,
    #[serde(default, rename = "sessionKey")]
    session_key: Option<String>,
    credential_id: Option<String>,
    #[serde(default)]
    approvals: Vec<String>,
}

fn default_invoke_action() -> String {
    "json".to_string()
}

async fn clawdbot_invoke(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Json(request): Json<ClawdbotInvokeRequest>,
) -> Result<Json<DecisionEnvelope>, ApiError> {
    let agent_id = header_string(&headers, "X-EDON-Agent-ID")
        .or_else(|| header_string(&headers, "X-Agent-ID"))
        .or_else(|| auth.bound_agent_id.clone())
        .unwrap_or_else(|| "clawdbot-agent".to_string());

    let mut params = json!({
        "tool": request.tool,
        "action": request.action,
        "args": if request.args.is_null() { json!({}) } else { request.args },
    });
    if let Some(session_key) = &request.session_key {
        params["sessionKey"] = json!(session_key);
    }

    let output = state
        .decision_service
        .decide_and_execute(DecideRequest {
            action: Action::new("clawdbot", "invoke", params),
            intent_id: header_string(&headers, "X-Intent-ID"),
            context: DecisionContext {
                agent_id: Some(agent_id),
                tenant_id: resolve_tenant(&auth, &headers),
                session_id: request.session_key.clone(),
                approvals: request.approvals,
            },
            credential_id: request.credential_id,
        })
        .await?;

    Ok(Json(DecisionEnvelope {
        verdict: output.decision.verdict,
        decision_id: output.decision_id,
        reason_code: output.decision.reason_code,
        explanation: output.decision.explanation,
        safe_alternative: output.decision.safe_alternative,
        escalation: output.decision.escalation,
        execution: output.execution,
        intent_id: output.intent_id,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// Audit / decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AuditQueryParams {
    agent_id: Option<String>,
    verdict: Option<String>,
    intent_id: Option<String>,
    limit: Option<u32>,
}

fn parse_audit_query(params: AuditQueryParams) -> Result<AuditQuery, ApiError> {
    let limit = params.limit.unwrap_or(AuditQuery::DEFAULT_LIMIT);
    if limit < 1 || limit > AuditQuery::MAX_LIMIT {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            AuditQuery::MAX_LIMIT
        )));
    }
    let verdict = match params.verdict.as_deref() {
        Some(raw) => Some(
            Verdict::parse(raw)
                .ok_or_else(|| ApiError::Validation(format!("Invalid verdict: {raw}")))?,
        ),
        None => None,
    };
    Ok(AuditQuery {
        agent_id: params.agent_id,
        verdict,
        intent_id: params.intent_id,
        limit,
    })
}

async fn audit_query(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<Value>, ApiError> {
    let query = parse_audit_query(params)?;
    let events = state.audit.query_events(&query).await?;
    Ok(Json(json!({
        "events": events,
        "total": events.len(),
        "limit": query.limit,
    })))
}

async fn decisions_query(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<Value>, ApiError> {
    let query = parse_audit_query(params)?;
    let decisions = state.audit.query_decisions(&query).await?;
    Ok(Json(json!({
        "decisions": decisions,
        "total": decisions.len(),
        "limit": query.limit,
    })))
}

async fn decision_get(
    State(state): State<AppState>,
    Path(decision_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let decision = state
        .audit
        .get_decision(&decision_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Decision not found".to_string()))?;
    Ok(Json(serde_json::to_value(decision).map_err(|e| ApiError::Internal(e.to_string()))?))
}

// ---------------------------------------------------------------------------
// Credentials (write-only surface)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CredentialSetRequest {
    credential_id: String,
    tool_name: String,
    #[serde(default = "default_credential_type")]
    credential_type: String,
    credential_data: Value,
    #[serde(default)]
    encrypted: bool,
}

fn default_credential_type() -> String {
    "api_key".to_string()
}

async fn credentials_set(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Json(request): Json<CredentialSetRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.credential_id.trim().is_empty() {
        return Err(ApiError::Validation("credential_id cannot be empty".to_string()));
    }
    if request.tool_name.trim().is_empty() {
        return Err(ApiError::Validation("tool_name cannot be empty".to_string()));
    }
    if !request.credential_data.is_object() {
        return Err(ApiError::Validation(
            "credential_data must be an object".to_string(),
        ));
    }

    let tenant = resolve_tenant(&auth, &headers);
    state
        .vault
        .set(
            &request.credential_id,
            &request.tool_name,
            tenant.as_deref(),
            &request.credential_type,
            request.credential_data,
            request.encrypted,
        )
        .await?;

    // The payload is write-only; only identity comes back.
    Ok(Json(json!({
        "ok": true,
        "credential_id": request.credential_id,
        "tool_name": request.tool_name,
    })))
}

async fn credentials_delete(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.vault.delete(&credential_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Credential not found".to_string()));
    }
    Ok(Json(json!({"ok": true, "deleted": credential_id})))
}

// ---------------------------------------------------------------------------
// Policy packs
// ---------------------------------------------------------------------------

async fn policy_packs_list() -> Json<Value> {
    Json(json!({
        "packs": policy_pack::list_packs(),
        "default": "personal_safe",
    }))
}

#[derive(Debug, Deserialize)]
struct ApplyPackQuery {
    objective: Option<String>,
}

async fn policy_pack_apply(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(query): Query<ApplyPackQuery>,
) -> Result<Json<Value>, ApiError> {
    let tenant = resolve_tenant(&auth, &headers);
    let intent = state
        .policy_service
        .apply_pack(&name, tenant.as_deref(), query.objective)
        .await?;

    Ok(Json(json!({
        "intent_id": intent.intent_id,
        "policy_pack": name,
        "intent": {
            "objective": intent.objective,
            "scope": intent.scope,
            "constraints": intent.constraints,
            "risk_level": intent.risk_level,
            "approved_by_user": intent.approved_by_user,
        },
    })))
}

// ---------------------------------------------------------------------------
// Integrations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ClawdbotConnectRequest {
    base_url: String,
    #[serde(default = "default_auth_mode")]
    auth_mode: String,
    secret: String,
    credential_id: Option<String>,
    #[serde(default)]
    probe: bool,
}

fn default_auth_mode() -> String {
    "password".to_string()
}

async fn clawdbot_connect(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Json(request): Json<ClawdbotConnectRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.base_url.trim().is_empty() || request.secret.trim().is_empty() {
        return Err(ApiError::Validation(
            "base_url and secret are required".to_string(),
        ));
    }
    if !matches!(request.auth_mode.as_str(), "password" | "token") {
        return Err(ApiError::Validation(
            "auth_mode must be 'password' or 'token'".to_string(),
        ));
    }

    let tenant = resolve_tenant(&auth, &headers);
    let default_id = state.config.default_clawdbot_credential_id.clone();
    let mut credential_id = request
        .credential_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| default_id.clone());
    if let Some(tenant_id) = &tenant {
        if credential_id != default_id {
            credential_id = format!("{credential_id}_{tenant_id}");
        }
    }

    state
        .vault
        .set(
            &credential_id,
            "clawdbot",
            tenant.as_deref(),
            "gateway",
            json!({
                "base_url": request.base_url.trim_end_matches('/'),
                "auth_mode": request.auth_mode,
                "secret": request.secret,
            }),
            true,
        )
        .await?;

    if request.probe {
        state
            .credentials
            .record_status(&credential_id, tenant.as_deref(), true, None)
            .await?;
    }

    Ok(Json(json!({
        "connected": true,
        "credential_id": credential_id,
        "base_url": request.base_url.trim_end_matches('/'),
        "auth_mode": request.auth_mode,
        "message": "Downstream gateway connected. Credential saved.",
    })))
}

async fn account_integrations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let tenant = resolve_tenant(&auth, &headers);

    let mut credential = state
        .credentials
        .get_for_tool("clawdbot", tenant.as_deref())
        .await?;
    if credential.is_none() && tenant.is_some() {
        credential = state.credentials.get_for_tool("clawdbot", None).await?;
    }

    // connected = a successful use has been recorded; last_error alone does
    // not flip it back to false.
    let connected = credential
        .as_ref()
        .is_some_and(|c| c.last_used_at.is_some());
    let base_url = credential.as_ref().and_then(|c| {
        c.payload
            .get("base_url")
            .or_else(|| c.payload.get("gateway_url"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let auth_mode = credential.as_ref().and_then(|c| {
        c.payload
            .get("auth_mode")
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    // Classification may resolve DNS for hostname URLs; keep it off the
    // reactor.
    let gating_url = base_url.clone();
    let gating_enabled = state.config.network_gating;
    let report = tokio::task::spawn_blocking(move || {
        validate_network_gating(gating_url.as_deref(), gating_enabled)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let default_intent_id = match &tenant {
        Some(tenant_id) => state.tenants.get_default_intent(tenant_id).await?,
        None => None,
    };

    let mut clawdbot = json!({
        "connected": connected,
        "base_url": base_url,
        "auth_mode": auth_mode,
        "last_ok_at": credential.as_ref().and_then(|c| c.last_used_at.map(|t| t.to_rfc3339())),
        "last_error": credential.as_ref().and_then(|c| c.last_error.clone()),
        "default_intent_id": default_intent_id,
        "network_gating_enabled": state.config.network_gating,
        "reachability": report.reachability,
        "bypass_risk": report.risk,
    });
    if let Some(recommendation) = report.recommendation {
        clawdbot["recommendation"] = json!(recommendation);
    }

    Ok(Json(json!({"clawdbot": clawdbot})))
}

// ---------------------------------------------------------------------------
// Metrics / benchmark / plan
// ---------------------------------------------------------------------------

async fn metrics_json(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let active_intents = state.intents.count().await?;
    let snapshot = state.metrics.snapshot(active_intents);
    Ok(Json(serde_json::to_value(snapshot).map_err(|e| ApiError::Internal(e.to_string()))?))
}

async fn metrics_prometheus(State(state): State<AppState>) -> Result<Response, ApiError> {
    let active_intents = state.intents.count().await?;
    let text = state.metrics.snapshot(active_intents).to_prometheus();
    Ok((
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        text,
    )
        .into_response())
}

async fn trust_spec(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let active_intents = state.intents.count().await?;
    let snapshot = state.metrics.snapshot(active_intents);
    Ok(Json(snapshot.trust_spec(
        state.config.network_gating,
        state.config.token_hardening,
        state.config.credentials_strict,
    )))
}

#[derive(Debug, Deserialize)]
struct PlanRequest {
    objective: String,
}

async fn plan(Json(request): Json<PlanRequest>) -> Result<Json<Value>, ApiError> {
    if request.objective.trim().is_empty() {
        return Err(ApiError::Validation("objective cannot be empty".to_string()));
    }
    let plan = planner::plan(&request.objective);
    Ok(Json(serde_json::to_value(plan).map_err(|e| ApiError::Internal(e.to_string()))?))
}
