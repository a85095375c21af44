// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Startup Wiring
//!
//! Startup ordering: load config -> open store -> run migrations -> run
//! anti-bypass checks -> validate required config -> begin serving. Any
//! failure aborts startup. The CLI and the integration tests share this
//! wiring.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};

use crate::application::auditor::Auditor;
use crate::application::decision_service::DecisionService;
use crate::application::metrics::MetricsCollector;
use crate::application::policy::PolicyService;
use crate::application::rate_limiter::{RateLimiter, RateLimits};
use crate::config::GatewayConfig;
use crate::domain::governor::{Governor, GovernorPolicy};
use crate::domain::repository::CredentialRepository;
use crate::infrastructure::connectors::{
    BraveSearchConnector, ClawdbotConnector, ConnectorRegistry, EmailConnector,
    FilesystemConnector,
};
use crate::infrastructure::db::Database;
use crate::infrastructure::network_gating::validate_network_gating;
use crate::infrastructure::repositories::{
    SqliteAuditRepository, SqliteCounterRepository, SqliteCredentialRepository,
    SqliteIntentRepository, SqliteTenantRepository, SqliteTokenRepository,
};
use crate::infrastructure::vault::{EnvFallback, Vault};
use crate::presentation::api::AppState;

/// Wire the application state on top of an opened, migrated store.
pub fn build_state(config: GatewayConfig, db: &Database) -> AppState {
    let config = Arc::new(config);
    let pool = db.pool().clone();

    let intents = Arc::new(SqliteIntentRepository::new(pool.clone()));
    let tenants = Arc::new(SqliteTenantRepository::new(pool.clone()));
    let audit = Arc::new(SqliteAuditRepository::new(pool.clone()));
    let counters = Arc::new(SqliteCounterRepository::new(pool.clone()));
    let tokens = Arc::new(SqliteTokenRepository::new(pool.clone()));
    let credentials: Arc<dyn CredentialRepository> =
        Arc::new(SqliteCredentialRepository::new(pool));

    let metrics = Arc::new(MetricsCollector::new());
    let vault = Arc::new(Vault::new(
        credentials.clone(),
        config.credentials_strict,
        EnvFallback::from_config(&config),
    ));

    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(ClawdbotConnector::new(credentials.clone())));
    registry.register(Arc::new(EmailConnector::new(config.email_sandbox_dir.clone())));
    registry.register(Arc::new(FilesystemConnector::new(
        config.filesystem_sandbox_dir.clone(),
    )));
    registry.register(Arc::new(BraveSearchConnector::new()));

    let governor = Governor::new(GovernorPolicy {
        loop_detection_threshold: config.loop_detection_threshold,
        loop_detection_window_seconds: config.loop_detection_window_seconds,
        max_actions_per_minute: config.max_actions_per_minute,
        ..Default::default()
    });

    let auditor = Auditor::new(audit.clone(), metrics.clone());
    let decision_service = Arc::new(DecisionService::new(
        governor,
        intents.clone(),
        tenants.clone(),
        audit.clone(),
        auditor,
        vault.clone(),
        Arc::new(registry),
        metrics.clone(),
    ));
    let policy_service = Arc::new(PolicyService::new(intents.clone(), tenants.clone()));

    let rate_limiter = Arc::new(RateLimiter::new(
        counters,
        config.rate_limit_enabled,
        RateLimits {
            per_minute: config.rate_limit_per_minute,
            per_hour: config.rate_limit_per_hour,
            per_day: config.rate_limit_per_day,
        },
    ));

    AppState {
        config,
        decision_service,
        policy_service,
        intents,
        tenants,
        audit,
        tokens,
        credentials,
        vault,
        rate_limiter,
        metrics,
    }
}

/// Full startup sequence. Returns wired state ready to serve.
pub async fn startup(config: GatewayConfig) -> anyhow::Result<AppState> {
    for warning in config.validate() {
        warn!("Configuration warning: {warning}");
    }
    config.enforce()?;

    let db = Database::connect(&config.database_path)
        .await
        .context("Failed to open store")?;
    db.migrate().await.context("Failed to run migrations")?;
    info!("Store ready at {:?} (schema v{})", config.database_path, db.schema_version().await?);

    let state = build_state(config, &db);

    if state.config.network_gating {
        run_network_gating_check(&state).await?;
    }

    Ok(state)
}

/// Resolve the downstream bot-gateway URL and refuse to start when gating is
/// on and the downstream is publicly reachable or unknown.
async fn run_network_gating_check(state: &AppState) -> anyhow::Result<()> {
    let base_url = downstream_base_url(state).await;
    let enabled = state.config.network_gating;

    // Hostname classification may resolve DNS; keep it off the reactor.
    let report = tokio::task::spawn_blocking(move || {
        validate_network_gating(base_url.as_deref(), enabled)
    })
    .await
    .context("network gating check panicked")?;

    if !report.is_valid {
        anyhow::bail!(
            "Network gating validation failed: downstream gateway is {} (risk: {}).\n{}",
            report.reachability.as_str(),
            report.risk.as_str(),
            report.recommendation.unwrap_or_default()
        );
    }
    info!(
        "Network gating validation passed: downstream gateway is {} (risk: {})",
        report.reachability.as_str(),
        report.risk.as_str()
    );
    Ok(())
}

async fn downstream_base_url(state: &AppState) -> Option<String> {
    if let Ok(Some(credential)) = state.credentials.get_for_tool("clawdbot", None).await {
        let url = credential
            .payload
            .get("base_url")
            .or_else(|| credential.payload.get("gateway_url"))
            .and_then(Value::as_str);
        if let Some(url) = url {
            return Some(url.to_string());
        }
    }
    if state.config.credentials_strict {
        return None;
    }
    state.config.clawdbot_gateway_url.clone()
}
