// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Gateway Configuration
//!
//! One configuration snapshot, loaded at startup and never mutated
//! thereafter. Sources, in precedence order: explicit YAML file (CLI flag or
//! `EDON_CONFIG_PATH`) -> environment variable overrides -> defaults.
//!
//! `validate()` returns warnings; `enforce()` refuses startup for
//! misconfigurations that are unacceptable in production.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_TOKENS: &[&str] = &[
    "your-secret-token",
    "your-secret-token-change-me",
    "production-token-change-me",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    // Authentication
    #[serde(default = "default_true")]
    pub auth_enabled: bool,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub token_binding_enabled: bool,

    // Security
    #[serde(default)]
    pub credentials_strict: bool,
    #[serde(default = "default_true")]
    pub validate_strict: bool,
    #[serde(default)]
    pub network_gating: bool,
    #[serde(default = "default_true")]
    pub token_hardening: bool,

    // Persistence
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    // Logging
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logging: bool,

    // CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    // Rate limiting
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: i64,
    #[serde(default = "default_rate_limit_per_hour")]
    pub rate_limit_per_hour: i64,
    #[serde(default = "default_rate_limit_per_day")]
    pub rate_limit_per_day: i64,

    // Governor knobs
    #[serde(default = "default_max_actions_per_minute")]
    pub max_actions_per_minute: u32,
    #[serde(default = "default_loop_threshold")]
    pub loop_detection_threshold: u32,
    #[serde(default = "default_loop_window")]
    pub loop_detection_window_seconds: u64,

    // Server
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // Downstream bot gateway
    #[serde(default = "default_clawdbot_credential_id")]
    pub default_clawdbot_credential_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clawdbot_gateway_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clawdbot_gateway_token: Option<String>,

    // Sandboxes
    #[serde(default = "default_email_sandbox")]
    pub email_sandbox_dir: PathBuf,
    #[serde(default = "default_filesystem_sandbox")]
    pub filesystem_sandbox_dir: PathBuf,

    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("defaults deserialize")
    }
}

impl GatewayConfig {
    /// Load config: explicit file if given, else `EDON_CONFIG_PATH`, else
    /// defaults; environment overrides are applied on top either way.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let discovered = path.map(PathBuf::from).or_else(|| {
            std::env::var("EDON_CONFIG_PATH")
                .ok()
                .map(PathBuf::from)
                .filter(|p| p.exists())
        });

        let mut config = match discovered {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                let content = std::fs::read_to_string(&path)?;
                serde_yaml::from_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables override file values so container deployments
    /// can configure the gateway without a config file.
    pub fn apply_env_overrides(&mut self) {
        env_bool("EDON_AUTH_ENABLED", &mut self.auth_enabled);
        env_string("EDON_API_TOKEN", &mut self.api_token);
        env_bool("EDON_TOKEN_BINDING_ENABLED", &mut self.token_binding_enabled);
        env_bool("EDON_CREDENTIALS_STRICT", &mut self.credentials_strict);
        env_bool("EDON_VALIDATE_STRICT", &mut self.validate_strict);
        env_bool("EDON_NETWORK_GATING", &mut self.network_gating);
        env_bool("EDON_TOKEN_HARDENING", &mut self.token_hardening);
        if let Ok(v) = std::env::var("EDON_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        env_string("EDON_LOG_LEVEL", &mut self.log_level);
        env_bool("EDON_JSON_LOGGING", &mut self.json_logging);
        if let Ok(v) = std::env::var("EDON_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        env_bool("EDON_RATE_LIMIT_ENABLED", &mut self.rate_limit_enabled);
        env_parse("EDON_RATE_LIMIT_PER_MINUTE", &mut self.rate_limit_per_minute);
        env_parse("EDON_RATE_LIMIT_PER_HOUR", &mut self.rate_limit_per_hour);
        env_parse("EDON_RATE_LIMIT_PER_DAY", &mut self.rate_limit_per_day);
        env_parse("EDON_MAX_ACTIONS_PER_MINUTE", &mut self.max_actions_per_minute);
        env_parse("EDON_LOOP_DETECTION_THRESHOLD", &mut self.loop_detection_threshold);
        env_parse(
            "EDON_LOOP_DETECTION_WINDOW_SECONDS",
            &mut self.loop_detection_window_seconds,
        );
        env_string("EDON_HOST", &mut self.host);
        env_parse("EDON_PORT", &mut self.port);
        env_string(
            "EDON_DEFAULT_CLAWDBOT_CREDENTIAL_ID",
            &mut self.default_clawdbot_credential_id,
        );
        if let Ok(v) = std::env::var("CLAWDBOT_GATEWAY_URL") {
            self.clawdbot_gateway_url = Some(v);
        }
        if let Ok(v) = std::env::var("CLAWDBOT_GATEWAY_TOKEN") {
            self.clawdbot_gateway_token = Some(v);
        }
        if let Ok(v) = std::env::var("ENVIRONMENT").or_else(|_| std::env::var("EDON_ENV")) {
            self.environment = v;
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production" || (self.credentials_strict && self.auth_enabled)
    }

    /// Non-fatal configuration warnings, logged at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.auth_enabled && self.api_token.is_empty() {
            warnings.push("EDON_AUTH_ENABLED=true but EDON_API_TOKEN is not set".to_string());
        }
        if self.auth_enabled && DEFAULT_TOKENS.contains(&self.api_token.as_str()) {
            warnings.push(
                "Using default API token! Change EDON_API_TOKEN in production".to_string(),
            );
        }
        if self.token_hardening && !self.credentials_strict {
            warnings.push(
                "EDON_TOKEN_HARDENING=true but EDON_CREDENTIALS_STRICT=false. \
                 Set EDON_CREDENTIALS_STRICT=true for full protection"
                    .to_string(),
            );
        }
        if self.cors_origins.iter().any(|o| o == "*") {
            warnings.push(
                "CORS allows all origins (*). Set EDON_CORS_ORIGINS to specific origins"
                    .to_string(),
            );
        }
        warnings
    }

    /// Hard startup refusals when production is detected.
    pub fn enforce(&self) -> anyhow::Result<()> {
        if !self.is_production() {
            return Ok(());
        }
        if self.auth_enabled
            && (self.api_token.is_empty() || DEFAULT_TOKENS.contains(&self.api_token.as_str()))
        {
            anyhow::bail!(
                "EDON_API_TOKEN is unset or a default value. Change it before running in production."
            );
        }
        if self.cors_origins.iter().any(|o| o == "*") {
            anyhow::bail!(
                "EDON_CORS_ORIGINS cannot include '*' in production. Set explicit origins."
            );
        }
        if self.token_hardening && !self.credentials_strict {
            anyhow::bail!(
                "EDON_TOKEN_HARDENING=true requires EDON_CREDENTIALS_STRICT=true in production."
            );
        }
        Ok(())
    }
}

fn env_bool(key: &str, target: &mut bool) {
    if let Ok(v) = std::env::var(key) {
        match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => *target = true,
            "false" | "0" | "no" | "off" => *target = false,
            other => tracing::warn!("Invalid value for {key}: '{other}'. Expected true/false."),
        }
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(v) = std::env::var(key) {
        let v = v.trim();
        if !v.is_empty() {
            *target = v.to_string();
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(v) = std::env::var(key) {
        match v.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Invalid value for {key}: '{v}'. Ignoring."),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("edon_gateway.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_rate_limit_per_minute() -> i64 {
    60
}

fn default_rate_limit_per_hour() -> i64 {
    1000
}

fn default_rate_limit_per_day() -> i64 {
    10_000
}

fn default_max_actions_per_minute() -> u32 {
    30
}

fn default_loop_threshold() -> u32 {
    5
}

fn default_loop_window() -> u64 {
    10
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_clawdbot_credential_id() -> String {
    "clawdbot_gateway".to_string()
}

fn default_email_sandbox() -> PathBuf {
    PathBuf::from("sandbox/emails")
}

fn default_filesystem_sandbox() -> PathBuf {
    PathBuf::from("sandbox/filesystem")
}

fn default_environment() -> String {
    "development".to_string()
}
