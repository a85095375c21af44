// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Request Middleware
//!
//! Ordering (outermost first): CORS -> authentication -> rate limiting ->
//! validation -> handler. Authentication resolves the principal before the
//! limiter picks its key; the limiter never reads the body; validation
//! buffers and checks the body but passes the original bytes onward.

use std::collections::HashSet;
use std::sync::OnceLock;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::application::rate_limiter::RateCheck;
use crate::domain::repository::StoreError;
use crate::domain::tenant::Tenant;
use crate::domain::validation::{
    validate_action_params, validate_body, MAX_BODY_BYTES,
};

use super::api::AppState;
use super::error::ApiError;

/// Authentication outcome carried through request extensions.
#[derive(Debug, Clone, Default)]
pub struct AuthInfo {
    pub tenant: Option<Tenant>,
    /// Agent identity bound to the token, when token binding resolved one.
    pub bound_agent_id: Option<String>,
}

fn public_paths() -> &'static HashSet<&'static str> {
    static PATHS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    PATHS.get_or_init(|| {
        HashSet::from([
            "/health",
            "/healthz",
            "/version",
            "/docs",
            "/openapi.json",
            "/redoc",
        ])
    })
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn extract_token(request: &Request) -> Option<String> {
    if let Some(token) = request
        .headers()
        .get("X-EDON-TOKEN")
        .and_then(|v| v.to_str().ok())
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    let auth = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .trim();
    let bearer = auth.strip_prefix("Bearer ")?.trim();
    (!bearer.is_empty()).then(|| bearer.to_string())
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn query_param(request: &Request, name: &str) -> Option<String> {
    let query = request.uri().query()?;
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(name) {
            return parts.next().map(str::to_string).filter(|v| !v.is_empty());
        }
    }
    None
}

/// Token -> principal resolution. Public routes pass through with a default
/// [`AuthInfo`]; everything else requires a valid token.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    if public_paths().contains(path) || !state.config.auth_enabled {
        request.extensions_mut().insert(AuthInfo::default());
        return next.run(request).await;
    }

    let Some(token) = extract_token(&request) else {
        return ApiError::AuthMissing.into_response();
    };
    let token_hash = hash_token(&token);

    // Tenant-scoped API keys first, then the configured gateway token.
    let mut info = AuthInfo::default();
    match state.tenants.get_by_api_key_hash(&token_hash).await {
        Ok(Some(tenant)) => info.tenant = Some(tenant),
        Ok(None) => {
            let api_token = state.config.api_token.trim();
            if api_token.is_empty() || token != api_token {
                return ApiError::AuthInvalid.into_response();
            }
        }
        Err(e) => return ApiError::from(e).into_response(),
    }

    // An inactive tenant cannot cause side effects: every mutating method
    // is refused, reads stay available.
    if let Some(tenant) = &info.tenant {
        if !tenant.can_execute() && request.method() != Method::GET {
            return ApiError::Forbidden(format!(
                "Tenant is not active (status: {})",
                tenant.status.as_str()
            ))
            .into_response();
        }
    }

    if state.config.token_binding_enabled {
        let supplied_agent =
            header_value(&request, "X-Agent-ID").or_else(|| query_param(&request, "agent_id"));
        match supplied_agent {
            Some(agent_id) => match state.tokens.bind(&token_hash, &agent_id).await {
                Ok(()) => {
                    info.bound_agent_id = Some(agent_id);
                    let _ = state.tokens.touch(&token_hash).await;
                }
                Err(StoreError::Conflict(_)) => {
                    return ApiError::AuthInvalid.into_response();
                }
                Err(e) => return ApiError::from(e).into_response(),
            },
            None => match state.tokens.lookup(&token_hash).await {
                Ok(bound) => {
                    if bound.is_some() {
                        let _ = state.tokens.touch(&token_hash).await;
                    }
                    info.bound_agent_id = bound;
                }
                Err(e) => return ApiError::from(e).into_response(),
            },
        }
    }

    request.extensions_mut().insert(info);
    next.run(request).await
}

/// Sliding-window rate limiting. The principal comes from headers or query
/// parameters only; the body is never read here. Counters are charged only
/// after a non-rate-limited response.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().trim_end_matches('/');
    if public_paths().contains(path) || path == "/metrics" || path == "/metrics/prometheus" {
        return next.run(request).await;
    }

    let agent_id = query_param(&request, "agent_id")
        .or_else(|| header_value(&request, "X-Agent-ID"))
        .or_else(|| header_value(&request, "X-EDON-Agent-ID"));
    let anonymous = agent_id.is_none();
    let principal = agent_id.unwrap_or_else(|| "anonymous".to_string());

    let now = Utc::now();
    match state.rate_limiter.check(&principal, anonymous, now).await {
        Ok(RateCheck::Allowed) => {}
        Ok(RateCheck::Limited {
            window,
            limit,
            retry_after_seconds,
        }) => {
            state.metrics.record_rate_limit_hit();
            let mut detail = format!("Rate limit exceeded: {limit} requests per {}", window.as_str());
            if anonymous {
                detail.push_str(
                    ". Anonymous requests are heavily rate-limited. \
                     Provide agent_id in the X-Agent-ID header or query parameter.",
                );
            }
            return ApiError::RateLimited {
                detail,
                retry_after_seconds,
            }
            .into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    }

    let response = next.run(request).await;

    if response.status().is_success() {
        if let Err(e) = state.rate_limiter.charge(&principal, now).await {
            tracing::warn!("Failed to charge rate counters: {e}");
        }
    }
    response
}

/// Reject-only body validation. The original bytes are preserved and passed
/// onward untouched.
pub async fn validate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().trim_end_matches('/').to_string();
    if public_paths().contains(path.as_str()) {
        return next.run(request).await;
    }

    // Content-Length is checked before any body read.
    if let Some(length) = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if length > MAX_BODY_BYTES {
            return ApiError::PayloadTooLarge.into_response();
        }
    }

    if !matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH
    ) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES + 1).await {
        Ok(bytes) => bytes,
        Err(_) => return ApiError::PayloadTooLarge.into_response(),
    };
    if bytes.len() > MAX_BODY_BYTES {
        return ApiError::PayloadTooLarge.into_response();
    }

    if !bytes.is_empty() {
        let parsed: Result<Value, _> = serde_json::from_slice(&bytes);
        match parsed {
            Ok(body_json) => {
                if let Err(violation) = validate_body(&body_json, state.config.validate_strict) {
                    return ApiError::Validation(violation.detail()).into_response();
                }
                if path == "/execute" {
                    if let Some(params) = body_json
                        .get("action")
                        .and_then(|action| action.get("params"))
                    {
                        if let Err(violation) =
                            validate_action_params(params, state.config.validate_strict)
                        {
                            return ApiError::Validation(violation.detail()).into_response();
                        }
                    }
                }
            }
            Err(_) => {
                return ApiError::Validation("Invalid JSON body".to_string()).into_response();
            }
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

/// Response hardening headers on every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let hash = hash_token("secret");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_token("secret2"));
        // Stable digest, not a salted hash.
        assert_eq!(hash, hash_token("secret"));
    }
}
