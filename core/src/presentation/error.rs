// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP Error Mapping
//!
//! Typed errors from inner layers propagate verbatim through the pipeline;
//! everything else collapses into a generic 500 here, after being logged
//! with full context server-side. No response body ever contains a
//! traceback, a source file path, or an internal library name.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::application::decision_service::PipelineError;
use crate::application::policy::PolicyError;
use crate::domain::repository::StoreError;
use crate::infrastructure::vault::VaultError;

#[derive(Debug)]
pub enum ApiError {
    AuthMissing,
    AuthInvalid,
    Forbidden(String),
    Validation(String),
    PayloadTooLarge,
    RateLimited {
        detail: String,
        retry_after_seconds: u64,
    },
    NotFound(String),
    Conflict(String),
    /// Strict-mode credential miss. 503, never rewrapped as 500.
    CredentialMissing(String),
    DownstreamUnavailable(String),
    Downstream {
        status: u16,
        detail: String,
    },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::AuthMissing => auth_response(
                "Missing authentication token. Provide X-EDON-TOKEN header or Authorization Bearer token.",
            ),
            Self::AuthInvalid => auth_response("Invalid authentication token"),
            Self::Forbidden(detail) => {
                (StatusCode::FORBIDDEN, Json(json!({"detail": detail}))).into_response()
            }
            Self::Validation(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({"detail": detail}))).into_response()
            }
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({"detail": "Request body exceeds maximum size"})),
            )
                .into_response(),
            Self::RateLimited {
                detail,
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_seconds.to_string())],
                Json(json!({
                    "detail": detail,
                    "retry_after_seconds": retry_after_seconds,
                })),
            )
                .into_response(),
            Self::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({"detail": detail}))).into_response()
            }
            Self::Conflict(detail) => {
                (StatusCode::CONFLICT, Json(json!({"detail": detail}))).into_response()
            }
            Self::CredentialMissing(detail) | Self::DownstreamUnavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"detail": detail})),
            )
                .into_response(),
            Self::Downstream { status, detail } => {
                error!("Downstream returned {status}: {detail}");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"detail": "Downstream service error"})),
                )
                    .into_response()
            }
            Self::Internal(detail) => {
                // Full detail stays server-side.
                error!("Internal server error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": "Internal server error"})),
                )
                    .into_response()
            }
        }
    }
}

fn auth_response(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({"detail": detail})),
    )
        .into_response()
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(detail) => Self::NotFound(detail),
            StoreError::Conflict(detail) => Self::Conflict(detail),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::CredentialMissing(detail) => Self::CredentialMissing(detail),
            PipelineError::DownstreamUnavailable(detail) => Self::DownstreamUnavailable(detail),
            PipelineError::Downstream { status, detail } => Self::Downstream { status, detail },
            PipelineError::Store(e) => e.into(),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::CredentialMissing(tool) => Self::CredentialMissing(format!(
                "Credential missing for tool '{tool}'. Configure via POST /credentials/set."
            )),
            VaultError::Store(e) => e.into(),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::UnknownPack(name) => Self::NotFound(format!("Unknown policy pack: {name}")),
            PolicyError::Store(e) => e.into(),
        }
    }
}
