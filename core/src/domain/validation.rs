// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Request Validation
//!
//! Reject-only structural checks applied to every mutating request body
//! before it reaches a handler. Nothing here mutates the payload; the
//! original bytes are preserved and passed onward.
//!
//! Limits:
//! - total request body <= 10 MiB (checked from Content-Length, before any
//!   body read)
//! - JSON nesting depth <= 10
//! - any string field <= 100,000 bytes
//! - any array <= 10,000 elements
//! - serialized `action.params` <= 5 MiB
//!
//! In strict mode, payloads containing `<script`, `javascript:` or object
//! keys that look like event-handler attributes are rejected with the
//! JSONPath of the offending field.

use serde_json::Value;

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_JSON_DEPTH: usize = 10;
pub const MAX_STRING_LENGTH: usize = 100_000;
pub const MAX_ARRAY_LENGTH: usize = 10_000;
pub const MAX_PARAMS_BYTES: usize = 5 * 1024 * 1024;

/// A single validation failure, pointing at the first offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationViolation {
    pub path: String,
    pub message: String,
}

impl ValidationViolation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// The `detail` string returned in the 400 response body.
    pub fn detail(&self) -> String {
        format!("{} at path: {}", self.message, self.path)
    }
}

/// Validate a full request body. `strict` additionally applies the dangerous
/// pattern checks.
pub fn validate_body(body: &Value, strict: bool) -> Result<(), ValidationViolation> {
    walk(body, 0, "", strict)
}

/// Validate `action.params` specifically: size cap plus structural checks.
pub fn validate_action_params(params: &Value, strict: bool) -> Result<(), ValidationViolation> {
    let serialized = params.to_string();
    if serialized.len() > MAX_PARAMS_BYTES {
        return Err(ValidationViolation::new(
            "action.params",
            format!("Action parameters exceed maximum size of {MAX_PARAMS_BYTES} bytes"),
        ));
    }
    walk(params, 0, "action.params", strict)
}

fn walk(value: &Value, depth: usize, path: &str, strict: bool) -> Result<(), ValidationViolation> {
    if depth > MAX_JSON_DEPTH {
        return Err(ValidationViolation::new(
            path,
            format!("JSON depth exceeds maximum of {MAX_JSON_DEPTH}"),
        ));
    }

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                if key.len() > MAX_STRING_LENGTH {
                    return Err(ValidationViolation::new(
                        &child_path,
                        format!("Key length exceeds maximum of {MAX_STRING_LENGTH}"),
                    ));
                }
                if strict && is_event_handler_key(key) {
                    return Err(ValidationViolation::new(
                        &child_path,
                        "Event handlers not allowed",
                    ));
                }
                if strict {
                    check_dangerous(key, &child_path)?;
                }
                walk(child, depth + 1, &child_path, strict)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            if items.len() > MAX_ARRAY_LENGTH {
                return Err(ValidationViolation::new(
                    path,
                    format!("Array length exceeds maximum of {MAX_ARRAY_LENGTH}"),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let child_path = format!("{path}[{i}]");
                walk(item, depth + 1, &child_path, strict)?;
            }
            Ok(())
        }
        Value::String(s) => {
            if s.len() > MAX_STRING_LENGTH {
                return Err(ValidationViolation::new(
                    path,
                    format!("String length exceeds maximum of {MAX_STRING_LENGTH}"),
                ));
            }
            if strict {
                check_dangerous(s, path)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_dangerous(s: &str, path: &str) -> Result<(), ValidationViolation> {
    let lower = s.to_ascii_lowercase();
    if lower.contains("<script") {
        return Err(ValidationViolation::new(path, "Script tags not allowed"));
    }
    if lower.contains("javascript:") {
        return Err(ValidationViolation::new(
            path,
            "JavaScript protocol not allowed",
        ));
    }
    Ok(())
}

/// `onclick`, `onload`, ... attribute-style keys are rejected outright.
fn is_event_handler_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() > 2
        && bytes[0].eq_ignore_ascii_case(&b'o')
        && bytes[1].eq_ignore_ascii_case(&b'n')
        && bytes[2..].iter().all(u8::is_ascii_alphabetic)
        && !matches!(key, "only" | "once" | "online")
}
