// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tenant aggregate. Only `active` tenants can cause executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub plan: String,
    pub status: TenantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn can_execute(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// The authenticated identity behind a request token.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    /// Present when the token resolved to a tenant-scoped API key.
    pub tenant: Option<Tenant>,
    /// Agent identity bound to the token, when token binding is enabled.
    pub agent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_tenants_execute() {
        let mut tenant = Tenant {
            tenant_id: "tenant_1".to_string(),
            plan: "starter".to_string(),
            status: TenantStatus::Active,
            default_intent_id: None,
            created_at: Utc::now(),
        };
        assert!(tenant.can_execute());
        tenant.status = TenantStatus::Suspended;
        assert!(!tenant.can_execute());
    }
}
