// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Packs
//!
//! Users don't want to design policies; they want presets. A [`PolicyPack`]
//! is a named preset that compiles into a concrete [`Intent`]. Applying a
//! pack persists the compiled intent and sets it as the tenant's default.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::intent::{AuditLevel, Constraints, Intent, RiskLevel};

/// A named preset that compiles into an intent contract.
#[derive(Debug, Clone)]
pub struct PolicyPack {
    pub name: &'static str,
    pub description: &'static str,
    pub scope: &'static [(&'static str, &'static [&'static str])],
    pub constraints: Constraints,
    pub risk_level: RiskLevel,
    pub approved_by_user: bool,
}

impl PolicyPack {
    /// Compile this pack into an intent for a tenant. The bot-gateway proxy
    /// scope is always present so `/clawdbot/invoke` works out of the box.
    pub fn compile(
        &self,
        intent_id: String,
        tenant_id: Option<String>,
        objective: Option<String>,
        now: DateTime<Utc>,
    ) -> Intent {
        let mut scope: BTreeMap<String, Vec<String>> = self
            .scope
            .iter()
            .map(|(tool, ops)| {
                (
                    tool.to_string(),
                    ops.iter().map(|o| o.to_string()).collect(),
                )
            })
            .collect();
        let clawdbot = scope.entry("clawdbot".to_string()).or_default();
        if !clawdbot.iter().any(|op| op == "invoke") {
            clawdbot.push("invoke".to_string());
        }

        Intent {
            intent_id,
            tenant_id,
            objective: objective.unwrap_or_else(|| self.description.to_string()),
            scope,
            constraints: self.constraints.clone(),
            risk_level: self.risk_level,
            approved_by_user: self.approved_by_user,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Summary row for `GET /policy-packs`.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyPackSummary {
    pub name: String,
    pub description: String,
    pub risk_level: RiskLevel,
    pub scope_summary: BTreeMap<String, usize>,
    pub constraints_summary: ConstraintsSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstraintsSummary {
    pub allowed_tools: usize,
    pub blocked_tools: usize,
    pub confirm_required: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Personal use: read-only plus drafting, one recipient, nothing leaves.
fn personal_safe() -> PolicyPack {
    PolicyPack {
        name: "personal_safe",
        description: "Personal Safe - read, summarize, draft and search only",
        scope: &[
            ("email", &["read", "summarize", "draft"]),
            ("brave_search", &["search"]),
            ("memory", &["read_preferences", "query_episodes"]),
        ],
        constraints: Constraints {
            drafts_only: true,
            max_recipients: Some(1),
            allowed_clawdbot_tools: Some(strings(&[
                "message",
                "web_read",
                "web_summarize",
                "web_draft",
                "web_search",
            ])),
            blocked_clawdbot_tools: strings(&[
                "web_send",
                "web_delete",
                "web_execute",
                "shell_execute",
                "file_write",
                "mass_outbound",
                "credential_operations",
            ]),
            no_external_sharing: true,
            ..Default::default()
        },
        risk_level: RiskLevel::Low,
        approved_by_user: true,
    }
}

/// Work use: drafting and internal tools with confirmation on sends.
fn work_safe() -> PolicyPack {
    PolicyPack {
        name: "work_safe",
        description: "Work Safe - read, draft and internal tools with confirmations",
        scope: &[
            ("email", &["read", "draft", "send"]),
            ("calendar", &["view", "propose"]),
            ("brave_search", &["search"]),
        ],
        constraints: Constraints {
            max_recipients: Some(10),
            confirm_irreversible: true,
            escalate_risk_levels: Some(vec![RiskLevel::High, RiskLevel::Critical]),
            allowed_clawdbot_tools: Some(strings(&[
                "message",
                "web_read",
                "web_search",
                "web_summarize",
                "web_draft",
                "calendar_view",
            ])),
            blocked_clawdbot_tools: strings(&[
                "web_execute",
                "shell_execute",
                "mass_outbound",
                "credential_operations",
            ]),
            no_external_sharing: true,
            ..Default::default()
        },
        risk_level: RiskLevel::Medium,
        approved_by_user: true,
    }
}

/// Operations admin: broad tool coverage, tight ops, detailed audit.
fn ops_admin() -> PolicyPack {
    PolicyPack {
        name: "ops_admin",
        description: "Ops Admin - broad tools with detailed audit and confirmations",
        scope: &[
            ("email", &["read", "draft", "send"]),
            ("calendar", &["view", "create_event"]),
            ("filesystem", &["read_file", "write_file"]),
            ("brave_search", &["search"]),
            ("github", &["list_repos", "create_issue"]),
        ],
        constraints: Constraints {
            max_recipients: Some(50),
            confirm_irreversible: true,
            audit_level: AuditLevel::Detailed,
            allowed_clawdbot_tools: Some(strings(&[
                "message",
                "web_read",
                "web_search",
                "web_summarize",
                "web_draft",
                "web_send",
                "sessions_list",
                "calendar_view",
                "calendar_create",
            ])),
            blocked_clawdbot_tools: strings(&[
                "shell_execute",
                "mass_outbound",
                "credential_operations",
            ]),
            ..Default::default()
        },
        risk_level: RiskLevel::High,
        approved_by_user: true,
    }
}

/// Bot-gateway proxy use: session management tools only, destructive
/// verbs blocked outright.
fn clawdbot_safe() -> PolicyPack {
    PolicyPack {
        name: "clawdbot_safe",
        description: "Clawdbot Safe - session management through the proxy only",
        scope: &[("clawdbot", &["invoke"])],
        constraints: Constraints {
            allowed_clawdbot_tools: Some(strings(&[
                "sessions_list",
                "sessions_get",
                "sessions_create",
                "sessions_update",
            ])),
            blocked_clawdbot_tools: strings(&[
                "sessions_delete",
                "web_execute",
                "web_delete",
                "shell_execute",
                "file_write",
                "file_delete",
                "mass_outbound",
                "credential_operations",
            ]),
            ..Default::default()
        },
        risk_level: RiskLevel::Low,
        approved_by_user: true,
    }
}

/// All registered policy packs, in presentation order.
pub fn all_packs() -> Vec<PolicyPack> {
    vec![personal_safe(), work_safe(), ops_admin(), clawdbot_safe()]
}

/// Look up a pack by name.
pub fn get_pack(name: &str) -> Option<PolicyPack> {
    all_packs().into_iter().find(|p| p.name == name)
}

/// Summaries for `GET /policy-packs`.
pub fn list_packs() -> Vec<PolicyPackSummary> {
    all_packs()
        .into_iter()
        .map(|pack| PolicyPackSummary {
            name: pack.name.to_string(),
            description: pack.description.to_string(),
            risk_level: pack.risk_level,
            scope_summary: pack
                .scope
                .iter()
                .map(|(tool, ops)| (tool.to_string(), ops.len()))
                .collect(),
            constraints_summary: ConstraintsSummary {
                allowed_tools: pack
                    .constraints
                    .allowed_clawdbot_tools
                    .as_ref()
                    .map(Vec::len)
                    .unwrap_or(0),
                blocked_tools: pack.constraints.blocked_clawdbot_tools.len(),
                confirm_required: pack.constraints.confirm_irreversible,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_required_packs_present() {
        let names: Vec<&str> = all_packs().iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec!["personal_safe", "work_safe", "ops_admin", "clawdbot_safe"]
        );
    }

    #[test]
    fn test_clawdbot_safe_allows_session_tools_only() {
        let pack = get_pack("clawdbot_safe").unwrap();
        let allowed = pack.constraints.allowed_clawdbot_tools.as_ref().unwrap();
        assert!(allowed.contains(&"sessions_list".to_string()));
        assert!(allowed.contains(&"sessions_update".to_string()));
        // Destructive verbs must be blocked.
        assert!(pack
            .constraints
            .blocked_clawdbot_tools
            .contains(&"sessions_delete".to_string()));
        assert!(pack
            .constraints
            .blocked_clawdbot_tools
            .contains(&"shell_execute".to_string()));
    }

    #[test]
    fn test_compile_always_includes_proxy_scope() {
        let pack = get_pack("personal_safe").unwrap();
        let intent = pack.compile("intent_x".to_string(), None, None, Utc::now());
        assert!(intent.allows("clawdbot", "invoke"));
        assert!(intent.allows("email", "draft"));
        assert!(intent.approved_by_user);
        assert!(intent.constraints.drafts_only);
    }

    #[test]
    fn test_unknown_pack_is_none() {
        assert!(get_pack("autonomy_mode").is_none());
    }

    #[test]
    fn test_list_packs_summaries() {
        let summaries = list_packs();
        assert_eq!(summaries.len(), 4);
        let clawdbot = summaries.iter().find(|s| s.name == "clawdbot_safe").unwrap();
        assert_eq!(clawdbot.constraints_summary.allowed_tools, 4);
        assert!(clawdbot.constraints_summary.blocked_tools >= 4);
    }
}
