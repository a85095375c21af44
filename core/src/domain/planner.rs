// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Planning and decomposition. Non-executing: an objective is broken into
//! ordered read/draft/execute steps, and every step still goes through the
//! Governor when the agent submits it via `/execute`.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// No side effects.
    Read,
    /// Produces a preview artifact.
    Draft,
    /// Has side effects; high-impact steps require confirmation downstream.
    Execute,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub id: String,
    pub tool: String,
    pub op: String,
    pub step_type: StepType,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub objective: String,
    pub steps: Vec<PlanStep>,
    pub count: usize,
    pub note: &'static str,
}

/// Decompose an objective into ordered steps using keyword heuristics.
pub fn decompose(objective: &str) -> Vec<PlanStep> {
    let lower = objective.trim().to_ascii_lowercase();
    let mut steps = Vec::new();
    let mut next_id = 0usize;

    let mut add = |steps: &mut Vec<PlanStep>, tool: &str, op: &str, step_type: StepType, params: Value| {
        next_id += 1;
        steps.push(PlanStep {
            id: format!("step_{next_id}"),
            tool: tool.to_string(),
            op: op.to_string(),
            step_type,
            params,
        });
    };

    let query: String = objective.chars().take(200).collect();
    let query = query.as_str();

    if contains_any(&lower, &["search", "find", "look up", "research", "web", "look for"]) {
        add(&mut steps, "brave_search", "search", StepType::Read, json!({"q": query, "count": 10}));
    }

    if contains_any(&lower, &["email", "send mail", "mail to", "e-mail", "inbox"]) {
        add(&mut steps, "email", "read", StepType::Read, json!({"max_results": 10}));
        if !lower.contains("draft") && !lower.contains("compose") {
            add(
                &mut steps,
                "email",
                "send",
                StepType::Execute,
                json!({"subject": "", "body": "", "recipients": []}),
            );
        } else {
            add(
                &mut steps,
                "email",
                "draft",
                StepType::Draft,
                json!({"subject": "", "body": "", "recipients": []}),
            );
        }
    }

    if contains_any(&lower, &["calendar", "schedule", "meeting", "event", "book"]) {
        add(&mut steps, "calendar", "view", StepType::Read, json!({"max_results": 20}));
        if contains_any(&lower, &["create", "add", "schedule", "book"]) {
            add(
                &mut steps,
                "calendar",
                "create_event",
                StepType::Execute,
                json!({"summary": "", "start": "", "end": ""}),
            );
        }
    }

    if contains_any(&lower, &["github", "repo", "issue", "pull request"]) {
        add(&mut steps, "github", "list_repos", StepType::Read, json!({"per_page": 20}));
        if contains_any(&lower, &["create issue", "open issue", "file issue"]) {
            add(
                &mut steps,
                "github",
                "create_issue",
                StepType::Execute,
                json!({"owner": "", "repo": "", "title": "", "body": ""}),
            );
        }
    }

    if contains_any(&lower, &["remember", "preference", "last time", "before"]) {
        add(&mut steps, "memory", "read_preferences", StepType::Read, json!({}));
        add(&mut steps, "memory", "query_episodes", StepType::Read, json!({"limit": 10}));
    }

    if steps.is_empty() {
        add(&mut steps, "brave_search", "search", StepType::Read, json!({"q": query, "count": 5}));
    }

    steps
}

/// Build the `/plan` response for an objective.
pub fn plan(objective: &str) -> Plan {
    let steps = decompose(objective);
    Plan {
        objective: objective.to_string(),
        count: steps.len(),
        steps,
        note: "Planning is non-executing. Execute each step via POST /execute.",
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_objective_yields_read_step() {
        let steps = decompose("research competitors in the widget market");
        assert_eq!(steps[0].tool, "brave_search");
        assert_eq!(steps[0].step_type, StepType::Read);
    }

    #[test]
    fn test_email_objective_reads_before_sending() {
        let steps = decompose("email the weekly report to the team");
        let ops: Vec<&str> = steps.iter().map(|s| s.op.as_str()).collect();
        let read_pos = ops.iter().position(|o| *o == "read").unwrap();
        let send_pos = ops.iter().position(|o| *o == "send").unwrap();
        assert!(read_pos < send_pos);
    }

    #[test]
    fn test_draft_objective_never_sends() {
        let steps = decompose("draft an email to the board");
        assert!(steps.iter().any(|s| s.op == "draft"));
        assert!(!steps.iter().any(|s| s.op == "send"));
    }

    #[test]
    fn test_unmatched_objective_falls_back_to_search() {
        let steps = decompose("do the thing");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool, "brave_search");
    }

    #[test]
    fn test_plan_counts_steps() {
        let plan = plan("search the web and schedule a meeting");
        assert_eq!(plan.count, plan.steps.len());
        assert!(plan.count >= 2);
    }
}
