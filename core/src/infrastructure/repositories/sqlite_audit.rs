// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Audit events and decision records. `save_event` writes both rows in a
//! single transaction; a failure rolls back both. Audit rows are append-only
//! and decision rows immutable once written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::audit::{ActionSnapshot, AuditEvent, AuditQuery, DecisionRecord};
use crate::domain::decision::{ReasonCode, Verdict};
use crate::domain::intent::RiskLevel;
use crate::domain::repository::{AuditRepository, StoreError};

use super::parse_ts;

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn event_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, StoreError> {
        let params_raw: String = row.get("action_params");
        let context_raw: String = row.get("context");
        let verdict_raw: String = row.get("verdict");
        let reason_raw: String = row.get("reason_code");
        let timestamp: String = row.get("timestamp");
        let computed_raw: String = row.get("action_computed_risk");
        let estimated_raw: Option<String> = row.get("action_estimated_risk");

        Ok(AuditEvent {
            event_id: row.get("event_id"),
            decision_id: row.get("decision_id"),
            tenant_id: row.get("tenant_id"),
            agent_id: row.get("agent_id"),
            intent_id: row.get("intent_id"),
            action: ActionSnapshot {
                tool: row.get("action_tool"),
                op: row.get("action_op"),
                params: serde_json::from_str(&params_raw)?,
                estimated_risk: estimated_raw.as_deref().and_then(RiskLevel::parse),
                computed_risk: RiskLevel::parse(&computed_raw).ok_or_else(|| {
                    StoreError::Serialization(format!("bad computed risk '{computed_raw}'"))
                })?,
            },
            context: serde_json::from_str(&context_raw)?,
            verdict: parse_verdict(&verdict_raw)?,
            reason_code: parse_reason(&reason_raw)?,
            explanation: row.get("explanation"),
            timestamp: parse_ts(&timestamp)?,
            latency_ms: row.get("latency_ms"),
        })
    }

    fn decision_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DecisionRecord, StoreError> {
        let verdict_raw: String = row.get("verdict");
        let reason_raw: String = row.get("reason_code");
        let timestamp: String = row.get("timestamp");
        let safe_alternative: Option<String> = row.get("safe_alternative");
        let escalation: Option<String> = row.get("escalation");

        Ok(DecisionRecord {
            decision_id: row.get("decision_id"),
            action_fingerprint: row.get("action_fingerprint"),
            verdict: parse_verdict(&verdict_raw)?,
            reason_code: parse_reason(&reason_raw)?,
            explanation: row.get("explanation"),
            safe_alternative: safe_alternative
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            escalation: escalation.as_deref().map(serde_json::from_str).transpose()?,
            intent_id: row.get("intent_id"),
            agent_id: row.get("agent_id"),
            timestamp: parse_ts(&timestamp)?,
        })
    }
}

fn parse_verdict(raw: &str) -> Result<Verdict, StoreError> {
    Verdict::parse(raw).ok_or_else(|| StoreError::Serialization(format!("bad verdict '{raw}'")))
}

fn parse_reason(raw: &str) -> Result<ReasonCode, StoreError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| StoreError::Serialization(format!("bad reason code '{raw}'")))
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn save_event(
        &self,
        event: &AuditEvent,
        record: &DecisionRecord,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO audit_events (
                event_id, decision_id, tenant_id, agent_id, intent_id,
                action_tool, action_op, action_params,
                action_estimated_risk, action_computed_risk,
                context, verdict, reason_code, explanation, timestamp, latency_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.decision_id)
        .bind(&event.tenant_id)
        .bind(&event.agent_id)
        .bind(&event.intent_id)
        .bind(&event.action.tool)
        .bind(&event.action.op)
        .bind(event.action.params.to_string())
        .bind(event.action.estimated_risk.map(|r| r.as_str()))
        .bind(event.action.computed_risk.as_str())
        .bind(event.context.to_string())
        .bind(event.verdict.as_str())
        .bind(event.reason_code.as_str())
        .bind(&event.explanation)
        .bind(event.timestamp.to_rfc3339())
        .bind(event.latency_ms)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO decisions (
                decision_id, action_fingerprint, verdict, reason_code,
                explanation, safe_alternative, escalation,
                intent_id, agent_id, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.decision_id)
        .bind(&record.action_fingerprint)
        .bind(record.verdict.as_str())
        .bind(record.reason_code.as_str())
        .bind(&record.explanation)
        .bind(record.safe_alternative.as_ref().map(|v| v.to_string()))
        .bind(record.escalation.as_ref().map(|v| v.to_string()))
        .bind(&record.intent_id)
        .bind(&record.agent_id)
        .bind(record.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn query_events(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>, StoreError> {
        let limit = query.limit.clamp(1, AuditQuery::MAX_LIMIT) as i64;
        let mut sql = String::from("SELECT * FROM audit_events WHERE 1=1");
        if query.agent_id.is_some() {
            sql.push_str(" AND agent_id = ?");
        }
        if query.verdict.is_some() {
            sql.push_str(" AND verdict = ?");
        }
        if query.intent_id.is_some() {
            sql.push_str(" AND intent_id = ?");
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ?");

        let mut q = sqlx::query(&sql);
        if let Some(agent_id) = &query.agent_id {
            q = q.bind(agent_id);
        }
        if let Some(verdict) = &query.verdict {
            q = q.bind(verdict.as_str());
        }
        if let Some(intent_id) = &query.intent_id {
            q = q.bind(intent_id);
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::event_from_row).collect()
    }

    async fn query_decisions(
        &self,
        query: &AuditQuery,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        let limit = query.limit.clamp(1, AuditQuery::MAX_LIMIT) as i64;
        let mut sql = String::from("SELECT * FROM decisions WHERE 1=1");
        if query.agent_id.is_some() {
            sql.push_str(" AND agent_id = ?");
        }
        if query.verdict.is_some() {
            sql.push_str(" AND verdict = ?");
        }
        if query.intent_id.is_some() {
            sql.push_str(" AND intent_id = ?");
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ?");

        let mut q = sqlx::query(&sql);
        if let Some(agent_id) = &query.agent_id {
            q = q.bind(agent_id);
        }
        if let Some(verdict) = &query.verdict {
            q = q.bind(verdict.as_str());
        }
        if let Some(intent_id) = &query.intent_id {
            q = q.bind(intent_id);
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::decision_from_row).collect()
    }

    async fn get_decision(
        &self,
        decision_id: &str,
    ) -> Result<Option<DecisionRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM decisions WHERE decision_id = ?")
            .bind(decision_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::decision_from_row(&r)).transpose()
    }

    async fn count_recent_decisions(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM decisions WHERE action_fingerprint = ? AND timestamp >= ?",
        )
        .bind(fingerprint)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    async fn count_recent_actions(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_events WHERE agent_id = ? AND timestamp >= ?",
        )
        .bind(agent_id)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::Database;
    use serde_json::json;

    async fn repo() -> SqliteAuditRepository {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        SqliteAuditRepository::new(db.pool().clone())
    }

    fn sample(decision_id: &str, agent: &str, verdict: Verdict) -> (AuditEvent, DecisionRecord) {
        let now = Utc::now();
        let reason = match verdict {
            Verdict::Allow => ReasonCode::Approved,
            _ => ReasonCode::ScopeViolation,
        };
        let event = AuditEvent {
            event_id: format!("evt-{decision_id}"),
            decision_id: decision_id.to_string(),
            tenant_id: None,
            agent_id: Some(agent.to_string()),
            intent_id: Some("intent_1".to_string()),
            action: ActionSnapshot {
                tool: "email".to_string(),
                op: "read".to_string(),
                params: json!({"folder": "inbox"}),
                estimated_risk: Some(RiskLevel::Low),
                computed_risk: RiskLevel::Low,
            },
            context: json!({"agent_id": agent}),
            verdict,
            reason_code: reason,
            explanation: "test".to_string(),
            timestamp: now,
            latency_ms: 1.5,
        };
        let record = DecisionRecord {
            decision_id: decision_id.to_string(),
            action_fingerprint: "fp-abc".to_string(),
            verdict,
            reason_code: reason,
            explanation: "test".to_string(),
            safe_alternative: None,
            escalation: None,
            intent_id: Some("intent_1".to_string()),
            agent_id: Some(agent.to_string()),
            timestamp: now,
        };
        (event, record)
    }

    #[tokio::test]
    async fn test_save_event_writes_both_rows() {
        let repo = repo().await;
        let (event, record) = sample("dec-1", "agent-a", Verdict::Allow);
        repo.save_event(&event, &record).await.unwrap();

        let events = repo
            .query_events(&AuditQuery {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].decision_id, "dec-1");

        let decision = repo.get_decision("dec-1").await.unwrap().unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);
    }

    #[tokio::test]
    async fn test_duplicate_decision_id_rolls_back_event() {
        let repo = repo().await;
        let (event, record) = sample("dec-1", "agent-a", Verdict::Allow);
        repo.save_event(&event, &record).await.unwrap();

        // Same decision_id, different event_id: the decision insert fails and
        // the whole transaction must roll back.
        let (mut event2, record2) = sample("dec-1", "agent-a", Verdict::Allow);
        event2.event_id = "evt-other".to_string();
        assert!(repo.save_event(&event2, &record2).await.is_err());

        let events = repo
            .query_events(&AuditQuery {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(events.len(), 1, "rolled-back event must not persist");
    }

    #[tokio::test]
    async fn test_query_filters() {
        let repo = repo().await;
        for (i, (agent, verdict)) in [
            ("agent-a", Verdict::Allow),
            ("agent-a", Verdict::Block),
            ("agent-b", Verdict::Allow),
        ]
        .iter()
        .enumerate()
        {
            let (event, record) = sample(&format!("dec-{i}"), agent, *verdict);
            repo.save_event(&event, &record).await.unwrap();
        }

        let by_agent = repo
            .query_events(&AuditQuery {
                agent_id: Some("agent-a".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_agent.len(), 2);

        let blocked = repo
            .query_decisions(&AuditQuery {
                verdict: Some(Verdict::Block),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(blocked.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_counters() {
        let repo = repo().await;
        for i in 0..3 {
            let (event, record) = sample(&format!("dec-{i}"), "agent-a", Verdict::Allow);
            repo.save_event(&event, &record).await.unwrap();
        }

        let since = Utc::now() - chrono::Duration::seconds(10);
        assert_eq!(
            repo.count_recent_decisions("fp-abc", since).await.unwrap(),
            3
        );
        assert_eq!(repo.count_recent_actions("agent-a", since).await.unwrap(), 3);
        assert_eq!(repo.count_recent_actions("agent-b", since).await.unwrap(), 0);

        let future = Utc::now() + chrono::Duration::seconds(10);
        assert_eq!(
            repo.count_recent_decisions("fp-abc", future).await.unwrap(),
            0
        );
    }
}
