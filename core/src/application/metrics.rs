// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Metrics
//!
//! Aggregate, non-sensitive counters only: decisions by verdict and reason,
//! rate-limit hits, audit write failures, decision latency percentiles.
//! No per-request data and no agent identifiers appear in any label.
//!
//! The latency reservoir is bounded; once full it drops the oldest half so
//! percentiles track recent behavior.

use std::collections::BTreeMap;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::decision::{ReasonCode, Verdict};

const LATENCY_RESERVOIR_CAP: usize = 10_000;

#[derive(Default)]
struct MetricsInner {
    decisions: BTreeMap<(String, String), u64>,
    rate_limit_hits: u64,
    audit_write_failures: u64,
    latencies_ms: Vec<f64>,
}

pub struct MetricsCollector {
    inner: Mutex<MetricsInner>,
    started_at: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsInner::default()),
            started_at: Instant::now(),
        }
    }

    pub fn record_decision(&self, verdict: Verdict, reason: ReasonCode, latency_ms: f64) {
        let mut inner = self.inner.lock();
        *inner
            .decisions
            .entry((verdict.as_str().to_string(), reason.as_str().to_string()))
            .or_default() += 1;
        if inner.latencies_ms.len() >= LATENCY_RESERVOIR_CAP {
            let half = LATENCY_RESERVOIR_CAP / 2;
            inner.latencies_ms.drain(..half);
        }
        inner.latencies_ms.push(latency_ms);
    }

    pub fn record_rate_limit_hit(&self) {
        self.inner.lock().rate_limit_hits += 1;
    }

    pub fn record_audit_write_failure(&self) {
        self.inner.lock().audit_write_failures += 1;
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn snapshot(&self, active_intents: u64) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let latency = LatencyStats::from_samples(&inner.latencies_ms);
        MetricsSnapshot {
            decisions: inner
                .decisions
                .iter()
                .map(|((verdict, reason), count)| DecisionCount {
                    verdict: verdict.clone(),
                    reason_code: reason.clone(),
                    count: *count,
                })
                .collect(),
            rate_limit_hits: inner.rate_limit_hits,
            audit_write_failures: inner.audit_write_failures,
            active_intents,
            uptime_seconds: self.uptime_seconds(),
            latency,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionCount {
    pub verdict: String,
    pub reason_code: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct LatencyStats {
    pub count: usize,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let percentile = |p: f64| {
            let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
            sorted[idx]
        };
        Self {
            count: sorted.len(),
            median_ms: percentile(0.5),
            p95_ms: percentile(0.95),
            p99_ms: percentile(0.99),
            max_ms: *sorted.last().unwrap(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub decisions: Vec<DecisionCount>,
    pub rate_limit_hits: u64,
    pub audit_write_failures: u64,
    pub active_intents: u64,
    pub uptime_seconds: u64,
    pub latency: LatencyStats,
}

impl MetricsSnapshot {
    /// Prometheus text exposition of the same aggregates.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP edon_decisions_total Total number of governance decisions\n");
        out.push_str("# TYPE edon_decisions_total counter\n");
        for entry in &self.decisions {
            out.push_str(&format!(
                "edon_decisions_total{{verdict=\"{}\",reason_code=\"{}\"}} {}\n",
                entry.verdict, entry.reason_code, entry.count
            ));
        }
        out.push_str("# HELP edon_rate_limit_hits_total Total number of rate limit hits\n");
        out.push_str("# TYPE edon_rate_limit_hits_total counter\n");
        out.push_str(&format!("edon_rate_limit_hits_total {}\n", self.rate_limit_hits));
        out.push_str("# HELP edon_audit_write_failures_total Audit persistence failures\n");
        out.push_str("# TYPE edon_audit_write_failures_total counter\n");
        out.push_str(&format!(
            "edon_audit_write_failures_total {}\n",
            self.audit_write_failures
        ));
        out.push_str("# HELP edon_active_intents Number of registered intent contracts\n");
        out.push_str("# TYPE edon_active_intents gauge\n");
        out.push_str(&format!("edon_active_intents {}\n", self.active_intents));
        out.push_str("# HELP edon_uptime_seconds Gateway uptime in seconds\n");
        out.push_str("# TYPE edon_uptime_seconds gauge\n");
        out.push_str(&format!("edon_uptime_seconds {}\n", self.uptime_seconds));
        out.push_str("# HELP edon_decision_latency_ms Decision latency percentiles\n");
        out.push_str("# TYPE edon_decision_latency_ms summary\n");
        out.push_str(&format!(
            "edon_decision_latency_ms{{quantile=\"0.5\"}} {}\n",
            self.latency.median_ms
        ));
        out.push_str(&format!(
            "edon_decision_latency_ms{{quantile=\"0.95\"}} {}\n",
            self.latency.p95_ms
        ));
        out.push_str(&format!(
            "edon_decision_latency_ms{{quantile=\"0.99\"}} {}\n",
            self.latency.p99_ms
        ));
        out
    }

    /// The `/benchmark/trust-spec` summary. The bypass resistance score is a
    /// monotone function of the three hardening flags.
    pub fn trust_spec(
        &self,
        network_gating: bool,
        token_hardening: bool,
        credentials_strict: bool,
    ) -> Value {
        let mut score = 0u32;
        let mut factors = Vec::new();
        if network_gating {
            score += 50;
            factors.push("Network gating enabled (+50)");
        } else {
            factors.push("Network gating disabled (0)");
        }
        if token_hardening {
            score += 40;
            factors.push("Token hardening enabled (+40)");
        } else {
            factors.push("Token hardening disabled (0)");
        }
        if credentials_strict {
            score += 10;
            factors.push("Credentials strict mode enabled (+10)");
        } else {
            factors.push("Credentials strict mode disabled (0)");
        }

        let level = match score {
            90..=100 => "Excellent - Highly resistant to bypass",
            70..=89 => "Good - Resistant to bypass",
            50..=69 => "Moderate - Some bypass protection",
            20..=49 => "Weak - Minimal bypass protection",
            _ => "Critical - No bypass protection",
        };

        let block_count: u64 = self
            .decisions
            .iter()
            .filter(|d| d.verdict == "BLOCK")
            .map(|d| d.count)
            .sum();
        let allow_count: u64 = self
            .decisions
            .iter()
            .filter(|d| d.verdict == "ALLOW")
            .map(|d| d.count)
            .sum();
        let decided = block_count + allow_count;
        let block_rate = if decided > 0 {
            block_count as f64 / decided as f64 * 100.0
        } else {
            0.0
        };

        json!({
            "latency_overhead_ms": {
                "median_ms": self.latency.median_ms,
                "p95_ms": self.latency.p95_ms,
                "target_local_ms": 25,
                "target_network_ms": 50,
                "meets_targets": self.latency.median_ms <= 25.0,
            },
            "block_rate": {
                "block_count": block_count,
                "allow_count": allow_count,
                "block_percentage": block_rate,
            },
            "bypass_resistance_score": {
                "score": score,
                "max_score": 100,
                "level": level,
                "factors": factors,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_counts_and_latency() {
        let metrics = MetricsCollector::new();
        metrics.record_decision(Verdict::Allow, ReasonCode::Approved, 5.0);
        metrics.record_decision(Verdict::Allow, ReasonCode::Approved, 15.0);
        metrics.record_decision(Verdict::Block, ReasonCode::ScopeViolation, 3.0);

        let snapshot = metrics.snapshot(2);
        let allow = snapshot
            .decisions
            .iter()
            .find(|d| d.verdict == "ALLOW")
            .unwrap();
        assert_eq!(allow.count, 2);
        assert_eq!(snapshot.active_intents, 2);
        assert_eq!(snapshot.latency.count, 3);
        assert!(snapshot.latency.median_ms >= 3.0);
        assert!(snapshot.latency.max_ms >= 15.0);
    }

    #[test]
    fn test_prometheus_exposition_has_no_agent_labels() {
        let metrics = MetricsCollector::new();
        metrics.record_decision(Verdict::Pause, ReasonCode::LoopDetected, 1.0);
        metrics.record_rate_limit_hit();
        let text = metrics.snapshot(0).to_prometheus();
        assert!(text.contains("edon_decisions_total{verdict=\"PAUSE\",reason_code=\"LOOP_DETECTED\"} 1"));
        assert!(text.contains("edon_rate_limit_hits_total 1"));
        assert!(!text.contains("agent"));
    }

    #[test]
    fn test_bypass_resistance_score_is_monotone() {
        let snapshot = MetricsCollector::new().snapshot(0);
        let none = snapshot.trust_spec(false, false, false);
        let some = snapshot.trust_spec(false, true, false);
        let all = snapshot.trust_spec(true, true, true);
        let score = |v: &Value| v["bypass_resistance_score"]["score"].as_u64().unwrap();
        assert!(score(&none) < score(&some));
        assert!(score(&some) < score(&all));
        assert_eq!(score(&all), 100);
    }

    #[test]
    fn test_block_rate() {
        let metrics = MetricsCollector::new();
        metrics.record_decision(Verdict::Allow, ReasonCode::Approved, 1.0);
        metrics.record_decision(Verdict::Block, ReasonCode::RiskTooHigh, 1.0);
        let spec = metrics.snapshot(0).trust_spec(false, false, false);
        assert_eq!(spec["block_rate"]["block_percentage"].as_f64().unwrap(), 50.0);
    }

    #[test]
    fn test_latency_reservoir_is_bounded() {
        let metrics = MetricsCollector::new();
        for i in 0..(LATENCY_RESERVOIR_CAP + 100) {
            metrics.record_decision(Verdict::Allow, ReasonCode::Approved, i as f64);
        }
        let snapshot = metrics.snapshot(0);
        assert!(snapshot.latency.count <= LATENCY_RESERVOIR_CAP);
    }
}
