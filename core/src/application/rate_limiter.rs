// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Rate Limiter
//!
//! Sliding-window counters keyed by `(principal, window, time bucket)` and
//! backed by the store's atomic counters. Windows are checked minute ->
//! hour -> day; the first exceeded window produces the 429 with a
//! `Retry-After` equal to the seconds until the next bucket.
//!
//! The principal is taken from headers or query parameters only — the body
//! is never read here, so an oversized body cannot be used to bypass or
//! DoS the limiter. Counters are incremented only after a non-rate-limited
//! request completes, so 429 responses are never charged.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::domain::repository::{CounterRepository, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Minute,
    Hour,
    Day,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// Bucket label for a timestamp, e.g. `202603021512` for a minute.
    fn bucket(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::Minute => format!(
                "{:04}{:02}{:02}{:02}{:02}",
                now.year(),
                now.month(),
                now.day(),
                now.hour(),
                now.minute()
            ),
            Self::Hour => format!(
                "{:04}{:02}{:02}{:02}",
                now.year(),
                now.month(),
                now.day(),
                now.hour()
            ),
            Self::Day => format!("{:04}{:02}{:02}", now.year(), now.month(), now.day()),
        }
    }

    /// Seconds until the next bucket opens.
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> u64 {
        match self {
            Self::Minute => 60 - now.second() as u64,
            Self::Hour => 3600 - (now.minute() as u64 * 60 + now.second() as u64),
            Self::Day => {
                86_400
                    - (now.hour() as u64 * 3600
                        + now.minute() as u64 * 60
                        + now.second() as u64)
            }
        }
    }
}

/// Per-principal limits, minute/hour/day.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub per_minute: i64,
    pub per_hour: i64,
    pub per_day: i64,
}

impl RateLimits {
    /// Default limits for authenticated principals.
    pub fn authenticated() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1000,
            per_day: 10_000,
        }
    }

    /// Anonymous requests (no agent identity) are limited much harder.
    pub fn anonymous() -> Self {
        Self {
            per_minute: 10,
            per_hour: 100,
            per_day: 500,
        }
    }

    fn for_window(&self, window: Window) -> i64 {
        match window {
            Window::Minute => self.per_minute,
            Window::Hour => self.per_hour,
            Window::Day => self.per_day,
        }
    }
}

/// Outcome of a pre-request limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateCheck {
    Allowed,
    Limited {
        window: Window,
        limit: i64,
        retry_after_seconds: u64,
    },
}

pub struct RateLimiter {
    counters: Arc<dyn CounterRepository>,
    enabled: bool,
    authenticated: RateLimits,
    anonymous: RateLimits,
}

impl RateLimiter {
    pub fn new(
        counters: Arc<dyn CounterRepository>,
        enabled: bool,
        authenticated: RateLimits,
    ) -> Self {
        Self {
            counters,
            enabled,
            authenticated,
            anonymous: RateLimits::anonymous(),
        }
    }

    fn key(principal: &str, window: Window, now: DateTime<Utc>) -> String {
        format!("rate_limit:{principal}:{}:{}", window.as_str(), window.bucket(now))
    }

    fn limits_for(&self, anonymous: bool) -> RateLimits {
        if anonymous {
            self.anonymous
        } else {
            self.authenticated
        }
    }

    /// Check all windows in order. Does not increment anything.
    pub async fn check(
        &self,
        principal: &str,
        anonymous: bool,
        now: DateTime<Utc>,
    ) -> Result<RateCheck, StoreError> {
        if !self.enabled {
            return Ok(RateCheck::Allowed);
        }
        let limits = self.limits_for(anonymous);
        for window in [Window::Minute, Window::Hour, Window::Day] {
            let limit = limits.for_window(window);
            let count = self.counters.get(&Self::key(principal, window, now)).await?;
            if count >= limit {
                return Ok(RateCheck::Limited {
                    window,
                    limit,
                    retry_after_seconds: window.seconds_until_reset(now),
                });
            }
        }
        Ok(RateCheck::Allowed)
    }

    /// Charge one request against every window. Called only after a
    /// non-rate-limited response.
    pub async fn charge(&self, principal: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        if !self.enabled {
            return Ok(());
        }
        for window in [Window::Minute, Window::Hour, Window::Day] {
            self.counters
                .increment(&Self::key(principal, window, now))
                .await?;
        }
        Ok(())
    }
}
