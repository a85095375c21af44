// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # EDON Gateway Core
//!
//! Policy-enforcement layer between AI agents and backend tools. For every
//! action an agent attempts, the Governor decides one of
//! ALLOW / DEGRADE / ESCALATE / BLOCK / PAUSE against a tenant-scoped intent
//! contract, then either executes the action through a vetted connector or
//! refuses it. Every decision is persisted as an immutable audit record.
//!
//! Layers:
//! - [`domain`] — pure types and the deterministic Governor
//! - [`application`] — decision pipeline, auditor, rate limiter, metrics
//! - [`infrastructure`] — SQLite store, vault, connectors, network gating
//! - [`presentation`] — axum router, middleware, HTTP error mapping

pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
