// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: services that orchestrate the domain against the
//! store, the vault and the connectors.

pub mod auditor;
pub mod decision_service;
pub mod metrics;
pub mod policy;
pub mod rate_limiter;
