// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: the SQLite store, the credential vault, connectors
//! and network gating. Everything here is reached through domain traits or
//! typed facades.

pub mod connectors;
pub mod db;
pub mod network_gating;
pub mod repositories;
pub mod vault;
