// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! SQLite repository implementations, one per aggregate root. Each holds a
//! clone of the shared pool; the pool is the process-wide synchronization
//! point.

mod sqlite_audit;
mod sqlite_connect_code;
mod sqlite_counter;
mod sqlite_credential;
mod sqlite_intent;
mod sqlite_tenant;
mod sqlite_token;

pub use sqlite_audit::SqliteAuditRepository;
pub use sqlite_connect_code::SqliteConnectCodeRepository;
pub use sqlite_counter::SqliteCounterRepository;
pub use sqlite_credential::SqliteCredentialRepository;
pub use sqlite_intent::SqliteIntentRepository;
pub use sqlite_tenant::SqliteTenantRepository;
pub use sqlite_token::SqliteTokenRepository;

use chrono::{DateTime, Utc};

use crate::domain::repository::StoreError;

/// Timestamps are stored as RFC 3339 TEXT.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{raw}': {e}")))
}

pub(crate) fn parse_ts_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.as_deref().map(parse_ts).transpose()
}
