// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy pack application: compile a named preset into a concrete intent,
//! persist it, and make it the tenant's default so subsequent proxy calls
//! without an explicit intent pick it up.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::intent::Intent;
use crate::domain::policy_pack::get_pack;
use crate::domain::repository::{IntentRepository, StoreError, TenantRepository};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Unknown policy pack: {0}")]
    UnknownPack(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct PolicyService {
    intents: Arc<dyn IntentRepository>,
    tenants: Arc<dyn TenantRepository>,
}

impl PolicyService {
    pub fn new(intents: Arc<dyn IntentRepository>, tenants: Arc<dyn TenantRepository>) -> Self {
        Self { intents, tenants }
    }

    /// Apply a pack for a tenant. Returns the compiled, persisted intent.
    pub async fn apply_pack(
        &self,
        pack_name: &str,
        tenant_id: Option<&str>,
        objective: Option<String>,
    ) -> Result<Intent, PolicyError> {
        let pack = get_pack(pack_name).ok_or_else(|| PolicyError::UnknownPack(pack_name.to_string()))?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let intent_id = match tenant_id {
            Some(tenant) => format!("intent_{tenant}_{pack_name}_{}", &suffix[..8]),
            None => format!("intent_{pack_name}_{}", &suffix[..12]),
        };

        let intent = pack.compile(
            intent_id,
            tenant_id.map(str::to_string),
            objective,
            Utc::now(),
        );
        self.intents.save(&intent).await?;

        if let Some(tenant) = tenant_id {
            // A missing tenant row is tolerated; the intent still applies.
            match self.tenants.set_default_intent(tenant, &intent.intent_id).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(intent)
    }
}
