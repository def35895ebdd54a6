//! Materialized lead registry.
//!
//! Several commands (`mark_for_replacement`, `delete_lead`) take only a
//! `lead_id` and expect the engine to already know that lead's attributes
//! (its lane, account number, url — `ReplacementRecord` carries
//! `account_number`/`url` copied from the lead at mark time). This is the
//! same kind of materialized, event-log-reconstructable cache as the
//! Replacement Store: built by replaying `LeadPlaced` events, not an
//! independent source of truth.

use std::collections::HashMap;

use crate::models::{Lead, LeadId};

#[derive(Default)]
pub struct LeadStore {
    leads: parking_lot::RwLock<HashMap<LeadId, Lead>>,
}

impl LeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, lead: Lead) {
        self.leads.write().insert(lead.id.clone(), lead);
    }

    pub fn get(&self, lead_id: &str) -> Option<Lead> {
        self.leads.read().get(lead_id).cloned()
    }

    pub fn remove(&self, lead_id: &str) {
        self.leads.write().remove(lead_id);
    }
}
