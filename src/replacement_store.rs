//! Replacement Store: open/closed marks keyed by original lead id, with a
//! derived per-lane FIFO queue and the cascading delete rules.
//!
//! `ReplacementRecord` is modeled as a sum type over `Open`/`Closed` rather
//! than a struct with an optional `replaced_by_lead_id` plus a derived
//! `is_closed` getter, so a closed record can never be caught mid-mutation
//! without its `replaced_by_lead_id`/`replaced_at` fields set.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::models::{Lane, Lead, LeadId, RepId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplacementRecord {
    Open {
        mark_id: String,
        original_lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
        account_number: String,
        url: String,
        marked_at: DateTime<Utc>,
    },
    Closed {
        mark_id: String,
        original_lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
        account_number: String,
        url: String,
        marked_at: DateTime<Utc>,
        replaced_by_lead_id: LeadId,
        replaced_at: DateTime<Utc>,
    },
}

impl ReplacementRecord {
    pub fn is_open(&self) -> bool {
        matches!(self, ReplacementRecord::Open { .. })
    }

    pub fn original_lead_id(&self) -> &str {
        match self {
            ReplacementRecord::Open {
                original_lead_id, ..
            }
            | ReplacementRecord::Closed {
                original_lead_id, ..
            } => original_lead_id,
        }
    }

    pub fn rep_id(&self) -> &str {
        match self {
            ReplacementRecord::Open { rep_id, .. } | ReplacementRecord::Closed { rep_id, .. } => {
                rep_id
            }
        }
    }

    pub fn lane(&self) -> Lane {
        match self {
            ReplacementRecord::Open { lane, .. } | ReplacementRecord::Closed { lane, .. } => *lane,
        }
    }

    pub fn marked_at(&self) -> DateTime<Utc> {
        match self {
            ReplacementRecord::Open { marked_at, .. }
            | ReplacementRecord::Closed { marked_at, .. } => *marked_at,
        }
    }

    pub fn mark_id(&self) -> &str {
        match self {
            ReplacementRecord::Open { mark_id, .. } | ReplacementRecord::Closed { mark_id, .. } => {
                mark_id
            }
        }
    }
}

/// Outcome of `on_lead_deleted`, used by the caller to decide which
/// compensating event(s) to append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The deleted lead was not referenced by any replacement record.
    NotMarked,
    /// The deleted lead was the `replaced_by_lead_id` of a closed record,
    /// which is now reopened (cascade rule 2).
    ReopenedMark {
        original_lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
    },
    /// The deleted lead was itself an open mark's original lead, which is
    /// now dropped (cascade rule 3).
    MarkCancelled { rep_id: RepId, lane: Lane },
}

/// Holds replacement records keyed by `original_lead_id`.
#[derive(Default)]
pub struct ReplacementStore {
    records: parking_lot::RwLock<HashMap<LeadId, ReplacementRecord>>,
}

impl ReplacementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent by `original_lead_id`: re-marking an already-marked lead
    /// returns the existing record unchanged.
    pub fn mark(
        &self,
        lead: &Lead,
        mark_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> ReplacementRecord {
        let mut records = self.records.write();
        if let Some(existing) = records.get(&lead.id) {
            return existing.clone();
        }
        let record = ReplacementRecord::Open {
            mark_id: mark_id.into(),
            original_lead_id: lead.id.clone(),
            rep_id: lead.assigned_rep.clone(),
            lane: lead.lane(),
            account_number: lead.account_number.clone(),
            url: lead.url.clone(),
            marked_at: now,
        };
        records.insert(lead.id.clone(), record.clone());
        record
    }

    pub fn fulfill(
        &self,
        original_lead_id: &str,
        new_lead: &Lead,
        now: DateTime<Utc>,
    ) -> EngineResult<ReplacementRecord> {
        let mut records = self.records.write();
        let existing = records.get(original_lead_id).cloned().ok_or_else(|| {
            EngineError::Validation(format!("no mark found for lead {original_lead_id}"))
        })?;
        let (mark_id, rep_id, lane, account_number, url, marked_at) = match existing {
            ReplacementRecord::Open {
                mark_id,
                rep_id,
                lane,
                account_number,
                url,
                marked_at,
                ..
            } => (mark_id, rep_id, lane, account_number, url, marked_at),
            ReplacementRecord::Closed { .. } => {
                // A second writer lost the race: some other fulfill already
                // closed this mark.
                return Err(EngineError::MarkAlreadyOpen {
                    lead_id: original_lead_id.to_string(),
                })
            }
        };
        if new_lead.assigned_rep != rep_id {
            return Err(EngineError::AssignmentMismatch {
                expected: rep_id,
                got: new_lead.assigned_rep.clone(),
            });
        }
        if new_lead.lane() != lane {
            return Err(EngineError::LaneMismatch {
                expected: lane,
                actual: new_lead.lane(),
            });
        }
        let record = ReplacementRecord::Closed {
            mark_id,
            original_lead_id: original_lead_id.to_string(),
            rep_id,
            lane,
            account_number,
            url,
            marked_at,
            replaced_by_lead_id: new_lead.id.clone(),
            replaced_at: now,
        };
        records.insert(original_lead_id.to_string(), record.clone());
        Ok(record)
    }

    /// Valid only on open marks; fails `MarkAlreadyClosed` otherwise.
    pub fn unmark(&self, lead_id: &str) -> EngineResult<()> {
        let mut records = self.records.write();
        match records.get(lead_id) {
            Some(ReplacementRecord::Open { .. }) => {
                records.remove(lead_id);
                Ok(())
            }
            Some(ReplacementRecord::Closed { .. }) => Err(EngineError::MarkAlreadyClosed {
                lead_id: lead_id.to_string(),
            }),
            None => Err(EngineError::Validation(format!(
                "no mark found for lead {lead_id}"
            ))),
        }
    }

    /// Runs the cascade rules for a lead deletion request.
    pub fn on_lead_deleted(&self, lead_id: &str) -> EngineResult<DeleteOutcome> {
        let mut records = self.records.write();

        if let Some(ReplacementRecord::Closed { .. }) = records.get(lead_id) {
            return Err(EngineError::DeleteBlocked {
                lead_id: lead_id.to_string(),
            });
        }

        if let Some((original_id, rep_id, lane)) = records.iter().find_map(|(id, r)| match r {
            ReplacementRecord::Closed {
                replaced_by_lead_id,
                rep_id,
                lane,
                ..
            } if replaced_by_lead_id == lead_id => Some((id.clone(), rep_id.clone(), *lane)),
            _ => None,
        }) {
            if let Some(ReplacementRecord::Closed {
                mark_id,
                original_lead_id,
                rep_id,
                lane,
                account_number,
                url,
                marked_at,
                ..
            }) = records.remove(&original_id)
            {
                records.insert(
                    original_id,
                    ReplacementRecord::Open {
                        mark_id,
                        original_lead_id,
                        rep_id,
                        lane,
                        account_number,
                        url,
                        marked_at,
                    },
                );
            }
            return Ok(DeleteOutcome::ReopenedMark {
                original_lead_id: original_id,
                rep_id,
                lane,
            });
        }

        if let Some(ReplacementRecord::Open { rep_id, lane, .. }) = records.get(lead_id) {
            let rep_id = rep_id.clone();
            let lane = *lane;
            records.remove(lead_id);
            return Ok(DeleteOutcome::MarkCancelled { rep_id, lane });
        }

        Ok(DeleteOutcome::NotMarked)
    }

    /// The derived per-lane FIFO queue: open records, sorted ascending by
    /// `marked_at` then `mark_id`. Duplicates preserved.
    pub fn queue(&self, lane: Lane) -> Vec<ReplacementRecord> {
        let records = self.records.read();
        let mut open: Vec<ReplacementRecord> = records
            .values()
            .filter(|r| r.is_open() && r.lane() == lane)
            .cloned()
            .collect();
        open.sort_by(|a, b| a.marked_at().cmp(&b.marked_at()).then(a.mark_id().cmp(b.mark_id())));
        open
    }

    pub fn get(&self, original_lead_id: &str) -> Option<ReplacementRecord> {
        self.records.read().get(original_lead_id).cloned()
    }
}
