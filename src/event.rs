//! The event stream vocabulary.
//!
//! Events are immutable once appended. The `EventStore` (see `event_log.rs`)
//! is the sole authority on `seq`; nothing in this module assigns one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Lane, Lead, LeadId, RepId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipTarget {
    Sub1k,
    OneKPlus,
    Both,
}

impl SkipTarget {
    pub fn targets(self, lane: Lane) -> bool {
        match self {
            SkipTarget::Both => true,
            SkipTarget::Sub1k => lane == Lane::Sub1k,
            SkipTarget::OneKPlus => lane == Lane::OneKPlus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Carries the full lead body (not just its id/rep/lane/date) so the
    /// materialized `LeadStore` and `ReplacementStore` projections — which
    /// need `account_number`/`url`/`property_types`/`unit_count` for a
    /// lead they never see again after this event — can be rebuilt purely
    /// by replaying the log (spec §6: "must be reconstructable from the
    /// event stream").
    LeadPlaced { lead: Lead },
    Skip {
        rep_id: RepId,
        target: SkipTarget,
        day: NaiveDate,
    },
    Ooo {
        rep_id: RepId,
        day: NaiveDate,
    },
    MarkForReplacement {
        lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
    },
    FulfillReplacement {
        original_lead_id: LeadId,
        new_lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
    },
    UnmarkForReplacement {
        lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
    },
    /// Compensating event emitted by the replacement-store cascade (spec
    /// §4.4 rule 2) when a replacement lead is deleted and its mark
    /// re-opens: restores the original's -1 and removes the replacement's +1.
    ReopenMark {
        original_lead_id: LeadId,
        former_new_lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
    },
    /// Compensating event emitted by the cascade when an originally-marked
    /// (still-open) lead is deleted: cancels the mark's -1.
    CancelMark {
        lead_id: LeadId,
        rep_id: RepId,
        lane: Lane,
    },
}

impl Event {
    /// A stable discriminant string, used for the `(ts, kind, lead_id)`
    /// tie-break fields carried on `EventEnvelope`.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::LeadPlaced { .. } => "lead_placed",
            Event::Skip { .. } => "skip",
            Event::Ooo { .. } => "ooo",
            Event::MarkForReplacement { .. } => "mark_for_replacement",
            Event::FulfillReplacement { .. } => "fulfill_replacement",
            Event::UnmarkForReplacement { .. } => "unmark_for_replacement",
            Event::ReopenMark { .. } => "reopen_mark",
            Event::CancelMark { .. } => "cancel_mark",
        }
    }

    /// The lead id most relevant for the tie-break ordering, when one exists.
    pub fn lead_id(&self) -> Option<&str> {
        match self {
            Event::LeadPlaced { lead } => Some(&lead.id),
            Event::MarkForReplacement { lead_id, .. }
            | Event::UnmarkForReplacement { lead_id, .. }
            | Event::CancelMark { lead_id, .. } => Some(lead_id),
            Event::FulfillReplacement { new_lead_id, .. } => Some(new_lead_id),
            Event::ReopenMark {
                former_new_lead_id, ..
            } => Some(former_new_lead_id),
            Event::Skip { .. } | Event::Ooo { .. } => None,
        }
    }
}

/// An envelope wrapping a stored event with its assigned sequence number and
/// timestamp. `seq` is the single source of truth for ordering; `ts` plus
/// `(kind, lead_id)` are carried for audit/diagnostic purposes and as a
/// documented tie-break should two envelopes ever be compared outside of
/// `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq: u64,
    pub ts: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn tie_break_key(&self) -> (DateTime<Utc>, &'static str, Option<&str>) {
        (self.ts, self.event.kind(), self.event.lead_id())
    }
}
