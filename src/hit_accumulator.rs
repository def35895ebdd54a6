//! Hit Accumulator: derives per-(rep, lane) net hit counts.
//!
//! Implementation note (see `DESIGN.md` "Open Question Decisions" item 1 and
//! the contribution note below): rather than summing flat per-event deltas,
//! the accumulator keeps a per-`lead_id` ledger. `LeadPlaced` opens an entry
//! at `+1`; `MarkForReplacement`/`UnmarkForReplacement` toggle it between `0`
//! and `1`; the cascade's compensating events (`ReopenMark`, `CancelMark`)
//! *set* the referenced lead's entry back to `0` rather than subtracting from
//! it. This is what makes "never negative" hold by construction instead of by
//! coincidence, and it is what makes window exclusion fall out naturally: a
//! lead's net contribution is only counted toward a window if its own
//! `LeadPlaced.action_date` falls inside that window, so a
//! `MarkForReplacement` whose original lead is outside the window is
//! excluded right along with it.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{EngineError, EngineResult};
use crate::event::{Event, EventEnvelope};
use crate::models::{Lane, LeadId, RepId};

#[derive(Debug, Clone, Copy)]
struct LedgerEntry {
    rep_id_idx: usize,
    lane: Lane,
    placed_date: NaiveDate,
    contribution: i64,
}

/// Net hit counts per `(rep, lane)`, derived from an event prefix.
#[derive(Debug, Clone, Default)]
pub struct HitCounter {
    counts: HashMap<(RepId, Lane), i64>,
}

impl HitCounter {
    pub fn net(&self, rep_id: &str, lane: Lane) -> i64 {
        self.counts
            .get(&(rep_id.to_string(), lane))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self, lane: Lane) -> i64 {
        self.counts
            .iter()
            .filter(|((_, l), _)| *l == lane)
            .map(|(_, v)| v)
            .sum()
    }
}

/// Accumulates hit counts for `lane` from the full event history, restricted
/// to the optional `[from, to]` day window. `events` must be in `seq` order
/// and is not itself pre-filtered by lane — the accumulator does the lane
/// selection so it can see every `LeadPlaced` needed to resolve a `Mark`/
/// `Fulfill`/`Unmark` reference regardless of lane filtering artifacts.
pub fn accumulate(
    events: &[EventEnvelope],
    lane: Lane,
    window: Option<(NaiveDate, NaiveDate)>,
) -> EngineResult<HitCounter> {
    let mut reps: Vec<RepId> = Vec::new();
    let mut rep_index = |rep_id: &str, reps: &mut Vec<RepId>| -> usize {
        if let Some(pos) = reps.iter().position(|r| r == rep_id) {
            pos
        } else {
            reps.push(rep_id.to_string());
            reps.len() - 1
        }
    };

    let mut ledger: HashMap<LeadId, LedgerEntry> = HashMap::new();
    // (rep_idx, day) contributions from Skip events, which have no lead_id.
    let mut skip_contribution: Vec<(usize, NaiveDate)> = Vec::new();

    for envelope in events {
        match &envelope.event {
            Event::LeadPlaced { lead } => {
                if lead.lane() != lane {
                    continue;
                }
                let idx = rep_index(&lead.assigned_rep, &mut reps);
                ledger.insert(
                    lead.id.clone(),
                    LedgerEntry {
                        rep_id_idx: idx,
                        lane,
                        placed_date: lead.action_date,
                        contribution: 1,
                    },
                );
            }
            Event::Skip { rep_id, target, day } => {
                if !target.targets(lane) {
                    continue;
                }
                let idx = rep_index(rep_id, &mut reps);
                skip_contribution.push((idx, *day));
            }
            Event::MarkForReplacement {
                lead_id, lane: event_lane, ..
            } => {
                if *event_lane != lane {
                    continue;
                }
                let entry = ledger.get_mut(lead_id).ok_or_else(|| {
                    EngineError::InvariantViolation(format!(
                        "MarkForReplacement for unknown lead {lead_id}"
                    ))
                })?;
                entry.contribution = 0;
            }
            Event::UnmarkForReplacement {
                lead_id, lane: event_lane, ..
            } => {
                if *event_lane != lane {
                    continue;
                }
                let entry = ledger.get_mut(lead_id).ok_or_else(|| {
                    EngineError::InvariantViolation(format!(
                        "UnmarkForReplacement for unknown lead {lead_id}"
                    ))
                })?;
                entry.contribution = 1;
            }
            Event::FulfillReplacement { .. } => {
                // No direct hit delta: the new lead's own `LeadPlaced` already
                // carries the credit to its rep, so this would double-count it.
            }
            Event::ReopenMark {
                former_new_lead_id,
                lane: event_lane,
                ..
            } => {
                if *event_lane != lane {
                    continue;
                }
                if let Some(entry) = ledger.get_mut(former_new_lead_id) {
                    entry.contribution = 0;
                }
            }
            Event::CancelMark {
                lead_id, lane: event_lane, ..
            } => {
                if *event_lane != lane {
                    continue;
                }
                if let Some(entry) = ledger.get_mut(lead_id) {
                    entry.contribution = 0;
                }
            }
            Event::Ooo { .. } => {}
        }
    }

    let mut counts: HashMap<(RepId, Lane), i64> = HashMap::new();
    for entry in ledger.values() {
        if let Some((from, to)) = window {
            if entry.placed_date < from || entry.placed_date > to {
                continue;
            }
        }
        let rep_id = reps[entry.rep_id_idx].clone();
        *counts.entry((rep_id, entry.lane)).or_insert(0) += entry.contribution;
    }
    for (idx, day) in skip_contribution {
        if let Some((from, to)) = window {
            if day < from || day > to {
                continue;
            }
        }
        let rep_id = reps[idx].clone();
        *counts.entry((rep_id, lane)).or_insert(0) += 1;
    }

    for ((rep_id, lane), net) in counts.iter() {
        if *net < 0 {
            return Err(EngineError::InvariantViolation(format!(
                "net hit count went negative for rep {rep_id} in lane {lane:?}"
            )));
        }
    }

    Ok(HitCounter { counts })
}
