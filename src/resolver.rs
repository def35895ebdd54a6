//! The Next-Rep Resolver: the facade tying the roster, event log, hit
//! accumulator, replacement store, sequence generator, overlay composer and
//! eligibility filter together into the engine's single write entry point.
//!
//! Every public mutation here is a thin "validate, mirror the effect onto
//! the materialized replacement/lead stores, append the event(s) that
//! justify it" sequence. The event log remains the sole authority: every
//! event carries everything `apply_to_projections` needs to reproduce that
//! same mirrored effect from scratch, so `rebuild_projections` replaying the
//! full log at startup lands `lead_store` and `replacement_store` on the
//! same state a live run would have, with no separate lead table or other
//! out-of-log state required.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::eligibility::{self, ProspectiveLead};
use crate::error::{EngineError, EngineResult};
use crate::event::{Event, EventEnvelope, SkipTarget};
use crate::event_log::{EventFilter, EventStore};
use crate::hit_accumulator::{self, HitCounter};
use crate::lead_store::LeadStore;
use crate::models::{Lane, Lead, Rep, RepId};
use crate::overlay;
use crate::replacement_store::{DeleteOutcome, ReplacementRecord, ReplacementStore};
use crate::roster::Roster;
use crate::sequence;

/// The engine's change notifications, used to invalidate the derived-view
/// cache. Carries no payload: subscribers re-derive from current state
/// rather than trying to apply a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeNotification {
    Roster,
    Events,
}

/// The rotation engine: owns the roster and the materialized replacement/
/// lead projections, and holds the event log behind a port so the
/// persistence adapter is swappable (spec §4.2, §4.10).
pub struct RotationEngine {
    event_store: Arc<dyn EventStore>,
    roster: Roster,
    replacement_store: ReplacementStore,
    lead_store: LeadStore,
    sequence_cap: usize,
    change_tx: tokio::sync::broadcast::Sender<ChangeNotification>,
}

impl RotationEngine {
    pub fn new(event_store: Arc<dyn EventStore>, reps: Vec<Rep>, sequence_cap: usize) -> EngineResult<Self> {
        let (change_tx, _) = tokio::sync::broadcast::channel(64);
        let engine = Self {
            event_store,
            roster: Roster::new(reps),
            replacement_store: ReplacementStore::new(),
            lead_store: LeadStore::new(),
            sequence_cap,
            change_tx,
        };
        engine.rebuild_projections()?;
        Ok(engine)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeNotification> {
        self.change_tx.subscribe()
    }

    /// Read-only access to the roster (base orders, active reps). Mutations
    /// go through `upsert_rep`/`remove_rep`/`reorder` below so the engine can
    /// fan out `ChangeNotification::Roster` to cache subscribers (spec §4.2
    /// "any roster change invalidates derived caches").
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn upsert_rep(&self, rep: Rep) {
        self.roster.upsert_rep(rep);
        let _ = self.change_tx.send(ChangeNotification::Roster);
    }

    pub fn remove_rep(&self, rep_id: &str) {
        self.roster.remove_rep(rep_id);
        let _ = self.change_tx.send(ChangeNotification::Roster);
    }

    pub fn reorder_roster(&self, lane: Lane, new_order: &[RepId]) -> EngineResult<()> {
        self.roster.reorder(lane, new_order)?;
        let _ = self.change_tx.send(ChangeNotification::Roster);
        Ok(())
    }

    pub fn event_store(&self) -> &dyn EventStore {
        self.event_store.as_ref()
    }

    pub fn replacement_store(&self) -> &ReplacementStore {
        &self.replacement_store
    }

    pub fn sequence_cap(&self) -> usize {
        self.sequence_cap
    }

    /// Replays the full event log into the replacement and lead stores.
    /// Called once at startup; the live write paths below keep both
    /// projections in sync incrementally so this never needs to run again
    /// mid-process.
    fn rebuild_projections(&self) -> EngineResult<()> {
        let events = self
            .event_store
            .all()
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        for envelope in &events {
            self.apply_to_projections(envelope)?;
        }
        Ok(())
    }

    fn apply_to_projections(&self, envelope: &EventEnvelope) -> EngineResult<()> {
        match &envelope.event {
            Event::LeadPlaced { lead } => {
                // The event carries the full lead body, so replay rebuilds
                // `lead_store` from the log alone — no separate lead table
                // needed, and no live in-process state survives a restart
                // that this replay doesn't also reconstruct.
                self.lead_store.insert(lead.clone());
            }
            Event::MarkForReplacement { lead_id, .. } => {
                if let Some(lead) = self.lead_store.get(lead_id) {
                    self.replacement_store.mark(&lead, lead_id.clone(), envelope.ts);
                }
            }
            Event::FulfillReplacement {
                original_lead_id,
                new_lead_id,
                ..
            } => {
                if let Some(new_lead) = self.lead_store.get(new_lead_id) {
                    let _ = self
                        .replacement_store
                        .fulfill(original_lead_id, &new_lead, envelope.ts);
                }
            }
            Event::UnmarkForReplacement { lead_id, .. } => {
                let _ = self.replacement_store.unmark(lead_id);
            }
            Event::ReopenMark {
                former_new_lead_id, ..
            } => {
                // Re-drives the exact cascade `delete_lead` ran live against
                // `former_new_lead_id` (spec §4.4 rule 2): by this point in
                // the replay, the fulfilled record is already `Closed` from
                // replaying `FulfillReplacement` above, so this reproduces
                // the same reopen.
                let _ = self.replacement_store.on_lead_deleted(former_new_lead_id);
                self.lead_store.remove(former_new_lead_id);
            }
            Event::CancelMark { lead_id, .. } => {
                // Re-drives the cascade `delete_lead` ran live against the
                // still-open marked lead (spec §4.4 rule 3).
                let _ = self.replacement_store.on_lead_deleted(lead_id);
                self.lead_store.remove(lead_id);
            }
            Event::Skip { .. } | Event::Ooo { .. } => {}
        }
        Ok(())
    }

    /// Resolves the next rep for a prospective lead (spec §4.8).
    pub fn resolve_next_rep(
        &self,
        lead: &ProspectiveLead,
        replaces_lead_id: Option<&str>,
    ) -> EngineResult<RepId> {
        if let Some(original_id) = replaces_lead_id {
            let mark = self.replacement_store.get(original_id).ok_or_else(|| {
                EngineError::Validation(format!("no mark found for lead {original_id}"))
            })?;
            if !mark.is_open() {
                return Err(EngineError::MarkAlreadyClosed {
                    lead_id: original_id.to_string(),
                });
            }
            if lead.lane() != mark.lane() {
                return Err(EngineError::LaneMismatch {
                    expected: mark.lane(),
                    actual: lead.lane(),
                });
            }
            return Ok(mark.rep_id().to_string());
        }

        let lane = lead.lane();
        let eligible = self.eligible_reps(lane, lead)?;
        let order = self.overlaid_rep_order(lane)?;
        order
            .into_iter()
            .find(|rep_id| eligible.iter().any(|r| &r.id == rep_id))
            .ok_or(EngineError::NoEligibleRep { lane })
    }

    /// Places a lead, appending `LeadPlaced` and, if `replaces_lead_id` is
    /// set, `FulfillReplacement` right behind it. The replacement's
    /// rep/lane match is validated up front so a rejected fulfillment
    /// (spec §8 scenario 6) leaves no trace: nothing is inserted or
    /// appended until every precondition holds.
    pub fn place_lead(&self, lead: Lead, replaces_lead_id: Option<&str>) -> EngineResult<()> {
        if let Some(original_id) = replaces_lead_id {
            let mark = self.replacement_store.get(original_id).ok_or_else(|| {
                EngineError::Validation(format!("no mark found for lead {original_id}"))
            })?;
            if !mark.is_open() {
                return Err(EngineError::MarkAlreadyClosed {
                    lead_id: original_id.to_string(),
                });
            }
            if lead.assigned_rep != mark.rep_id() {
                return Err(EngineError::AssignmentMismatch {
                    expected: mark.rep_id().to_string(),
                    got: lead.assigned_rep.clone(),
                });
            }
            if lead.lane() != mark.lane() {
                return Err(EngineError::LaneMismatch {
                    expected: mark.lane(),
                    actual: lead.lane(),
                });
            }
        }

        let now = Utc::now();
        self.lead_store.insert(lead.clone());
        self.event_store
            .append(Event::LeadPlaced { lead: lead.clone() }, now)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        if let Some(original_id) = replaces_lead_id {
            self.replacement_store.fulfill(original_id, &lead, now)?;
            self.event_store
                .append(
                    Event::FulfillReplacement {
                        original_lead_id: original_id.to_string(),
                        new_lead_id: lead.id.clone(),
                        rep_id: lead.assigned_rep.clone(),
                        lane: lead.lane(),
                    },
                    now,
                )
                .map_err(|e| EngineError::Validation(e.to_string()))?;
        }

        let _ = self.change_tx.send(ChangeNotification::Events);
        Ok(())
    }

    pub fn mark_for_replacement(&self, lead_id: &str) -> EngineResult<ReplacementRecord> {
        let lead = self
            .lead_store
            .get(lead_id)
            .ok_or_else(|| EngineError::Validation(format!("unknown lead {lead_id}")))?;
        let now = Utc::now();
        let record = self.replacement_store.mark(&lead, lead_id.to_string(), now);
        self.event_store
            .append(
                Event::MarkForReplacement {
                    lead_id: lead.id.clone(),
                    rep_id: lead.assigned_rep.clone(),
                    lane: lead.lane(),
                },
                now,
            )
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        let _ = self.change_tx.send(ChangeNotification::Events);
        Ok(record)
    }

    pub fn unmark(&self, lead_id: &str) -> EngineResult<()> {
        let lead = self
            .lead_store
            .get(lead_id)
            .ok_or_else(|| EngineError::Validation(format!("unknown lead {lead_id}")))?;
        self.replacement_store.unmark(lead_id)?;
        self.event_store
            .append(
                Event::UnmarkForReplacement {
                    lead_id: lead.id.clone(),
                    rep_id: lead.assigned_rep.clone(),
                    lane: lead.lane(),
                },
                Utc::now(),
            )
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        let _ = self.change_tx.send(ChangeNotification::Events);
        Ok(())
    }

    /// Deletes a lead, running the replacement-store cascade (spec §4.4) and
    /// appending whatever compensating event it produces.
    pub fn delete_lead(&self, lead_id: &str) -> EngineResult<DeleteOutcome> {
        let outcome = self.replacement_store.on_lead_deleted(lead_id)?;
        let now = Utc::now();
        match &outcome {
            DeleteOutcome::NotMarked => {}
            DeleteOutcome::ReopenedMark {
                original_lead_id,
                rep_id,
                lane,
            } => {
                self.event_store
                    .append(
                        Event::ReopenMark {
                            original_lead_id: original_lead_id.clone(),
                            former_new_lead_id: lead_id.to_string(),
                            rep_id: rep_id.clone(),
                            lane: *lane,
                        },
                        now,
                    )
                    .map_err(|e| EngineError::Validation(e.to_string()))?;
            }
            DeleteOutcome::MarkCancelled { rep_id, lane } => {
                self.event_store
                    .append(
                        Event::CancelMark {
                            lead_id: lead_id.to_string(),
                            rep_id: rep_id.clone(),
                            lane: *lane,
                        },
                        now,
                    )
                    .map_err(|e| EngineError::Validation(e.to_string()))?;
            }
        }
        self.lead_store.remove(lead_id);
        let _ = self.change_tx.send(ChangeNotification::Events);
        Ok(outcome)
    }

    pub fn skip(&self, rep_id: &str, target: SkipTarget, day: NaiveDate) -> EngineResult<()> {
        self.event_store
            .append(
                Event::Skip {
                    rep_id: rep_id.to_string(),
                    target,
                    day,
                },
                Utc::now(),
            )
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        let _ = self.change_tx.send(ChangeNotification::Events);
        Ok(())
    }

    pub fn set_ooo(&self, rep_id: &str, day: NaiveDate) -> EngineResult<()> {
        self.event_store
            .append(
                Event::Ooo {
                    rep_id: rep_id.to_string(),
                    day,
                },
                Utc::now(),
            )
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        let _ = self.change_tx.send(ChangeNotification::Events);
        Ok(())
    }

    /// Active, eligible reps for `lane` given `lead`'s attributes and the
    /// OOO events recorded for `lead.day` (spec §4.7).
    pub fn eligible_reps(&self, lane: Lane, lead: &ProspectiveLead) -> EngineResult<Vec<Rep>> {
        let active = self.roster.list_active(lane);
        let ooo_today = self.ooo_reps_on(lead.day)?;
        Ok(eligibility::filter(&active, lead, &ooo_today))
    }

    fn ooo_reps_on(&self, day: NaiveDate) -> EngineResult<HashSet<String>> {
        let events = self
            .event_store
            .range(&EventFilter {
                from_day: Some(day),
                to_day: Some(day),
                ..Default::default()
            })
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        Ok(events
            .into_iter()
            .filter_map(|e| match e.event {
                Event::Ooo { rep_id, day: d } if d == day => Some(rep_id),
                _ => None,
            })
            .collect())
    }

    /// Hit counts for `lane` over the full history (spec §4.3).
    pub fn hit_counts(&self, lane: Lane) -> EngineResult<HitCounter> {
        let events = self
            .event_store
            .all()
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        hit_accumulator::accumulate(&events, lane, None)
    }

    /// The raw (un-overlaid) sequence for `lane` (spec §4.5).
    pub fn sequence(&self, lane: Lane) -> EngineResult<Vec<RepId>> {
        let base_order: Vec<RepId> = self.roster.list_active(lane).into_iter().map(|r| r.id).collect();
        let hits = self.hit_counts(lane)?;
        Ok(sequence::generate(&base_order, &hits, lane, self.sequence_cap))
    }

    /// The sequence with the replacement queue lifted on top (spec §4.6),
    /// flattened to a plain rep-id walk order used by `resolve_next_rep`.
    fn overlaid_rep_order(&self, lane: Lane) -> EngineResult<Vec<RepId>> {
        let base_order: Vec<RepId> = self.roster.list_active(lane).into_iter().map(|r| r.id).collect();
        let sequence = self.sequence(lane)?;
        let queue = self.replacement_store.queue(lane);
        let view = overlay::overlay_expanded(&sequence, &queue, &base_order);
        let mut order: Vec<RepId> = view.section_a.iter().map(|r| r.rep_id.clone()).collect();
        order.extend(view.section_b.iter().map(|r| r.rep_id.clone()));
        Ok(order)
    }

    pub fn replacement_queue(&self, lane: Lane) -> Vec<ReplacementRecord> {
        self.replacement_store.queue(lane)
    }

    pub fn lead_id_lane(&self, lead_id: &str) -> Option<Lane> {
        self.lead_store.get(lead_id).map(|l| l.lane())
    }
}

/// Converts a `LeadId` into a `ProspectiveLead` by looking it up in the
/// materialized lead store; used when a caller resolves a next rep by
/// referencing an already-placed lead rather than supplying raw attributes.
pub fn prospective_from_lead(lead: &Lead, day: NaiveDate) -> ProspectiveLead {
    ProspectiveLead {
        property_types: lead.property_types.clone(),
        unit_count: lead.unit_count,
        day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::InMemoryEventStore;
    use crate::models::{PropertyType, RepParameters, RepStatus};
    use std::collections::BTreeSet;

    fn rep(id: &str, order: u32, can_1kplus: bool) -> Rep {
        Rep {
            id: id.into(),
            display_name: id.into(),
            parameters: RepParameters {
                property_types: BTreeSet::from([PropertyType::Mfh]),
                max_units: None,
                can_handle_1kplus: can_1kplus,
            },
            sub1k_order: order,
            over1k_order: if can_1kplus { Some(order) } else { None },
            status: RepStatus::Active,
        }
    }

    fn engine(reps: Vec<Rep>) -> RotationEngine {
        RotationEngine::new(Arc::new(InMemoryEventStore::new()), reps, 100).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn lead(unit_count: i64) -> ProspectiveLead {
        ProspectiveLead {
            property_types: BTreeSet::from([PropertyType::Mfh]),
            unit_count,
            day: day(),
        }
    }

    #[test]
    fn resolve_next_rep_picks_base_order_front_with_no_history() {
        let engine = engine(vec![rep("A", 1, false), rep("B", 2, false)]);
        let rep_id = engine.resolve_next_rep(&lead(500), None).unwrap();
        assert_eq!(rep_id, "A");
    }

    #[test]
    fn resolve_next_rep_advances_after_a_placement() {
        let engine = engine(vec![rep("A", 1, false), rep("B", 2, false)]);
        let first = engine.resolve_next_rep(&lead(500), None).unwrap();
        engine
            .place_lead(
                Lead {
                    id: "L1".into(),
                    account_number: "ACC".into(),
                    url: "http://x".into(),
                    property_types: BTreeSet::from([PropertyType::Mfh]),
                    unit_count: 500,
                    assigned_rep: first.clone(),
                    action_date: day(),
                    comments: vec![],
                },
                None,
            )
            .unwrap();
        let second = engine.resolve_next_rep(&lead(500), None).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn resolve_next_rep_locks_to_the_marked_reps_replacement() {
        let engine = engine(vec![rep("A", 1, false), rep("B", 2, false)]);
        let original = Lead {
            id: "L1".into(),
            account_number: "ACC".into(),
            url: "http://x".into(),
            property_types: BTreeSet::from([PropertyType::Mfh]),
            unit_count: 500,
            assigned_rep: "B".into(),
            action_date: day(),
            comments: vec![],
        };
        engine.place_lead(original, None).unwrap();
        engine.mark_for_replacement("L1").unwrap();

        let rep_id = engine
            .resolve_next_rep(&lead(500), Some("L1"))
            .unwrap();
        assert_eq!(rep_id, "B");
    }

    #[test]
    fn resolve_next_rep_rejects_lane_cross_on_locked_replacement() {
        let engine = engine(vec![rep("A", 1, true)]);
        let original = Lead {
            id: "L1".into(),
            account_number: "ACC".into(),
            url: "http://x".into(),
            property_types: BTreeSet::from([PropertyType::Mfh]),
            unit_count: 500,
            assigned_rep: "A".into(),
            action_date: day(),
            comments: vec![],
        };
        engine.place_lead(original, None).unwrap();
        engine.mark_for_replacement("L1").unwrap();

        let err = engine
            .resolve_next_rep(&lead(1500), Some("L1"))
            .unwrap_err();
        assert!(matches!(err, EngineError::LaneMismatch { .. }));
    }

    #[test]
    fn resolve_next_rep_returns_no_eligible_rep_when_roster_empty() {
        let engine = engine(vec![]);
        let err = engine.resolve_next_rep(&lead(500), None).unwrap_err();
        assert!(matches!(err, EngineError::NoEligibleRep { .. }));
    }

    #[test]
    fn delete_lead_cancel_outcome_removes_it_from_the_queue() {
        let engine = engine(vec![rep("A", 1, false)]);
        let original = Lead {
            id: "L1".into(),
            account_number: "ACC".into(),
            url: "http://x".into(),
            property_types: BTreeSet::from([PropertyType::Mfh]),
            unit_count: 500,
            assigned_rep: "A".into(),
            action_date: day(),
            comments: vec![],
        };
        engine.place_lead(original, None).unwrap();
        engine.mark_for_replacement("L1").unwrap();
        assert_eq!(engine.replacement_queue(Lane::Sub1k).len(), 1);

        let outcome = engine.delete_lead("L1").unwrap();
        assert!(matches!(outcome, DeleteOutcome::MarkCancelled { .. }));
        assert!(engine.replacement_queue(Lane::Sub1k).is_empty());
    }
}
