//! The Event Log port and an in-memory implementation used by tests and as
//! the default store when no persistence adapter is configured.

use chrono::NaiveDate;

use crate::event::{Event, EventEnvelope};
use crate::models::{Lane, RepId};

/// Filter applied when reading a range of events. `None` fields are
/// unconstrained.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub lane: Option<Lane>,
    pub rep_id: Option<RepId>,
    pub from_day: Option<NaiveDate>,
    pub to_day: Option<NaiveDate>,
}

impl EventFilter {
    pub fn for_lane(lane: Lane) -> Self {
        Self {
            lane: Some(lane),
            ..Default::default()
        }
    }

    fn day_of(event: &Event) -> Option<NaiveDate> {
        match event {
            Event::LeadPlaced { lead } => Some(lead.action_date),
            Event::Skip { day, .. } | Event::Ooo { day, .. } => Some(*day),
            _ => None,
        }
    }

    fn lane_of(event: &Event) -> Option<Lane> {
        match event {
            Event::LeadPlaced { lead } => Some(lead.lane()),
            Event::MarkForReplacement { lane, .. }
            | Event::FulfillReplacement { lane, .. }
            | Event::UnmarkForReplacement { lane, .. }
            | Event::ReopenMark { lane, .. }
            | Event::CancelMark { lane, .. } => Some(*lane),
            Event::Skip { target, .. } => match target {
                crate::event::SkipTarget::Sub1k => Some(Lane::Sub1k),
                crate::event::SkipTarget::OneKPlus => Some(Lane::OneKPlus),
                crate::event::SkipTarget::Both => None,
            },
            Event::Ooo { .. } => None,
        }
    }

    fn rep_of(event: &Event) -> Option<&RepId> {
        match event {
            Event::LeadPlaced { lead } => Some(&lead.assigned_rep),
            Event::Skip { rep_id, .. }
            | Event::Ooo { rep_id, .. }
            | Event::MarkForReplacement { rep_id, .. }
            | Event::FulfillReplacement { rep_id, .. }
            | Event::UnmarkForReplacement { rep_id, .. }
            | Event::ReopenMark { rep_id, .. }
            | Event::CancelMark { rep_id, .. } => Some(rep_id),
        }
    }

    /// Matches a `Skip{target: both}` against a single requested lane; every
    /// other event kind matches only on an exact lane equality.
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(lane) = self.lane {
            let event_lane = Self::lane_of(&envelope.event);
            let matches_lane = match (&envelope.event, event_lane) {
                (Event::Skip { target, .. }, _) => target.targets(lane),
                (_, Some(l)) => l == lane,
                (_, None) => true,
            };
            if !matches_lane {
                return false;
            }
        }
        if let Some(rep_id) = &self.rep_id {
            if Self::rep_of(&envelope.event) != Some(rep_id) {
                return false;
            }
        }
        if let Some(day) = Self::day_of(&envelope.event) {
            if let Some(from) = self.from_day {
                if day < from {
                    return false;
                }
            }
            if let Some(to) = self.to_day {
                if day > to {
                    return false;
                }
            }
        }
        true
    }
}

/// Append-only, totally-ordered event log.
pub trait EventStore: Send + Sync {
    fn append(&self, event: Event, ts: chrono::DateTime<chrono::Utc>) -> anyhow::Result<u64>;
    fn range(&self, filter: &EventFilter) -> anyhow::Result<Vec<EventEnvelope>>;
    /// All events, in `seq` order, with no filtering. Used internally by
    /// derivations that need the full prefix before applying a filter.
    fn all(&self) -> anyhow::Result<Vec<EventEnvelope>>;
}

/// Plain in-memory event log, used for unit tests and as a default store.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: parking_lot::Mutex<Vec<EventEnvelope>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, event: Event, ts: chrono::DateTime<chrono::Utc>) -> anyhow::Result<u64> {
        let mut events = self.events.lock();
        let seq = events.len() as u64 + 1;
        events.push(EventEnvelope { seq, ts, event });
        Ok(seq)
    }

    fn range(&self, filter: &EventFilter) -> anyhow::Result<Vec<EventEnvelope>> {
        let events = self.events.lock();
        Ok(events.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    fn all(&self) -> anyhow::Result<Vec<EventEnvelope>> {
        Ok(self.events.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lead;
    use chrono::Utc;

    fn lead_placed(lead_id: &str, rep_id: &str, lane: Lane) -> Event {
        let unit_count = match lane {
            Lane::Sub1k => 500,
            Lane::OneKPlus => 1500,
        };
        Event::LeadPlaced {
            lead: Lead {
                id: lead_id.to_string(),
                account_number: "ACC".to_string(),
                url: "http://example".to_string(),
                property_types: Default::default(),
                unit_count,
                assigned_rep: rep_id.to_string(),
                action_date: Utc::now().date_naive(),
                comments: Vec::new(),
            },
        }
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let s1 = store
            .append(lead_placed("L1", "A", Lane::Sub1k), Utc::now())
            .unwrap();
        let s2 = store
            .append(lead_placed("L2", "A", Lane::Sub1k), Utc::now())
            .unwrap();
        assert!(s2 > s1);
    }

    #[test]
    fn skip_both_matches_either_lane_filter() {
        let store = InMemoryEventStore::new();
        store
            .append(
                Event::Skip {
                    rep_id: "A".into(),
                    target: crate::event::SkipTarget::Both,
                    day: Utc::now().date_naive(),
                },
                Utc::now(),
            )
            .unwrap();

        let sub1k = store.range(&EventFilter::for_lane(Lane::Sub1k)).unwrap();
        let over1k = store.range(&EventFilter::for_lane(Lane::OneKPlus)).unwrap();
        assert_eq!(sub1k.len(), 1);
        assert_eq!(over1k.len(), 1);
    }

    #[test]
    fn lane_filter_excludes_other_lane_lead_placed() {
        let store = InMemoryEventStore::new();
        store
            .append(lead_placed("L1", "A", Lane::Sub1k), Utc::now())
            .unwrap();
        store
            .append(lead_placed("L2", "B", Lane::OneKPlus), Utc::now())
            .unwrap();

        let sub1k = store.range(&EventFilter::for_lane(Lane::Sub1k)).unwrap();
        assert_eq!(sub1k.len(), 1);
    }
}
