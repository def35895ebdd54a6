//! Sequence Generator: the deterministic rotation sequence.
//!
//! Implements Formulation B ("next-position formula") with a binary heap.
//! For rep `r` at 1-indexed base-order position `p(r)` with hit count
//! `h(r)`, its next appearance in the emitted sequence is at position
//! `p(r) + h(r) * N`. Because every rep has a distinct `p(r)` in `1..=N`,
//! these next-appearance values are never equal across two different reps,
//! so ties between reps with the same hit count break on ascending base
//! order without needing a separate comparator.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::hit_accumulator::HitCounter;
use crate::models::{Lane, RepId};

pub const DEFAULT_SEQUENCE_CAP: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapEntry {
    next_position: i64,
    idx: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.next_position.cmp(&other.next_position)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Emits the deterministic sequence for `base_order` (already sorted by
/// position) given `hits`, stopping at the first lap into pure base order or
/// at `cap`, whichever comes first.
pub fn generate(base_order: &[RepId], hits: &HitCounter, lane: Lane, cap: usize) -> Vec<RepId> {
    let n = base_order.len();
    if n == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::with_capacity(n);
    for (idx, rep_id) in base_order.iter().enumerate() {
        let position = idx as i64 + 1;
        let h = hits.net(rep_id, lane);
        heap.push(Reverse(HeapEntry {
            next_position: position + h * n as i64,
            idx,
        }));
    }

    let mut out = Vec::new();
    while out.len() < cap {
        let Reverse(mut entry) = heap.pop().expect("heap never empties while n > 0");
        out.push(base_order[entry.idx].clone());
        entry.next_position += n as i64;
        heap.push(Reverse(entry));

        if out.len() >= n && out[out.len() - n..] == base_order[..] {
            break;
        }
    }
    out
}

/// First appearance of each rep in `sequence`, sorted by that position.
pub fn collapse(sequence: &[RepId]) -> Vec<(RepId, usize)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (pos, rep_id) in sequence.iter().enumerate() {
        if seen.insert(rep_id.clone()) {
            out.push((rep_id.clone(), pos + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(ids: &[&str]) -> Vec<RepId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn hits_from_events(events: &[crate::event::EventEnvelope], lane: Lane) -> HitCounter {
        crate::hit_accumulator::accumulate(events, lane, None).unwrap()
    }

    #[test]
    fn all_zero_hits_emits_base_order_then_laps_immediately() {
        let b = base(&["A", "B", "C", "D", "E"]);
        let hits = HitCounter::default();
        let seq = generate(&b, &hits, Lane::Sub1k, 100);
        assert_eq!(seq, b);
    }

    #[test]
    fn scenario_2_one_hit_on_a_reorders_sequence() {
        use chrono::{NaiveDate, TimeZone, Utc};
        let b = base(&["A", "B", "C", "D", "E"]);
        let events = vec![crate::event::EventEnvelope {
            seq: 1,
            ts: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            event: crate::event::Event::LeadPlaced {
                lead: crate::models::Lead {
                    id: "L1".into(),
                    account_number: "ACC".into(),
                    url: "http://example".into(),
                    property_types: Default::default(),
                    unit_count: 500,
                    assigned_rep: "A".into(),
                    action_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                    comments: Vec::new(),
                },
            },
        }];
        let hits = hits_from_events(&events, Lane::Sub1k);
        let seq = generate(&b, &hits, Lane::Sub1k, 100);
        let collapsed = collapse(&seq);
        let order: Vec<&str> = collapsed.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "D", "E", "A"]);
    }

    #[test]
    fn stops_at_cap_when_never_laps() {
        let b = base(&["A", "B"]);
        let hits = HitCounter::default();
        let seq = generate(&b, &hits, Lane::Sub1k, 3);
        assert_eq!(seq.len(), 3);
    }
}
