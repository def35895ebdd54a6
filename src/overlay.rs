//! Overlay Composer (spec §4.6): merges the replacement queue over the
//! sequence-generator output for display and selection. Purely
//! presentational — it never changes hit counts.

use serde::Serialize;

use crate::models::RepId;
use crate::replacement_store::ReplacementRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollapsedRow {
    pub rep_id: RepId,
    pub display_position: usize,
    pub has_open_mark: bool,
}

/// Collapsed view overlay (spec §4.6): reps in the queue are lifted to the
/// top in FIFO order (duplicates preserved), renumbered `1..=|Q|`; reps not
/// in `Q` retain their sequence position. A no-op when `Q` is empty.
pub fn overlay_collapsed(
    collapsed_sequence: &[(RepId, usize)],
    queue: &[ReplacementRecord],
) -> Vec<CollapsedRow> {
    if queue.is_empty() {
        return collapsed_sequence
            .iter()
            .map(|(rep_id, pos)| CollapsedRow {
                rep_id: rep_id.clone(),
                display_position: *pos,
                has_open_mark: false,
            })
            .collect();
    }

    let mut rows = Vec::with_capacity(collapsed_sequence.len() + queue.len());
    for (i, record) in queue.iter().enumerate() {
        rows.push(CollapsedRow {
            rep_id: record.rep_id().to_string(),
            display_position: i + 1,
            has_open_mark: true,
        });
    }
    for (rep_id, pos) in collapsed_sequence {
        rows.push(CollapsedRow {
            rep_id: rep_id.clone(),
            display_position: *pos,
            has_open_mark: false,
        });
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedView {
    /// Section A: the replacement queue, renumbered `1..=|Q|`, FIFO.
    pub section_a: Vec<CollapsedRow>,
    /// Section B: the full sequence prefix, renumbered continuing after
    /// section A.
    pub section_b: Vec<CollapsedRow>,
    /// Section C: the base order, for reference only.
    pub section_c: Vec<RepId>,
}

/// Expanded view overlay (spec §4.6).
pub fn overlay_expanded(
    sequence: &[RepId],
    queue: &[ReplacementRecord],
    base_order: &[RepId],
) -> ExpandedView {
    let section_a: Vec<CollapsedRow> = queue
        .iter()
        .enumerate()
        .map(|(i, record)| CollapsedRow {
            rep_id: record.rep_id().to_string(),
            display_position: i + 1,
            has_open_mark: true,
        })
        .collect();

    let offset = section_a.len();
    let open_reps: std::collections::HashSet<&str> =
        queue.iter().map(|r| r.rep_id()).collect();
    let section_b: Vec<CollapsedRow> = sequence
        .iter()
        .enumerate()
        .map(|(i, rep_id)| CollapsedRow {
            rep_id: rep_id.clone(),
            display_position: offset + i + 1,
            has_open_mark: open_reps.contains(rep_id.as_str()),
        })
        .collect();

    ExpandedView {
        section_a,
        section_b,
        section_c: base_order.to_vec(),
    }
}
