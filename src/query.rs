//! Query Surface: read-only panel statistics and rotation views over a
//! derived time window. Everything here is a pure function of the engine's
//! current state; none of it appends events.

use chrono::{Datelike, Duration, NaiveDate};

use crate::hit_accumulator;
use crate::models::{Lane, RepId};
use crate::overlay::{self, CollapsedRow, ExpandedView};
use crate::resolver::RotationEngine;

/// The reporting windows a panel can be scoped to. `bounds` returns `None`
/// for `AllTime`, meaning "no window filter" to the hit accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Ytd,
    AllTime,
}

impl TimeWindow {
    /// Bounds as of `today`, inclusive on both ends. `Week` is a trailing
    /// window (the 7 days ending today); `Month` is calendar-aligned (the
    /// first of the current month through today), per spec §4.9.
    pub fn bounds(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            TimeWindow::AllTime => None,
            TimeWindow::Day => Some((today, today)),
            TimeWindow::Week => Some((today - Duration::days(6), today)),
            TimeWindow::Month => Some((
                NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today),
                today,
            )),
            TimeWindow::Ytd => Some((
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                today,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepStat {
    pub rep_id: RepId,
    pub display_name: String,
    pub base_order: u32,
    pub hits: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelStats {
    pub lane: Lane,
    pub window: &'static str,
    pub total_hits: i64,
    pub most_assigned: Option<RepStat>,
    pub least_assigned: Option<RepStat>,
    pub needing_replacement: usize,
    pub per_rep: Vec<RepStat>,
}

fn window_label(window: TimeWindow) -> &'static str {
    match window {
        TimeWindow::Day => "day",
        TimeWindow::Week => "week",
        TimeWindow::Month => "month",
        TimeWindow::Ytd => "ytd",
        TimeWindow::AllTime => "alltime",
    }
}

/// Panel statistics for `lane` over `window` as of `today`.
pub fn panel_stats(
    engine: &RotationEngine,
    lane: Lane,
    window: TimeWindow,
    today: NaiveDate,
) -> anyhow::Result<PanelStats> {
    let events = engine.event_store().all()?;
    let hits = hit_accumulator::accumulate(&events, lane, window.bounds(today))
        .map_err(|e| anyhow::anyhow!(e))?;

    let active = engine.roster().list_active(lane);
    let per_rep: Vec<RepStat> = active
        .iter()
        .map(|rep| RepStat {
            rep_id: rep.id.clone(),
            display_name: rep.display_name.clone(),
            base_order: rep.order_for(lane).unwrap_or(0),
            hits: hits.net(&rep.id, lane),
        })
        .collect();

    let most_assigned = per_rep.iter().max_by_key(|r| r.hits).cloned();
    let least_assigned = per_rep.iter().min_by_key(|r| r.hits).cloned();
    let needing_replacement = engine.replacement_queue(lane).len();

    Ok(PanelStats {
        lane,
        window: window_label(window),
        total_hits: hits.total(lane),
        most_assigned,
        least_assigned,
        needing_replacement,
        per_rep,
    })
}

/// The collapsed rotation view for `lane`, overlaid with the open
/// replacement queue.
pub fn collapsed_view(engine: &RotationEngine, lane: Lane) -> anyhow::Result<Vec<CollapsedRow>> {
    let sequence = engine.sequence(lane).map_err(|e| anyhow::anyhow!(e))?;
    let collapsed = crate::sequence::collapse(&sequence);
    let queue = engine.replacement_queue(lane);
    Ok(overlay::overlay_collapsed(&collapsed, &queue))
}

/// The expanded rotation view for `lane`.
pub fn expanded_view(engine: &RotationEngine, lane: Lane) -> anyhow::Result<ExpandedView> {
    let base_order: Vec<RepId> = engine.roster().list_active(lane).into_iter().map(|r| r.id).collect();
    let sequence = engine.sequence(lane).map_err(|e| anyhow::anyhow!(e))?;
    let queue = engine.replacement_queue(lane);
    Ok(overlay::overlay_expanded(&sequence, &queue, &base_order))
}
