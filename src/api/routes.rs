//! HTTP command surface: the request/response shapes and handlers for every
//! engine command, plus the read-only query endpoints backed by `query.rs`.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, Query as AxumQuery, State as AxumState};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, DerivedViewCache};
use crate::eligibility::ProspectiveLead;
use crate::error::EngineError;
use crate::event::SkipTarget;
use crate::models::{Lane, PropertyType};
use crate::overlay::{CollapsedRow, ExpandedView};
use crate::query::{self, PanelStats, TimeWindow};
use crate::replacement_store::{DeleteOutcome, ReplacementRecord};
use crate::resolver::RotationEngine;

/// Shared state for the HTTP command surface. The three derived-view caches
/// back the read-heavy query endpoints: a cache hit returns without
/// recomputing the sequence/overlay/hit-accumulation pipeline, keyed on
/// `(roster_version, event_seq, lane, window)` so a stale entry is simply
/// unreachable once either version moves, never actively invalidated.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RotationEngine>,
    pub stats_cache: Arc<DerivedViewCache<PanelStats>>,
    pub collapsed_cache: Arc<DerivedViewCache<Vec<CollapsedRow>>>,
    pub expanded_cache: Arc<DerivedViewCache<ExpandedView>>,
}

impl AppState {
    pub fn new(engine: Arc<RotationEngine>) -> Self {
        Self {
            engine,
            stats_cache: Arc::new(DerivedViewCache::new()),
            collapsed_cache: Arc::new(DerivedViewCache::new()),
            expanded_cache: Arc::new(DerivedViewCache::new()),
        }
    }
}

/// Maps the engine's closed error taxonomy onto HTTP status codes.
/// `InvariantViolation` is the one case that should never happen on valid
/// input; it still returns a response rather than panicking, since the
/// server must stay up for every other caller.
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation(_) | EngineError::InvalidOrder { .. } => StatusCode::BAD_REQUEST,
            EngineError::LaneMismatch { .. }
            | EngineError::AssignmentMismatch { .. }
            | EngineError::MarkAlreadyClosed { .. }
            | EngineError::MarkAlreadyOpen { .. }
            | EngineError::DeleteBlocked { .. } => StatusCode::CONFLICT,
            EngineError::NoEligibleRep { .. } => StatusCode::NOT_FOUND,
            EngineError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self, "invariant violation surfaced to a caller");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn internal(err: anyhow::Error) -> Response {
    tracing::error!(error = %err, "unhandled storage error");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: err.to_string() })).into_response()
}

pub async fn health_check() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct ResolveNextRepRequest {
    pub property_types: BTreeSet<PropertyType>,
    pub unit_count: i64,
    pub day: NaiveDate,
    pub replaces_lead_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveNextRepResponse {
    pub rep_id: String,
}

pub async fn resolve_next_rep_handler(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<ResolveNextRepRequest>,
) -> Result<Json<ResolveNextRepResponse>, EngineError> {
    let lead = ProspectiveLead {
        property_types: request.property_types,
        unit_count: request.unit_count,
        day: request.day,
    };
    let rep_id = state
        .engine
        .resolve_next_rep(&lead, request.replaces_lead_id.as_deref())?;
    Ok(Json(ResolveNextRepResponse { rep_id }))
}

#[derive(Debug, Deserialize)]
pub struct PlaceLeadRequest {
    pub id: String,
    pub account_number: String,
    pub url: String,
    pub property_types: BTreeSet<PropertyType>,
    pub unit_count: i64,
    pub assigned_rep: String,
    pub action_date: NaiveDate,
    #[serde(default)]
    pub comments: Vec<String>,
    pub replaces_lead_id: Option<String>,
}

pub async fn place_lead_handler(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<PlaceLeadRequest>,
) -> Result<StatusCode, EngineError> {
    let lead = crate::models::Lead {
        id: request.id,
        account_number: request.account_number,
        url: request.url,
        property_types: request.property_types,
        unit_count: request.unit_count,
        assigned_rep: request.assigned_rep,
        action_date: request.action_date,
        comments: request.comments,
    };
    state.engine.place_lead(lead, request.replaces_lead_id.as_deref())?;
    Ok(StatusCode::CREATED)
}

pub async fn mark_for_replacement_handler(
    AxumState(state): AxumState<AppState>,
    Path(lead_id): Path<String>,
) -> Result<Json<ReplacementRecord>, EngineError> {
    let record = state.engine.mark_for_replacement(&lead_id)?;
    Ok(Json(record))
}

pub async fn unmark_handler(
    AxumState(state): AxumState<AppState>,
    Path(lead_id): Path<String>,
) -> Result<StatusCode, EngineError> {
    state.engine.unmark(&lead_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_lead_handler(
    AxumState(state): AxumState<AppState>,
    Path(lead_id): Path<String>,
) -> Result<Json<DeleteOutcome>, EngineError> {
    let outcome = state.engine.delete_lead(&lead_id)?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    pub target: SkipTarget,
    pub day: NaiveDate,
}

pub async fn skip_handler(
    AxumState(state): AxumState<AppState>,
    Path(rep_id): Path<String>,
    Json(request): Json<SkipRequest>,
) -> Result<StatusCode, EngineError> {
    state.engine.skip(&rep_id, request.target, request.day)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct OooRequest {
    pub day: NaiveDate,
}

pub async fn set_ooo_handler(
    AxumState(state): AxumState<AppState>,
    Path(rep_id): Path<String>,
    Json(request): Json<OooRequest>,
) -> Result<StatusCode, EngineError> {
    state.engine.set_ooo(&rep_id, request.day)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub window: Option<String>,
    pub today: NaiveDate,
}

fn parse_window(window: Option<&str>) -> TimeWindow {
    match window {
        Some("day") => TimeWindow::Day,
        Some("week") => TimeWindow::Week,
        Some("month") => TimeWindow::Month,
        Some("ytd") => TimeWindow::Ytd,
        _ => TimeWindow::AllTime,
    }
}

pub async fn rotation_stats_handler(
    AxumState(state): AxumState<AppState>,
    Path(lane): Path<Lane>,
    AxumQuery(params): AxumQuery<StatsQuery>,
) -> Response {
    let window = parse_window(params.window.as_deref());
    // `today` anchors Day/Week/Month/Ytd bounds but isn't part of roster/event
    // state, so it must be folded into the cache label itself — otherwise a
    // second request with a different `today` against an unchanged log would
    // incorrectly reuse the first request's cached stats.
    let window_label = format!("{}:{}", window_cache_label(window), params.today);
    let key = match CacheKey::current(&state.engine, lane, window_label) {
        Ok(key) => key,
        Err(err) => return internal(err),
    };

    match state
        .stats_cache
        .try_get_or_compute(key, || query::panel_stats(&state.engine, lane, window, params.today))
    {
        Ok(stats) => Json(PanelStatsResponse::from((*stats).clone())).into_response(),
        Err(err) => internal(err),
    }
}

fn window_cache_label(window: TimeWindow) -> &'static str {
    match window {
        TimeWindow::Day => "day",
        TimeWindow::Week => "week",
        TimeWindow::Month => "month",
        TimeWindow::Ytd => "ytd",
        TimeWindow::AllTime => "alltime",
    }
}

#[derive(Debug, Serialize)]
pub struct PanelStatsResponse {
    pub lane: Lane,
    pub window: &'static str,
    pub total_hits: i64,
    pub needing_replacement: usize,
    pub per_rep: Vec<RepStatResponse>,
}

#[derive(Debug, Serialize)]
pub struct RepStatResponse {
    pub rep_id: String,
    pub display_name: String,
    pub base_order: u32,
    pub hits: i64,
}

impl From<query::PanelStats> for PanelStatsResponse {
    fn from(stats: query::PanelStats) -> Self {
        Self {
            lane: stats.lane,
            window: stats.window,
            total_hits: stats.total_hits,
            needing_replacement: stats.needing_replacement,
            per_rep: stats
                .per_rep
                .into_iter()
                .map(|r| RepStatResponse {
                    rep_id: r.rep_id,
                    display_name: r.display_name,
                    base_order: r.base_order,
                    hits: r.hits,
                })
                .collect(),
        }
    }
}

pub async fn replacement_queue_handler(
    AxumState(state): AxumState<AppState>,
    Path(lane): Path<Lane>,
) -> Json<Vec<ReplacementRecord>> {
    Json(state.engine.replacement_queue(lane))
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

pub async fn rotation_view_handler(
    AxumState(state): AxumState<AppState>,
    Path(lane): Path<Lane>,
    AxumQuery(params): AxumQuery<ViewQuery>,
) -> Response {
    if params.mode.as_deref() == Some("expanded") {
        let key = match CacheKey::current(&state.engine, lane, "expanded") {
            Ok(key) => key,
            Err(err) => return internal(err),
        };
        match state
            .expanded_cache
            .try_get_or_compute(key, || query::expanded_view(&state.engine, lane))
        {
            Ok(view) => Json((*view).clone()).into_response(),
            Err(err) => internal(err),
        }
    } else {
        let key = match CacheKey::current(&state.engine, lane, "collapsed") {
            Ok(key) => key,
            Err(err) => return internal(err),
        };
        match state
            .collapsed_cache
            .try_get_or_compute(key, || query::collapsed_view(&state.engine, lane))
        {
            Ok(view) => Json((*view).clone()).into_response(),
            Err(err) => internal(err),
        }
    }
}
