pub mod routes;

use axum::routing::{delete, get, post};
use axum::Router;

pub use routes::AppState;

/// Assembles the full HTTP command surface.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/rotation/resolve-next-rep", post(routes::resolve_next_rep_handler))
        .route("/api/leads", post(routes::place_lead_handler))
        .route("/api/leads/:lead_id", delete(routes::delete_lead_handler))
        .route(
            "/api/leads/:lead_id/mark-for-replacement",
            post(routes::mark_for_replacement_handler),
        )
        .route("/api/leads/:lead_id/unmark", post(routes::unmark_handler))
        .route("/api/reps/:rep_id/skip", post(routes::skip_handler))
        .route("/api/reps/:rep_id/ooo", post(routes::set_ooo_handler))
        .route("/api/rotation/:lane/stats", get(routes::rotation_stats_handler))
        .route("/api/rotation/:lane/queue", get(routes::replacement_queue_handler))
        .route("/api/rotation/:lane/view", get(routes::rotation_view_handler))
        .with_state(state)
}
