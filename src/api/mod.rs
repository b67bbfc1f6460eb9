use crate::state::SharedController;
use axum::Router;
use axum::routing::{get, post};

pub mod handlers;
pub mod responses;

pub fn router(controller: SharedController) -> Router {
    Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/state", get(handlers::get_state))
        .route("/api/mode", get(handlers::get_mode).post(handlers::post_mode))
        .route("/api/lights", get(handlers::get_lights))
        .route("/api/distance", get(handlers::get_distance))
        .route("/api/timers", get(handlers::get_timers))
        .route("/api/open", post(handlers::post_open))
        .route("/api/close", post(handlers::post_close))
        .route("/api/stop", post(handlers::post_stop))
        .with_state(controller)
}
