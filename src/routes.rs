use std::sync::Arc;

use axum::routing::{get, patch};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/appointments",
            get(handlers::appointments::list_appointments)
                .post(handlers::appointments::create_appointment),
        )
        .route(
            "/api/appointments/upcoming",
            get(handlers::appointments::list_upcoming),
        )
        .route(
            "/api/appointments/available",
            get(handlers::appointments::check_availability),
        )
        .route(
            "/api/appointments/slots",
            get(handlers::appointments::day_slots),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::appointments::get_appointment)
                .put(handlers::appointments::update_appointment)
                .delete(handlers::appointments::cancel_appointment),
        )
        .route("/api/admin/appointments", get(handlers::admin::list_all))
        .route(
            "/api/admin/appointments/daily/:date",
            get(handlers::admin::list_daily),
        )
        .route(
            "/api/admin/appointments/:id/status",
            patch(handlers::admin::update_status),
        )
        .route("/api/admin/summary", get(handlers::admin::get_summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
