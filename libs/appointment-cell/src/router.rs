// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        // Booking
        .route("/", post(handlers::book_group))
        .route("/walk-in", post(handlers::book_walk_in))
        .route("/search", get(handlers::search_appointments))

        // Groups
        .route("/groups/{group_id}", get(handlers::get_group))
        .route("/groups/{group_id}/cancel", post(handlers::cancel_group))

        // Single appointments
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/arrive", post(handlers::mark_arrived))
        .route("/{appointment_id}/start", post(handlers::start_service))
        .route("/{appointment_id}/ready", post(handlers::mark_ready_to_pay))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/no-show", post(handlers::mark_no_show))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
