// libs/professional-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn professional_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        // Availability queries
        .route("/availability/summary", get(handlers::get_availability_summary))
        .route("/{professional_id}/slots", get(handlers::get_available_slots))
        .route("/{professional_id}/calendar", get(handlers::get_month_calendar))

        // Recurring availability CRUD
        .route("/{professional_id}/availability", post(handlers::create_availability))
        .route("/{professional_id}/availability", get(handlers::list_availability))
        .route("/{professional_id}/availability/{availability_id}", put(handlers::update_availability))
        .route("/{professional_id}/availability/{availability_id}", delete(handlers::delete_availability))

        // Recurring breaks CRUD
        .route("/{professional_id}/breaks", post(handlers::create_break))
        .route("/{professional_id}/breaks", get(handlers::list_breaks))
        .route("/{professional_id}/breaks/{break_id}", delete(handlers::delete_break))

        // Blocked times CRUD
        .route("/{professional_id}/blocked-times", post(handlers::create_blocked_time))
        .route("/{professional_id}/blocked-times", get(handlers::list_blocked_times))
        .route("/{professional_id}/blocked-times/{blocked_time_id}", delete(handlers::delete_blocked_time))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
