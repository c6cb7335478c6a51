use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use professional_cell::router::professional_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Salon booking API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/professionals", professional_routes(state.clone()))
}
