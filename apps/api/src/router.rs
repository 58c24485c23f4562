use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use professional_cell::router::professional_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Practice API is running!" }))
        .nest("/professionals", professional_routes(state))
}
