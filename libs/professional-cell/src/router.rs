// libs/professional-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn professional_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        // Dashboard
        .route("/{professional_id}/overview", get(handlers::get_professional_overview))
        .route("/{professional_id}/metrics", get(handlers::get_professional_metrics))
        .route("/{professional_id}/reconciliation", get(handlers::get_reconciliation))

        // Plan lifecycle
        .route(
            "/{professional_id}/plan",
            get(handlers::get_plan_status)
                .post(handlers::create_plan) // Admin only
                .put(handlers::select_plan),
        )
        .route("/{professional_id}/plan/monthly-payment", post(handlers::confirm_monthly_payment)) // Admin only
        .route("/{professional_id}/plan/activation", patch(handlers::set_plan_activation)) // Admin only

        .route("/appointments/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
