// libs/professional-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::warn;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::error::ProfessionalError;
use crate::models::{
    ActivationRequest, MonthlyPaymentRequest, ProfessionalMetrics, ProfessionalOverview,
    ReconciliationQuery, ReportingWindow, RescheduleRequest, SelectPlanRequest,
};
use crate::services::{AppointmentService, MetricsService, OverviewService, PlanService};

fn ensure_admin(user: &User, action: &str) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    warn!("User {} denied admin action: {}", user.id, action);
    Err(AppError::Forbidden(format!("Only administrators can {}", action)))
}

fn ensure_can_act_for(user: &User, professional_id: &str) -> Result<(), AppError> {
    if user.can_act_for(professional_id) {
        return Ok(());
    }
    warn!("User {} denied access to professional {}", user.id, professional_id);
    Err(ProfessionalError::Unauthorized.into())
}

// ==============================================================================
// DASHBOARD
// ==============================================================================

#[axum::debug_handler]
pub async fn get_professional_overview(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<ProfessionalOverview>, AppError> {
    ensure_can_act_for(&user, &professional_id)?;

    let overview_service = OverviewService::new(&state);
    let overview = overview_service
        .professional_overview(&professional_id, auth.token())
        .await?;

    Ok(Json(overview))
}

/// Unlike the overview, an explicit metrics request surfaces aggregation failures.
#[axum::debug_handler]
pub async fn get_professional_metrics(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<ProfessionalMetrics>, AppError> {
    ensure_can_act_for(&user, &professional_id)?;

    let metrics_service = MetricsService::new(&state);
    let metrics = metrics_service
        .calculate_professional_metrics(&professional_id, auth.token())
        .await?;

    Ok(Json(metrics))
}

#[axum::debug_handler]
pub async fn get_reconciliation(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    Query(query): Query<ReconciliationQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_act_for(&user, &professional_id)?;

    let metrics_service = MetricsService::new(&state);
    let week = metrics_service.current_week()?;
    let window = ReportingWindow {
        start: query.from.unwrap_or(week.start),
        end: query.to.unwrap_or(week.end),
    };

    if window.start > window.end {
        return Err(AppError::ValidationError("`from` must not be after `to`".to_string()));
    }

    let appointments = metrics_service
        .reconcile(&professional_id, &window, auth.token())
        .await?;

    let matched = appointments.iter().filter(|entry| entry.payment_id.is_some()).count();
    let total_revenue: Decimal = appointments.iter().filter_map(|entry| entry.amount).sum();

    Ok(Json(json!({
        "professional_id": professional_id,
        "window": window,
        "appointments": appointments,
        "matched_count": matched,
        "total_revenue": total_revenue
    })))
}

// ==============================================================================
// PLAN LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn get_plan_status(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_act_for(&user, &professional_id)?;

    let plan_service = PlanService::new(&state);
    let status = plan_service.plan_status(&professional_id, auth.token()).await?;

    Ok(Json(json!({
        "plan_status": status
    })))
}

#[axum::debug_handler]
pub async fn create_plan(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user, "approve professionals")?;

    let plan_service = PlanService::new(&state);
    let status = plan_service.create_plan(&professional_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "plan_status": status,
        "message": "Plan record created"
    })))
}

#[axum::debug_handler]
pub async fn select_plan(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SelectPlanRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_act_for(&user, &professional_id)?;

    let plan_service = PlanService::new(&state);
    let status = plan_service
        .select_plan(&professional_id, request.plan_type, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "plan_status": status,
        "message": format!("Plan set to {}", request.plan_type.as_str())
    })))
}

#[axum::debug_handler]
pub async fn confirm_monthly_payment(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MonthlyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user, "confirm monthly payments")?;

    let plan_service = PlanService::new(&state);
    let status = plan_service
        .confirm_monthly_payment(&professional_id, request.paid_at, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "plan_status": status,
        "message": "Monthly payment recorded"
    })))
}

#[axum::debug_handler]
pub async fn set_plan_activation(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ActivationRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user, "change plan activation")?;

    let plan_service = PlanService::new(&state);
    let status = plan_service
        .set_active(&professional_id, request.is_active, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "plan_status": status,
        "message": if request.is_active { "Professional reactivated" } else { "Professional deactivated" }
    })))
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);
    let appointment = appointment_service
        .reschedule(&appointment_id, request.scheduled_at, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}
