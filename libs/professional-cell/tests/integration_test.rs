use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use chrono_tz::America::Santiago;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use professional_cell::models::{PlanState, ProfessionalMetrics, ProfessionalOverview};
use professional_cell::router::professional_routes;
use professional_cell::services::metrics::week_window;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    professional_routes(Arc::new(config))
}

fn config_for(mock_server: &MockServer) -> AppConfig {
    TestConfig::with_supabase_url(mock_server.uri()).to_app_config()
}

fn authorized(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn mount_plan(mock_server: &MockServer, professional_id: &str, plan_type: Option<&str>, is_active: bool) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_plans"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::plan_row(professional_id, plan_type, is_active, None)
        ])))
        .mount(mock_server)
        .await;
}

// Counts are answered by HEAD requests; the status-specific mocks outrank the
// unfiltered monthly total.
async fn mount_counts(mock_server: &MockServer, total: u64, upcoming: u64, completed: u64) {
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", format!("*/{}", completed).as_str()))
        .with_priority(1)
        .mount(mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(confirmed,pending_confirmation)"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", format!("*/{}", upcoming).as_str()))
        .with_priority(1)
        .mount(mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", format!("*/{}", total).as_str()))
        .mount(mock_server)
        .await;
}

async fn mount_week_activity(mock_server: &MockServer, professional_id: &str) {
    let week = week_window(Utc::now(), Santiago).unwrap();
    let first = (week.start + Duration::hours(13)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let second = (week.start + Duration::hours(37)).to_rfc3339_opts(SecondsFormat::Secs, true);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row("APT-00000042", professional_id, &first, "completed"),
            MockSupabaseResponses::appointment_row("43", professional_id, &second, "confirmed"),
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("status", "eq.succeeded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::payment_row("pay-1", "42", professional_id, 30000.0, &first),
            MockSupabaseResponses::payment_row("pay-2", "00000043", professional_id, 25000.0, &second),
            MockSupabaseResponses::payment_row("pay-3", "99", professional_id, 50000.0, &first),
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_overview_combines_plan_and_weekly_revenue() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    mount_plan(&mock_server, &user.id, Some("commission"), true).await;
    mount_counts(&mock_server, 12, 4, 3).await;
    mount_week_activity(&mock_server, &user.id).await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized("GET", &format!("/{}/overview", user.id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let overview: ProfessionalOverview = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(overview.professional_id, user.id);
    assert_eq!(overview.plan_status.state, PlanState::CommissionActive);
    assert!(overview.plan_status.can_use_service);

    let metrics = overview.metrics.expect("metrics should be present");
    assert_eq!(metrics.total_appointments, 12);
    assert_eq!(metrics.upcoming_appointments, 4);
    assert_eq!(metrics.completed_appointments, 3);
    assert_eq!(metrics.total_revenue, dec!(55000));
}

#[tokio::test]
async fn test_overview_survives_metrics_outage() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    mount_plan(&mock_server, &user.id, Some("monthly"), true).await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("upstream unavailable", "XX000"),
        ))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized("GET", &format!("/{}/overview", user.id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["metrics"].is_null());
    assert_eq!(body["plan_status"]["state"], "monthly_expired");
    assert_eq!(body["plan_status"]["can_use_service"], false);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_outage() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized("GET", &format!("/{}/metrics", user.id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_figures() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    mount_counts(&mock_server, 5, 1, 0).await;
    mount_week_activity(&mock_server, &user.id).await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized("GET", &format!("/{}/metrics", user.id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let metrics: ProfessionalMetrics = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(metrics.total_appointments, 5);
    assert_eq!(metrics.upcoming_appointments, 1);
    assert_eq!(metrics.completed_appointments, 0);
    assert_eq!(metrics.total_revenue, dec!(55000));
}

#[tokio::test]
async fn test_other_professional_is_forbidden() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");
    let other = TestUser::professional("other@example.com");

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized("GET", &format!("/{}/overview", other.id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");
    let config = config_for(&mock_server);

    let missing = Request::builder()
        .method("GET")
        .uri(format!("/{}/plan", user.id))
        .body(Body::empty())
        .unwrap();
    let response = create_test_app(config.clone()).oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let expired = JwtTestUtils::create_expired_token(&user, &config.supabase_jwt_secret);
    let response = create_test_app(config)
        .oneshot(authorized("GET", &format!("/{}/plan", user.id), &expired, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_plan_record_is_no_plan() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized("GET", &format!("/{}/plan", user.id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["plan_status"]["state"], "no_plan");
    assert!(body["plan_status"]["plan"].is_null());
    assert!(body["plan_status"]["days_remaining"].is_null());
}

#[tokio::test]
async fn test_select_plan_updates_record() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    mount_plan(&mock_server, &user.id, None, true).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/professional_plans"))
        .and(query_param("professional_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::plan_row(&user.id, Some("commission"), true, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized(
            "PUT",
            &format!("/{}/plan", user.id),
            &token,
            Some(json!({ "plan_type": "commission" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["plan_status"]["state"], "commission_active");
    assert_eq!(body["plan_status"]["can_use_service"], true);
}

#[tokio::test]
async fn test_only_admin_toggles_activation() {
    let mock_server = MockServer::start().await;
    let professional = TestUser::professional("pro@example.com");
    let admin = TestUser::admin("admin@example.com");

    mount_plan(&mock_server, &professional.id, Some("commission"), true).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/professional_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::plan_row(&professional.id, Some("commission"), false, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let uri = format!("/{}/plan/activation", professional.id);

    let own_token = JwtTestUtils::create_test_token(&professional, &config.supabase_jwt_secret, Some(24));
    let response = create_test_app(config.clone())
        .oneshot(authorized("PATCH", &uri, &own_token, Some(json!({ "is_active": false }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin_token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let response = create_test_app(config)
        .oneshot(authorized("PATCH", &uri, &admin_token, Some(json!({ "is_active": false }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["plan_status"]["state"], "deactivated");
    assert_eq!(body["plan_status"]["can_use_service"], false);
}

#[tokio::test]
async fn test_professional_cannot_confirm_own_monthly_payment() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::plan_row(&user.id, Some("monthly"), true, Some("2020-01-01T00:00:00Z"))
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/professional_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let response = create_test_app(config)
        .oneshot(authorized(
            "POST",
            &format!("/{}/plan/monthly-payment", user.id),
            &token,
            Some(json!({})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_only_admin_creates_plan_records() {
    let mock_server = MockServer::start().await;
    let professional = TestUser::professional("pro@example.com");
    let patient = TestUser::patient("patient@example.com");
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/professional_plans"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::plan_row(&professional.id, None, true, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let uri = format!("/{}/plan", professional.id);

    for user in [&professional, &patient] {
        let token = JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(24));
        let response = create_test_app(config.clone())
            .oneshot(authorized("POST", &uri, &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "role {}", user.role);
    }

    let admin_token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let response = create_test_app(config)
        .oneshot(authorized("POST", &uri, &admin_token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["plan_status"]["state"], "no_plan");
}

#[tokio::test]
async fn test_reconciliation_lists_matched_and_unmatched() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    mount_week_activity(&mock_server, &user.id).await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized("GET", &format!("/{}/reconciliation", user.id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let appointments = body["appointments"].as_array().unwrap();
    assert_eq!(appointments.len(), 2);
    assert_eq!(appointments[0]["payment_id"], "pay-1");
    assert_eq!(appointments[1]["payment_id"], "pay-2");
    assert_eq!(body["matched_count"], 2);
}

#[tokio::test]
async fn test_reconciliation_rejects_inverted_window() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let uri = format!(
        "/{}/reconciliation?from=2025-02-01T00:00:00Z&to=2025-01-01T00:00:00Z",
        user.id
    );
    let response = app.oneshot(authorized("GET", &uri, &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reschedule_completed_appointment_is_rejected() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row("42", &user.id, "2025-01-16T13:00:00Z", "completed")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let new_time = (Utc::now() + Duration::days(2)).to_rfc3339();
    let response = app
        .oneshot(authorized(
            "PATCH",
            "/appointments/42/reschedule",
            &token,
            Some(json!({ "scheduled_at": new_time })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reschedule_confirmed_appointment() {
    let mock_server = MockServer::start().await;
    let user = TestUser::professional("pro@example.com");
    let original = (Utc::now() + Duration::days(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let moved = (Utc::now() + Duration::days(3)).to_rfc3339_opts(SecondsFormat::Secs, true);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row("42", &user.id, &original, "confirmed")
        ])))
        .mount(&mock_server)
        .await;

    let mut updated = MockSupabaseResponses::appointment_row("42", &user.id, &moved, "confirmed");
    updated["rescheduled_at"] = json!(original);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(authorized(
            "PATCH",
            "/appointments/42/reschedule",
            &token,
            Some(json!({ "scheduled_at": moved })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["id"], "42");
}
