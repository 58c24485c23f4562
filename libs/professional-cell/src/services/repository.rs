use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentCountFilter, Payment, PlanUpdate, ProfessionalPlan, ReportingWindow,
    PAYMENT_STATUS_SUCCEEDED,
};

const PAYMENT_COLUMNS: &str = "id,appointment_id,professional_id,amount,status,created_at";

/// Read/write primitives the cell needs from the relational store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfessionalRepository: Send + Sync {
    async fn count_appointments(&self, filter: &AppointmentCountFilter, auth_token: &str) -> Result<u64>;

    async fn list_appointments(
        &self,
        professional_id: &str,
        window: &ReportingWindow,
        auth_token: &str,
    ) -> Result<Vec<Appointment>>;

    async fn list_succeeded_payments(&self, professional_id: &str, auth_token: &str) -> Result<Vec<Payment>>;

    async fn get_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Option<Appointment>>;

    async fn update_appointment_schedule(
        &self,
        appointment_id: &str,
        scheduled_at: DateTime<Utc>,
        rescheduled_at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment>;

    async fn get_plan(&self, professional_id: &str, auth_token: &str) -> Result<Option<ProfessionalPlan>>;

    async fn insert_plan(&self, professional_id: &str, auth_token: &str) -> Result<ProfessionalPlan>;

    async fn update_plan(
        &self,
        professional_id: &str,
        update: &PlanUpdate,
        auth_token: &str,
    ) -> Result<ProfessionalPlan>;
}

pub struct SupabaseProfessionalRepository {
    supabase: SupabaseClient,
}

impl SupabaseProfessionalRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}

fn encode_instant(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::Secs, true)).into_owned()
}

fn appointment_filter_query(filter: &AppointmentCountFilter) -> String {
    let mut query = vec![
        "select=id".to_string(),
        format!("professional_id=eq.{}", urlencoding::encode(&filter.professional_id)),
    ];

    if let Some(from) = filter.from {
        query.push(format!("scheduled_at=gte.{}", encode_instant(from)));
    }
    if let Some(to) = filter.to {
        query.push(format!("scheduled_at=lte.{}", encode_instant(to)));
    }
    match filter.statuses.as_slice() {
        [] => {}
        [single] => query.push(format!("status=eq.{}", urlencoding::encode(single.as_str()))),
        many => {
            let joined = many
                .iter()
                .map(|status| urlencoding::encode(status.as_str()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            query.push(format!("status=in.({})", joined));
        }
    }

    query.join("&")
}

fn plan_update_body(update: &PlanUpdate) -> Value {
    let mut body = Map::new();

    if let Some(plan_type) = update.plan_type {
        body.insert("plan_type".to_string(), json!(plan_type.as_str()));
    }
    if let Some(is_active) = update.is_active {
        body.insert("is_active".to_string(), json!(is_active));
    }
    if let Some(paid_at) = update.last_monthly_payment_date {
        body.insert("last_monthly_payment_date".to_string(), json!(paid_at.to_rfc3339()));
    }
    if let Some(expires_at) = update.monthly_plan_expires_at {
        body.insert("monthly_plan_expires_at".to_string(), json!(expires_at.to_rfc3339()));
    }
    body.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

    Value::Object(body)
}

fn first_row<T>(rows: Vec<Value>) -> Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl ProfessionalRepository for SupabaseProfessionalRepository {
    async fn count_appointments(&self, filter: &AppointmentCountFilter, auth_token: &str) -> Result<u64> {
        let path = format!("/rest/v1/appointments?{}", appointment_filter_query(filter));
        debug!("Counting appointments: {}", path);

        self.supabase.count(&path, Some(auth_token)).await
    }

    async fn list_appointments(
        &self,
        professional_id: &str,
        window: &ReportingWindow,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?select=*&professional_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&order=scheduled_at.asc",
            urlencoding::encode(professional_id),
            encode_instant(window.start),
            encode_instant(window.end),
        );

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()?;

        debug!("Fetched {} appointments for professional {}", appointments.len(), professional_id);
        Ok(appointments)
    }

    async fn list_succeeded_payments(&self, professional_id: &str, auth_token: &str) -> Result<Vec<Payment>> {
        let path = format!(
            "/rest/v1/payments?select={}&professional_id=eq.{}&status=eq.{}&order=created_at.desc",
            PAYMENT_COLUMNS,
            urlencoding::encode(professional_id),
            PAYMENT_STATUS_SUCCEEDED,
        );

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let payments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Payment>, _>>()?;

        debug!("Fetched {} succeeded payments for professional {}", payments.len(), professional_id);
        Ok(payments)
    }

    async fn get_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", urlencoding::encode(appointment_id));
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        first_row(rows)
    }

    async fn update_appointment_schedule(
        &self,
        appointment_id: &str,
        scheduled_at: DateTime<Utc>,
        rescheduled_at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment> {
        let path = format!("/rest/v1/appointments?id=eq.{}", urlencoding::encode(appointment_id));
        let body = json!({
            "scheduled_at": scheduled_at.to_rfc3339(),
            "rescheduled_at": rescheduled_at.to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await?;

        first_row(rows)?.ok_or_else(|| anyhow!("Appointment {} was not updated", appointment_id))
    }

    async fn get_plan(&self, professional_id: &str, auth_token: &str) -> Result<Option<ProfessionalPlan>> {
        let path = format!(
            "/rest/v1/professional_plans?professional_id=eq.{}&limit=1",
            urlencoding::encode(professional_id),
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        first_row(rows)
    }

    async fn insert_plan(&self, professional_id: &str, auth_token: &str) -> Result<ProfessionalPlan> {
        let body = json!({
            "professional_id": professional_id,
            "plan_type": null,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/professional_plans",
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await?;

        first_row(rows)?.ok_or_else(|| anyhow!("Failed to create plan for professional {}", professional_id))
    }

    async fn update_plan(
        &self,
        professional_id: &str,
        update: &PlanUpdate,
        auth_token: &str,
    ) -> Result<ProfessionalPlan> {
        let path = format!(
            "/rest/v1/professional_plans?professional_id=eq.{}",
            urlencoding::encode(professional_id),
        );

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(plan_update_body(update)),
            Some(Self::representation_headers()),
        ).await?;

        first_row(rows)?.ok_or_else(|| anyhow!("Plan for professional {} was not updated", professional_id))
    }
}
