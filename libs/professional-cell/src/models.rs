// libs/professional-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const PAYMENT_STATUS_SUCCEEDED: &str = "succeeded";

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

/// Appointment status as stored. The vocabulary is open-ended, so anything
/// unrecognised is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    PendingConfirmation,
    Other(String),
}

/// Statuses that count as "upcoming" on the professional overview.
pub const UPCOMING_STATUSES: [AppointmentStatus; 2] = [
    AppointmentStatus::Confirmed,
    AppointmentStatus::PendingConfirmation,
];

impl AppointmentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::PendingConfirmation => "pending_confirmation",
            AppointmentStatus::Other(status) => status,
        }
    }

    /// No further scheduling changes once an appointment reaches these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl From<String> for AppointmentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => AppointmentStatus::Pending,
            "confirmed" => AppointmentStatus::Confirmed,
            "completed" => AppointmentStatus::Completed,
            "cancelled" => AppointmentStatus::Cancelled,
            "pending_confirmation" => AppointmentStatus::PendingConfirmation,
            _ => AppointmentStatus::Other(value),
        }
    }
}

impl From<AppointmentStatus> for String {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    #[serde(deserialize_with = "loose_id")]
    pub professional_id: String,
    #[serde(default, deserialize_with = "optional_loose_id")]
    pub patient_id: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub meeting_url: Option<String>,
    /// Originally booked `scheduled_at`, set by the first reschedule and kept after.
    #[serde(default)]
    pub rescheduled_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// PAYMENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    /// Same loosely formatted identifier family as `Appointment::id`.
    #[serde(default, deserialize_with = "optional_loose_id")]
    pub appointment_id: Option<String>,
    #[serde(default, deserialize_with = "optional_loose_id")]
    pub professional_id: Option<String>,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_succeeded(&self) -> bool {
        self.status == PAYMENT_STATUS_SUCCEEDED
    }
}

/// One appointment in a reporting window with the payment chosen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledAppointment {
    pub appointment_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub payment_id: Option<String>,
    pub amount: Option<Decimal>,
}

// ==============================================================================
// PLANS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Commission,
    Monthly,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Commission => "commission",
            PlanType::Monthly => "monthly",
        }
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "commission" => Ok(PlanType::Commission),
            "monthly" => Ok(PlanType::Monthly),
            other => Err(format!("unknown plan type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalPlan {
    #[serde(deserialize_with = "loose_id")]
    pub professional_id: String,
    /// Unrecognised values read as unset, which keeps the service unusable.
    #[serde(default, deserialize_with = "lenient_plan_type")]
    pub plan_type: Option<PlanType>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub last_monthly_payment_date: Option<String>,
    #[serde(default)]
    pub monthly_plan_expires_at: Option<String>,
}

/// Usability of the booking service for a professional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    NoPlan,
    CommissionActive,
    MonthlyActive,
    MonthlyExpired,
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStatus {
    pub plan: Option<ProfessionalPlan>,
    pub state: PlanState,
    pub can_use_service: bool,
    pub days_remaining: Option<i64>,
}

/// Partial update of a plan row; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanUpdate {
    pub plan_type: Option<PlanType>,
    pub is_active: Option<bool>,
    pub last_monthly_payment_date: Option<DateTime<Utc>>,
    pub monthly_plan_expires_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// METRICS
// ==============================================================================

/// Closed interval `[start, end]` in UTC, derived from local calendar boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportingWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalMetrics {
    /// Appointments scheduled this calendar month, any status.
    pub total_appointments: u64,
    /// Confirmed or awaiting confirmation, from now on.
    pub upcoming_appointments: u64,
    /// Completed this week.
    pub completed_appointments: u64,
    /// Matched payments for appointments scheduled this week.
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentCountFilter {
    pub professional_id: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub statuses: Vec<AppointmentStatus>,
}

impl AppointmentCountFilter {
    pub fn in_window(professional_id: &str, window: &ReportingWindow) -> Self {
        Self {
            professional_id: professional_id.to_string(),
            from: Some(window.start),
            to: Some(window.end),
            statuses: Vec::new(),
        }
    }

    pub fn with_statuses(mut self, statuses: &[AppointmentStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalOverview {
    pub professional_id: String,
    pub plan_status: PlanStatus,
    /// Absent when aggregation failed; the rest of the overview is still served.
    pub metrics: Option<ProfessionalMetrics>,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectPlanRequest {
    pub plan_type: PlanType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyPaymentRequest {
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ==============================================================================
// SERDE HELPERS
// ==============================================================================

// Identifier columns hold integers in some tables and text in others.
fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(value).ok_or_else(|| serde::de::Error::custom("expected a string or numeric identifier"))
}

fn optional_loose_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(id_from_value))
}

fn lenient_plan_type<'de, D>(deserializer: D) -> Result<Option<PlanType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|raw| raw.parse().ok()))
}
