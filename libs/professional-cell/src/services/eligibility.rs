//! Whether a professional may currently take bookings. Pure functions of the
//! plan record and the current instant.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::{PlanState, PlanStatus, PlanType, ProfessionalPlan};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Parses plan timestamps as they come out of the database or were typed in by
/// an admin: RFC 3339, Postgres text output, or a bare date (midnight UTC).
pub fn parse_plan_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn expires_at(plan: &ProfessionalPlan) -> Option<DateTime<Utc>> {
    plan.monthly_plan_expires_at.as_deref().and_then(parse_plan_timestamp)
}

pub fn is_monthly_plan_active(plan: &ProfessionalPlan, now: DateTime<Utc>) -> bool {
    plan.plan_type == Some(PlanType::Monthly)
        && expires_at(plan).is_some_and(|expiry| expiry > now)
}

/// `is_active` gates everything; below it, commission is always usable and
/// monthly only while unexpired.
pub fn can_use_service(plan: Option<&ProfessionalPlan>, now: DateTime<Utc>) -> bool {
    let Some(plan) = plan else {
        return false;
    };
    if !plan.is_active {
        return false;
    }

    match plan.plan_type {
        Some(PlanType::Commission) => true,
        Some(PlanType::Monthly) => is_monthly_plan_active(plan, now),
        None => false,
    }
}

/// Whole days until expiry, rounded up and never negative. `None` when no
/// (readable) expiry is set.
pub fn days_remaining(plan: &ProfessionalPlan, now: DateTime<Utc>) -> Option<i64> {
    let expiry = expires_at(plan)?;
    let millis = (expiry - now).num_milliseconds();
    if millis <= 0 {
        return Some(0);
    }
    Some((millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY)
}

pub fn plan_state(plan: Option<&ProfessionalPlan>, now: DateTime<Utc>) -> PlanState {
    let Some(plan) = plan else {
        return PlanState::NoPlan;
    };
    if !plan.is_active {
        return PlanState::Deactivated;
    }

    match plan.plan_type {
        None => PlanState::NoPlan,
        Some(PlanType::Commission) => PlanState::CommissionActive,
        Some(PlanType::Monthly) if is_monthly_plan_active(plan, now) => PlanState::MonthlyActive,
        Some(PlanType::Monthly) => PlanState::MonthlyExpired,
    }
}

impl PlanStatus {
    pub fn evaluate(plan: Option<ProfessionalPlan>, now: DateTime<Utc>) -> Self {
        let state = plan_state(plan.as_ref(), now);
        let can_use_service = can_use_service(plan.as_ref(), now);
        let days_remaining = plan.as_ref().and_then(|plan| days_remaining(plan, now));

        Self {
            plan,
            state,
            can_use_service,
            days_remaining,
        }
    }
}
