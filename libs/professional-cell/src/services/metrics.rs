use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::debug;

use shared_config::AppConfig;

use crate::error::MetricsError;
use crate::models::{
    AppointmentCountFilter, AppointmentStatus, ProfessionalMetrics, ReconciledAppointment,
    ReportingWindow, UPCOMING_STATUSES,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::matching::{matcher_for, PaymentMatcher};
use crate::services::repository::{ProfessionalRepository, SupabaseProfessionalRepository};

// ==============================================================================
// REPORTING WINDOWS
// ==============================================================================

/// Converts a local wall-clock time to UTC. A time skipped by a DST jump
/// resolves to the first valid instant after the gap; a repeated time takes
/// the earlier or later occurrence as asked.
fn resolve_local(tz: Tz, local: NaiveDateTime, latest: bool) -> Result<DateTime<Utc>, MetricsError> {
    for hours in 0..=3 {
        let candidate = local + Duration::hours(hours);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(instant) => return Ok(instant.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, later) => {
                let chosen = if latest { later } else { earliest };
                return Ok(chosen.with_timezone(&Utc));
            }
            LocalResult::None => continue,
        }
    }
    Err(MetricsError::Timezone(format!("{} does not exist in {}", local, tz)))
}

fn day_bounds(tz: Tz, first: NaiveDate, last: NaiveDate) -> Result<ReportingWindow, MetricsError> {
    let start = first
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| MetricsError::Timezone(format!("invalid start day {}", first)))?;
    let end = last
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| MetricsError::Timezone(format!("invalid end day {}", last)))?;

    Ok(ReportingWindow {
        start: resolve_local(tz, start, false)?,
        end: resolve_local(tz, end, true)?,
    })
}

/// Monday 00:00:00 through Sunday 23:59:59 of the ISO week containing `now`,
/// local to `tz`.
pub fn week_window(now: DateTime<Utc>, tz: Tz) -> Result<ReportingWindow, MetricsError> {
    let today = now.with_timezone(&tz).date_naive();
    // 1 = Monday .. 7 = Sunday; a Sunday closes its own week.
    let weekday = i64::from(today.weekday().number_from_monday());

    let monday = today - Duration::days(weekday - 1);
    let sunday = today + Duration::days(7 - weekday);

    day_bounds(tz, monday, sunday)
}

/// First to last calendar day of the month containing `now`, local to `tz`.
pub fn month_window(now: DateTime<Utc>, tz: Tz) -> Result<ReportingWindow, MetricsError> {
    let today = now.with_timezone(&tz).date_naive();

    let first = today
        .with_day(1)
        .ok_or_else(|| MetricsError::Timezone(format!("no first day for {}", today)))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| MetricsError::Timezone(format!("no last day for {}", today)))?;

    day_bounds(tz, first, last)
}

// ==============================================================================
// AGGREGATION
// ==============================================================================

pub struct MetricsService {
    repository: Arc<dyn ProfessionalRepository>,
    matcher: Arc<dyn PaymentMatcher>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl MetricsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            repository: Arc::new(SupabaseProfessionalRepository::new(config)),
            matcher: matcher_for(config.payment_matching),
            clock: Arc::new(SystemClock),
            timezone: config.reporting_timezone,
        }
    }

    pub fn with_parts(
        repository: Arc<dyn ProfessionalRepository>,
        matcher: Arc<dyn PaymentMatcher>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            repository,
            matcher,
            clock,
            timezone,
        }
    }

    pub fn current_week(&self) -> Result<ReportingWindow, MetricsError> {
        week_window(self.clock.now(), self.timezone)
    }

    /// Monthly total, upcoming, weekly completed and weekly revenue. The three
    /// counts and the revenue reconciliation are issued concurrently.
    pub async fn calculate_professional_metrics(
        &self,
        professional_id: &str,
        auth_token: &str,
    ) -> Result<ProfessionalMetrics, MetricsError> {
        let now = self.clock.now();
        let week = week_window(now, self.timezone)?;
        let month = month_window(now, self.timezone)?;

        debug!(
            "Calculating metrics for professional {} (week {} - {}, month {} - {})",
            professional_id, week.start, week.end, month.start, month.end
        );

        let total_filter = AppointmentCountFilter::in_window(professional_id, &month);
        let upcoming_filter = AppointmentCountFilter {
            professional_id: professional_id.to_string(),
            from: Some(now),
            to: None,
            statuses: UPCOMING_STATUSES.to_vec(),
        };
        let completed_filter = AppointmentCountFilter::in_window(professional_id, &week)
            .with_statuses(&[AppointmentStatus::Completed]);

        let (total_appointments, upcoming_appointments, completed_appointments, reconciled) = tokio::try_join!(
            self.count(&total_filter, auth_token),
            self.count(&upcoming_filter, auth_token),
            self.count(&completed_filter, auth_token),
            self.reconcile(professional_id, &week, auth_token),
        )?;

        let total_revenue = reconciled
            .iter()
            .filter_map(|entry| entry.amount)
            .sum::<Decimal>();

        Ok(ProfessionalMetrics {
            total_appointments,
            upcoming_appointments,
            completed_appointments,
            total_revenue,
        })
    }

    /// Every appointment scheduled in `window` with its authoritative payment.
    /// Payments that match no appointment in the window are ignored.
    pub async fn reconcile(
        &self,
        professional_id: &str,
        window: &ReportingWindow,
        auth_token: &str,
    ) -> Result<Vec<ReconciledAppointment>, MetricsError> {
        let (appointments, payments) = tokio::try_join!(
            self.repository.list_appointments(professional_id, window, auth_token),
            self.repository.list_succeeded_payments(professional_id, auth_token),
        )
        .map_err(MetricsError::fetch)?;

        let fetched = appointments.len();
        let appointments: Vec<_> = appointments
            .into_iter()
            .filter(|appointment| window.contains(appointment.scheduled_at))
            .collect();
        if appointments.len() < fetched {
            debug!("Dropped {} appointments outside {} - {}", fetched - appointments.len(), window.start, window.end);
        }

        let mut matched = self.matcher.match_payments(&appointments, &payments);

        debug!(
            "Matched {} of {} appointments against {} payments for professional {}",
            matched.len(),
            appointments.len(),
            payments.len(),
            professional_id
        );

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let payment = matched.remove(&appointment.id);
                ReconciledAppointment {
                    appointment_id: appointment.id,
                    scheduled_at: appointment.scheduled_at,
                    status: appointment.status,
                    payment_id: payment.as_ref().map(|p| p.id.clone()),
                    amount: payment.map(|p| p.amount),
                }
            })
            .collect())
    }

    async fn count(&self, filter: &AppointmentCountFilter, auth_token: &str) -> Result<u64, MetricsError> {
        self.repository
            .count_appointments(filter, auth_token)
            .await
            .map_err(MetricsError::fetch)
    }
}
