use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::is_conflict;

use crate::error::ProfessionalError;
use crate::models::{PlanStatus, PlanType, PlanUpdate, ProfessionalPlan};
use crate::services::clock::{Clock, SystemClock};
use crate::services::eligibility::parse_plan_timestamp;
use crate::services::repository::{ProfessionalRepository, SupabaseProfessionalRepository};

/// Reads and moves a professional's plan through its lifecycle: approval,
/// plan selection, monthly payment and admin (de)activation.
pub struct PlanService {
    repository: Arc<dyn ProfessionalRepository>,
    clock: Arc<dyn Clock>,
}

impl PlanService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            repository: Arc::new(SupabaseProfessionalRepository::new(config)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_parts(repository: Arc<dyn ProfessionalRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn plan_status(&self, professional_id: &str, auth_token: &str) -> Result<PlanStatus, ProfessionalError> {
        let plan = self.repository.get_plan(professional_id, auth_token).await?;
        Ok(PlanStatus::evaluate(plan, self.clock.now()))
    }

    /// Called when a professional's request is approved. The record starts
    /// active with no plan type.
    pub async fn create_plan(&self, professional_id: &str, auth_token: &str) -> Result<PlanStatus, ProfessionalError> {
        if self.repository.get_plan(professional_id, auth_token).await?.is_some() {
            return Err(ProfessionalError::PlanAlreadyExists(professional_id.to_string()));
        }

        // A concurrent approval can still win the insert.
        let plan = match self.repository.insert_plan(professional_id, auth_token).await {
            Ok(plan) => plan,
            Err(e) if is_conflict(&e) => {
                return Err(ProfessionalError::PlanAlreadyExists(professional_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        info!("Created plan record for professional {}", professional_id);

        Ok(PlanStatus::evaluate(Some(plan), self.clock.now()))
    }

    pub async fn select_plan(
        &self,
        professional_id: &str,
        plan_type: PlanType,
        auth_token: &str,
    ) -> Result<PlanStatus, ProfessionalError> {
        let current = self.existing_plan(professional_id, auth_token).await?;
        if current.plan_type == Some(plan_type) {
            debug!("Professional {} already on {} plan", professional_id, plan_type.as_str());
            return Ok(PlanStatus::evaluate(Some(current), self.clock.now()));
        }

        let update = PlanUpdate {
            plan_type: Some(plan_type),
            ..PlanUpdate::default()
        };
        let plan = self.repository.update_plan(professional_id, &update, auth_token).await?;
        info!("Professional {} selected {} plan", professional_id, plan_type.as_str());

        Ok(PlanStatus::evaluate(Some(plan), self.clock.now()))
    }

    /// Extends a monthly plan by one calendar month, counted from the current
    /// expiry while it is still in the future, otherwise from now.
    pub async fn confirm_monthly_payment(
        &self,
        professional_id: &str,
        paid_at: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<PlanStatus, ProfessionalError> {
        let current = self.existing_plan(professional_id, auth_token).await?;
        if current.plan_type != Some(PlanType::Monthly) {
            return Err(ProfessionalError::Validation(
                "Monthly payments only apply to the monthly plan".to_string(),
            ));
        }

        let now = self.clock.now();
        let new_expiry = next_monthly_expiry(&current, now)?;

        let update = PlanUpdate {
            last_monthly_payment_date: Some(paid_at.unwrap_or(now)),
            monthly_plan_expires_at: Some(new_expiry),
            ..PlanUpdate::default()
        };
        let plan = self.repository.update_plan(professional_id, &update, auth_token).await?;
        info!("Monthly plan for professional {} now expires at {}", professional_id, new_expiry);

        Ok(PlanStatus::evaluate(Some(plan), now))
    }

    /// Admin switch. Reactivation falls back to whatever state the stored plan implies.
    pub async fn set_active(
        &self,
        professional_id: &str,
        is_active: bool,
        auth_token: &str,
    ) -> Result<PlanStatus, ProfessionalError> {
        self.existing_plan(professional_id, auth_token).await?;

        let update = PlanUpdate {
            is_active: Some(is_active),
            ..PlanUpdate::default()
        };
        let plan = self.repository.update_plan(professional_id, &update, auth_token).await?;
        info!(
            "Professional {} {}",
            professional_id,
            if is_active { "reactivated" } else { "deactivated" }
        );

        Ok(PlanStatus::evaluate(Some(plan), self.clock.now()))
    }

    async fn existing_plan(&self, professional_id: &str, auth_token: &str) -> Result<ProfessionalPlan, ProfessionalError> {
        self.repository
            .get_plan(professional_id, auth_token)
            .await?
            .ok_or_else(|| ProfessionalError::PlanNotFound(professional_id.to_string()))
    }
}

fn next_monthly_expiry(plan: &ProfessionalPlan, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProfessionalError> {
    let base = plan
        .monthly_plan_expires_at
        .as_deref()
        .and_then(parse_plan_timestamp)
        .filter(|expiry| *expiry > now)
        .unwrap_or(now);

    base.checked_add_months(Months::new(1))
        .ok_or_else(|| ProfessionalError::Validation(format!("cannot extend plan past {}", base)))
}
