use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::error::ProfessionalError;
use crate::models::Appointment;
use crate::services::clock::{Clock, SystemClock};
use crate::services::repository::{ProfessionalRepository, SupabaseProfessionalRepository};

pub struct AppointmentService {
    repository: Arc<dyn ProfessionalRepository>,
    clock: Arc<dyn Clock>,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            repository: Arc::new(SupabaseProfessionalRepository::new(config)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_parts(repository: Arc<dyn ProfessionalRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Moves an appointment to `new_scheduled_at`. `rescheduled_at` keeps the
    /// originally booked time across any number of moves. Only the
    /// professional, the patient or an admin may do this, and only before the
    /// appointment is completed or cancelled.
    pub async fn reschedule(
        &self,
        appointment_id: &str,
        new_scheduled_at: DateTime<Utc>,
        actor: &User,
        auth_token: &str,
    ) -> Result<Appointment, ProfessionalError> {
        debug!("Rescheduling appointment {} to {}", appointment_id, new_scheduled_at);

        let current = self
            .repository
            .get_appointment(appointment_id, auth_token)
            .await?
            .ok_or_else(|| ProfessionalError::AppointmentNotFound(appointment_id.to_string()))?;

        if !may_reschedule(actor, &current) {
            warn!("User {} tried to reschedule appointment {}", actor.id, appointment_id);
            return Err(ProfessionalError::Unauthorized);
        }

        if current.status.is_terminal() {
            return Err(ProfessionalError::Validation(format!(
                "Cannot reschedule a {} appointment",
                current.status
            )));
        }

        if new_scheduled_at <= self.clock.now() {
            return Err(ProfessionalError::Validation(
                "Rescheduled time must be in the future".to_string(),
            ));
        }

        let originally_scheduled_at = current.rescheduled_at.unwrap_or(current.scheduled_at);

        let updated = self
            .repository
            .update_appointment_schedule(appointment_id, new_scheduled_at, originally_scheduled_at, auth_token)
            .await?;

        info!(
            "Appointment {} moved from {} to {}",
            appointment_id, current.scheduled_at, updated.scheduled_at
        );
        Ok(updated)
    }
}

fn may_reschedule(actor: &User, appointment: &Appointment) -> bool {
    actor.can_act_for(&appointment.professional_id)
        || appointment.patient_id.as_deref() == Some(actor.id.as_str())
}
