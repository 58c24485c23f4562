use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum ProfessionalError {
    #[error("Plan not found for professional {0}")]
    PlanNotFound(String),

    #[error("Plan already exists for professional {0}")]
    PlanAlreadyExists(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),

    #[error("Unauthorized access to professional data")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ProfessionalError {
    fn from(e: anyhow::Error) -> Self {
        ProfessionalError::Database(e.to_string())
    }
}

/// Failure to aggregate metrics. Callers rendering an overview treat this as
/// "metrics unavailable" rather than failing the response.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to fetch metrics data: {0}")]
    Fetch(String),

    #[error("Cannot resolve reporting boundary: {0}")]
    Timezone(String),
}

impl MetricsError {
    pub fn fetch(e: anyhow::Error) -> Self {
        MetricsError::Fetch(e.to_string())
    }
}

impl From<ProfessionalError> for AppError {
    fn from(e: ProfessionalError) -> Self {
        match e {
            ProfessionalError::PlanNotFound(_) | ProfessionalError::AppointmentNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            ProfessionalError::PlanAlreadyExists(_) => AppError::Conflict(e.to_string()),
            ProfessionalError::Unauthorized => AppError::Forbidden(e.to_string()),
            ProfessionalError::Validation(msg) => AppError::ValidationError(msg),
            ProfessionalError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<MetricsError> for AppError {
    fn from(e: MetricsError) -> Self {
        match e {
            MetricsError::Fetch(msg) => AppError::Database(msg),
            MetricsError::Timezone(msg) => AppError::Internal(msg),
        }
    }
}
