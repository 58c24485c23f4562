use tracing::debug;

use shared_config::AppConfig;

use crate::error::ProfessionalError;
use crate::models::ProfessionalOverview;
use crate::services::metrics::MetricsService;
use crate::services::plan::PlanService;

/// Everything the professional dashboard shows on load: plan usability plus
/// this week's and month's figures.
pub struct OverviewService {
    plans: PlanService,
    metrics: MetricsService,
    log_metric_failures: bool,
}

impl OverviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            plans: PlanService::new(config),
            metrics: MetricsService::new(config),
            log_metric_failures: !config.is_production(),
        }
    }

    pub fn with_parts(plans: PlanService, metrics: MetricsService, log_metric_failures: bool) -> Self {
        Self {
            plans,
            metrics,
            log_metric_failures,
        }
    }

    /// Only a failed plan read fails the overview. Metrics are supplementary:
    /// when they cannot be computed the overview carries `metrics: None`.
    pub async fn professional_overview(
        &self,
        professional_id: &str,
        auth_token: &str,
    ) -> Result<ProfessionalOverview, ProfessionalError> {
        let plan_status = self.plans.plan_status(professional_id, auth_token).await?;

        let metrics = match self.metrics.calculate_professional_metrics(professional_id, auth_token).await {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                if self.log_metric_failures {
                    debug!("Metrics unavailable for professional {}: {}", professional_id, e);
                }
                None
            }
        };

        Ok(ProfessionalOverview {
            professional_id: professional_id.to_string(),
            plan_status,
            metrics,
        })
    }
}
