pub mod appointment;
pub mod clock;
pub mod eligibility;
pub mod matching;
pub mod metrics;
pub mod overview;
pub mod plan;
pub mod repository;

pub use appointment::AppointmentService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use matching::{CanonicalIdMatcher, LegacyIdMatcher, PaymentMatcher};
pub use metrics::MetricsService;
pub use overview::OverviewService;
pub use plan::PlanService;
pub use repository::{ProfessionalRepository, SupabaseProfessionalRepository};
