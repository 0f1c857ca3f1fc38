//! Enrollment lifecycle
//!
//! - `state`: status FSM and named transitions
//! - `types`: enrollment record, intake DTOs, list filter
//! - `repository`: persistence seam with the atomic payment-recording rule
//! - `lifecycle`: transitions through compare-and-set
//! - `service`: intake, payment confirmation, administration, dashboard

pub mod lifecycle;
pub mod repository;
pub mod service;
pub mod state;
pub mod types;

pub use lifecycle::{activate_on_access, apply_transition};
pub use repository::{EnrollmentStore, PaymentClaim, PaymentRecord};
pub use service::{Dashboard, DashboardEntry, DashboardStats, EnrollmentService, WebhookOutcome};
pub use state::{EnrollmentStatus, PaymentStatus, Transition};
pub use types::{
    Cohort, ContactInfo, Enrollment, EnrollmentFilter, EnrollmentIntake, EnrollmentType,
    LearnerIdentity, Page, PaymentDetails,
};
