//! Enrollment persistence seam
//!
//! Implementations must make [`EnrollmentStore::record_payment`] atomic with
//! respect to concurrent calls for the same (provider, reference) and the same
//! (learner email, program).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::state::EnrollmentStatus;
use super::types::{Enrollment, EnrollmentFilter, LearnerIdentity, Page, PaymentDetails};
use crate::core_types::{AccountId, EnrollmentId, ProgramId};
use crate::error::CoreError;
use crate::payment::ProviderKind;

/// A verified payment to be attached to an enrollment
#[derive(Debug, Clone)]
pub struct PaymentClaim {
    pub learner: LearnerIdentity,
    pub program_id: ProgramId,
    pub payment: PaymentDetails,
}

impl PaymentClaim {
    pub fn email(&self) -> String {
        self.learner.email()
    }
}

/// Outcome of [`EnrollmentStore::record_payment`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRecord {
    /// New `confirmed/paid` enrollment
    Created(Enrollment),
    /// Existing `pending` enrollment upgraded to `confirmed/paid`
    Confirmed(Enrollment),
    /// Reference already processed; returned unchanged
    AlreadyRecorded(Enrollment),
    /// Learner already holds the program under a different reference
    AlreadyEnrolled(Enrollment),
}

impl PaymentRecord {
    pub fn enrollment(&self) -> &Enrollment {
        match self {
            PaymentRecord::Created(e)
            | PaymentRecord::Confirmed(e)
            | PaymentRecord::AlreadyRecorded(e)
            | PaymentRecord::AlreadyEnrolled(e) => e,
        }
    }

    pub fn into_enrollment(self) -> Enrollment {
        match self {
            PaymentRecord::Created(e)
            | PaymentRecord::Confirmed(e)
            | PaymentRecord::AlreadyRecorded(e)
            | PaymentRecord::AlreadyEnrolled(e) => e,
        }
    }

    /// State changed by this call
    pub fn is_new(&self) -> bool {
        matches!(self, PaymentRecord::Created(_) | PaymentRecord::Confirmed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecord::Created(_) => "created",
            PaymentRecord::Confirmed(_) => "confirmed",
            PaymentRecord::AlreadyRecorded(_) => "already_recorded",
            PaymentRecord::AlreadyEnrolled(_) => "already_enrolled",
        }
    }
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), CoreError>;

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, CoreError>;

    async fn find_by_payment_reference(
        &self,
        provider: ProviderKind,
        reference: &str,
    ) -> Result<Option<Enrollment>, CoreError>;

    /// Most recent enrollment of `email` in `program_id` whose status is in `statuses`
    async fn find_for_learner(
        &self,
        email: &str,
        program_id: ProgramId,
        statuses: &[EnrollmentStatus],
    ) -> Result<Option<Enrollment>, CoreError>;

    /// All enrollments matching the email or the account, newest first
    async fn list_for_learner(
        &self,
        email: &str,
        account_id: Option<AccountId>,
    ) -> Result<Vec<Enrollment>, CoreError>;

    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> Result<Page<Enrollment>, CoreError>;

    /// Attach a verified payment:
    /// 1. same (provider, reference) exists → `AlreadyRecorded`
    /// 2. standing enrollment for (email, program) → `AlreadyEnrolled`
    /// 3. pending enrollment for (email, program) → upgraded, `Confirmed`
    /// 4. otherwise → new enrollment, `Created`
    async fn record_payment(&self, claim: &PaymentClaim) -> Result<PaymentRecord, CoreError>;

    /// Unconditional status write (admin). Returns the updated record.
    async fn set_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
        notes: Option<String>,
    ) -> Result<Option<Enrollment>, CoreError>;

    /// Compare-and-set: write `to` only while the status is still `from`
    async fn transition_status(
        &self,
        id: EnrollmentId,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, CoreError>;

    /// Delete an enrollment and its progress record
    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, CoreError>;
}
