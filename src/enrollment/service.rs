//! Enrollment service
//!
//! Intake, payment initialization and verification, webhook processing,
//! administrative status changes and the learner dashboard.
//!
//! A payment is only ever recorded through [`EnrollmentStore::record_payment`],
//! so the browser-return path and the webhook path converge on one outcome per
//! (provider, reference).

use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::repository::{EnrollmentStore, PaymentClaim, PaymentRecord};
use super::state::{EnrollmentStatus, Transition};
use super::types::{
    ContactInfo, Enrollment, EnrollmentFilter, EnrollmentIntake, LearnerIdentity, Page,
    PaymentDetails, DEFAULT_SOURCE,
};
use crate::catalog::{CatalogStore, Money, Program, require_program};
use crate::core_types::{Caller, EnrollmentId, ProgramId};
use crate::error::CoreError;
use crate::notify::{NotificationEvent, Notifier};
use crate::payment::{
    Checkout, CheckoutRequest, PaymentEvent, PaymentGateway, ProviderKind, Verification,
};
use crate::progress::{Progress, ProgressStore};

/// Number of progress records shown as recent activity
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Result of processing one webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State changed
    Recorded(Enrollment),
    /// Reference already processed
    Duplicate(Enrollment),
    /// Authentic but not actionable; acknowledged so the provider stops retrying
    Ignored(&'static str),
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Recorded(_) => "recorded",
            WebhookOutcome::Duplicate(_) => "duplicate",
            WebhookOutcome::Ignored(reason) => reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardEntry {
    pub enrollment: Enrollment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    pub total_lessons: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_enrollments: usize,
    /// confirmed + active
    pub active_programs: usize,
    pub completed_programs: usize,
    pub pending_enrollments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Dashboard {
    pub enrollments: Vec<DashboardEntry>,
    pub pending_enrollments: Vec<Enrollment>,
    pub recent_activity: Vec<Progress>,
    pub stats: DashboardStats,
}

pub struct EnrollmentService {
    catalog: Arc<dyn CatalogStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    progress: Arc<dyn ProgressStore>,
    payments: Arc<PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    callback_base_url: String,
}

impl EnrollmentService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        progress: Arc<dyn ProgressStore>,
        payments: Arc<PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        callback_base_url: &str,
    ) -> Self {
        Self {
            catalog,
            enrollments,
            progress,
            payments,
            notifier,
            callback_base_url: callback_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn payments(&self) -> &PaymentGateway {
        &self.payments
    }

    // ========================================================================
    // Intake
    // ========================================================================

    /// Record an intake as `pending/pending`.
    ///
    /// The amount due is captured now so later price changes do not alter it.
    pub async fn submit(&self, intake: EnrollmentIntake) -> Result<Enrollment, CoreError> {
        let intake = intake.normalized();
        intake.validate()?;
        if intake.cohort_date.is_some_and(|c| !c.is_ordered()) {
            return Err(CoreError::validation("Cohort end date precedes start date"));
        }

        let program = self.active_program(intake.program_id).await?;
        let amount_due = program.price.times(intake.number_of_participants);

        let mut enrollment = Enrollment::pending(
            LearnerIdentity::Guest(intake.student_info),
            program.id,
            amount_due,
        );
        enrollment.enrollment_type = intake.enrollment_type;
        enrollment.participants = intake.number_of_participants;
        enrollment.cohort = intake.cohort_date;
        enrollment.notes = intake.notes;
        enrollment.source = intake
            .source
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

        self.enrollments.insert_enrollment(&enrollment).await?;

        info!(
            enrollment_id = %enrollment.id,
            program = %program.slug,
            participants = enrollment.participants,
            amount = %enrollment.amount_due,
            "Enrollment submitted"
        );
        self.notifier.notify(NotificationEvent::EnrollmentSubmitted {
            enrollment_id: enrollment.id,
            program_id: program.id,
            program_title: program.title.clone(),
            learner_email: enrollment.learner_email.clone(),
            learner_name: enrollment.learner.display_name(),
            amount: enrollment.amount_due.clone(),
        });
        Ok(enrollment)
    }

    // ========================================================================
    // Payment
    // ========================================================================

    /// Start a checkout for the caller. No enrollment state is written.
    pub async fn initialize_payment(
        &self,
        caller: &Caller,
        program_id: ProgramId,
        provider: Option<ProviderKind>,
    ) -> Result<Checkout, CoreError> {
        let program = self.active_program(program_id).await?;

        if self
            .enrollments
            .find_for_learner(&caller.email, program_id, &EnrollmentStatus::STANDING)
            .await?
            .is_some()
        {
            return Err(CoreError::AlreadyEnrolled);
        }

        let kind = provider.unwrap_or_else(|| self.payments.default_provider());
        let adapter = self.payments.provider(kind)?;
        let request = CheckoutRequest {
            program_id,
            program_title: program.title.clone(),
            amount: self.expected_amount(&caller.email, &program).await?,
            email: caller.email.clone(),
            account_id: Some(caller.account_id),
            callback_base_url: self.callback_base_url.clone(),
        };

        let checkout = adapter.initialize(&request).await?;
        info!(
            provider = %kind,
            reference = %checkout.reference,
            program = %program.slug,
            amount = %request.amount,
            "Payment initialized"
        );
        Ok(checkout)
    }

    /// Browser-return confirmation.
    ///
    /// Idempotent per (provider, reference): repeating a verified reference
    /// returns the enrollment it produced without calling the provider again.
    pub async fn verify_payment(
        &self,
        caller: &Caller,
        kind: ProviderKind,
        reference: &str,
        program_id: ProgramId,
    ) -> Result<Enrollment, CoreError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(CoreError::validation("Payment reference is required"));
        }

        if let Some(existing) = self
            .enrollments
            .find_by_payment_reference(kind, reference)
            .await?
        {
            return self.reuse_recorded(caller, existing);
        }

        let program = require_program(self.catalog.as_ref(), program_id).await?;
        let adapter = self.payments.provider(kind)?;

        let (amount, paid_at) = match adapter.verify(reference).await? {
            Verification::Paid { amount, paid_at } => (amount, paid_at),
            Verification::Failed { reason } => {
                info!(provider = %kind, reference, reason = %reason, "Payment not confirmed");
                return Err(CoreError::PaymentVerification(reason));
            }
        };

        let expected = self.expected_amount(&caller.email, &program).await?;
        check_amount(&amount, &expected)?;

        let claim = PaymentClaim {
            learner: LearnerIdentity::from_caller(caller),
            program_id,
            payment: PaymentDetails {
                provider: kind,
                reference: reference.to_string(),
                amount,
                paid_at,
            },
        };
        let record = self.enrollments.record_payment(&claim).await?;
        self.finish_payment(&program, &claim, record)
    }

    /// Process a provider-pushed notification.
    ///
    /// Only a bad signature or an unconfigured provider is an error; every
    /// other authentic delivery is acknowledged.
    pub async fn handle_webhook(
        &self,
        kind: ProviderKind,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, CoreError> {
        let adapter = self.payments.provider(kind)?;
        let Some(event) = adapter.parse_webhook(body, signature)? else {
            debug!(provider = %kind, "Webhook event ignored");
            return Ok(WebhookOutcome::Ignored("unhandled_event"));
        };

        let Some(program) = self.catalog.get_program(event.program_id).await? else {
            warn!(
                provider = %kind,
                reference = %event.reference,
                program_id = %event.program_id,
                "Webhook for unknown program"
            );
            return Ok(WebhookOutcome::Ignored("unknown_program"));
        };
        if event.email.trim().is_empty() {
            warn!(provider = %kind, reference = %event.reference, "Webhook without customer email");
            return Ok(WebhookOutcome::Ignored("missing_email"));
        }

        if let Some(existing) = self
            .enrollments
            .find_by_payment_reference(kind, &event.reference)
            .await?
        {
            debug!(enrollment_id = %existing.id, reference = %event.reference, "Webhook redelivered");
            return Ok(WebhookOutcome::Duplicate(existing));
        }

        let claim = claim_from_event(&event);
        let expected = self.expected_amount(&claim.email(), &program).await?;
        if let Err(e) = check_amount(&event.amount, &expected) {
            warn!(
                provider = %kind,
                reference = %event.reference,
                error = %e,
                "Webhook amount rejected"
            );
            return Ok(WebhookOutcome::Ignored("amount_mismatch"));
        }

        let record = self.enrollments.record_payment(&claim).await?;
        let duplicate = matches!(record, PaymentRecord::AlreadyRecorded(_));
        match self.finish_payment(&program, &claim, record) {
            Ok(enrollment) if duplicate => Ok(WebhookOutcome::Duplicate(enrollment)),
            Ok(enrollment) => Ok(WebhookOutcome::Recorded(enrollment)),
            Err(CoreError::AlreadyEnrolled) => Ok(WebhookOutcome::Ignored("already_enrolled")),
            Err(e) => Err(e),
        }
    }

    fn reuse_recorded(&self, caller: &Caller, existing: Enrollment) -> Result<Enrollment, CoreError> {
        if !caller.is_admin() && !existing.belongs_to(caller) {
            return Err(CoreError::Conflict(
                "Payment reference belongs to another enrollment".to_string(),
            ));
        }
        debug!(enrollment_id = %existing.id, "Payment reference already verified");
        Ok(existing)
    }

    fn finish_payment(
        &self,
        program: &Program,
        claim: &PaymentClaim,
        record: PaymentRecord,
    ) -> Result<Enrollment, CoreError> {
        let outcome = record.as_str();
        let payment = &claim.payment;
        match record {
            PaymentRecord::Created(enrollment) | PaymentRecord::Confirmed(enrollment) => {
                info!(
                    enrollment_id = %enrollment.id,
                    provider = %payment.provider,
                    reference = %payment.reference,
                    amount = %payment.amount,
                    outcome,
                    "Payment recorded"
                );
                self.notifier.notify(NotificationEvent::PaymentReceived {
                    enrollment_id: enrollment.id,
                    program_title: program.title.clone(),
                    learner_email: enrollment.learner_email.clone(),
                    amount: payment.amount.clone(),
                    provider: payment.provider.to_string(),
                    reference: payment.reference.clone(),
                });
                self.notifier.notify(NotificationEvent::EnrollmentConfirmed {
                    enrollment_id: enrollment.id,
                    program_title: program.title.clone(),
                    learner_email: enrollment.learner_email.clone(),
                    amount: payment.amount.clone(),
                });
                Ok(enrollment)
            }
            PaymentRecord::AlreadyRecorded(enrollment) => {
                debug!(
                    enrollment_id = %enrollment.id,
                    reference = %payment.reference,
                    "Payment already recorded"
                );
                Ok(enrollment)
            }
            PaymentRecord::AlreadyEnrolled(enrollment) => {
                // Money was captured twice; surface the reference for a manual refund
                warn!(
                    enrollment_id = %enrollment.id,
                    provider = %payment.provider,
                    reference = %payment.reference,
                    amount = %payment.amount,
                    "Payment for a program the learner already holds"
                );
                Err(CoreError::AlreadyEnrolled)
            }
        }
    }

    /// Amount the learner owes: the open intake's captured amount, else the
    /// current price
    async fn expected_amount(&self, email: &str, program: &Program) -> Result<Money, CoreError> {
        let pending = self
            .enrollments
            .find_for_learner(email, program.id, &[EnrollmentStatus::Pending])
            .await?;
        Ok(pending
            .map(|e| e.amount_due)
            .unwrap_or_else(|| program.price.clone()))
    }

    async fn active_program(&self, program_id: ProgramId) -> Result<Program, CoreError> {
        let program = require_program(self.catalog.as_ref(), program_id).await?;
        if !program.is_active {
            return Err(CoreError::not_found("Program"));
        }
        Ok(program)
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub async fn get(&self, id: EnrollmentId) -> Result<Enrollment, CoreError> {
        self.enrollments
            .get_enrollment(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Enrollment"))
    }

    pub async fn list(&self, filter: &EnrollmentFilter) -> Result<Page<Enrollment>, CoreError> {
        self.enrollments.list_enrollments(filter).await
    }

    /// Administrative override: any status may be set
    pub async fn update_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
        notes: Option<String>,
    ) -> Result<Enrollment, CoreError> {
        let previous = self.get(id).await?;
        let Some(to) = Transition::AdminOverride(status).apply(previous.status) else {
            return Err(CoreError::validation("Status change not allowed"));
        };
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let updated = self
            .enrollments
            .set_status(id, to, notes)
            .await?
            .ok_or_else(|| CoreError::not_found("Enrollment"))?;
        info!(
            enrollment_id = %id,
            from = %previous.status,
            to = %updated.status,
            "Enrollment status overridden"
        );
        Ok(updated)
    }

    /// Delete an enrollment and its progress
    pub async fn delete(&self, id: EnrollmentId) -> Result<(), CoreError> {
        if !self.enrollments.delete_enrollment(id).await? {
            return Err(CoreError::not_found("Enrollment"));
        }
        info!(enrollment_id = %id, "Enrollment deleted");
        Ok(())
    }

    // ========================================================================
    // Learner views
    // ========================================================================

    pub async fn my_enrollments(&self, caller: &Caller) -> Result<Vec<Enrollment>, CoreError> {
        self.enrollments
            .list_for_learner(&caller.email, Some(caller.account_id))
            .await
    }

    /// Enrollments with progress, pending intakes and recent activity
    pub async fn dashboard(&self, caller: &Caller) -> Result<Dashboard, CoreError> {
        let all = self.my_enrollments(caller).await?;
        let progress = self.progress.list_progress(&caller.email).await?;

        let mut stats = DashboardStats {
            total_enrollments: all.len(),
            ..Default::default()
        };
        let mut standing = Vec::new();
        let mut pending = Vec::new();

        for enrollment in all {
            match enrollment.status {
                EnrollmentStatus::Pending => {
                    stats.pending_enrollments += 1;
                    pending.push(enrollment);
                    continue;
                }
                EnrollmentStatus::Confirmed | EnrollmentStatus::Active => {
                    stats.active_programs += 1
                }
                EnrollmentStatus::Completed => stats.completed_programs += 1,
                EnrollmentStatus::Cancelled => continue,
            }
            standing.push(enrollment);
        }

        let progress_ref = &progress;
        let entries = try_join_all(standing.into_iter().map(move |enrollment| async move {
            let program = self.catalog.get_program(enrollment.program_id).await?;
            let total_lessons = self
                .catalog
                .count_published_lessons(enrollment.program_id)
                .await?;
            Ok::<_, CoreError>(DashboardEntry {
                program_title: program.map(|p| p.title),
                progress: progress_ref
                    .iter()
                    .find(|p| p.program_id == enrollment.program_id)
                    .cloned(),
                total_lessons,
                enrollment,
            })
        }))
        .await?;

        Ok(Dashboard {
            enrollments: entries,
            pending_enrollments: pending,
            recent_activity: progress.into_iter().take(RECENT_ACTIVITY_LIMIT).collect(),
            stats,
        })
    }
}

fn claim_from_event(event: &PaymentEvent) -> PaymentClaim {
    let learner = match event.account_id {
        Some(account_id) => LearnerIdentity::Account {
            account_id,
            email: event.email.clone(),
            name: None,
        },
        None => LearnerIdentity::Guest(ContactInfo {
            email: event.email.clone(),
            ..Default::default()
        }),
    };
    PaymentClaim {
        learner,
        program_id: event.program_id,
        payment: PaymentDetails {
            provider: event.provider,
            reference: event.reference.clone(),
            amount: event.amount.clone(),
            paid_at: event.paid_at,
        },
    }
}

/// Paid amount must cover what is owed, in the same currency
fn check_amount(paid: &Money, expected: &Money) -> Result<(), CoreError> {
    if !paid.same_currency(expected) {
        return Err(CoreError::PaymentVerification(format!(
            "Currency mismatch: paid {}, expected {}",
            paid.currency, expected.currency
        )));
    }
    if paid.amount < expected.amount {
        return Err(CoreError::PaymentVerification(format!(
            "Paid amount {} is below the amount due {}",
            paid, expected
        )));
    }
    Ok(())
}
