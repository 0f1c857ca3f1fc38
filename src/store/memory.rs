//! In-memory store
//!
//! Catalog entries live in `DashMap`s. Enrollments and progress share one
//! `tokio::sync::RwLock` so `record_payment` and cascading deletes observe and
//! mutate both collections atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::catalog::{CatalogStore, Lesson, Program};
use crate::core_types::{AccountId, EnrollmentId, LessonId, ProgramId, ProgressId, normalize_email};
use crate::enrollment::{
    Enrollment, EnrollmentFilter, EnrollmentStatus, EnrollmentStore, Page, PaymentClaim,
    PaymentRecord,
};
use crate::error::CoreError;
use crate::payment::ProviderKind;
use crate::progress::{Progress, ProgressStore};

#[derive(Default)]
struct Ledger {
    enrollments: HashMap<EnrollmentId, Enrollment>,
    progress: HashMap<ProgressId, Progress>,
}

impl Ledger {
    fn by_reference(&self, provider: ProviderKind, reference: &str) -> Option<&Enrollment> {
        self.enrollments
            .values()
            .find(|e| e.payment_reference() == Some((provider, reference)))
    }

    /// Most recently created match
    fn latest_for(
        &self,
        email: &str,
        program_id: ProgramId,
        statuses: &[EnrollmentStatus],
    ) -> Option<&Enrollment> {
        self.enrollments
            .values()
            .filter(|e| {
                e.learner_email == email
                    && e.program_id == program_id
                    && statuses.contains(&e.status)
            })
            .max_by_key(|e| e.created_at)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    programs: DashMap<ProgramId, Program>,
    lessons: DashMap<LessonId, Lesson>,
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enrollment_count(&self) -> usize {
        self.ledger.read().await.enrollments.len()
    }

    pub async fn progress_count(&self) -> usize {
        self.ledger.read().await.progress.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, CoreError> {
        Ok(self.programs.get(&id).map(|p| p.clone()))
    }

    async fn list_programs(&self) -> Result<Vec<Program>, CoreError> {
        let mut programs: Vec<Program> = self.programs.iter().map(|p| p.clone()).collect();
        programs.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(programs)
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, CoreError> {
        Ok(self.lessons.get(&id).map(|l| l.clone()))
    }

    async fn published_lessons(&self, program_id: ProgramId) -> Result<Vec<Lesson>, CoreError> {
        let mut lessons: Vec<Lesson> = self
            .lessons
            .iter()
            .filter(|l| l.program_id == program_id && l.is_published)
            .map(|l| l.clone())
            .collect();
        lessons.sort_by_key(|l| l.sort_key());
        Ok(lessons)
    }

    async fn upsert_program(&self, program: &Program) -> Result<(), CoreError> {
        self.programs.insert(program.id, program.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), CoreError> {
        self.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), CoreError> {
        let mut ledger = self.ledger.write().await;
        if ledger.enrollments.contains_key(&enrollment.id) {
            return Err(CoreError::Conflict(format!(
                "Enrollment {} already exists",
                enrollment.id
            )));
        }
        ledger.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, CoreError> {
        Ok(self.ledger.read().await.enrollments.get(&id).cloned())
    }

    async fn find_by_payment_reference(
        &self,
        provider: ProviderKind,
        reference: &str,
    ) -> Result<Option<Enrollment>, CoreError> {
        Ok(self
            .ledger
            .read()
            .await
            .by_reference(provider, reference)
            .cloned())
    }

    async fn find_for_learner(
        &self,
        email: &str,
        program_id: ProgramId,
        statuses: &[EnrollmentStatus],
    ) -> Result<Option<Enrollment>, CoreError> {
        let email = normalize_email(email);
        Ok(self
            .ledger
            .read()
            .await
            .latest_for(&email, program_id, statuses)
            .cloned())
    }

    async fn list_for_learner(
        &self,
        email: &str,
        account_id: Option<AccountId>,
    ) -> Result<Vec<Enrollment>, CoreError> {
        let email = normalize_email(email);
        let ledger = self.ledger.read().await;
        let mut found: Vec<Enrollment> = ledger
            .enrollments
            .values()
            .filter(|e| {
                e.learner_email == email
                    || (account_id.is_some() && e.learner.account_id() == account_id)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> Result<Page<Enrollment>, CoreError> {
        let ledger = self.ledger.read().await;
        let mut matched: Vec<&Enrollment> = ledger
            .enrollments
            .values()
            .filter(|e| filter.matches(e))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, filter))
    }

    async fn record_payment(&self, claim: &PaymentClaim) -> Result<PaymentRecord, CoreError> {
        let payment = &claim.payment;
        let email = claim.email();
        let mut ledger = self.ledger.write().await;

        if let Some(existing) = ledger.by_reference(payment.provider, &payment.reference) {
            return Ok(PaymentRecord::AlreadyRecorded(existing.clone()));
        }
        if let Some(existing) =
            ledger.latest_for(&email, claim.program_id, &EnrollmentStatus::STANDING)
        {
            return Ok(PaymentRecord::AlreadyEnrolled(existing.clone()));
        }

        let pending_id = ledger
            .latest_for(&email, claim.program_id, &[EnrollmentStatus::Pending])
            .map(|e| e.id);
        if let Some(enrollment) = pending_id.and_then(|id| ledger.enrollments.get_mut(&id)) {
            enrollment.apply_payment(payment.clone());
            return Ok(PaymentRecord::Confirmed(enrollment.clone()));
        }

        let enrollment = Enrollment::paid(claim.learner.clone(), claim.program_id, payment.clone());
        ledger.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(PaymentRecord::Created(enrollment))
    }

    async fn set_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
        notes: Option<String>,
    ) -> Result<Option<Enrollment>, CoreError> {
        let mut ledger = self.ledger.write().await;
        let Some(target) = ledger.enrollments.get(&id) else {
            return Ok(None);
        };
        // At most one standing enrollment per (email, program)
        if status.is_standing() {
            let holder = ledger.enrollments.values().any(|e| {
                e.id != id
                    && e.learner_email == target.learner_email
                    && e.program_id == target.program_id
                    && e.status.is_standing()
            });
            if holder {
                return Err(CoreError::Conflict(
                    "Learner already holds this program".to_string(),
                ));
            }
        }
        let Some(enrollment) = ledger.enrollments.get_mut(&id) else {
            return Ok(None);
        };
        enrollment.status = status;
        if notes.is_some() {
            enrollment.notes = notes;
        }
        enrollment.updated_at = Utc::now();
        Ok(Some(enrollment.clone()))
    }

    async fn transition_status(
        &self,
        id: EnrollmentId,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let mut ledger = self.ledger.write().await;
        match ledger.enrollments.get_mut(&id) {
            Some(enrollment) if enrollment.status == from => {
                enrollment.status = to;
                enrollment.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, CoreError> {
        let mut ledger = self.ledger.write().await;
        if ledger.enrollments.remove(&id).is_none() {
            return Ok(false);
        }
        ledger.progress.retain(|_, p| p.enrollment_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get_progress(
        &self,
        email: &str,
        program_id: ProgramId,
    ) -> Result<Option<Progress>, CoreError> {
        let email = normalize_email(email);
        Ok(self
            .ledger
            .read()
            .await
            .progress
            .values()
            .find(|p| p.learner_email == email && p.program_id == program_id)
            .cloned())
    }

    async fn insert_progress_if_absent(&self, progress: &Progress) -> Result<Progress, CoreError> {
        let mut ledger = self.ledger.write().await;
        if let Some(existing) = ledger
            .progress
            .values()
            .find(|p| p.learner_email == progress.learner_email && p.program_id == progress.program_id)
        {
            return Ok(existing.clone());
        }
        ledger.progress.insert(progress.id, progress.clone());
        Ok(progress.clone())
    }

    async fn save_progress(&self, progress: &Progress) -> Result<(), CoreError> {
        let mut ledger = self.ledger.write().await;
        match ledger.progress.get_mut(&progress.id) {
            Some(slot) => {
                *slot = progress.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("Progress")),
        }
    }

    async fn list_progress(&self, email: &str) -> Result<Vec<Progress>, CoreError> {
        let email = normalize_email(email);
        let mut found: Vec<Progress> = self
            .ledger
            .read()
            .await
            .progress
            .values()
            .filter(|p| p.learner_email == email)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Ok(found)
    }
}
