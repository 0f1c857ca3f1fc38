//! Access Control Gate
//!
//! Decision order:
//! 1. administrators are always allowed
//! 2. unpublished lessons are hidden from everyone else
//! 3. free-preview lessons are open to any authenticated caller
//! 4. otherwise the caller needs an enrollment whose status grants access

use std::sync::Arc;

use crate::catalog::Lesson;
use crate::core_types::{Caller, ProgramId};
use crate::enrollment::{Enrollment, EnrollmentStatus, EnrollmentStore};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(AllowReason),
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    Admin,
    FreePreview,
    Enrolled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unpublished,
    NotEnrolled,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }

    /// Denials as errors: unpublished lessons look absent
    pub fn into_result(self) -> Result<AllowReason, CoreError> {
        match self {
            AccessDecision::Allow(reason) => Ok(reason),
            AccessDecision::Deny(DenyReason::Unpublished) => Err(CoreError::not_found("Lesson")),
            AccessDecision::Deny(DenyReason::NotEnrolled) => Err(CoreError::access_denied(
                "You must be enrolled to view this lesson",
            )),
        }
    }
}

/// Pure decision over already-loaded state
pub fn decide(caller: &Caller, lesson: &Lesson, enrollment: Option<&Enrollment>) -> AccessDecision {
    if caller.is_admin() {
        return AccessDecision::Allow(AllowReason::Admin);
    }
    if !lesson.is_published {
        return AccessDecision::Deny(DenyReason::Unpublished);
    }
    if lesson.is_free {
        return AccessDecision::Allow(AllowReason::FreePreview);
    }
    match enrollment {
        Some(e) if e.program_id == lesson.program_id && e.status.grants_access() => {
            AccessDecision::Allow(AllowReason::Enrolled)
        }
        _ => AccessDecision::Deny(DenyReason::NotEnrolled),
    }
}

/// Loads the caller's enrollment and applies [`decide`]
pub struct AccessGate {
    enrollments: Arc<dyn EnrollmentStore>,
}

impl AccessGate {
    pub fn new(enrollments: Arc<dyn EnrollmentStore>) -> Self {
        Self { enrollments }
    }

    /// The caller's enrollment in `program_id` that grants access, if any
    pub async fn eligible_enrollment(
        &self,
        caller: &Caller,
        program_id: ProgramId,
    ) -> Result<Option<Enrollment>, CoreError> {
        self.enrollments
            .find_for_learner(&caller.email, program_id, &EnrollmentStatus::STANDING)
            .await
    }

    pub async fn check(&self, caller: &Caller, lesson: &Lesson) -> Result<AccessDecision, CoreError> {
        // Skip the lookup when the lesson alone decides
        if caller.is_admin() || !lesson.is_published || lesson.is_free {
            return Ok(decide(caller, lesson, None));
        }
        let enrollment = self.eligible_enrollment(caller, lesson.program_id).await?;
        Ok(decide(caller, lesson, enrollment.as_ref()))
    }

    pub async fn require(&self, caller: &Caller, lesson: &Lesson) -> Result<AllowReason, CoreError> {
        self.check(caller, lesson).await?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Money;
    use crate::core_types::Role;
    use crate::enrollment::LearnerIdentity;
    use uuid::Uuid;

    fn student() -> Caller {
        Caller::new(Uuid::new_v4(), "ada@example.com", Role::Student)
    }

    fn enrollment(program_id: ProgramId, status: EnrollmentStatus) -> Enrollment {
        let mut e = Enrollment::pending(
            LearnerIdentity::from_caller(&student()),
            program_id,
            Money::new("349".parse().unwrap(), "USD"),
        );
        e.status = status;
        e
    }

    #[test]
    fn test_admin_always_allowed() {
        let admin = Caller::new(Uuid::new_v4(), "root@example.com", Role::Admin);
        let mut lesson = Lesson::new(Uuid::new_v4(), 0, 0, "draft");
        lesson.is_published = false;
        assert_eq!(
            decide(&admin, &lesson, None),
            AccessDecision::Allow(AllowReason::Admin)
        );
    }

    #[test]
    fn test_unpublished_hidden_even_when_enrolled() {
        let mut lesson = Lesson::new(Uuid::new_v4(), 0, 0, "draft");
        lesson.is_published = false;
        lesson.is_free = true;
        let e = enrollment(lesson.program_id, EnrollmentStatus::Active);
        let decision = decide(&student(), &lesson, Some(&e));
        assert_eq!(decision, AccessDecision::Deny(DenyReason::Unpublished));
        assert!(matches!(decision.into_result(), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_free_preview() {
        let mut lesson = Lesson::new(Uuid::new_v4(), 0, 0, "intro");
        lesson.is_free = true;
        assert_eq!(
            decide(&student(), &lesson, None),
            AccessDecision::Allow(AllowReason::FreePreview)
        );
    }

    #[test]
    fn test_status_matrix() {
        let lesson = Lesson::new(Uuid::new_v4(), 0, 0, "paid content");
        let cases = [
            (EnrollmentStatus::Pending, false),
            (EnrollmentStatus::Confirmed, true),
            (EnrollmentStatus::Active, true),
            (EnrollmentStatus::Completed, true),
            (EnrollmentStatus::Cancelled, false),
        ];
        for (status, allowed) in cases {
            let e = enrollment(lesson.program_id, status);
            assert_eq!(
                decide(&student(), &lesson, Some(&e)).is_allowed(),
                allowed,
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_enrollment_in_other_program_denied() {
        let lesson = Lesson::new(Uuid::new_v4(), 0, 0, "paid content");
        let e = enrollment(Uuid::new_v4(), EnrollmentStatus::Active);
        let decision = decide(&student(), &lesson, Some(&e));
        assert!(matches!(
            decision.into_result(),
            Err(CoreError::AccessDenied(_))
        ));
    }
}
