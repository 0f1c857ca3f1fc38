//! Named transitions applied through the store's compare-and-set

use chrono::Utc;
use tracing::{debug, info};

use super::repository::EnrollmentStore;
use super::state::{EnrollmentStatus, Transition};
use super::types::Enrollment;
use crate::error::CoreError;

/// Apply `transition` to `enrollment`.
///
/// Returns the updated record, or `None` when the transition is not allowed
/// from the current status or another request changed the status first.
pub async fn apply_transition(
    store: &dyn EnrollmentStore,
    enrollment: &Enrollment,
    transition: Transition,
) -> Result<Option<Enrollment>, CoreError> {
    let from = enrollment.status;
    let Some(to) = transition.apply(from) else {
        return Ok(None);
    };

    let now = Utc::now();
    if !store.transition_status(enrollment.id, from, to, now).await? {
        debug!(
            enrollment_id = %enrollment.id,
            transition = transition.as_str(),
            "Status changed concurrently, transition skipped"
        );
        return Ok(None);
    }

    info!(
        enrollment_id = %enrollment.id,
        transition = transition.as_str(),
        from = %from,
        to = %to,
        "Enrollment transitioned"
    );
    let mut updated = enrollment.clone();
    updated.status = to;
    updated.updated_at = now;
    Ok(Some(updated))
}

/// `confirmed → active` on first content access; other statuses pass through
pub async fn activate_on_access(
    store: &dyn EnrollmentStore,
    enrollment: Enrollment,
) -> Result<Enrollment, CoreError> {
    if enrollment.status != EnrollmentStatus::Confirmed {
        return Ok(enrollment);
    }
    if let Some(updated) = apply_transition(store, &enrollment, Transition::Activate).await? {
        return Ok(updated);
    }
    Ok(store
        .get_enrollment(enrollment.id)
        .await?
        .unwrap_or(enrollment))
}
