//! Progress persistence seam

use async_trait::async_trait;

use super::types::Progress;
use crate::core_types::ProgramId;
use crate::error::CoreError;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_progress(
        &self,
        email: &str,
        program_id: ProgramId,
    ) -> Result<Option<Progress>, CoreError>;

    /// Insert unless a record for (email, program) exists; returns the stored record
    async fn insert_progress_if_absent(&self, progress: &Progress) -> Result<Progress, CoreError>;

    /// Replace the record with the same id
    async fn save_progress(&self, progress: &Progress) -> Result<(), CoreError>;

    /// All records of a learner, most recently accessed first
    async fn list_progress(&self, email: &str) -> Result<Vec<Progress>, CoreError>;
}
