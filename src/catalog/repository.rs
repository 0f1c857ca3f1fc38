//! Catalog persistence seam

use async_trait::async_trait;

use super::models::{Lesson, Program};
use crate::core_types::{LessonId, ProgramId};
use crate::error::CoreError;

/// Read-mostly catalog access.
///
/// `published_lessons` MUST return lessons in curriculum order
/// (module index, then order within module).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, CoreError>;

    async fn list_programs(&self) -> Result<Vec<Program>, CoreError>;

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, CoreError>;

    /// Published lessons of a program in curriculum order
    async fn published_lessons(&self, program_id: ProgramId) -> Result<Vec<Lesson>, CoreError>;

    async fn count_published_lessons(&self, program_id: ProgramId) -> Result<usize, CoreError> {
        Ok(self.published_lessons(program_id).await?.len())
    }

    /// Insert or replace (administrative edits and seeding)
    async fn upsert_program(&self, program: &Program) -> Result<(), CoreError>;

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), CoreError>;
}

/// Fetch a program or fail with `NotFound`
pub async fn require_program(
    catalog: &dyn CatalogStore,
    id: ProgramId,
) -> Result<Program, CoreError> {
    catalog
        .get_program(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Program"))
}

/// Fetch a lesson or fail with `NotFound`
pub async fn require_lesson(catalog: &dyn CatalogStore, id: LessonId) -> Result<Lesson, CoreError> {
    catalog
        .get_lesson(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Lesson"))
}
