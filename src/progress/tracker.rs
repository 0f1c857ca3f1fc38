//! Progress Tracker
//!
//! Lesson completion, quiz submission, notes and the learner-facing program
//! views. Every content read by an enrolled learner goes through
//! [`activate_on_access`], so a `confirmed` enrollment becomes `active` on the
//! first one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::quiz::{QuizResult, grade};
use super::repository::ProgressStore;
use super::types::{Completion, LessonNote, Progress};
use crate::access::AccessGate;
use crate::catalog::{CatalogStore, Lesson, LessonView, Program, require_lesson, require_program};
use crate::core_types::{Caller, LessonId, ProgramId};
use crate::enrollment::{
    Enrollment, EnrollmentStore, Transition, activate_on_access, apply_transition,
};
use crate::error::CoreError;
use crate::notify::{NotificationEvent, Notifier};

/// `POST /student/notes` body
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    #[schema(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
    #[schema(value_type = String, format = Uuid)]
    pub lesson_id: LessonId,
    pub content: String,
    /// Offset into the lesson media, seconds
    #[serde(default)]
    pub timestamp: Option<u32>,
}

/// `POST /lessons/{id}/complete` body
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonRequest {
    #[serde(default)]
    pub watch_time: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProgramLessons {
    pub lessons: Vec<LessonView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<Enrollment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ModuleLessons {
    pub index: u32,
    pub title: String,
    pub lessons: Vec<LessonView>,
}

/// Everything the learning page renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LearningPage {
    pub program: Program,
    pub modules: Vec<ModuleLessons>,
    pub progress: Progress,
    pub enrollment: Enrollment,
}

/// Group curriculum-ordered lessons by module
pub fn group_by_module(program: &Program, lessons: &[Lesson]) -> Vec<ModuleLessons> {
    let mut modules: Vec<ModuleLessons> = Vec::new();
    for lesson in lessons {
        match modules.last_mut() {
            Some(m) if m.index == lesson.module_index => m.lessons.push(lesson.into()),
            _ => modules.push(ModuleLessons {
                index: lesson.module_index,
                title: program.module_title(lesson.module_index),
                lessons: vec![lesson.into()],
            }),
        }
    }
    modules
}

pub struct ProgressTracker {
    catalog: Arc<dyn CatalogStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    progress: Arc<dyn ProgressStore>,
    gate: AccessGate,
    notifier: Arc<dyn Notifier>,
}

impl ProgressTracker {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        progress: Arc<dyn ProgressStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gate: AccessGate::new(enrollments.clone()),
            catalog,
            enrollments,
            progress,
            notifier,
        }
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Eligible enrollment after lazy activation, or `AccessDenied`
    async fn enrolled(&self, caller: &Caller, program_id: ProgramId) -> Result<Enrollment, CoreError> {
        let enrollment = self
            .gate
            .eligible_enrollment(caller, program_id)
            .await?
            .ok_or_else(|| {
                CoreError::access_denied("You are not enrolled in this program or enrollment is pending")
            })?;
        activate_on_access(self.enrollments.as_ref(), enrollment).await
    }

    async fn load_or_create(&self, enrollment: &Enrollment) -> Result<Progress, CoreError> {
        let email = &enrollment.learner_email;
        if let Some(progress) = self.progress.get_progress(email, enrollment.program_id).await? {
            return Ok(progress);
        }
        let first = self
            .catalog
            .published_lessons(enrollment.program_id)
            .await?
            .first()
            .map(|l| l.id);
        let fresh = Progress::new(enrollment.id, email, enrollment.program_id, first);
        let stored = self.progress.insert_progress_if_absent(&fresh).await?;
        if stored.id == fresh.id {
            debug!(
                enrollment_id = %enrollment.id,
                program_id = %enrollment.program_id,
                "Progress created"
            );
        }
        Ok(stored)
    }

    /// Progress for (caller, program), created on first access
    pub async fn get_or_create(
        &self,
        caller: &Caller,
        program_id: ProgramId,
    ) -> Result<(Enrollment, Progress), CoreError> {
        let enrollment = self.enrolled(caller, program_id).await?;
        let progress = self.load_or_create(&enrollment).await?;
        Ok((enrollment, progress))
    }

    /// Published lessons of a program. Administrators see them without an
    /// enrollment; learners need an eligible one.
    pub async fn program_lessons(
        &self,
        caller: &Caller,
        program_id: ProgramId,
    ) -> Result<ProgramLessons, CoreError> {
        require_program(self.catalog.as_ref(), program_id).await?;
        let lessons = self.catalog.published_lessons(program_id).await?;
        let views = lessons.iter().map(LessonView::from).collect();

        if caller.is_admin() {
            return Ok(ProgramLessons {
                lessons: views,
                progress: None,
                enrollment: None,
            });
        }

        let enrollment = self.enrolled(caller, program_id).await?;
        let progress = self
            .progress
            .get_progress(&enrollment.learner_email, program_id)
            .await?;
        Ok(ProgramLessons {
            lessons: views,
            progress,
            enrollment: Some(enrollment),
        })
    }

    pub async fn learning_page(
        &self,
        caller: &Caller,
        program_id: ProgramId,
    ) -> Result<LearningPage, CoreError> {
        let program = require_program(self.catalog.as_ref(), program_id).await?;
        let enrollment = self.enrolled(caller, program_id).await?;
        let lessons = self.catalog.published_lessons(program_id).await?;

        let mut progress = self.load_or_create(&enrollment).await?;
        progress.touch();
        self.progress.save_progress(&progress).await?;

        Ok(LearningPage {
            modules: group_by_module(&program, &lessons),
            program,
            progress,
            enrollment,
        })
    }

    /// One lesson through the access gate
    pub async fn lesson(&self, caller: &Caller, lesson_id: LessonId) -> Result<LessonView, CoreError> {
        let lesson = require_lesson(self.catalog.as_ref(), lesson_id).await?;
        self.gate.require(caller, &lesson).await?;
        if let Some(enrollment) = self.gate.eligible_enrollment(caller, lesson.program_id).await? {
            activate_on_access(self.enrollments.as_ref(), enrollment).await?;
        }
        Ok(LessonView::from(&lesson))
    }

    /// Published lesson or `NotFound`
    async fn published_lesson(&self, lesson_id: LessonId) -> Result<Lesson, CoreError> {
        let lesson = require_lesson(self.catalog.as_ref(), lesson_id).await?;
        if !lesson.is_published {
            return Err(CoreError::not_found("Lesson"));
        }
        Ok(lesson)
    }

    /// Mark a lesson completed. Repeating a completion returns the unchanged
    /// record.
    pub async fn complete_lesson(
        &self,
        caller: &Caller,
        lesson_id: LessonId,
        completion: Completion,
    ) -> Result<Progress, CoreError> {
        let lesson = self.published_lesson(lesson_id).await?;
        let (enrollment, progress) = self.get_or_create(caller, lesson.program_id).await?;
        let (progress, _) = self.record(&enrollment, progress, &lesson, completion).await?;
        Ok(progress)
    }

    /// Grade a quiz. A passing score completes the lesson for enrolled callers;
    /// a failing one changes nothing.
    pub async fn submit_quiz(
        &self,
        caller: &Caller,
        lesson_id: LessonId,
        answers: &[usize],
    ) -> Result<QuizResult, CoreError> {
        let lesson = require_lesson(self.catalog.as_ref(), lesson_id).await?;
        let Some(quiz) = lesson.quiz.as_ref().filter(|_| lesson.is_quiz()) else {
            return Err(CoreError::not_found("Quiz"));
        };
        self.gate.require(caller, &lesson).await?;

        let mut result = grade(quiz, answers)?;
        info!(
            lesson_id = %lesson.id,
            score = result.score,
            passed = result.passed,
            "Quiz graded"
        );
        if !result.passed || !lesson.is_published {
            return Ok(result);
        }

        // Free-preview and admin callers are graded without a progress record
        let Some(enrollment) = self.gate.eligible_enrollment(caller, lesson.program_id).await? else {
            return Ok(result);
        };
        let enrollment = activate_on_access(self.enrollments.as_ref(), enrollment).await?;
        let progress = self.load_or_create(&enrollment).await?;
        let completion = Completion {
            watch_time_secs: None,
            quiz_score: Some(result.score),
        };
        let (_, changed) = self.record(&enrollment, progress, &lesson, completion).await?;
        result.lesson_completed = changed;
        Ok(result)
    }

    async fn record(
        &self,
        enrollment: &Enrollment,
        mut progress: Progress,
        lesson: &Lesson,
        completion: Completion,
    ) -> Result<(Progress, bool), CoreError> {
        let published = self.catalog.published_lessons(lesson.program_id).await?;
        if !progress.record_completion(lesson.id, completion, &published) {
            debug!(lesson_id = %lesson.id, "Lesson already completed");
            return Ok((progress, false));
        }
        self.progress.save_progress(&progress).await?;
        info!(
            enrollment_id = %enrollment.id,
            lesson_id = %lesson.id,
            overall_progress = progress.overall_progress,
            "Lesson completed"
        );

        if progress.is_finished() {
            self.complete_program(enrollment).await?;
        }
        Ok((progress, true))
    }

    /// `confirmed|active → completed`, then notify
    async fn complete_program(&self, enrollment: &Enrollment) -> Result<(), CoreError> {
        let Some(completed) =
            apply_transition(self.enrollments.as_ref(), enrollment, Transition::Complete).await?
        else {
            return Ok(());
        };
        let program_title = self
            .catalog
            .get_program(completed.program_id)
            .await?
            .map(|p| p.title)
            .unwrap_or_default();
        self.notifier.notify(NotificationEvent::ProgramCompleted {
            enrollment_id: completed.id,
            program_title,
            learner_email: completed.learner_email.clone(),
            completed_at: completed.updated_at,
        });
        Ok(())
    }

    /// Append a note to the caller's progress in the program
    pub async fn save_note(&self, caller: &Caller, req: NoteRequest) -> Result<Vec<LessonNote>, CoreError> {
        let content = req.content.trim();
        if content.is_empty() {
            return Err(CoreError::validation("Note content is required"));
        }
        let mut progress = self
            .progress
            .get_progress(&caller.email, req.program_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Progress"))?;
        let lesson = require_lesson(self.catalog.as_ref(), req.lesson_id).await?;
        if lesson.program_id != req.program_id {
            return Err(CoreError::validation("Lesson does not belong to this program"));
        }

        progress.add_note(lesson.id, content, req.timestamp);
        self.progress.save_progress(&progress).await?;
        Ok(progress.notes)
    }

    pub async fn list_notes(
        &self,
        caller: &Caller,
        program_id: ProgramId,
    ) -> Result<Vec<LessonNote>, CoreError> {
        Ok(self
            .progress
            .get_progress(&caller.email, program_id)
            .await?
            .map(|p| p.notes)
            .unwrap_or_default())
    }
}
