//! Progress record
//!
//! One record per (learner email, program). `overall_progress` is derived from
//! the completed set and the program's published lessons on every completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::catalog::Lesson;
use crate::core_types::{EnrollmentId, LessonId, ProgramId, ProgressId, normalize_email};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CompletedLesson {
    #[schema(value_type = String, format = Uuid)]
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_time_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<u8>,
}

/// Append-only learner annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LessonNote {
    #[schema(value_type = String, format = Uuid)]
    pub lesson_id: LessonId,
    pub content: String,
    /// Offset into the lesson media, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_secs: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Progress {
    #[schema(value_type = String, format = Uuid)]
    pub id: ProgressId,
    /// Enrollment that made the learner eligible when the record was created
    #[schema(value_type = String, format = Uuid)]
    pub enrollment_id: EnrollmentId,
    pub learner_email: String,
    #[schema(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
    pub completed_lessons: Vec<CompletedLesson>,
    /// Resume pointer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub current_lesson: Option<LessonId>,
    /// 0..=100
    pub overall_progress: u8,
    pub total_watch_time_secs: u64,
    pub last_accessed_at: DateTime<Utc>,
    pub notes: Vec<LessonNote>,
    pub created_at: DateTime<Utc>,
}

/// A completion to record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    pub watch_time_secs: Option<u32>,
    pub quiz_score: Option<u8>,
}

/// round(100 × completed / total), half-up, 0 for an empty program
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let (k, n) = (completed.min(total) as u64, total as u64);
    ((200 * k + n) / (2 * n)) as u8
}

impl Progress {
    pub fn new(
        enrollment_id: EnrollmentId,
        learner_email: &str,
        program_id: ProgramId,
        first_lesson: Option<LessonId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            enrollment_id,
            learner_email: normalize_email(learner_email),
            program_id,
            completed_lessons: Vec::new(),
            current_lesson: first_lesson,
            overall_progress: 0,
            total_watch_time_secs: 0,
            last_accessed_at: now,
            notes: Vec::new(),
            created_at: now,
        }
    }

    pub fn is_completed(&self, lesson_id: LessonId) -> bool {
        self.completed_lessons.iter().any(|c| c.lesson_id == lesson_id)
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    /// Append a completion and recompute.
    ///
    /// `published` is the program's published lessons in curriculum order.
    /// Returns `false`, changing nothing, when the lesson is already completed.
    pub fn record_completion(
        &mut self,
        lesson_id: LessonId,
        completion: Completion,
        published: &[Lesson],
    ) -> bool {
        if self.is_completed(lesson_id) {
            return false;
        }

        self.completed_lessons.push(CompletedLesson {
            lesson_id,
            completed_at: Utc::now(),
            watch_time_secs: completion.watch_time_secs,
            quiz_score: completion.quiz_score,
        });
        self.total_watch_time_secs += u64::from(completion.watch_time_secs.unwrap_or(0));
        self.recompute(published);
        self.advance_from(lesson_id, published);
        self.touch();
        true
    }

    /// Derive `overall_progress` from completions of currently published lessons
    pub fn recompute(&mut self, published: &[Lesson]) {
        let done: HashSet<LessonId> = self.completed_lessons.iter().map(|c| c.lesson_id).collect();
        let counted = published.iter().filter(|l| done.contains(&l.id)).count();
        self.overall_progress = percent(counted, published.len());
    }

    /// Point at the next uncompleted lesson after `lesson_id`, wrapping to the
    /// first uncompleted one; stays on `lesson_id` when nothing is left.
    fn advance_from(&mut self, lesson_id: LessonId, published: &[Lesson]) {
        let start = published
            .iter()
            .position(|l| l.id == lesson_id)
            .map(|i| i + 1)
            .unwrap_or(0);
        let next = published[start..]
            .iter()
            .chain(published[..start].iter())
            .find(|l| !self.is_completed(l.id))
            .map(|l| l.id);
        self.current_lesson = next.or(Some(lesson_id));
    }

    pub fn add_note(&mut self, lesson_id: LessonId, content: &str, timestamp_secs: Option<u32>) {
        self.notes.push(LessonNote {
            lesson_id,
            content: content.to_string(),
            timestamp_secs,
            created_at: Utc::now(),
        });
        self.touch();
    }

    pub fn is_finished(&self) -> bool {
        self.overall_progress >= 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curriculum(n: u32) -> (ProgramId, Vec<Lesson>) {
        let pid = Uuid::new_v4();
        let lessons = (0..n)
            .map(|i| Lesson::new(pid, i / 5, i % 5, &format!("Lesson {}", i + 1)))
            .collect();
        (pid, lessons)
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13); // 12.5 rounds up
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(5, 0), 0);
        assert_eq!(percent(7, 3), 100);
    }

    #[test]
    fn test_completion_sequence() {
        let (pid, lessons) = curriculum(10);
        let mut p = Progress::new(Uuid::new_v4(), "Ada@Example.com", pid, Some(lessons[0].id));
        assert_eq!(p.learner_email, "ada@example.com");

        let mut seen = Vec::new();
        for lesson in &lessons {
            assert!(p.record_completion(lesson.id, Completion::default(), &lessons));
            seen.push(p.overall_progress);
        }
        assert_eq!(seen, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert!(p.is_finished());
    }

    #[test]
    fn test_completion_idempotent() {
        let (pid, lessons) = curriculum(4);
        let mut p = Progress::new(Uuid::new_v4(), "a@b.c", pid, None);
        let watch = Completion {
            watch_time_secs: Some(120),
            quiz_score: None,
        };
        assert!(p.record_completion(lessons[0].id, watch, &lessons));
        let snapshot = p.clone();

        assert!(!p.record_completion(lessons[0].id, watch, &lessons));
        assert_eq!(p, snapshot);
        assert_eq!(p.completed_lessons.len(), 1);
        assert_eq!(p.total_watch_time_secs, 120);
        assert_eq!(p.overall_progress, 25);
    }

    #[test]
    fn test_resume_pointer_advances_and_wraps() {
        let (pid, lessons) = curriculum(3);
        let mut p = Progress::new(Uuid::new_v4(), "a@b.c", pid, Some(lessons[0].id));

        p.record_completion(lessons[1].id, Completion::default(), &lessons);
        assert_eq!(p.current_lesson, Some(lessons[2].id));

        p.record_completion(lessons[2].id, Completion::default(), &lessons);
        assert_eq!(p.current_lesson, Some(lessons[0].id));

        p.record_completion(lessons[0].id, Completion::default(), &lessons);
        assert_eq!(p.current_lesson, Some(lessons[0].id));
    }

    #[test]
    fn test_unpublished_completions_not_counted() {
        let (pid, mut lessons) = curriculum(4);
        let mut p = Progress::new(Uuid::new_v4(), "a@b.c", pid, None);
        p.record_completion(lessons[3].id, Completion::default(), &lessons);
        assert_eq!(p.overall_progress, 25);

        // lesson later unpublished: drops out of both numerator and denominator
        lessons.pop();
        p.recompute(&lessons);
        assert_eq!(p.overall_progress, 0);
    }

    #[test]
    fn test_notes_append() {
        let (pid, lessons) = curriculum(1);
        let mut p = Progress::new(Uuid::new_v4(), "a@b.c", pid, None);
        p.add_note(lessons[0].id, "remember the borrow rules", Some(95));
        p.add_note(lessons[0].id, "second", None);
        assert_eq!(p.notes.len(), 2);
        assert_eq!(p.notes[0].timestamp_secs, Some(95));
    }
}
