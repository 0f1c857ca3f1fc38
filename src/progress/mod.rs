//! Progress tracking: per-learner lesson completions, quiz grading and notes

pub mod quiz;
pub mod repository;
pub mod tracker;
pub mod types;

pub use quiz::{QuestionResult, QuizResult, QuizSubmission, grade};
pub use repository::ProgressStore;
pub use tracker::{
    CompleteLessonRequest, LearningPage, ModuleLessons, NoteRequest, ProgramLessons,
    ProgressTracker, group_by_module,
};
pub use types::{CompletedLesson, Completion, LessonNote, Progress, percent};
