//! Catalog: program and lesson definitions
//!
//! Read-mostly data referenced by every other component.

pub mod models;
pub mod repository;
pub mod seed;

pub use models::{
    DEFAULT_PASSING_SCORE, Lesson, LessonType, LessonView, Money, Program, ProgramCategory,
    ProgramModule, QuestionView, Quiz, QuizQuestion, QuizView, slugify, sort_curriculum,
};
pub use repository::{CatalogStore, require_lesson, require_program};
pub use seed::CatalogSeed;
