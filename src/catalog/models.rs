//! Catalog data models: programs, modules, lessons and quizzes

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core_types::{LessonId, ProgramId};

/// Default quiz passing threshold (percent)
pub const DEFAULT_PASSING_SCORE: u8 = 70;

// ============================================================================
// Money
// ============================================================================

/// Amount + ISO currency code (always upper-case)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.trim().to_uppercase(),
        }
    }

    /// Price for `count` seats
    pub fn times(&self, count: u32) -> Money {
        Money {
            amount: self.amount * Decimal::from(count),
            currency: self.currency.clone(),
        }
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency.eq_ignore_ascii_case(&other.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.amount)
    }
}

// ============================================================================
// Program
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProgramCategory {
    Bootcamp,
    Olympiad,
    Corporate,
    Climate,
}

impl ProgramCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramCategory::Bootcamp => "bootcamp",
            ProgramCategory::Olympiad => "olympiad",
            ProgramCategory::Corporate => "corporate",
            ProgramCategory::Climate => "climate",
        }
    }
}

impl fmt::Display for ProgramCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgramCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bootcamp" => Ok(ProgramCategory::Bootcamp),
            "olympiad" => Ok(ProgramCategory::Olympiad),
            "corporate" => Ok(ProgramCategory::Corporate),
            "climate" => Ok(ProgramCategory::Climate),
            _ => Err(format!("Invalid program category: {}", s)),
        }
    }
}

/// Curriculum module (ordered within its program)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProgramModule {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Program {
    #[schema(value_type = String, format = Uuid)]
    pub id: ProgramId,
    pub slug: String,
    pub title: String,
    pub category: ProgramCategory,
    pub price: Money,
    pub modules: Vec<ProgramModule>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Program {
    pub fn new(title: &str, category: ProgramCategory, price: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slugify(title),
            title: title.to_string(),
            category,
            price,
            modules: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Module title for display, falling back to "Module N" (1-based)
    pub fn module_title(&self, index: u32) -> String {
        self.modules
            .get(index as usize)
            .map(|m| m.title.clone())
            .unwrap_or_else(|| format!("Module {}", index + 1))
    }
}

/// Derive a URL slug: lowercase, non-alphanumeric runs collapse to `-`
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// ============================================================================
// Lesson
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[default]
    Video,
    Article,
    Quiz,
    Assignment,
    Resource,
}

impl LessonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonType::Video => "video",
            LessonType::Article => "article",
            LessonType::Quiz => "quiz",
            LessonType::Assignment => "assignment",
            LessonType::Resource => "resource",
        }
    }
}

impl fmt::Display for LessonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(LessonType::Video),
            "article" => Ok(LessonType::Article),
            "quiz" => Ok(LessonType::Quiz),
            "assignment" => Ok(LessonType::Assignment),
            "resource" => Ok(LessonType::Resource),
            _ => Err(format!("Invalid lesson type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    #[serde(default = "default_passing_score")]
    pub passing_score: u8,
}

fn default_passing_score() -> u8 {
    DEFAULT_PASSING_SCORE
}

/// Unit of progress tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Lesson {
    #[schema(value_type = String, format = Uuid)]
    pub id: LessonId,
    #[schema(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
    pub module_index: u32,
    /// Order within the module
    pub order: u32,
    pub title: String,
    pub lesson_type: LessonType,
    /// Estimated minutes
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_duration_secs: Option<u32>,
    pub is_free: bool,
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

impl Lesson {
    pub fn new(program_id: ProgramId, module_index: u32, order: u32, title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            program_id,
            module_index,
            order,
            title: title.to_string(),
            lesson_type: LessonType::Video,
            duration_minutes: 10,
            video_duration_secs: None,
            is_free: false,
            is_published: true,
            quiz: None,
        }
    }

    /// Curriculum ordering key
    #[inline]
    pub fn sort_key(&self) -> (u32, u32) {
        (self.module_index, self.order)
    }

    pub fn is_quiz(&self) -> bool {
        self.lesson_type == LessonType::Quiz
    }
}

/// Learner-facing lesson: quiz answer keys and explanations stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LessonView {
    #[schema(value_type = String, format = Uuid)]
    pub id: LessonId,
    pub module_index: u32,
    pub order: u32,
    pub title: String,
    pub lesson_type: LessonType,
    pub duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_secs: Option<u32>,
    pub is_free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuizView {
    pub questions: Vec<QuestionView>,
    pub passing_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuestionView {
    pub question: String,
    pub options: Vec<String>,
}

impl From<&Lesson> for LessonView {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id,
            module_index: lesson.module_index,
            order: lesson.order,
            title: lesson.title.clone(),
            lesson_type: lesson.lesson_type,
            duration_minutes: lesson.duration_minutes,
            video_duration_secs: lesson.video_duration_secs,
            is_free: lesson.is_free,
            quiz: lesson.quiz.as_ref().map(|q| QuizView {
                questions: q
                    .questions
                    .iter()
                    .map(|qq| QuestionView {
                        question: qq.question.clone(),
                        options: qq.options.clone(),
                    })
                    .collect(),
                passing_score: q.passing_score,
            }),
        }
    }
}

/// Sort lessons into curriculum order (module index, then order within module)
pub fn sort_curriculum(lessons: &mut [Lesson]) {
    lessons.sort_by_key(|l| l.sort_key());
}
