//! YAML catalog seed
//!
//! Programs and their lessons are described in one file and loaded into the
//! active [`CatalogStore`] at startup.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use uuid::Uuid;

use super::models::{
    Lesson, LessonType, Money, Program, ProgramCategory, ProgramModule, Quiz, slugify,
};
use super::repository::CatalogStore;

#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub programs: Vec<ProgramSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProgramSeed {
    /// Stable id; generated when absent
    pub id: Option<Uuid>,
    pub title: String,
    pub slug: Option<String>,
    pub category: ProgramCategory,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub modules: Vec<ProgramModule>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub lessons: Vec<LessonSeed>,
}

#[derive(Debug, Deserialize)]
pub struct LessonSeed {
    pub id: Option<Uuid>,
    pub title: String,
    pub module_index: u32,
    #[serde(default)]
    pub order: u32,
    #[serde(default, rename = "type")]
    pub lesson_type: LessonType,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    pub video_duration_secs: Option<u32>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default = "default_true")]
    pub is_published: bool,
    pub quiz: Option<Quiz>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_true() -> bool {
    true
}

fn default_duration() -> u32 {
    10
}

impl CatalogSeed {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse catalog seed yaml")
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog seed: {}", path))?;
        Self::from_yaml(&content)
    }

    /// Materialize programs and lessons
    pub fn build(self) -> Vec<(Program, Vec<Lesson>)> {
        self.programs
            .into_iter()
            .map(|p| {
                let mut program =
                    Program::new(&p.title, p.category, Money::new(p.price, &p.currency));
                if let Some(id) = p.id {
                    program.id = id;
                }
                if let Some(slug) = p.slug {
                    program.slug = slugify(&slug);
                }
                program.modules = p.modules;
                program.is_active = p.is_active;

                let lessons = p
                    .lessons
                    .into_iter()
                    .map(|l| {
                        let mut lesson =
                            Lesson::new(program.id, l.module_index, l.order, &l.title);
                        if let Some(id) = l.id {
                            lesson.id = id;
                        }
                        lesson.lesson_type = l.lesson_type;
                        lesson.duration_minutes = l.duration_minutes;
                        lesson.video_duration_secs = l.video_duration_secs;
                        lesson.is_free = l.is_free;
                        lesson.is_published = l.is_published;
                        lesson.quiz = l.quiz;
                        lesson
                    })
                    .collect();

                (program, lessons)
            })
            .collect()
    }

    /// Write the seed into a catalog store. Returns (programs, lessons) written.
    pub async fn apply(self, catalog: &dyn CatalogStore) -> Result<(usize, usize)> {
        let mut program_count = 0;
        let mut lesson_count = 0;
        for (program, lessons) in self.build() {
            catalog.upsert_program(&program).await?;
            program_count += 1;
            for lesson in &lessons {
                catalog.upsert_lesson(lesson).await?;
                lesson_count += 1;
            }
        }
        tracing::info!(
            programs = program_count,
            lessons = lesson_count,
            "Catalog seed applied"
        );
        Ok((program_count, lesson_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"
programs:
  - title: "Python Bootcamp"
    category: bootcamp
    price: 349
    modules:
      - title: Basics
        topics: [syntax, types]
      - title: Projects
    lessons:
      - title: Welcome
        module_index: 0
        order: 0
        is_free: true
      - title: Checkpoint
        module_index: 1
        order: 0
        type: quiz
        quiz:
          questions:
            - question: "2 + 2?"
              options: ["3", "4"]
              correct_answer: 1
  - title: "Olympiad Prep"
    category: olympiad
    price: 120.50
    currency: ngn
    is_active: false
"#;

    #[test]
    fn test_seed_parse_and_build() {
        let seed = CatalogSeed::from_yaml(SEED).unwrap();
        let built = seed.build();
        assert_eq!(built.len(), 2);

        let (python, lessons) = &built[0];
        assert_eq!(python.slug, "python-bootcamp");
        assert_eq!(python.price.currency, "USD");
        assert_eq!(python.modules.len(), 2);
        assert_eq!(lessons.len(), 2);
        assert!(lessons[0].is_free);
        assert!(lessons.iter().all(|l| l.program_id == python.id));

        let quiz = lessons[1].quiz.as_ref().unwrap();
        assert_eq!(lessons[1].lesson_type, LessonType::Quiz);
        assert_eq!(quiz.passing_score, 70);

        let (olympiad, _) = &built[1];
        assert!(!olympiad.is_active);
        assert_eq!(olympiad.price.currency, "NGN");
    }

    #[test]
    fn test_seed_rejects_unknown_category() {
        let bad = "programs:\n  - title: X\n    category: cooking\n    price: 1\n";
        assert!(CatalogSeed::from_yaml(bad).is_err());
    }
}
