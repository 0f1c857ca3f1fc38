//! Quiz grading

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::Quiz;
use crate::error::CoreError;

/// `POST /student/quiz/{lessonId}/submit` body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuizSubmission {
    /// Selected option index per question, in question order
    pub answers: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question: String,
    pub your_answer: usize,
    pub correct_answer: usize,
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub score: u8,
    pub passed: bool,
    pub passing_score: u8,
    pub results: Vec<QuestionResult>,
    /// This submission newly completed the lesson
    pub lesson_completed: bool,
}

/// Grade by exact index match. score = round(100 × correct / total).
pub fn grade(quiz: &Quiz, answers: &[usize]) -> Result<QuizResult, CoreError> {
    if quiz.questions.is_empty() {
        return Err(CoreError::validation("Quiz has no questions"));
    }
    if answers.len() != quiz.questions.len() {
        return Err(CoreError::validation(format!(
            "Expected {} answers, got {}",
            quiz.questions.len(),
            answers.len()
        )));
    }

    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .zip(answers)
        .map(|(q, &answer)| QuestionResult {
            question: q.question.clone(),
            your_answer: answer,
            correct_answer: q.correct_answer,
            is_correct: answer == q.correct_answer,
            explanation: q.explanation.clone(),
        })
        .collect();

    let correct = results.iter().filter(|r| r.is_correct).count();
    let score = super::types::percent(correct, results.len());

    Ok(QuizResult {
        score,
        passed: score >= quiz.passing_score,
        passing_score: quiz.passing_score,
        results,
        lesson_completed: false,
    })
}
