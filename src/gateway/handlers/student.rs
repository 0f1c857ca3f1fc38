//! Learner dashboard, learning page, notes and quizzes

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::core_types::{Caller, LessonId, ProgramId};
use crate::enrollment::Dashboard;
use crate::progress::{LearningPage, LessonNote, NoteRequest, QuizResult, QuizSubmission};

#[utoipa::path(
    get,
    path = "/api/v1/student/dashboard",
    responses(
        (status = 200, description = "Enrollments, progress and counts", body = Dashboard)
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Dashboard> {
    ok(state.enrollments.dashboard(&caller).await?)
}

/// Program, lessons grouped by module, progress and enrollment
#[utoipa::path(
    get,
    path = "/api/v1/student/program/{program_id}",
    params(("program_id" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Learning page", body = LearningPage),
        (status = 403, description = "Not enrolled")
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn learning_page(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(program_id): Path<ProgramId>,
) -> ApiResult<LearningPage> {
    ok(state.tracker.learning_page(&caller, program_id).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/student/notes",
    request_body = NoteRequest,
    responses(
        (status = 200, description = "All notes of the program", body = [LessonNote]),
        (status = 404, description = "No progress for this program")
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn save_note(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<NoteRequest>,
) -> ApiResult<Vec<LessonNote>> {
    ok(state.tracker.save_note(&caller, req).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/student/notes/{program_id}",
    params(("program_id" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Notes, oldest first", body = [LessonNote])
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(program_id): Path<ProgramId>,
) -> ApiResult<Vec<LessonNote>> {
    ok(state.tracker.list_notes(&caller, program_id).await?)
}

/// Grade a quiz; a pass completes the lesson
#[utoipa::path(
    post,
    path = "/api/v1/student/quiz/{lesson_id}/submit",
    params(("lesson_id" = Uuid, Path, description = "Quiz lesson id")),
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Score and per-question results", body = QuizResult),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(lesson_id): Path<LessonId>,
    Json(req): Json<QuizSubmission>,
) -> ApiResult<QuizResult> {
    ok(state
        .tracker
        .submit_quiz(&caller, lesson_id, &req.answers)
        .await?)
}
