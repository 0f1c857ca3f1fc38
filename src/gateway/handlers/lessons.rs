//! Lesson access and completion

use std::sync::Arc;

use axum::{
    Extension,
    body::Bytes,
    extract::{Path, State},
};

use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::catalog::LessonView;
use crate::core_types::{Caller, LessonId, ProgramId};
use crate::error::CoreError;
use crate::progress::{CompleteLessonRequest, Completion, Progress, ProgramLessons};

/// Published lessons of a program, with the caller's progress
#[utoipa::path(
    get,
    path = "/api/v1/lessons/program/{program_id}",
    params(("program_id" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Lessons in curriculum order", body = ProgramLessons),
        (status = 403, description = "Not enrolled")
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn program_lessons(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(program_id): Path<ProgramId>,
) -> ApiResult<ProgramLessons> {
    ok(state.tracker.program_lessons(&caller, program_id).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson content", body = LessonView),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Unknown lesson")
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<LessonId>,
) -> ApiResult<LessonView> {
    ok(state.tracker.lesson(&caller, id).await?)
}

/// Mark a lesson completed
#[utoipa::path(
    post,
    path = "/api/v1/lessons/{id}/complete",
    params(("id" = Uuid, Path, description = "Lesson id")),
    request_body = CompleteLessonRequest,
    responses(
        (status = 200, description = "Updated progress", body = Progress),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Unknown lesson")
    ),
    security(("bearer_auth" = [])),
    tag = "Learning"
)]
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<LessonId>,
    body: Bytes,
) -> ApiResult<Progress> {
    // Body is optional
    let req: CompleteLessonRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CompleteLessonRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| CoreError::validation(e.to_string()))?
    };
    let completion = Completion {
        watch_time_secs: req.watch_time,
        quiz_score: None,
    };
    ok(state.tracker.complete_lesson(&caller, id, completion).await?)
}
