//! Public catalog endpoints

use std::sync::Arc;

use axum::extract::{Path, State};

use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::catalog::{Program, require_program};
use crate::core_types::ProgramId;

/// List active programs
#[utoipa::path(
    get,
    path = "/api/v1/programs",
    responses(
        (status = 200, description = "Active programs", body = [Program])
    ),
    tag = "Catalog"
)]
pub async fn list_programs(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Program>> {
    let programs = state
        .catalog
        .list_programs()
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .collect();
    ok(programs)
}

#[utoipa::path(
    get,
    path = "/api/v1/programs/{id}",
    params(("id" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Program", body = Program),
        (status = 404, description = "Unknown program")
    ),
    tag = "Catalog"
)]
pub async fn get_program(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProgramId>,
) -> ApiResult<Program> {
    ok(require_program(state.catalog.as_ref(), id).await?)
}
