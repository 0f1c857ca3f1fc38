//! Enrollment intake and administration

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::state::AppState;
use super::super::types::{ApiResponse, ApiResult, ok};
use crate::core_types::{Caller, EnrollmentId, ProgramId};
use crate::enrollment::{
    Enrollment, EnrollmentFilter, EnrollmentIntake, EnrollmentStatus, Page, PaymentStatus,
};
use crate::error::CoreError;

/// Intake acknowledgement
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCreated {
    #[schema(value_type = String, format = Uuid)]
    pub enrollment_id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub payment_status: PaymentStatus,
}

/// Admin list query
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEnrollmentsQuery {
    /// pending | confirmed | active | completed | cancelled
    pub status: Option<String>,
    #[param(value_type = Option<String>, format = Uuid)]
    pub program: Option<ProgramId>,
    /// 1-based
    pub page: Option<u32>,
    /// Default 20, max 100
    pub limit: Option<u32>,
}

impl ListEnrollmentsQuery {
    fn into_filter(self) -> Result<EnrollmentFilter, CoreError> {
        let mut filter = EnrollmentFilter::new(self.page, self.limit);
        filter.status = self
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<EnrollmentStatus>)
            .transpose()
            .map_err(CoreError::Validation)?;
        filter.program_id = self.program;
        Ok(filter)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Submit an enrollment (guest or signed-in)
#[utoipa::path(
    post,
    path = "/api/v1/enrollments",
    request_body = EnrollmentIntake,
    responses(
        (status = 201, description = "Enrollment recorded as pending", body = EnrollmentCreated),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown or inactive program")
    ),
    tag = "Enrollments"
)]
pub async fn submit_enrollment(
    State(state): State<Arc<AppState>>,
    Json(intake): Json<EnrollmentIntake>,
) -> Result<(StatusCode, Json<ApiResponse<EnrollmentCreated>>), CoreError> {
    let enrollment = state.enrollments.submit(intake).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(EnrollmentCreated {
            enrollment_id: enrollment.id,
            status: enrollment.status,
            payment_status: enrollment.payment_status,
        })),
    ))
}

/// The caller's enrollments
#[utoipa::path(
    get,
    path = "/api/v1/enrollments/me",
    responses(
        (status = 200, description = "Enrollments by account id or email", body = [Enrollment])
    ),
    security(("bearer_auth" = [])),
    tag = "Enrollments"
)]
pub async fn my_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<Enrollment>> {
    ok(state.enrollments.my_enrollments(&caller).await?)
}

/// Paged listing, newest first
#[utoipa::path(
    get,
    path = "/api/v1/enrollments",
    params(ListEnrollmentsQuery),
    responses(
        (status = 200, description = "One page of enrollments", body = Page<Enrollment>),
        (status = 403, description = "Administrator role required")
    ),
    security(("bearer_auth" = [])),
    tag = "Administration"
)]
pub async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListEnrollmentsQuery>,
) -> ApiResult<Page<Enrollment>> {
    let filter = query.into_filter()?;
    ok(state.enrollments.list(&filter).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/enrollments/{id}",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Enrollment", body = Enrollment),
        (status = 404, description = "Unknown enrollment")
    ),
    security(("bearer_auth" = [])),
    tag = "Administration"
)]
pub async fn get_enrollment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EnrollmentId>,
) -> ApiResult<Enrollment> {
    ok(state.enrollments.get(id).await?)
}

#[utoipa::path(
    put,
    path = "/api/v1/enrollments/{id}/status",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated enrollment", body = Enrollment),
        (status = 404, description = "Unknown enrollment")
    ),
    security(("bearer_auth" = [])),
    tag = "Administration"
)]
pub async fn update_enrollment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EnrollmentId>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Enrollment> {
    ok(state
        .enrollments
        .update_status(id, req.status, req.notes)
        .await?)
}

/// Delete an enrollment together with its progress
#[utoipa::path(
    delete,
    path = "/api/v1/enrollments/{id}",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Unknown enrollment")
    ),
    security(("bearer_auth" = [])),
    tag = "Administration"
)]
pub async fn delete_enrollment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EnrollmentId>,
) -> ApiResult<EnrollmentId> {
    state.enrollments.delete(id).await?;
    ok(id)
}
