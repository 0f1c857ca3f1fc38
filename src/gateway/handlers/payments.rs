//! Payment initialization, verification and provider webhooks

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::core_types::{Caller, ProgramId};
use crate::enrollment::Enrollment;
use crate::error::CoreError;
use crate::payment::{Checkout, PaymentPublicConfig, ProviderKind};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    #[schema(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
    /// Defaults to the configured provider
    #[serde(default)]
    pub provider: Option<ProviderKind>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    #[param(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StripeVerifyRequest {
    pub session_id: String,
    #[schema(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// recorded | duplicate | reason the event was ignored
    pub outcome: String,
}

/// Enabled providers and their publishable keys
#[utoipa::path(
    get,
    path = "/api/v1/payments/config",
    responses(
        (status = 200, description = "Provider configuration", body = PaymentPublicConfig)
    ),
    tag = "Payments"
)]
pub async fn payment_config(State(state): State<Arc<AppState>>) -> ApiResult<PaymentPublicConfig> {
    ok(state.enrollments.payments().public_config())
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/initialize",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Checkout redirect", body = Checkout),
        (status = 400, description = "Already enrolled"),
        (status = 404, description = "Unknown program"),
        (status = 503, description = "Provider unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initialize_payment(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<InitializePaymentRequest>,
) -> ApiResult<Checkout> {
    ok(state
        .enrollments
        .initialize_payment(&caller, req.program_id, req.provider)
        .await?)
}

/// Browser return from Paystack
#[utoipa::path(
    get,
    path = "/api/v1/payments/verify/paystack/{reference}",
    params(
        ("reference" = String, Path, description = "Transaction reference"),
        VerifyQuery
    ),
    responses(
        (status = 200, description = "Confirmed enrollment", body = Enrollment),
        (status = 400, description = "Verification failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_paystack(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(reference): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Enrollment> {
    ok(state
        .enrollments
        .verify_payment(&caller, ProviderKind::Paystack, &reference, query.program_id)
        .await?)
}

/// Browser return from Stripe Checkout
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify/stripe",
    request_body = StripeVerifyRequest,
    responses(
        (status = 200, description = "Confirmed enrollment", body = Enrollment),
        (status = 400, description = "Verification failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_stripe(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<StripeVerifyRequest>,
) -> ApiResult<Enrollment> {
    ok(state
        .enrollments
        .verify_payment(&caller, ProviderKind::Stripe, &req.session_id, req.program_id)
        .await?)
}

/// Signed provider notification. The raw body is needed for the signature.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook/{provider}",
    params(("provider" = String, Path, description = "paystack | stripe")),
    request_body(content = String, content_type = "application/json", description = "Raw provider event"),
    responses(
        (status = 200, description = "Acknowledged", body = WebhookAck),
        (status = 400, description = "Bad signature or unknown provider")
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookAck> {
    let kind: ProviderKind = provider.parse().map_err(CoreError::Validation)?;
    let header = state.enrollments.payments().provider(kind)?.signature_header();
    let signature = headers.get(header).and_then(|v| v.to_str().ok());

    let outcome = state
        .enrollments
        .handle_webhook(kind, &body, signature)
        .await?;
    debug!(provider = %kind, outcome = outcome.as_str(), "Webhook acknowledged");
    ok(WebhookAck {
        received: true,
        outcome: outcome.as_str().to_string(),
    })
}
