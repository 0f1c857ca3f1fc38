//! Stripe Checkout client
//!
//! The checkout session id is the provider reference. A session is paid iff
//! `payment_status == "paid"`; `amount_total` is in minor units.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::signature::verify_stripe;
use super::types::{
    Checkout, CheckoutMetadata, CheckoutRequest, PaymentError, PaymentEvent, ProviderKind,
    Verification,
};
use super::{PaymentProvider, from_minor_units, to_minor_units};
use crate::catalog::Money;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const SESSION_COMPLETED: &str = "checkout.session.completed";

pub struct StripeProvider {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Session {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: serde_json::Value,
}

impl Session {
    fn money(&self) -> Option<Money> {
        let minor = self.amount_total?;
        let currency = self.currency.as_deref()?;
        Some(Money::new(from_minor_units(minor), currency))
    }

    fn metadata(&self) -> Option<CheckoutMetadata> {
        let program_id = self
            .metadata
            .get("program_id")
            .or_else(|| self.metadata.get("programId"))?
            .parse()
            .ok()?;
        let account_id = self
            .metadata
            .get("account_id")
            .or_else(|| self.metadata.get("userId"))
            .and_then(|v| v.parse().ok());
        let email = self
            .metadata
            .get("email")
            .cloned()
            .or_else(|| self.customer_email.clone())
            .unwrap_or_default();
        Some(CheckoutMetadata {
            program_id,
            account_id,
            email,
        })
    }
}

impl StripeProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        secret_key: &str,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            webhook_secret,
        }
    }

    async fn read_session(response: reqwest::Response) -> Result<Result<Session, String>, PaymentError> {
        let status = response.status();
        if status.is_server_error() {
            return Err(PaymentError::Unavailable(format!("Stripe returned {}", status)));
        }
        if status.is_success() {
            return Ok(Ok(response.json().await?));
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.error.message)
            .unwrap_or_else(|_| format!("Stripe returned {}", status));
        Ok(Err(message))
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    fn signature_header(&self) -> &'static str {
        SIGNATURE_HEADER
    }

    async fn initialize(&self, req: &CheckoutRequest) -> Result<Checkout, PaymentError> {
        let metadata = CheckoutMetadata::from_request(req);
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                req.amount.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                to_minor_units(req.amount.amount)?.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                req.program_title.clone(),
            ),
            (
                "success_url",
                format!(
                    "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}&program={}",
                    req.callback_base_url, req.program_id
                ),
            ),
            (
                "cancel_url",
                format!("{}/payment/cancel?program={}", req.callback_base_url, req.program_id),
            ),
            ("customer_email", req.email.clone()),
            ("metadata[program_id]", metadata.program_id.to_string()),
            ("metadata[email]", metadata.email.clone()),
        ];
        if let Some(account_id) = metadata.account_id {
            form.push(("metadata[account_id]", account_id.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        match Self::read_session(response).await? {
            Ok(Session { id, url: Some(url), .. }) => {
                debug!(session = %id, "Stripe checkout session created");
                Ok(Checkout {
                    provider: ProviderKind::Stripe,
                    reference: id,
                    redirect_url: url,
                })
            }
            Ok(session) => Err(PaymentError::Malformed(format!(
                "Session {} has no redirect url",
                session.id
            ))),
            Err(message) => Err(PaymentError::Declined(message)),
        }
    }

    async fn verify(&self, reference: &str) -> Result<Verification, PaymentError> {
        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let session = match Self::read_session(response).await? {
            Ok(session) => session,
            Err(reason) => return Ok(Verification::Failed { reason }),
        };
        Ok(session_verification(&session))
    }

    fn parse_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<PaymentEvent>, PaymentError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(PaymentError::NotConfigured(ProviderKind::Stripe))?;
        let header = signature.ok_or(PaymentError::InvalidSignature)?;
        verify_stripe(secret, body, header, Utc::now().timestamp())?;

        let event: Event =
            serde_json::from_slice(body).map_err(|e| PaymentError::Malformed(e.to_string()))?;
        if event.kind != SESSION_COMPLETED {
            debug!(event = %event.kind, "Ignoring Stripe event");
            return Ok(None);
        }

        let session: Session = serde_json::from_value(event.data.object)
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;
        if session.payment_status != "paid" {
            debug!(session = %session.id, status = %session.payment_status, "Session completed but unpaid");
            return Ok(None);
        }
        let (Some(metadata), Some(amount)) = (session.metadata(), session.money()) else {
            warn!(session = %session.id, "Completed session without checkout metadata");
            return Ok(None);
        };

        Ok(Some(PaymentEvent {
            provider: ProviderKind::Stripe,
            reference: session.id,
            program_id: metadata.program_id,
            account_id: metadata.account_id,
            email: metadata.email,
            amount,
            paid_at: Utc::now(),
        }))
    }
}

fn session_verification(session: &Session) -> Verification {
    if session.payment_status != "paid" {
        return Verification::Failed {
            reason: "Payment not completed".to_string(),
        };
    }
    match session.money() {
        Some(amount) => Verification::Paid {
            amount,
            paid_at: Utc::now(),
        },
        None => Verification::Failed {
            reason: "Session has no amount".to_string(),
        },
    }
}
