//! Paystack client
//!
//! - `POST /transaction/initialize` with amount in minor units
//! - `GET /transaction/verify/{reference}`, paid iff `data.status == "success"`
//! - webhook `charge.success`, signed with `x-paystack-signature`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::reference::generate_reference;
use super::signature::verify_paystack;
use super::types::{
    Checkout, CheckoutMetadata, CheckoutRequest, PaymentError, PaymentEvent, ProviderKind,
    Verification,
};
use super::{PaymentProvider, from_minor_units, to_minor_units};
use crate::catalog::Money;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";
pub const CHARGE_SUCCESS: &str = "charge.success";

pub struct PaystackProvider {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

/// Paystack response envelope
#[derive(Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    callback_url: String,
    metadata: CheckoutMetadata,
}

#[derive(Deserialize)]
struct InitializeData {
    authorization_url: String,
}

/// Transaction as returned by verify and carried by webhooks
#[derive(Debug, Deserialize)]
pub(crate) struct Transaction {
    pub reference: String,
    pub status: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Customer {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl Transaction {
    fn paid_at(&self) -> DateTime<Utc> {
        self.paid_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }

    fn money(&self) -> Money {
        Money::new(from_minor_units(self.amount), &self.currency)
    }
}

impl PaystackProvider {
    pub fn new(client: reqwest::Client, base_url: &str, secret_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    async fn read_envelope<T>(response: reqwest::Response) -> Result<Envelope<T>, PaymentError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        if status.is_server_error() {
            return Err(PaymentError::Unavailable(format!("Paystack returned {}", status)));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Paystack
    }

    fn signature_header(&self) -> &'static str {
        SIGNATURE_HEADER
    }

    async fn initialize(&self, req: &CheckoutRequest) -> Result<Checkout, PaymentError> {
        let reference = generate_reference();
        let body = InitializeBody {
            email: &req.email,
            amount: to_minor_units(req.amount.amount)?,
            currency: &req.amount.currency,
            reference: &reference,
            callback_url: format!(
                "{}/payment/verify?reference={}&program={}",
                req.callback_base_url, reference, req.program_id
            ),
            metadata: CheckoutMetadata::from_request(req),
        };

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;
        let envelope: Envelope<InitializeData> = Self::read_envelope(response).await?;

        match envelope.data {
            Some(data) if envelope.status => {
                debug!(reference = %reference, "Paystack transaction initialized");
                Ok(Checkout {
                    provider: ProviderKind::Paystack,
                    reference,
                    redirect_url: data.authorization_url,
                })
            }
            _ => Err(PaymentError::Declined(if envelope.message.is_empty() {
                "Payment initialization failed".to_string()
            } else {
                envelope.message
            })),
        }
    }

    async fn verify(&self, reference: &str) -> Result<Verification, PaymentError> {
        let response = self
            .client
            .get(verify_url(&self.base_url, reference)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let envelope: Envelope<Transaction> = Self::read_envelope(response).await?;

        let Some(tx) = envelope.data.filter(|_| envelope.status) else {
            return Ok(Verification::Failed {
                reason: envelope.message,
            });
        };
        Ok(transaction_verification(&tx))
    }

    fn parse_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<PaymentEvent>, PaymentError> {
        parse_signed_event(&self.secret_key, ProviderKind::Paystack, body, signature)
    }
}

/// Paystack references: alphanumerics plus `-`, `.`, `=` and `_`
fn is_valid_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.chars().any(|c| c != '.')
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '=' | '_'))
}

/// `{base}/transaction/verify/{reference}` with the reference as one path segment
fn verify_url(base_url: &str, reference: &str) -> Result<reqwest::Url, PaymentError> {
    if !is_valid_reference(reference) {
        return Err(PaymentError::Declined(format!(
            "Invalid payment reference: {:?}",
            reference
        )));
    }
    let mut url = reqwest::Url::parse(base_url)
        .map_err(|e| PaymentError::Unavailable(format!("Invalid Paystack base URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| PaymentError::Unavailable("Invalid Paystack base URL".to_string()))?
        .pop_if_empty()
        .extend(["transaction", "verify", reference]);
    Ok(url)
}

fn transaction_verification(tx: &Transaction) -> Verification {
    if tx.status == "success" {
        Verification::Paid {
            amount: tx.money(),
            paid_at: tx.paid_at(),
        }
    } else {
        Verification::Failed {
            reason: tx
                .gateway_response
                .clone()
                .unwrap_or_else(|| format!("Transaction status: {}", tx.status)),
        }
    }
}

/// Verify and decode a Paystack-format webhook.
///
/// Shared with the sandbox provider, which signs its events the same way.
pub(crate) fn parse_signed_event(
    secret: &str,
    provider: ProviderKind,
    body: &[u8],
    signature: Option<&str>,
) -> Result<Option<PaymentEvent>, PaymentError> {
    let signature = signature.ok_or(PaymentError::InvalidSignature)?;
    verify_paystack(secret, body, signature)?;

    let envelope: WebhookEnvelope =
        serde_json::from_slice(body).map_err(|e| PaymentError::Malformed(e.to_string()))?;
    if envelope.event != CHARGE_SUCCESS {
        debug!(event = %envelope.event, "Ignoring Paystack event");
        return Ok(None);
    }

    let tx: Transaction =
        serde_json::from_value(envelope.data).map_err(|e| PaymentError::Malformed(e.to_string()))?;
    let Some(metadata) = tx
        .metadata
        .as_ref()
        .and_then(|m| serde_json::from_value::<CheckoutMetadata>(m.clone()).ok())
    else {
        warn!(reference = %tx.reference, "charge.success without checkout metadata");
        return Ok(None);
    };

    let email = if metadata.email.trim().is_empty() {
        tx.customer
            .as_ref()
            .and_then(|c| c.email.clone())
            .unwrap_or_default()
    } else {
        metadata.email.clone()
    };

    Ok(Some(PaymentEvent {
        provider,
        reference: tx.reference.clone(),
        program_id: metadata.program_id,
        account_id: metadata.account_id,
        email,
        amount: tx.money(),
        paid_at: tx.paid_at(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::signature::paystack_signature;
    use uuid::Uuid;

    fn provider() -> PaystackProvider {
        PaystackProvider::new(reqwest::Client::new(), "http://127.0.0.1:1/", "sk_test")
    }

    #[test]
    fn test_verify_url_keeps_reference_in_one_segment() {
        let url = verify_url("https://api.paystack.co", "PE_1735689600000_a1b2c3").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.paystack.co/transaction/verify/PE_1735689600000_a1b2c3"
        );

        let url = verify_url("http://127.0.0.1:9000/paystack", "T-1.2=").unwrap();
        assert_eq!(url.path(), "/paystack/transaction/verify/T-1.2=");
    }

    #[test]
    fn test_verify_url_rejects_path_tricks() {
        for reference in ["../customer", "..", "a/b", "PE 1", "PE_1?x=1", "%2e%2e", ""] {
            assert!(
                matches!(
                    verify_url("https://api.paystack.co", reference),
                    Err(PaymentError::Declined(_))
                ),
                "reference {:?}",
                reference
            );
        }
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_reference_without_calling_out() {
        let result = provider().verify("../customer").await;
        assert!(matches!(result, Err(PaymentError::Declined(_))));
    }

    #[test]
    fn test_verification_from_transaction() {
        let tx: Transaction = serde_json::from_str(
            r#"{"reference":"PE_1","status":"success","amount":34900,"currency":"usd","paid_at":"2025-01-02T03:04:05.000Z"}"#,
        )
        .unwrap();
        match transaction_verification(&tx) {
            Verification::Paid { amount, paid_at } => {
                assert_eq!(amount, Money::new("349.00".parse().unwrap(), "USD"));
                assert_eq!(paid_at.to_rfc3339(), "2025-01-02T03:04:05+00:00");
            }
            other => panic!("unexpected {:?}", other),
        }

        let tx: Transaction = serde_json::from_str(
            r#"{"reference":"PE_2","status":"abandoned","amount":100,"currency":"NGN"}"#,
        )
        .unwrap();
        assert!(!transaction_verification(&tx).is_paid());
    }

    #[test]
    fn test_webhook_charge_success() {
        let program_id = Uuid::new_v4();
        let body = serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": "PE_999",
                "status": "success",
                "amount": 34900,
                "currency": "USD",
                "customer": {"email": "Ada@Example.com"},
                "metadata": {"programId": program_id.to_string()}
            }
        })
        .to_string();
        let sig = paystack_signature("sk_test", body.as_bytes()).unwrap();

        let event = provider()
            .parse_webhook(body.as_bytes(), Some(&sig))
            .unwrap()
            .unwrap();
        assert_eq!(event.reference, "PE_999");
        assert_eq!(event.program_id, program_id);
        assert_eq!(event.email, "Ada@Example.com");
        assert_eq!(event.amount.amount, "349".parse().unwrap());
    }

    #[test]
    fn test_webhook_rejects_bad_signature() {
        let body = br#"{"event":"charge.success","data":{}}"#;
        assert_eq!(
            provider().parse_webhook(body, Some("00")).unwrap_err(),
            PaymentError::InvalidSignature
        );
        assert_eq!(
            provider().parse_webhook(body, None).unwrap_err(),
            PaymentError::InvalidSignature
        );
    }

    #[test]
    fn test_webhook_ignores_other_events() {
        let body = br#"{"event":"transfer.success","data":{"transfer_code":"TRF_1"}}"#;
        let sig = paystack_signature("sk_test", body).unwrap();
        assert_eq!(provider().parse_webhook(body, Some(&sig)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        let err = provider().verify("PE_1").await.unwrap_err();
        assert!(matches!(err, PaymentError::Unavailable(_)));
    }
}
