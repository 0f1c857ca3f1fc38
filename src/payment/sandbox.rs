//! Sandbox provider for development and tests
//!
//! Keeps charges in memory. Webhooks use the Paystack envelope signed with
//! [`SANDBOX_WEBHOOK_SECRET`] regardless of the kind being impersonated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use super::paystack::{self, CHARGE_SUCCESS};
use super::reference::generate_reference;
use super::signature::paystack_signature;
use super::types::{
    Checkout, CheckoutRequest, PaymentError, PaymentEvent, ProviderKind, Verification,
};
use super::{PaymentProvider, to_minor_units};
use crate::catalog::Money;

pub const SANDBOX_WEBHOOK_SECRET: &str = "sandbox_webhook_secret";

#[derive(Debug, Clone)]
enum Charge {
    Pending(Money),
    Paid(Money, DateTime<Utc>),
    Declined(String),
}

pub struct SandboxProvider {
    kind: ProviderKind,
    charges: DashMap<String, Charge>,
    /// Settle pending charges on first verify
    auto_settle: AtomicBool,
    unavailable: AtomicBool,
    initialize_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl SandboxProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            charges: DashMap::new(),
            auto_settle: AtomicBool::new(true),
            unavailable: AtomicBool::new(false),
            initialize_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }

    /// Record `reference` as paid with `amount`
    pub fn settle(&self, reference: &str, amount: Money) {
        self.charges
            .insert(reference.to_string(), Charge::Paid(amount, Utc::now()));
    }

    pub fn decline(&self, reference: &str, reason: &str) {
        self.charges
            .insert(reference.to_string(), Charge::Declined(reason.to_string()));
    }

    pub fn set_auto_settle(&self, enabled: bool) {
        self.auto_settle.store(enabled, Ordering::SeqCst);
    }

    /// Simulate a provider outage (every call fails as unavailable)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn initialize_count(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn verify_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Signed `charge.success` webhook for `event`: returns (body, signature)
    pub fn webhook(&self, event: &PaymentEvent) -> Result<(Vec<u8>, String), PaymentError> {
        let body = serde_json::json!({
            "event": CHARGE_SUCCESS,
            "data": {
                "reference": event.reference,
                "status": "success",
                "amount": to_minor_units(event.amount.amount)?,
                "currency": event.amount.currency,
                "paid_at": event.paid_at.to_rfc3339(),
                "customer": {"email": event.email},
                "metadata": {
                    "program_id": event.program_id,
                    "account_id": event.account_id,
                    "email": event.email,
                }
            }
        })
        .to_string()
        .into_bytes();
        let signature = paystack_signature(SANDBOX_WEBHOOK_SECRET, &body)?;
        Ok((body, signature))
    }

    fn check_available(&self) -> Result<(), PaymentError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable("sandbox provider offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for SandboxProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn signature_header(&self) -> &'static str {
        paystack::SIGNATURE_HEADER
    }

    async fn initialize(&self, req: &CheckoutRequest) -> Result<Checkout, PaymentError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let reference = match self.kind {
            ProviderKind::Paystack => generate_reference(),
            ProviderKind::Stripe => format!("cs_test_{}", Uuid::new_v4().simple()),
        };
        self.charges
            .insert(reference.clone(), Charge::Pending(req.amount.clone()));

        Ok(Checkout {
            provider: self.kind,
            redirect_url: format!(
                "{}/payment/sandbox?reference={}&program={}",
                req.callback_base_url, reference, req.program_id
            ),
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, PaymentError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let Some(mut charge) = self.charges.get_mut(reference) else {
            return Ok(Verification::Failed {
                reason: "Transaction not found".to_string(),
            });
        };

        if let Charge::Pending(amount) = charge.value().clone() {
            if !self.auto_settle.load(Ordering::SeqCst) {
                return Ok(Verification::Failed {
                    reason: "Payment not completed".to_string(),
                });
            }
            *charge = Charge::Paid(amount, Utc::now());
        }

        Ok(match charge.value() {
            Charge::Paid(amount, paid_at) => Verification::Paid {
                amount: amount.clone(),
                paid_at: *paid_at,
            },
            Charge::Declined(reason) => Verification::Failed {
                reason: reason.clone(),
            },
            Charge::Pending(_) => Verification::Failed {
                reason: "Payment not completed".to_string(),
            },
        })
    }

    fn parse_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<PaymentEvent>, PaymentError> {
        paystack::parse_signed_event(SANDBOX_WEBHOOK_SECRET, self.kind, body, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: &str) -> Money {
        Money::new(amount.parse().unwrap(), "USD")
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            program_id: Uuid::new_v4(),
            program_title: "Python Bootcamp".to_string(),
            amount: usd("349"),
            email: "ada@example.com".to_string(),
            account_id: None,
            callback_base_url: "http://localhost:3000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_initialize_then_verify_settles() {
        let sandbox = SandboxProvider::new(ProviderKind::Paystack);
        let checkout = sandbox.initialize(&request()).await.unwrap();
        assert!(checkout.reference.starts_with("PE_"));

        let v = sandbox.verify(&checkout.reference).await.unwrap();
        assert!(v.is_paid());
        assert_eq!(sandbox.verify_count(), 1);
    }

    #[tokio::test]
    async fn test_pending_without_auto_settle_fails() {
        let sandbox = SandboxProvider::new(ProviderKind::Stripe);
        sandbox.set_auto_settle(false);
        let checkout = sandbox.initialize(&request()).await.unwrap();
        assert!(checkout.reference.starts_with("cs_test_"));
        assert!(!sandbox.verify(&checkout.reference).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_declined_and_unknown() {
        let sandbox = SandboxProvider::new(ProviderKind::Paystack);
        sandbox.decline("PE_bad", "Insufficient funds");
        assert_eq!(
            sandbox.verify("PE_bad").await.unwrap(),
            Verification::Failed {
                reason: "Insufficient funds".to_string()
            }
        );
        assert!(!sandbox.verify("PE_missing").await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let sandbox = SandboxProvider::new(ProviderKind::Paystack);
        sandbox.set_unavailable(true);
        assert!(matches!(
            sandbox.verify("PE_1").await,
            Err(PaymentError::Unavailable(_))
        ));
        assert!(matches!(
            sandbox.initialize(&request()).await,
            Err(PaymentError::Unavailable(_))
        ));
    }

    #[test]
    fn test_webhook_roundtrip() {
        let sandbox = SandboxProvider::new(ProviderKind::Paystack);
        let event = PaymentEvent {
            provider: ProviderKind::Paystack,
            reference: "PE_999".to_string(),
            program_id: Uuid::new_v4(),
            account_id: Some(Uuid::new_v4()),
            email: "ada@example.com".to_string(),
            amount: usd("349.00"),
            paid_at: Utc::now(),
        };
        let (body, sig) = sandbox.webhook(&event).unwrap();
        let parsed = sandbox.parse_webhook(&body, Some(&sig)).unwrap().unwrap();
        assert_eq!(parsed.reference, event.reference);
        assert_eq!(parsed.program_id, event.program_id);
        assert_eq!(parsed.account_id, event.account_id);
        assert_eq!(parsed.amount, event.amount);
    }
}
