//! Payment Gateway Adapter
//!
//! Normalizes the external payment providers behind [`PaymentProvider`]:
//! `initialize` obtains a redirect target, `verify` asks the provider whether a
//! reference was paid, `parse_webhook` authenticates and decodes pushed events.
//!
//! Provider calls carry an explicit client timeout. A timeout or transport
//! failure surfaces as [`PaymentError::Unavailable`], never as a declined
//! payment.

pub mod paystack;
pub mod reference;
#[cfg(any(test, feature = "mock-api"))]
pub mod sandbox;
pub mod signature;
pub mod stripe;
pub mod types;

pub use paystack::PaystackProvider;
pub use reference::generate_reference;
#[cfg(any(test, feature = "mock-api"))]
pub use sandbox::SandboxProvider;
pub use stripe::StripeProvider;
pub use types::{
    Checkout, CheckoutMetadata, CheckoutRequest, PaymentError, PaymentEvent, ProviderKind,
    Verification,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::config::PaymentsConfig;

/// External payment provider contract
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Header carrying the webhook signature
    fn signature_header(&self) -> &'static str;

    /// Start a checkout; does not touch enrollment state
    async fn initialize(&self, req: &CheckoutRequest) -> Result<Checkout, PaymentError>;

    /// Ask the provider whether `reference` was paid
    async fn verify(&self, reference: &str) -> Result<Verification, PaymentError>;

    /// Authenticate a webhook body.
    ///
    /// Returns `Ok(None)` for authentic events that do not confirm a payment.
    fn parse_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<PaymentEvent>, PaymentError>;
}

/// Public view of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProviderPublicConfig {
    #[serde(rename = "publicKey")]
    pub public_key: Option<String>,
    pub enabled: bool,
}

/// Response of `GET /payments/config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentPublicConfig {
    pub paystack: ProviderPublicConfig,
    pub stripe: ProviderPublicConfig,
    #[serde(rename = "defaultProvider")]
    pub default_provider: String,
}

/// Registry of configured providers
pub struct PaymentGateway {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
    public_keys: HashMap<ProviderKind, String>,
    default_provider: ProviderKind,
}

impl PaymentGateway {
    pub fn new(default_provider: ProviderKind) -> Self {
        Self {
            providers: HashMap::new(),
            public_keys: HashMap::new(),
            default_provider,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn with_public_key(mut self, kind: ProviderKind, key: impl Into<String>) -> Self {
        self.public_keys.insert(kind, key.into());
        self
    }

    /// Build from configuration. Providers without a secret key stay
    /// unregistered and report `NotConfigured` on use.
    pub fn from_config(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mut gateway = Self::new(config.default_provider);

        if let Some(key) = &config.paystack.public_key {
            gateway = gateway.with_public_key(ProviderKind::Paystack, key);
        }
        if let Some(key) = &config.stripe.public_key {
            gateway = gateway.with_public_key(ProviderKind::Stripe, key);
        }

        #[cfg(feature = "mock-api")]
        if config.sandbox {
            tracing::warn!("Payment sandbox enabled: no real charges will be made");
            return Ok(gateway
                .with_provider(Arc::new(SandboxProvider::new(ProviderKind::Paystack)))
                .with_provider(Arc::new(SandboxProvider::new(ProviderKind::Stripe))));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        if let Some(secret) = &config.paystack.secret_key {
            gateway = gateway.with_provider(Arc::new(PaystackProvider::new(
                client.clone(),
                &config.paystack.base_url,
                secret,
            )));
        }
        if let Some(secret) = &config.stripe.secret_key {
            gateway = gateway.with_provider(Arc::new(StripeProvider::new(
                client,
                &config.stripe.base_url,
                secret,
                config.stripe.webhook_secret.clone(),
            )));
        }

        tracing::info!(
            paystack = gateway.is_enabled(ProviderKind::Paystack),
            stripe = gateway.is_enabled(ProviderKind::Stripe),
            timeout_secs = config.timeout_secs,
            "Payment gateway configured"
        );
        Ok(gateway)
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or(PaymentError::NotConfigured(kind))
    }

    pub fn public_config(&self) -> PaymentPublicConfig {
        let view = |kind: ProviderKind| ProviderPublicConfig {
            public_key: self.public_keys.get(&kind).cloned(),
            enabled: self.is_enabled(kind),
        };
        PaymentPublicConfig {
            paystack: view(ProviderKind::Paystack),
            stripe: view(ProviderKind::Stripe),
            default_provider: self.default_provider.to_string(),
        }
    }
}

/// Amount in minor units (kobo/cents)
pub(crate) fn to_minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| PaymentError::Malformed(format!("Amount out of range: {}", amount)))
}

pub(crate) fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units("349.00".parse().unwrap()).unwrap(), 34900);
        assert_eq!(to_minor_units("19.999".parse().unwrap()).unwrap(), 2000);
        assert_eq!(from_minor_units(34900), "349.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_unconfigured_provider() {
        let gateway = PaymentGateway::new(ProviderKind::Paystack);
        assert_eq!(
            gateway.provider(ProviderKind::Stripe).err(),
            Some(PaymentError::NotConfigured(ProviderKind::Stripe))
        );
        let public = gateway.public_config();
        assert!(!public.paystack.enabled);
        assert!(!public.stripe.enabled);
    }

    #[test]
    fn test_from_config_registers_keyed_providers() {
        let mut config = PaymentsConfig::default();
        config.paystack.secret_key = Some("sk_test".into());
        config.paystack.public_key = Some("pk_test".into());

        let gateway = PaymentGateway::from_config(&config).unwrap();
        assert!(gateway.is_enabled(ProviderKind::Paystack));
        assert!(!gateway.is_enabled(ProviderKind::Stripe));

        let public = gateway.public_config();
        assert_eq!(public.paystack.public_key.as_deref(), Some("pk_test"));
        assert_eq!(public.default_provider, "paystack");
    }

    #[cfg(feature = "mock-api")]
    #[test]
    fn test_sandbox_registers_both() {
        let config = PaymentsConfig {
            sandbox: true,
            ..Default::default()
        };
        let gateway = PaymentGateway::from_config(&config).unwrap();
        assert!(gateway.is_enabled(ProviderKind::Paystack));
        assert!(gateway.is_enabled(ProviderKind::Stripe));
    }
}
