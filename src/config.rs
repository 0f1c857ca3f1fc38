use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

use crate::payment::ProviderKind;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; in-memory store when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    /// Catalog seed yaml loaded at startup
    #[serde(default)]
    pub catalog_seed: Option<String>,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Outbound provider call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Frontend base URL used in provider redirects
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    #[serde(default)]
    pub default_provider: ProviderKind,
    /// Register sandbox providers instead of real ones (mock-api builds only)
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default)]
    pub paystack: PaystackConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            callback_base_url: default_callback_base_url(),
            default_provider: ProviderKind::Paystack,
            sandbox: false,
            paystack: PaystackConfig::default(),
            stripe: StripeConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaystackConfig {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default = "default_paystack_url")]
    pub base_url: String,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            public_key: None,
            base_url: default_paystack_url(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StripeConfig {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_stripe_url")]
    pub base_url: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            public_key: None,
            webhook_secret: None,
            base_url: default_stripe_url(),
        }
    }
}

/// Mail relay collaborator
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationConfig {
    /// POST target for notification events; log-only when absent
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    /// Per-delivery timeout for the relay call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            admin_email: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_callback_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_paystack_url() -> String {
    "https://api.paystack.co".to_string()
}

fn default_stripe_url() -> String {
    "https://api.stripe.com".to_string()
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config yaml")
    }

    /// Secrets from the environment take precedence over the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABASE_URL") {
            self.postgres_url = Some(v);
        }
        if let Some(v) = get("JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = get("PAYSTACK_SECRET_KEY") {
            self.payments.paystack.secret_key = Some(v);
        }
        if let Some(v) = get("PAYSTACK_PUBLIC_KEY") {
            self.payments.paystack.public_key = Some(v);
        }
        if let Some(v) = get("STRIPE_SECRET_KEY") {
            self.payments.stripe.secret_key = Some(v);
        }
        if let Some(v) = get("STRIPE_PUBLIC_KEY") {
            self.payments.stripe.public_key = Some(v);
        }
        if let Some(v) = get("STRIPE_WEBHOOK_SECRET") {
            self.payments.stripe.webhook_secret = Some(v);
        }
    }
}
