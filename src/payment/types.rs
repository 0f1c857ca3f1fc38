//! Payment provider contract types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

use crate::catalog::Money;
use crate::core_types::{AccountId, ProgramId};
use crate::error::CoreError;

/// Supported external payment providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Paystack,
    Stripe,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Paystack => "paystack",
            ProviderKind::Stripe => "stripe",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paystack" => Ok(ProviderKind::Paystack),
            "stripe" => Ok(ProviderKind::Stripe),
            _ => Err(format!("Unsupported payment provider: {}", s)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("{0} is not configured")]
    NotConfigured(ProviderKind),

    /// Timeout, connection failure or provider-side 5xx
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed provider payload: {0}")]
    Malformed(String),
}

impl From<PaymentError> for CoreError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotConfigured(_) | PaymentError::Unavailable(_) => {
                CoreError::ProviderUnavailable(e.to_string())
            }
            PaymentError::Declined(msg) => CoreError::PaymentVerification(msg),
            PaymentError::Malformed(msg) => CoreError::PaymentVerification(msg),
            PaymentError::InvalidSignature => CoreError::Validation(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PaymentError::Unavailable("request timed out".to_string())
        } else if e.is_decode() {
            PaymentError::Malformed(e.to_string())
        } else {
            PaymentError::Unavailable(e.to_string())
        }
    }
}

/// Input to `initialize`
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub program_id: ProgramId,
    pub program_title: String,
    pub amount: Money,
    pub email: String,
    pub account_id: Option<AccountId>,
    /// Frontend base URL the provider redirects back to
    pub callback_base_url: String,
}

/// Result of `initialize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Checkout {
    pub provider: ProviderKind,
    /// Idempotence key for verification and webhooks
    pub reference: String,
    pub redirect_url: String,
}

/// Result of `verify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Paid {
        amount: Money,
        paid_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

impl Verification {
    pub fn is_paid(&self) -> bool {
        matches!(self, Verification::Paid { .. })
    }
}

/// Successful charge reported through a signed webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub provider: ProviderKind,
    pub reference: String,
    pub program_id: ProgramId,
    pub account_id: Option<AccountId>,
    pub email: String,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

/// Metadata attached at initialization and echoed back by webhooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    #[serde(alias = "programId")]
    pub program_id: ProgramId,
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    /// Falls back to the provider's customer email when empty
    #[serde(default)]
    pub email: String,
}

impl CheckoutMetadata {
    pub fn from_request(req: &CheckoutRequest) -> Self {
        Self {
            program_id: req.program_id,
            account_id: req.account_id,
            email: req.email.clone(),
        }
    }
}
