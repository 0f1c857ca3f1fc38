//! Webhook signature verification
//!
//! - Paystack: hex HMAC-SHA512 of the raw body, keyed by the secret key
//! - Stripe: `t=<unix>,v1=<hex>` header, HMAC-SHA256 of `"{t}.{body}"`

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use super::types::PaymentError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Maximum age of a Stripe signature timestamp
pub const STRIPE_TOLERANCE_SECS: i64 = 300;

fn paystack_mac(secret: &str, body: &[u8]) -> Result<HmacSha512, PaymentError> {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(body);
    Ok(mac)
}

fn stripe_mac(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, PaymentError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

pub fn paystack_signature(secret: &str, body: &[u8]) -> Result<String, PaymentError> {
    Ok(hex::encode(paystack_mac(secret, body)?.finalize().into_bytes()))
}

/// Constant-time check of `x-paystack-signature`
pub fn verify_paystack(secret: &str, body: &[u8], signature: &str) -> Result<(), PaymentError> {
    let expected = hex::decode(signature.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    paystack_mac(secret, body)?
        .verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature)
}

pub fn stripe_signature(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, PaymentError> {
    Ok(hex::encode(
        stripe_mac(secret, timestamp, body)?.finalize().into_bytes(),
    ))
}

/// Check a `Stripe-Signature` header against the body at time `now` (unix secs)
pub fn verify_stripe(
    secret: &str,
    body: &[u8],
    header: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::InvalidSignature)?;
    if (now - timestamp).abs() > STRIPE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature);
    }

    for candidate in candidates {
        if stripe_mac(secret, timestamp, body)?
            .verify_slice(&candidate)
            .is_ok()
        {
            return Ok(());
        }
    }
    Err(PaymentError::InvalidSignature)
}
