//! Bearer token authentication
//!
//! Tokens are issued by the platform's auth service (HS256, shared secret).
//! The middleware turns a valid token into a [`Caller`] request extension.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::state::AppState;
use crate::core_types::{Caller, Role};
use crate::error::CoreError;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn into_caller(self) -> Result<Caller, CoreError> {
        let account_id = Uuid::parse_str(&self.sub)
            .map_err(|_| CoreError::Unauthorized("Invalid token subject".to_string()))?;
        let caller = Caller::new(account_id, &self.email, self.role);
        Ok(match self.name {
            Some(name) => caller.with_name(name),
            None => caller,
        })
    }
}

pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Caller, CoreError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|_| CoreError::Unauthorized("Invalid or expired token".to_string()))?;
        data.claims.into_caller()
    }

    /// Sign a token for `caller` (development tooling and tests)
    pub fn issue(&self, caller: &Caller, ttl: Duration) -> Result<String, CoreError> {
        let now = Utc::now();
        let claims = Claims {
            sub: caller.account_id.to_string(),
            email: caller.email.clone(),
            role: caller.role,
            name: caller.name.clone(),
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::Storage(format!("Failed to sign token: {}", e)))
    }
}

fn bearer_token(request: &Request<Body>) -> Result<&str, CoreError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| CoreError::Unauthorized("Missing Authorization header".to_string()))?;
    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| CoreError::Unauthorized("Invalid token format".to_string()))
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, CoreError> {
    let caller = state.tokens.verify(bearer_token(&request)?)?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Runs inside [`jwt_auth_middleware`]
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, CoreError> {
    match request.extensions().get::<Caller>() {
        Some(caller) if caller.is_admin() => Ok(next.run(request).await),
        Some(_) => Err(CoreError::access_denied("Administrator role required")),
        None => Err(CoreError::Unauthorized("Authentication required".to_string())),
    }
}
