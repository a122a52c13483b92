//! Session tokens, the cookie that carries them, and password-reset tokens

use crate::core::error::{AppError, AppResult};
use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

pub const COOKIE_NAME: &str = "jwt";
pub const LOGGED_OUT: &str = "loggedout";
const LOGOUT_COOKIE_SECS: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies HS256 session tokens
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    expires_in: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, expires_in_days: i64) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            expires_in: Duration::days(expires_in_days),
        }
    }

    pub fn sign(&self, user_id: &Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            id: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expires_in).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

// =============================================================================
// Cookies
// =============================================================================

/// Whether the client reached us over HTTPS (directly or via a proxy)
pub fn is_secure(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

pub fn session_cookie(token: &str, max_age_days: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        COOKIE_NAME,
        token,
        Duration::days(max_age_days).num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Replaces the session cookie with a placeholder that expires in seconds
pub fn logout_cookie() -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        COOKIE_NAME, LOGGED_OUT, LOGOUT_COOKIE_SECS
    )
}

/// Value of cookie `name` across every `Cookie` header
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Token from `Authorization: Bearer`, falling back to the session cookie
pub fn request_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| {
        cookie_value(headers, COOKIE_NAME).filter(|t| !t.is_empty() && *t != LOGGED_OUT)
    })
}

// =============================================================================
// Password reset tokens
// =============================================================================

/// A reset token: `plain` goes to the user, only `digest` is stored
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub plain: String,
    pub digest: String,
}

pub fn reset_token() -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);
    ResetToken {
        digest: digest(&plain),
        plain,
    }
}

pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
