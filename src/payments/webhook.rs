//! Signed webhook payloads
//!
//! The provider signs `"{timestamp}.{body}"` with HMAC-SHA256 and sends
//! `t=<timestamp>,v1=<hex signature>[,v1=...]` in the `stripe-signature`
//! header.

use super::PaymentError;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

/// The session object of a `checkout.session.completed` event
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedCheckout {
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    /// Amount paid in the smallest currency unit
    pub amount_total: Option<i64>,
}

impl CompletedCheckout {
    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
    }
}

impl WebhookEvent {
    /// The completed checkout session, when this event carries one
    pub fn completed_checkout(&self) -> Result<Option<CompletedCheckout>, PaymentError> {
        if self.kind != CHECKOUT_COMPLETED {
            return Ok(None);
        }
        serde_json::from_value(self.data.object.clone())
            .map(Some)
            .map_err(|e| PaymentError::Webhook(format!("malformed checkout session: {}", e)))
    }
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, PaymentError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Webhook(format!("unusable webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Header value signing `payload` at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, PaymentError> {
        let signature = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
    }

    /// Check `header` against `payload` as of `now` (unix seconds)
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), PaymentError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let Some(timestamp) = timestamp.filter(|_| !signatures.is_empty()) else {
            return Err(PaymentError::Webhook(
                "Unable to extract timestamp and signatures from header".into(),
            ));
        };

        let matched = signatures.iter().any(|candidate| {
            let Ok(bytes) = hex::decode(candidate) else {
                return false;
            };
            self.mac(timestamp, payload)
                .is_ok_and(|mac| mac.verify_slice(&bytes).is_ok())
        });
        if !matched {
            return Err(PaymentError::Webhook(
                "No signatures found matching the expected signature for payload".into(),
            ));
        }

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(PaymentError::Webhook("Timestamp outside the tolerance zone".into()));
        }
        Ok(())
    }

    /// Verify the signature and parse the event
    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<WebhookEvent, PaymentError> {
        self.verify_at(payload, header, Utc::now().timestamp())?;
        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::Webhook(format!("malformed event payload: {}", e)))
    }
}
