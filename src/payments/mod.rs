//! Hosted checkout: the provider seam, its Stripe client and webhook
//! verification

#[cfg(feature = "stripe")]
pub mod stripe;
pub mod webhook;

#[cfg(feature = "stripe")]
pub use stripe::StripeGateway;
pub use webhook::{CompletedCheckout, WebhookEvent, WebhookVerifier};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PaymentsConfig;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payments are not configured on this server")]
    NotConfigured,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Webhook error: {0}")]
    Webhook(String),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::Provider(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Webhook(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PaymentError::NotConfigured => "PAYMENTS_NOT_CONFIGURED",
            PaymentError::Provider(_) => "PAYMENT_PROVIDER_ERROR",
            PaymentError::Webhook(_) => "WEBHOOK_ERROR",
        }
    }
}

/// The single product being bought
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    /// Price in the smallest currency unit (cents)
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRequest {
    pub customer_email: String,
    /// Echoed back by the provider on completion; holds the tour id
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    pub line_item: LineItem,
}

/// A provider-hosted checkout page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

/// Gateway used when no provider key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_checkout_session(
        &self,
        _request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}

/// Pick the gateway the configuration allows
pub fn gateway_from_config(config: &PaymentsConfig) -> Arc<dyn PaymentGateway> {
    match provider_gateway(config) {
        Some(gateway) => gateway,
        None => {
            tracing::warn!("No payment provider key configured; checkout is disabled");
            Arc::new(UnconfiguredGateway)
        }
    }
}

#[cfg(feature = "stripe")]
fn provider_gateway(config: &PaymentsConfig) -> Option<Arc<dyn PaymentGateway>> {
    let key = config.secret_key.as_ref()?;
    Some(Arc::new(StripeGateway::new(key.clone(), config.api_base.clone())))
}

#[cfg(not(feature = "stripe"))]
fn provider_gateway(_config: &PaymentsConfig) -> Option<Arc<dyn PaymentGateway>> {
    None
}

/// Convert a price in currency units to the smallest unit
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
