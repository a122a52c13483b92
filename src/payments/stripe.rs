//! Stripe Checkout client over the REST API

use super::{CheckoutRequest, CheckoutSession, PaymentError, PaymentGateway};
use async_trait::async_trait;

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Form fields in the provider's bracketed encoding
    fn form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let item = &request.line_item;
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("client_reference_id".to_string(), request.client_reference_id.clone()),
            ("line_items[0][quantity]".to_string(), item.quantity.to_string()),
            ("line_items[0][price_data][currency]".to_string(), request.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), item.unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), item.name.clone()),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                item.description.clone(),
            ),
        ];
        for (i, image) in item.images.iter().enumerate() {
            form.push((
                format!("line_items[0][price_data][product_data][images][{}]", i),
                image.clone(),
            ));
        }
        form
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        tracing::debug!(reference = %request.client_reference_id, "creating checkout session");

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&Self::form(&request))
            .send()
            .await
            .map_err(|e| PaymentError::Provider(format!("checkout request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(format!(
                "checkout session rejected ({status}): {error}"
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| PaymentError::Provider(format!("failed to parse checkout session: {e}")))
    }
}
