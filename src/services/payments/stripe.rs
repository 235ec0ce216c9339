use async_trait::async_trait;
use serde::Deserialize;

use super::GatewayError;
use crate::config::StripeConfig;

/// Stripe's terminal success status for a payment intent.
pub const STRIPE_STATUS_SUCCEEDED: &str = "succeeded";

/// Subset of the Stripe payment-intent object the verifier needs.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    /// Amount in minor units (cents for USD).
    pub amount: i64,
}

/// Read-only view of Stripe used by the verifier. Injected so tests can
/// substitute a fake.
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn retrieve_payment_intent(
        &self,
        payment_id: &str,
    ) -> Result<PaymentIntent, GatewayError>;
}

pub struct StripeHttpClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeHttpClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        }
    }
}

#[async_trait]
impl StripeGateway for StripeHttpClient {
    async fn retrieve_payment_intent(
        &self,
        payment_id: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let url = format!("{}/v1/payment_intents/{}", self.api_base, payment_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}
