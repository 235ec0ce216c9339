use async_trait::async_trait;
use serde::Deserialize;

use super::GatewayError;
use crate::config::PayPalConfig;

/// PayPal's terminal status for a captured order.
pub const PAYPAL_STATUS_COMPLETED: &str = "COMPLETED";

/// Subset of the PayPal order object the verifier needs.
#[derive(Clone, Debug, Deserialize)]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PurchaseUnit {
    pub payments: Option<PurchaseUnitPayments>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PurchaseUnitPayments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Capture {
    pub amount: CaptureAmount,
}

/// Major-unit decimal string, e.g. `"35.98"`.
#[derive(Clone, Debug, Deserialize)]
pub struct CaptureAmount {
    pub currency_code: String,
    pub value: String,
}

impl PayPalOrder {
    /// Amount string of the first capture in the first purchase unit.
    pub fn first_capture_amount(&self) -> Option<&str> {
        self.purchase_units
            .first()?
            .payments
            .as_ref()?
            .captures
            .first()
            .map(|c| c.amount.value.as_str())
    }
}

/// Read-only view of PayPal used by the verifier.
#[async_trait]
pub trait PayPalGateway: Send + Sync {
    async fn get_order(&self, order_id: &str) -> Result<PayPalOrder, GatewayError>;
}

pub struct PayPalHttpClient {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl PayPalHttpClient {
    pub fn new(config: &PayPalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    // TODO: cache the token until its expires_in instead of fetching per call
    async fn access_token(&self) -> Result<String, GatewayError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let url = format!("{}/v1/oauth2/token", self.api_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PayPalGateway for PayPalHttpClient {
    async fn get_order(&self, order_id: &str) -> Result<PayPalOrder, GatewayError> {
        let token = self.access_token().await?;

        let url = format!("{}/v2/checkout/orders/{}", self.api_base, order_id);
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<PayPalOrder>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_capture_amount_walks_the_nested_structure() {
        let order: PayPalOrder = serde_json::from_value(serde_json::json!({
            "id": "PAYPAL-1",
            "status": "COMPLETED",
            "purchase_units": [{
                "payments": {
                    "captures": [{
                        "amount": { "currency_code": "USD", "value": "35.98" }
                    }]
                }
            }]
        }))
        .unwrap();

        assert_eq!(order.first_capture_amount(), Some("35.98"));
    }

    #[test]
    fn first_capture_amount_is_none_without_captures() {
        let order: PayPalOrder = serde_json::from_value(serde_json::json!({
            "id": "PAYPAL-2",
            "status": "APPROVED"
        }))
        .unwrap();

        assert_eq!(order.first_capture_amount(), None);
    }
}
