pub mod paypal;
pub mod stripe;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use paypal::PayPalGateway;
use stripe::StripeGateway;

/// Payment providers accepted at checkout completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Paypal,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paypal => "paypal",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentProvider::Stripe),
            "paypal" => Ok(PaymentProvider::Paypal),
            _ => Err(()),
        }
    }
}

/// Failure talking to a provider's read API. Never crosses the verifier
/// boundary: callers see `ServiceError::PaymentVerificationFailed` instead.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Converts a major-unit amount to minor units: `round(amount * 100)`, with
/// half-cents rounding away from zero (`Decimal::round` alone is banker's
/// rounding and would turn 0.005 into 0).
///
/// Returns `None` when the result does not fit in an `i64`, which for any
/// plausible order total means the stored amount is corrupt.
pub(crate) fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Confirms against the provider's API that a payment is complete and was
/// captured for exactly the checkout total. Providers never act as the source
/// of truth for the amount owed; the stored checkout total does.
pub struct PaymentVerifier {
    stripe: Arc<dyn StripeGateway>,
    paypal: Arc<dyn PayPalGateway>,
}

impl PaymentVerifier {
    pub fn new(stripe: Arc<dyn StripeGateway>, paypal: Arc<dyn PayPalGateway>) -> Self {
        Self { stripe, paypal }
    }

    /// Verifies that `payment_id` names a completed payment for exactly
    /// `expected_total` (major currency units) at the given provider.
    #[instrument(skip(self), fields(provider = %provider, payment_id = %payment_id))]
    pub async fn verify(
        &self,
        provider: PaymentProvider,
        payment_id: &str,
        expected_total: Decimal,
    ) -> Result<(), ServiceError> {
        match provider {
            PaymentProvider::Stripe => self.verify_stripe(payment_id, expected_total).await,
            PaymentProvider::Paypal => self.verify_paypal(payment_id, expected_total).await,
        }
    }

    async fn verify_stripe(
        &self,
        payment_id: &str,
        expected_total: Decimal,
    ) -> Result<(), ServiceError> {
        let intent = self
            .stripe
            .retrieve_payment_intent(payment_id)
            .await
            .map_err(|e| {
                error!(error = %e, "stripe payment intent lookup failed");
                ServiceError::PaymentVerificationFailed
            })?;

        if intent.status != stripe::STRIPE_STATUS_SUCCEEDED {
            return Err(ServiceError::PaymentFailed(format!(
                "Payment not completed. Status: {}",
                intent.status
            )));
        }

        let expected_minor = to_minor_units(expected_total).ok_or_else(|| {
            error!(%expected_total, "checkout total not representable in minor units");
            ServiceError::PaymentVerificationFailed
        })?;

        if intent.amount != expected_minor {
            warn!(
                expected = expected_minor,
                reported = intent.amount,
                "stripe amount mismatch"
            );
            return Err(ServiceError::PaymentFailed(
                "Payment amount mismatch".to_string(),
            ));
        }

        Ok(())
    }

    async fn verify_paypal(
        &self,
        payment_id: &str,
        expected_total: Decimal,
    ) -> Result<(), ServiceError> {
        let order = self.paypal.get_order(payment_id).await.map_err(|e| {
            error!(error = %e, "paypal order lookup failed");
            ServiceError::PaymentVerificationFailed
        })?;

        if order.status != paypal::PAYPAL_STATUS_COMPLETED {
            return Err(ServiceError::PaymentFailed(format!(
                "Payment not completed. Status: {}",
                order.status
            )));
        }

        let raw = order.first_capture_amount().ok_or_else(|| {
            error!("paypal order has no capture amount");
            ServiceError::PaymentVerificationFailed
        })?;
        let captured = Decimal::from_str(raw).map_err(|e| {
            error!(error = %e, raw, "paypal capture amount is not a decimal");
            ServiceError::PaymentVerificationFailed
        })?;

        if captured != expected_total {
            warn!(
                expected = %expected_total,
                reported = %captured,
                "paypal amount mismatch"
            );
            return Err(ServiceError::PaymentFailed(
                "Payment amount mismatch".to_string(),
            ));
        }

        Ok(())
    }
}

/// Mockall doubles for the gateway traits, shared by service-level tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::paypal::{PayPalGateway, PayPalOrder};
    use super::stripe::{PaymentIntent, StripeGateway};
    use super::GatewayError;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub StripeGw {}

        #[async_trait]
        impl StripeGateway for StripeGw {
            async fn retrieve_payment_intent(
                &self,
                payment_id: &str,
            ) -> Result<PaymentIntent, GatewayError>;
        }
    }

    mock! {
        pub PayPalGw {}

        #[async_trait]
        impl PayPalGateway for PayPalGw {
            async fn get_order(&self, order_id: &str) -> Result<PayPalOrder, GatewayError>;
        }
    }
}
