//! Card processor client (Stripe REST API, form-encoded).

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Parameters for opening a payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
}

/// The part of the processor's payment intent we keep
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Payment gateway seam
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, ServiceError>;
}

/// Converts an amount in reais to integer centavos, rounding half away from zero
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::InvalidInput(format!("Valor inválido: {amount}")))
}

#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client error: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    pub fn from_config(cfg: &crate::config::AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            cfg.stripe_api_base.clone(),
            cfg.stripe_secret_key.clone(),
            cfg.http_timeout(),
        )
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self), fields(order_id = %request.order_id))]
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, ServiceError> {
        let order_id = request.order_id.to_string();
        let params = [
            ("amount", request.amount_cents.to_string()),
            ("currency", request.currency.clone()),
            ("metadata[orderId]", order_id.clone()),
            ("metadata[userId]", request.user_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", &order_id)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentFailed(format!("Stripe API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, body = %error_text, "Stripe rejected the payment intent");
            return Err(ServiceError::PaymentFailed(format!("Stripe error: {status}")));
        }

        let intent: PaymentIntent = response.json().await.map_err(|e| {
            ServiceError::PaymentFailed(format!("Failed to parse Stripe response: {e}"))
        })?;

        info!(payment_intent = %intent.id, amount = request.amount_cents, "payment intent created");
        Ok(intent)
    }
}
