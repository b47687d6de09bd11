//! Client for the Melhor Envio rate calculator.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::errors::ServiceError;

/// Parcel dimensions in centimetres; every cart ships as the same envelope
pub const PARCEL_WIDTH_CM: u32 = 14;
pub const PARCEL_HEIGHT_CM: u32 = 2;
pub const PARCEL_LENGTH_CM: u32 = 20;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostalCodeRef {
    pub postal_code: String,
}

/// One product line of a rate request. Weight is in kilograms.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateProduct {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub length: u32,
    pub weight: f64,
    pub insurance_value: f64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateOptions {
    pub own_hand: bool,
    pub receipt: bool,
    pub insurance_value: f64,
}

impl Default for RateOptions {
    fn default() -> Self {
        Self {
            own_hand: false,
            receipt: false,
            insurance_value: 0.0,
        }
    }
}

/// Body of `POST /me/shipment/calculate`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateRequest {
    pub from: PostalCodeRef,
    pub to: PostalCodeRef,
    pub products: Vec<RateProduct>,
    pub options: RateOptions,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct RawCompany {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// One entry of the aggregator's answer, kept close to the wire format
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct RawQuote {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Sent as a string ("15.00") by the live API
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub delivery_time: Option<i32>,
    #[serde(default)]
    pub company: Option<RawCompany>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Shipping rate aggregator seam
#[async_trait]
pub trait RateAggregator: Send + Sync {
    async fn calculate(&self, request: &RateRequest) -> Result<Vec<RawQuote>, ServiceError>;
}

#[derive(Clone)]
pub struct MelhorEnvioClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl MelhorEnvioClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client error: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(cfg: &crate::config::AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            cfg.shipping_api_url.clone(),
            cfg.shipping_api_token.clone(),
            &cfg.shipping_user_agent,
            cfg.http_timeout(),
        )
    }
}

#[async_trait]
impl RateAggregator for MelhorEnvioClient {
    #[instrument(skip_all, fields(to = %request.to.postal_code, products = request.products.len()))]
    async fn calculate(&self, request: &RateRequest) -> Result<Vec<RawQuote>, ServiceError> {
        let url = format!("{}/me/shipment/calculate", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::ShippingUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "rate aggregator returned an error");
            return Err(ServiceError::ShippingUnavailable(format!(
                "aggregator answered {status}"
            )));
        }

        let entries: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ServiceError::ShippingUnavailable(format!("unparsable response: {e}")))?;

        let quotes: Vec<RawQuote> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<RawQuote>(entry) {
                Ok(quote) => Some(quote),
                Err(e) => {
                    debug!(error = %e, "skipping malformed quote entry");
                    None
                }
            })
            .collect();

        Ok(quotes)
    }
}
