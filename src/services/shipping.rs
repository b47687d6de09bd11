use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::book;
use crate::errors::ServiceError;
use crate::integrations::shipping::{
    PostalCodeRef, RateAggregator, RateOptions, RateProduct, RateRequest, RawQuote,
    PARCEL_HEIGHT_CM, PARCEL_LENGTH_CM, PARCEL_WIDTH_CM,
};
use crate::repositories::CheckoutStore;

/// A cart line as sent by the storefront. Any client-side price is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub book_id: Uuid,
    pub quantity: i32,
}

/// Body of `POST /api/shipping/calculate`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuoteRequest {
    /// Destination CEP; punctuation is ignored
    #[schema(example = "01001-000")]
    pub postal_code: String,
    pub items: Vec<CartItem>,
}

/// A normalized delivery option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub service_id: i64,
    pub name: String,
    pub carrier_name: String,
    #[schema(value_type = f64, example = 15.0)]
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub delivery_days: Option<i32>,
    pub logo_url: Option<String>,
}

/// Strips everything but digits; the result must be exactly eight digits
pub fn normalize_postal_code(raw: &str) -> Result<String, ServiceError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 8 {
        return Err(ServiceError::InvalidInput("CEP inválido".to_string()));
    }
    Ok(digits)
}

/// Rejects empty carts and non-positive quantities, then merges repeated books
/// keeping first-seen order
pub fn merge_cart(items: &[CartItem]) -> Result<Vec<CartItem>, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError("Carrinho vazio".to_string()));
    }

    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for item in items {
        if item.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantidade deve ser pelo menos 1".to_string(),
            ));
        }
        match index.get(&item.book_id) {
            Some(&at) => {
                merged[at].quantity = merged[at].quantity.checked_add(item.quantity).ok_or_else(
                    || ServiceError::ValidationError("Quantidade inválida".to_string()),
                )?;
            }
            None => {
                index.insert(item.book_id, merged.len());
                merged.push(*item);
            }
        }
    }
    Ok(merged)
}

/// Pairs every cart line with its stored book; any unknown id is a 404
pub async fn resolve_cart(
    store: &dyn CheckoutStore,
    items: &[CartItem],
) -> Result<Vec<(book::Model, i32)>, ServiceError> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.book_id).collect();
    let mut books: HashMap<Uuid, book::Model> = store
        .books_by_ids(&ids)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    items
        .iter()
        .map(|item| {
            books
                .remove(&item.book_id)
                .map(|book| (book, item.quantity))
                .ok_or_else(|| ServiceError::NotFound("Livro não encontrado".to_string()))
        })
        .collect()
}

/// Aggregator request for the resolved cart lines
pub fn build_rate_request(origin: &str, destination: &str, lines: &[(book::Model, i32)]) -> RateRequest {
    let products = lines
        .iter()
        .map(|(book, quantity)| {
            let insurance = book.price * Decimal::from(*quantity);
            let weight_kg = Decimal::from(book.weight_grams) * Decimal::from(*quantity) / Decimal::ONE_THOUSAND;
            RateProduct {
                id: book.id.to_string(),
                width: PARCEL_WIDTH_CM,
                height: PARCEL_HEIGHT_CM,
                length: PARCEL_LENGTH_CM,
                weight: weight_kg.to_f64().unwrap_or_default(),
                insurance_value: insurance.round_dp(2).to_f64().unwrap_or_default(),
                quantity: *quantity,
            }
        })
        .collect();

    RateRequest {
        from: PostalCodeRef {
            postal_code: origin.to_string(),
        },
        to: PostalCodeRef {
            postal_code: destination.to_string(),
        },
        products,
        options: RateOptions::default(),
    }
}

/// Drops errored or unpriced entries and maps the rest, preserving order
pub fn normalize_quotes(raw: Vec<RawQuote>) -> Vec<ShippingQuote> {
    raw.into_iter()
        .filter(|q| q.error.is_none())
        .filter_map(|q| {
            let price = q.price.filter(|p| *p > Decimal::ZERO)?;
            let company = q.company.unwrap_or_default();
            Some(ShippingQuote {
                service_id: q.id,
                name: q.name,
                carrier_name: company.name.unwrap_or_default(),
                price,
                delivery_days: q.delivery_time,
                logo_url: company.picture,
            })
        })
        .collect()
}

/// Shipping quote adapter
#[derive(Clone)]
pub struct ShippingService {
    store: Arc<dyn CheckoutStore>,
    aggregator: Arc<dyn RateAggregator>,
    origin_postal_code: String,
}

impl ShippingService {
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        aggregator: Arc<dyn RateAggregator>,
        origin_postal_code: impl Into<String>,
    ) -> Self {
        Self {
            store,
            aggregator,
            origin_postal_code: origin_postal_code.into(),
        }
    }

    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn calculate(
        &self,
        request: ShippingQuoteRequest,
    ) -> Result<Vec<ShippingQuote>, ServiceError> {
        let destination = normalize_postal_code(&request.postal_code)?;
        let items = merge_cart(&request.items)?;
        let lines = resolve_cart(self.store.as_ref(), &items).await?;

        let rate_request = build_rate_request(&self.origin_postal_code, &destination, &lines);
        let raw = self.aggregator.calculate(&rate_request).await?;
        if raw.is_empty() {
            return Err(ServiceError::ShippingUnavailable(
                "aggregator returned no options".to_string(),
            ));
        }

        let quotes = normalize_quotes(raw);
        info!(destination = %destination, quotes = quotes.len(), "shipping quoted");
        Ok(quotes)
    }
}
