use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::ShippingAddress;
use crate::errors::ServiceError;
use crate::integrations::payments::{to_minor_units, IntentRequest, PaymentGateway};
use crate::repositories::{CheckoutStore, NewOrder, NewOrderItem};
use crate::services::shipping::{merge_cart, normalize_postal_code, resolve_cart, CartItem};

/// The delivery option the customer picked from the quotes
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub name: String,
    #[schema(value_type = f64, example = 15.0)]
    pub price: Decimal,
}

/// Body of `POST /api/stripe/create-intent`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub shipping_option: ShippingOption,
    pub address: ShippingAddress,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub client_secret: String,
    pub order_id: Uuid,
    #[schema(value_type = f64, example = 74.8)]
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

fn required(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Delivery address with a normalized CEP; street and number must be present
pub fn normalize_address(address: ShippingAddress) -> Result<ShippingAddress, ServiceError> {
    let cep = normalize_postal_code(&address.cep)?;
    let street = required(&address.address)
        .ok_or_else(|| ServiceError::ValidationError("Endereço é obrigatório".to_string()))?;
    let number = required(&address.number)
        .ok_or_else(|| ServiceError::ValidationError("Número é obrigatório".to_string()))?;

    Ok(ShippingAddress {
        cep,
        address: street,
        number,
        complement: address.complement.as_deref().and_then(required),
        city: address.city.as_deref().and_then(required),
        state: address.state.as_deref().and_then(required),
    })
}

/// Opens a pending order and its payment intent
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn CheckoutStore>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        gateway: Arc<dyn PaymentGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            currency: currency.into(),
        }
    }

    /// Prices come from the catalog, never from the request. The order row is
    /// written before the intent is requested and removed again if that fails.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order_and_intent(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        let shipping = request.shipping_option;
        if shipping.price.is_sign_negative() {
            return Err(ServiceError::ValidationError("Frete inválido".to_string()));
        }
        let shipping_service = required(&shipping.name)
            .ok_or_else(|| ServiceError::ValidationError("Opção de frete inválida".to_string()))?;
        let address = normalize_address(request.address)?;

        let items = merge_cart(&request.items)?;
        let lines = resolve_cart(self.store.as_ref(), &items).await?;

        for (book, quantity) in &lines {
            if *quantity > book.stock {
                return Err(ServiceError::InsufficientStock(format!(
                    "Estoque insuficiente para \"{}\"",
                    book.title
                )));
            }
        }

        let subtotal: Decimal = lines
            .iter()
            .map(|(book, quantity)| book.price * Decimal::from(*quantity))
            .sum();
        let shipping_cost = shipping.price.round_dp(2);
        let total = (subtotal + shipping_cost).round_dp(2);

        let order = self
            .store
            .create_pending_order(NewOrder {
                user_id,
                subtotal: subtotal.round_dp(2),
                shipping_cost,
                total,
                shipping_service,
                address,
                items: lines
                    .iter()
                    .map(|(book, quantity)| NewOrderItem {
                        book_id: book.id,
                        quantity: *quantity,
                        unit_price: book.price,
                    })
                    .collect(),
            })
            .await?;

        let intent_request = IntentRequest {
            amount_cents: to_minor_units(total)?,
            currency: self.currency.clone(),
            order_id: order.id,
            user_id,
        };

        let intent = match self.gateway.create_intent(intent_request).await {
            Ok(intent) => intent,
            Err(e) => {
                counter!("checkout.intents.failed", 1);
                self.compensate(order.id).await;
                return Err(e);
            }
        };

        if let Err(e) = self.store.attach_payment_intent(order.id, &intent.id).await {
            error!(error = %e, order_id = %order.id, "could not store payment id");
            self.compensate(order.id).await;
            return Err(e);
        }

        counter!("checkout.intents.created", 1);
        info!(order_id = %order.id, total = %total, payment_intent = %intent.id, "checkout opened");

        Ok(CheckoutResponse {
            client_secret: intent.client_secret,
            order_id: order.id,
            total,
        })
    }

    async fn compensate(&self, order_id: Uuid) {
        match self.store.discard_pending_order(order_id).await {
            Ok(()) => warn!(order_id = %order_id, "pending order discarded"),
            Err(e) => error!(error = %e, order_id = %order_id, "failed to discard pending order"),
        }
    }
}
