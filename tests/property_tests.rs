//! Property-based tests for pricing, cart handling and webhook signatures.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bookshop_api::entities::book::{self, BookCondition};
use bookshop_api::entities::order::{OrderStatus, ShippingAddress};
use bookshop_api::errors::ServiceError;
use bookshop_api::integrations::payments::to_minor_units;
use bookshop_api::integrations::{IntentRequest, PaymentGateway, PaymentIntent};
use bookshop_api::repositories::InMemoryCheckoutStore;
use bookshop_api::services::checkout::{CheckoutRequest, CheckoutService, ShippingOption};
use bookshop_api::services::shipping::{merge_cart, normalize_postal_code, CartItem};
use bookshop_api::webhooks::{sign_payload, verify_signature};
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

const STATUSES: [OrderStatus; 5] = [
    OrderStatus::Pendente,
    OrderStatus::Pago,
    OrderStatus::Enviado,
    OrderStatus::Entregue,
    OrderStatus::Cancelado,
];

/// Accepts every intent and remembers what it was asked to charge
#[derive(Default)]
struct RecordingGateway {
    requests: Mutex<Vec<IntentRequest>>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, ServiceError> {
        let id = format!("pi_{}", request.order_id.simple());
        self.requests
            .lock()
            .map_err(|_| ServiceError::InternalError("poisoned".into()))?
            .push(request);
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }
}

fn book_at(price: Decimal, stock: i32) -> book::Model {
    book::Model {
        id: Uuid::new_v4(),
        title: "Memórias Póstumas de Brás Cubas".into(),
        author: "Machado de Assis".into(),
        price,
        stock,
        weight_grams: 250,
        condition: BookCondition::Bom,
        category: "Literatura Brasileira".into(),
        isbn: None,
        cover_image: None,
        description: None,
        published_year: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn cents() -> impl Strategy<Value = i64> {
    1i64..50_000
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn charged_amount_comes_from_the_catalog(
        price_cents in cents(),
        quantity in 1i32..5,
        shipping_cents in 0i64..10_000,
        client_price in any::<f64>(),
    ) {
        let price = Decimal::new(price_cents, 2);
        let shipping = Decimal::new(shipping_cents, 2);
        let book = book_at(price, 10);

        // A price in the cart line is not part of the accepted payload
        let line = serde_json::json!({ "bookId": book.id, "quantity": quantity, "price": client_price });
        let item: CartItem = serde_json::from_value(line).expect("cart line");

        let store = Arc::new(InMemoryCheckoutStore::with_books([book]));
        let gateway = Arc::new(RecordingGateway::default());
        let checkout = CheckoutService::new(store, gateway.clone(), "brl");

        let response = runtime().block_on(checkout.create_order_and_intent(
            Uuid::new_v4(),
            CheckoutRequest {
                items: vec![item],
                shipping_option: ShippingOption { name: "PAC".into(), price: shipping },
                address: ShippingAddress {
                    cep: "01001-000".into(),
                    address: "Praça da Sé".into(),
                    number: "1".into(),
                    ..Default::default()
                },
            },
        ));
        let response = response.expect("checkout");

        let expected = price * Decimal::from(quantity) + shipping;
        prop_assert_eq!(response.total, expected);
        let requests = gateway.requests.lock().expect("lock");
        prop_assert_eq!(requests.len(), 1);
        prop_assert_eq!(
            requests[0].amount_cents,
            price_cents * i64::from(quantity) + shipping_cents
        );
    }

    #[test]
    fn two_decimal_amounts_convert_exactly(amount in 0i64..10_000_000) {
        prop_assert_eq!(to_minor_units(Decimal::new(amount, 2)).expect("cents"), amount);
    }

    #[test]
    fn postal_codes_keep_only_their_digits(digits in "[0-9]{8}") {
        let dashed = format!("{}-{}", &digits[..5], &digits[5..]);
        prop_assert_eq!(normalize_postal_code(&dashed).expect("cep"), digits.clone());
        prop_assert_eq!(normalize_postal_code(&format!(" {digits} ")).expect("cep"), digits);
    }

    #[test]
    fn merging_a_cart_preserves_quantities(quantities in prop::collection::vec((0usize..3, 1i32..20), 1..12)) {
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let items: Vec<CartItem> = quantities
            .iter()
            .map(|(slot, quantity)| CartItem { book_id: ids[*slot], quantity: *quantity })
            .collect();

        let merged = merge_cart(&items).expect("merge");
        let total_in: i32 = items.iter().map(|i| i.quantity).sum();
        let total_out: i32 = merged.iter().map(|i| i.quantity).sum();
        prop_assert_eq!(total_in, total_out);

        let mut seen = std::collections::HashSet::new();
        prop_assert!(merged.iter().all(|item| seen.insert(item.book_id)));
    }

    #[test]
    fn any_altered_byte_breaks_the_signature(
        body in prop::collection::vec(any::<u8>(), 1..256),
        at in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let now = Utc::now().timestamp();
        let header = sign_payload(&body, "whsec_property", now).expect("sign");
        prop_assert!(verify_signature(&body, &header, "whsec_property", 300, now).is_ok());

        let mut altered = body.clone();
        let index = at.index(altered.len());
        altered[index] ^= flip;
        prop_assert!(verify_signature(&altered, &header, "whsec_property", 300, now).is_err());
    }
}

#[test]
fn cancelled_orders_are_terminal_and_payment_is_never_manual() {
    for next in STATUSES {
        assert!(!OrderStatus::Cancelado.can_transition_to(next), "{next}");
        assert!(!OrderStatus::Entregue.admin_can_transition_to(OrderStatus::Pago));
    }
    for from in STATUSES {
        assert!(!from.admin_can_transition_to(OrderStatus::Pago), "{from}");
        assert!(!from.can_transition_to(OrderStatus::Pendente), "{from}");
    }
}
