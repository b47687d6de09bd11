use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CheckoutStore, NewOrder, PaymentConfirmation, ReconcileOutcome, StockShortfall,
};
use crate::entities::order::OrderStatus;
use crate::entities::{book, order, order_item};
use crate::errors::ServiceError;

#[derive(Default)]
struct MemoryState {
    books: HashMap<Uuid, book::Model>,
    orders: HashMap<Uuid, order::Model>,
    items: Vec<order_item::Model>,
    processed_events: HashSet<String>,
}

/// In-process [`CheckoutStore`]; one lock guards every table so each call is atomic.
#[derive(Default)]
pub struct InMemoryCheckoutStore {
    state: Mutex<MemoryState>,
}

impl InMemoryCheckoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_books(books: impl IntoIterator<Item = book::Model>) -> Self {
        let state = MemoryState {
            books: books.into_iter().map(|b| (b.id, b)).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn insert_book(&self, book: book::Model) {
        self.state.lock().await.books.insert(book.id, book);
    }

    pub async fn remove_book(&self, book_id: Uuid) {
        let mut state = self.state.lock().await;
        state.books.remove(&book_id);
        for item in state.items.iter_mut() {
            if item.book_id == Some(book_id) {
                item.book_id = None;
            }
        }
    }

    pub async fn stock_of(&self, book_id: Uuid) -> Option<i32> {
        self.state.lock().await.books.get(&book_id).map(|b| b.stock)
    }

    pub async fn order(&self, order_id: Uuid) -> Option<order::Model> {
        self.state.lock().await.orders.get(&order_id).cloned()
    }

    pub async fn items_of(&self, order_id: Uuid) -> Vec<order_item::Model> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl CheckoutStore for InMemoryCheckoutStore {
    async fn books_by_ids(&self, ids: &[Uuid]) -> Result<Vec<book::Model>, ServiceError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.books.get(id).cloned())
            .collect())
    }

    async fn create_pending_order(&self, new: NewOrder) -> Result<order::Model, ServiceError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let order = order::Model {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            subtotal: new.subtotal,
            shipping_cost: new.shipping_cost,
            total: new.total,
            shipping_service: new.shipping_service,
            status: OrderStatus::Pendente,
            tracking_code: None,
            address: new.address,
            stripe_payment_id: None,
            created_at: now,
            updated_at: now,
        };

        for item in new.items {
            state.items.push(order_item::Model {
                id: Uuid::new_v4(),
                order_id: order.id,
                book_id: Some(item.book_id),
                quantity: item.quantity,
                price: item.unit_price,
            });
        }
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_id: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.stripe_payment_id = Some(payment_id.to_string());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn discard_pending_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let pending = state
            .orders
            .get(&order_id)
            .is_some_and(|o| o.status == OrderStatus::Pendente);
        if pending {
            state.orders.remove(&order_id);
            state.items.retain(|item| item.order_id != order_id);
        }
        Ok(())
    }

    async fn record_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let mut state = self.state.lock().await;

        if !state
            .processed_events
            .insert(confirmation.event_id.clone())
        {
            return Ok(ReconcileOutcome::DuplicateEvent);
        }

        let Some(order) = state.orders.get_mut(&confirmation.order_id) else {
            return Ok(ReconcileOutcome::UnknownOrder);
        };
        if order.status != OrderStatus::Pendente {
            return Ok(ReconcileOutcome::AlreadySettled {
                status: order.status,
            });
        }
        order.status = OrderStatus::Pago;
        order.stripe_payment_id = Some(confirmation.payment_id.clone());
        order.updated_at = Utc::now();

        let lines: Vec<(Uuid, i32)> = state
            .items
            .iter()
            .filter(|item| item.order_id == confirmation.order_id)
            .filter_map(|item| item.book_id.map(|book_id| (book_id, item.quantity)))
            .collect();

        let mut shortfalls = Vec::new();
        for (book_id, quantity) in lines {
            match state.books.get_mut(&book_id) {
                Some(book) if book.stock >= quantity => book.stock -= quantity,
                Some(book) => shortfalls.push(StockShortfall {
                    book_id,
                    requested: quantity,
                    available: book.stock,
                }),
                None => shortfalls.push(StockShortfall {
                    book_id,
                    requested: quantity,
                    available: 0,
                }),
            }
        }

        Ok(ReconcileOutcome::Applied {
            order_id: confirmation.order_id,
            shortfalls,
        })
    }
}
