use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{book, order};
use crate::errors::ServiceError;

pub mod book_repository;
pub mod checkout_store;
pub mod memory;
pub mod order_repository;
pub mod user_repository;

pub use checkout_store::SeaOrmCheckoutStore;
pub use memory::InMemoryCheckoutStore;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// A line of an order that is about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub book_id: Uuid,
    pub quantity: i32,
    /// Unit price read from the catalog at checkout time.
    pub unit_price: Decimal,
}

/// A pending order together with its lines.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub shipping_service: String,
    pub address: order::ShippingAddress,
    pub items: Vec<NewOrderItem>,
}

/// A verified "payment succeeded" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub event_id: String,
    pub event_type: String,
    pub order_id: Uuid,
    pub payment_id: String,
}

/// A line whose stock could not be decremented without going negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortfall {
    pub book_id: Uuid,
    pub requested: i32,
    pub available: i32,
}

/// What applying a payment confirmation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order moved to PAGO; `shortfalls` lists lines that were out of stock.
    Applied {
        order_id: Uuid,
        shortfalls: Vec<StockShortfall>,
    },
    /// The event id had already been processed.
    DuplicateEvent,
    /// No order matches the correlation id.
    UnknownOrder,
    /// The order had already left PENDENTE.
    AlreadySettled { status: order::OrderStatus },
}

/// Storage port used by the checkout, shipping and reconciliation flows.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Books matching `ids`; unknown ids are simply absent from the result.
    async fn books_by_ids(&self, ids: &[Uuid]) -> Result<Vec<book::Model>, ServiceError>;

    /// Persists a PENDENTE order and all of its items atomically.
    async fn create_pending_order(&self, order: NewOrder) -> Result<order::Model, ServiceError>;

    /// Stores the processor's payment id on the order.
    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_id: &str,
    ) -> Result<(), ServiceError>;

    /// Removes an order that never got a payment intent.
    async fn discard_pending_order(&self, order_id: Uuid) -> Result<(), ServiceError>;

    /// Applies a payment confirmation exactly once: records the event id,
    /// moves the order from PENDENTE to PAGO and decrements stock without
    /// letting it go negative.
    async fn record_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<ReconcileOutcome, ServiceError>;
}
