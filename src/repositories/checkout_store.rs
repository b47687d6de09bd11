use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    CheckoutStore, NewOrder, PaymentConfirmation, ReconcileOutcome, StockShortfall,
};
use crate::entities::order::OrderStatus;
use crate::entities::{book, order, order_item, processed_webhook_event};
use crate::errors::ServiceError;

/// [`CheckoutStore`] backed by the relational database.
#[derive(Debug, Clone)]
pub struct SeaOrmCheckoutStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCheckoutStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckoutStore for SeaOrmCheckoutStore {
    async fn books_by_ids(&self, ids: &[Uuid]) -> Result<Vec<book::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(book::Entity::find()
            .filter(book::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.as_ref())
            .await?)
    }

    async fn create_pending_order(&self, new: NewOrder) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let created = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(new.user_id),
            subtotal: Set(new.subtotal),
            shipping_cost: Set(new.shipping_cost),
            total: Set(new.total),
            shipping_service: Set(new.shipping_service),
            status: Set(OrderStatus::Pendente),
            tracking_code: Set(None),
            address: Set(new.address),
            stripe_payment_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for item in new.items {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                book_id: Set(Some(item.book_id)),
                quantity: Set(item.quantity),
                price: Set(item.unit_price),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        debug!(order_id = %order_id, "pending order persisted");
        Ok(created)
    }

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_id: &str,
    ) -> Result<(), ServiceError> {
        order::Entity::update_many()
            .col_expr(
                order::Column::StripePaymentId,
                Expr::value(Some(payment_id.to_string())),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn discard_pending_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        // Items go with the order through ON DELETE CASCADE
        order::Entity::delete_many()
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pendente))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn record_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let inserted = processed_webhook_event::Entity::insert(processed_webhook_event::ActiveModel {
            event_id: Set(confirmation.event_id.clone()),
            event_type: Set(confirmation.event_type.clone()),
            processed_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(processed_webhook_event::Column::EventId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        if inserted == 0 {
            txn.rollback().await?;
            return Ok(ReconcileOutcome::DuplicateEvent);
        }

        let transitioned = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Pago.to_value()))
            .col_expr(
                order::Column::StripePaymentId,
                Expr::value(Some(confirmation.payment_id.clone())),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(confirmation.order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pendente))
            .exec(&txn)
            .await?;

        if transitioned.rows_affected == 0 {
            let existing = order::Entity::find_by_id(confirmation.order_id)
                .one(&txn)
                .await?;
            txn.commit().await?;
            return Ok(match existing {
                Some(order) => ReconcileOutcome::AlreadySettled {
                    status: order.status,
                },
                None => ReconcileOutcome::UnknownOrder,
            });
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(confirmation.order_id))
            .all(&txn)
            .await?;

        let mut shortfalls = Vec::new();
        for item in items {
            let Some(book_id) = item.book_id else {
                continue;
            };

            let decremented = book::Entity::update_many()
                .col_expr(
                    book::Column::Stock,
                    Expr::col(book::Column::Stock).sub(item.quantity),
                )
                .col_expr(book::Column::UpdatedAt, Expr::value(now))
                .filter(book::Column::Id.eq(book_id))
                .filter(book::Column::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;

            if decremented.rows_affected == 0 {
                let available = book::Entity::find_by_id(book_id)
                    .one(&txn)
                    .await?
                    .map(|b| b.stock)
                    .unwrap_or(0);
                warn!(
                    order_id = %confirmation.order_id,
                    book_id = %book_id,
                    requested = item.quantity,
                    available,
                    "stock decrement refused"
                );
                shortfalls.push(StockShortfall {
                    book_id,
                    requested: item.quantity,
                    available,
                });
            }
        }

        txn.commit().await?;
        Ok(ReconcileOutcome::Applied {
            order_id: confirmation.order_id,
            shortfalls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::book::BookCondition;
    use crate::entities::order::ShippingAddress;
    use crate::repositories::NewOrderItem;
    use rust_decimal_macros::dec;

    async fn setup() -> (Arc<DatabaseConnection>, SeaOrmCheckoutStore) {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .expect("connect");
        crate::db::run_migrations(&db).await.expect("migrate");
        let db = Arc::new(db);
        (db.clone(), SeaOrmCheckoutStore::new(db))
    }

    async fn insert_user(db: &DatabaseConnection) -> Uuid {
        use crate::entities::user;
        let id = Uuid::new_v4();
        user::ActiveModel {
            id: Set(id),
            name: Set("Ana".into()),
            email: Set(format!("{id}@example.com")),
            password_hash: Set("x".into()),
            role: Set(user::UserRole::Customer),
            phone: Set(None),
            cpf: Set(None),
            birthdate: Set(None),
            address_street: Set(None),
            address_number: Set(None),
            address_complement: Set(None),
            address_neighborhood: Set(None),
            address_city: Set(None),
            address_state: Set(None),
            address_zip: Set(None),
            preferences: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .expect("user");
        id
    }

    async fn insert_book(db: &DatabaseConnection, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        book::ActiveModel {
            id: Set(id),
            title: Set("1984".into()),
            author: Set("George Orwell".into()),
            price: Set(dec!(29.90)),
            stock: Set(stock),
            weight_grams: Set(250),
            condition: Set(BookCondition::Bom),
            category: Set("Distopia".into()),
            isbn: Set(None),
            cover_image: Set(None),
            description: Set(None),
            published_year: Set(Some(1949)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .expect("book");
        id
    }

    fn pending(user_id: Uuid, book_id: Uuid, quantity: i32) -> NewOrder {
        NewOrder {
            user_id,
            subtotal: dec!(29.90) * rust_decimal::Decimal::from(quantity),
            shipping_cost: dec!(15.00),
            total: dec!(29.90) * rust_decimal::Decimal::from(quantity) + dec!(15.00),
            shipping_service: "PAC".into(),
            address: ShippingAddress {
                cep: "01001000".into(),
                address: "Praça da Sé".into(),
                number: "1".into(),
                ..Default::default()
            },
            items: vec![NewOrderItem {
                book_id,
                quantity,
                unit_price: dec!(29.90),
            }],
        }
    }

    fn confirmation(event_id: &str, order_id: Uuid) -> PaymentConfirmation {
        PaymentConfirmation {
            event_id: event_id.into(),
            event_type: "payment_intent.succeeded".into(),
            order_id,
            payment_id: "pi_123".into(),
        }
    }

    async fn stock_of(db: &DatabaseConnection, book_id: Uuid) -> i32 {
        book::Entity::find_by_id(book_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn pending_order_is_persisted_with_items() {
        let (db, store) = setup().await;
        let user_id = insert_user(&db).await;
        let book_id = insert_book(&db, 5).await;

        let order = store
            .create_pending_order(pending(user_id, book_id, 2))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pendente);
        assert_eq!(order.total, dec!(74.80));

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(db.as_ref())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].price, dec!(29.90));
    }

    #[tokio::test]
    async fn payment_is_applied_once_per_event() {
        let (db, store) = setup().await;
        let user_id = insert_user(&db).await;
        let book_id = insert_book(&db, 12).await;
        let order = store
            .create_pending_order(pending(user_id, book_id, 2))
            .await
            .unwrap();

        let first = store
            .record_payment(&confirmation("evt_1", order.id))
            .await
            .unwrap();
        assert_eq!(
            first,
            ReconcileOutcome::Applied {
                order_id: order.id,
                shortfalls: vec![]
            }
        );
        assert_eq!(stock_of(&db, book_id).await, 10);

        let replay = store
            .record_payment(&confirmation("evt_1", order.id))
            .await
            .unwrap();
        assert_eq!(replay, ReconcileOutcome::DuplicateEvent);
        assert_eq!(stock_of(&db, book_id).await, 10);

        let stored = order::Entity::find_by_id(order.id)
            .one(db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, OrderStatus::Pago);
        assert_eq!(stored.stripe_payment_id.as_deref(), Some("pi_123"));
    }

    #[tokio::test]
    async fn new_event_for_paid_order_leaves_stock_alone() {
        let (db, store) = setup().await;
        let user_id = insert_user(&db).await;
        let book_id = insert_book(&db, 12).await;
        let order = store
            .create_pending_order(pending(user_id, book_id, 2))
            .await
            .unwrap();

        store
            .record_payment(&confirmation("evt_1", order.id))
            .await
            .unwrap();
        let second = store
            .record_payment(&confirmation("evt_2", order.id))
            .await
            .unwrap();

        assert_eq!(
            second,
            ReconcileOutcome::AlreadySettled {
                status: OrderStatus::Pago
            }
        );
        assert_eq!(stock_of(&db, book_id).await, 10);
    }

    #[tokio::test]
    async fn stock_never_goes_negative() {
        let (db, store) = setup().await;
        let book_id = insert_book(&db, 3).await;
        let mut orders = Vec::new();
        for _ in 0..3 {
            let user_id = insert_user(&db).await;
            orders.push(
                store
                    .create_pending_order(pending(user_id, book_id, 2))
                    .await
                    .unwrap(),
            );
        }

        let mut shortfall_count = 0;
        for (i, order) in orders.iter().enumerate() {
            let outcome = store
                .record_payment(&confirmation(&format!("evt_{i}"), order.id))
                .await
                .unwrap();
            match outcome {
                ReconcileOutcome::Applied { shortfalls, .. } => {
                    shortfall_count += shortfalls.len()
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(stock_of(&db, book_id).await, 1);
        assert_eq!(shortfall_count, 2);
    }

    /// File-backed database so the pool hands out several real connections
    async fn shared_setup() -> (tempfile::TempDir, Arc<DatabaseConnection>, SeaOrmCheckoutStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("shop.db").display());
        let db = crate::db::establish_connection(&url).await.expect("connect");
        crate::db::run_migrations(&db).await.expect("migrate");
        let db = Arc::new(db);
        (dir, db.clone(), SeaOrmCheckoutStore::new(db))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_payments_never_oversell() {
        let (_dir, db, store) = shared_setup().await;
        let book_id = insert_book(&db, 5).await;
        let mut orders = Vec::new();
        for _ in 0..6 {
            let user_id = insert_user(&db).await;
            orders.push(
                store
                    .create_pending_order(pending(user_id, book_id, 2))
                    .await
                    .unwrap(),
            );
        }

        let outcomes = futures::future::join_all(orders.iter().enumerate().map(|(i, order)| {
            let store = store.clone();
            let confirmation = confirmation(&format!("evt_{i}"), order.id);
            tokio::spawn(async move { store.record_payment(&confirmation).await })
        }))
        .await;

        let mut shortfall_count = 0;
        for outcome in outcomes {
            match outcome.unwrap().unwrap() {
                ReconcileOutcome::Applied { shortfalls, .. } => {
                    shortfall_count += shortfalls.len()
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        // two orders of two fit in five copies
        assert_eq!(stock_of(&db, book_id).await, 1);
        assert_eq!(shortfall_count, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redeliveries_apply_once() {
        let (_dir, db, store) = shared_setup().await;
        let user_id = insert_user(&db).await;
        let book_id = insert_book(&db, 10).await;
        let order = store
            .create_pending_order(pending(user_id, book_id, 3))
            .await
            .unwrap();

        let outcomes = futures::future::join_all((0..5).map(|_| {
            let store = store.clone();
            let confirmation = confirmation("evt_same", order.id);
            tokio::spawn(async move { store.record_payment(&confirmation).await })
        }))
        .await;

        let outcomes: Vec<ReconcileOutcome> = outcomes
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        let applied = outcomes
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::Applied { .. }))
            .count();
        assert_eq!(applied, 1, "{outcomes:?}");
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, ReconcileOutcome::Applied { .. } | ReconcileOutcome::DuplicateEvent)));
        assert_eq!(stock_of(&db, book_id).await, 7);
    }

    #[tokio::test]
    async fn unknown_order_is_reported() {
        let (_db, store) = setup().await;
        let outcome = store
            .record_payment(&confirmation("evt_x", Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::UnknownOrder);
    }

    #[tokio::test]
    async fn discarding_removes_order_and_items() {
        let (db, store) = setup().await;
        let user_id = insert_user(&db).await;
        let book_id = insert_book(&db, 5).await;
        let order = store
            .create_pending_order(pending(user_id, book_id, 1))
            .await
            .unwrap();

        store.discard_pending_order(order.id).await.unwrap();

        assert!(order::Entity::find_by_id(order.id)
            .one(db.as_ref())
            .await
            .unwrap()
            .is_none());
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(db.as_ref())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn deleted_book_leaves_item_without_reference() {
        let (db, store) = setup().await;
        let user_id = insert_user(&db).await;
        let book_id = insert_book(&db, 5).await;
        let order = store
            .create_pending_order(pending(user_id, book_id, 1))
            .await
            .unwrap();

        book::Entity::delete_by_id(book_id)
            .exec(db.as_ref())
            .await
            .unwrap();

        let outcome = store
            .record_payment(&confirmation("evt_del", order.id))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                order_id: order.id,
                shortfalls: vec![]
            }
        );
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(db.as_ref())
            .await
            .unwrap();
        assert_eq!(items[0].book_id, None);
    }
}
