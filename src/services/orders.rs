use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::book;
use crate::entities::order::{self, OrderStatus, ShippingAddress};
use crate::entities::user;
use crate::errors::ServiceError;
use crate::repositories::order_repository::{
    OrderLine, OrderPatch, OrderRepository, OrderWithCustomer, OrderWithLines,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Null once the book has been removed from the catalog
    pub book_id: Option<Uuid>,
    pub quantity: i32,
    /// Unit price paid
    #[schema(value_type = f64)]
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub book: Option<book::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = f64)]
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[schema(value_type = f64)]
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_cost: Decimal,
    #[schema(value_type = f64)]
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub shipping_service: String,
    pub status: OrderStatus,
    pub tracking_code: Option<String>,
    pub address: ShippingAddress,
    pub stripe_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    pub fn from_parts(order: order::Model, lines: Vec<OrderLine>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            shipping_service: order.shipping_service,
            status: order.status,
            tracking_code: order.tracking_code,
            address: order.address,
            stripe_payment_id: order.stripe_payment_id,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: lines
                .into_iter()
                .map(|OrderLine { item, book }| OrderItemView {
                    id: item.id,
                    order_id: item.order_id,
                    book_id: item.book_id,
                    quantity: item.quantity,
                    price: item.price,
                    book,
                })
                .collect(),
        }
    }
}

impl From<OrderWithLines> for OrderView {
    fn from(value: OrderWithLines) -> Self {
        Self::from_parts(value.order, value.lines)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CustomerSummary {
    pub name: String,
    pub email: String,
}

impl From<user::Model> for CustomerSummary {
    fn from(user: user::Model) -> Self {
        Self {
            name: user.name,
            email: user.email,
        }
    }
}

/// Back-office order row
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminOrderView {
    #[serde(flatten)]
    pub order: OrderView,
    pub user: Option<CustomerSummary>,
}

impl From<OrderWithCustomer> for AdminOrderView {
    fn from(value: OrderWithCustomer) -> Self {
        Self {
            order: OrderView::from_parts(value.order, value.lines),
            user: value.customer.map(CustomerSummary::from),
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of `PATCH /api/admin/orders/:id`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    /// `null` clears the tracking code
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>, nullable)]
    pub tracking_code: Option<Option<String>>,
}

/// Order history for customers and order management for administrators
#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            orders: OrderRepository::new(db_pool),
        }
    }

    /// The caller's orders, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderView>, ServiceError> {
        Ok(self
            .orders
            .find_for_user(user_id)
            .await?
            .into_iter()
            .map(OrderView::from)
            .collect())
    }

    /// Another customer's order is reported as missing
    pub async fn get_for_user(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ServiceError> {
        self.orders
            .find_for_user_by_id(user_id, order_id)
            .await?
            .map(OrderView::from)
            .ok_or_else(|| ServiceError::NotFound("Pedido não encontrado".to_string()))
    }

    pub async fn list_all(&self) -> Result<Vec<AdminOrderView>, ServiceError> {
        Ok(self
            .orders
            .find_all_with_customers()
            .await?
            .into_iter()
            .map(AdminOrderView::from)
            .collect())
    }

    /// Back-office status and tracking changes; payment confirmation stays with the webhook
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderView, ServiceError> {
        let existing = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Pedido não encontrado".to_string()))?;

        let mut patch = OrderPatch::default();
        if let Some(next) = request.status.filter(|next| *next != existing.status) {
            if !existing.status.admin_can_transition_to(next) {
                return Err(ServiceError::Conflict(format!(
                    "Transição de status inválida: {} → {}",
                    existing.status, next
                )));
            }
            patch.status = Some(next);
        }
        patch.tracking_code = request
            .tracking_code
            .map(|code| code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()));

        let previous = existing.status;
        let updated = self.orders.apply_patch(existing, patch).await?;
        if updated.status != previous {
            info!(order_id = %order_id, from = %previous, to = %updated.status, "order status changed");
        }

        self.orders
            .find_with_lines(updated.id)
            .await?
            .map(OrderView::from)
            .ok_or_else(|| ServiceError::NotFound("Pedido não encontrado".to_string()))
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        self.orders.count().await
    }

    pub async fn revenue(&self) -> Result<Decimal, ServiceError> {
        self.orders.revenue().await
    }
}
