use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{BaseRepository, Repository};
use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel, OrderStatus,
};
use crate::entities::{book, order_item, user};
use crate::errors::ServiceError;

/// An order line with the book it points to, if that book still exists.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub item: order_item::Model,
    pub book: Option<book::Model>,
}

#[derive(Debug, Clone)]
pub struct OrderWithLines {
    pub order: OrderModel,
    pub lines: Vec<OrderLine>,
}

/// Back-office view of an order.
#[derive(Debug, Clone)]
pub struct OrderWithCustomer {
    pub order: OrderModel,
    pub customer: Option<user::Model>,
    pub lines: Vec<OrderLine>,
}

/// Field-level changes an administrator can make to an order.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    /// `Some(None)` clears the tracking code.
    pub tracking_code: Option<Option<String>>,
}

/// Repository for order operations
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find_by_id(id).one(self.base.get_db()).await?)
    }

    /// Orders placed by `user_id`, newest first, with their lines
    pub async fn find_for_user(&self, user_id: Uuid) -> Result<Vec<OrderWithLines>, ServiceError> {
        let orders = Order::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await?;

        let mut lines = self.lines_for(orders.iter().map(|o| o.id)).await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderWithLines {
                lines: lines.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    /// A single order, only if it belongs to `user_id`
    pub async fn find_for_user_by_id(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<OrderWithLines>, ServiceError> {
        let Some(order) = Order::find_by_id(order_id)
            .filter(Column::UserId.eq(user_id))
            .one(self.base.get_db())
            .await?
        else {
            return Ok(None);
        };

        let mut lines = self.lines_for(std::iter::once(order.id)).await?;
        Ok(Some(OrderWithLines {
            lines: lines.remove(&order.id).unwrap_or_default(),
            order,
        }))
    }

    pub async fn find_with_lines(&self, order_id: Uuid) -> Result<Option<OrderWithLines>, ServiceError> {
        let Some(order) = self.find_by_id(order_id).await? else {
            return Ok(None);
        };
        let mut lines = self.lines_for(std::iter::once(order.id)).await?;
        Ok(Some(OrderWithLines {
            lines: lines.remove(&order.id).unwrap_or_default(),
            order,
        }))
    }

    /// Every order, newest first, with customer and lines
    pub async fn find_all_with_customers(&self) -> Result<Vec<OrderWithCustomer>, ServiceError> {
        let rows = Order::find()
            .find_also_related(user::Entity)
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await?;

        let mut lines = self.lines_for(rows.iter().map(|(o, _)| o.id)).await?;
        Ok(rows
            .into_iter()
            .map(|(order, customer)| OrderWithCustomer {
                lines: lines.remove(&order.id).unwrap_or_default(),
                customer,
                order,
            })
            .collect())
    }

    async fn lines_for(
        &self,
        order_ids: impl Iterator<Item = Uuid>,
    ) -> Result<HashMap<Uuid, Vec<OrderLine>>, ServiceError> {
        let ids: Vec<Uuid> = order_ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(ids))
            .find_also_related(book::Entity)
            .all(self.base.get_db())
            .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for (item, book) in rows {
            grouped
                .entry(item.order_id)
                .or_default()
                .push(OrderLine { item, book });
        }
        Ok(grouped)
    }

    /// Applies `patch` to an existing order
    pub async fn apply_patch(
        &self,
        existing: OrderModel,
        patch: OrderPatch,
    ) -> Result<OrderModel, ServiceError> {
        let mut active: OrderActiveModel = existing.into();
        if let Some(status) = patch.status {
            active.status = Set(status);
        }
        if let Some(tracking_code) = patch.tracking_code {
            active.tracking_code = Set(tracking_code);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.base.get_db()).await?)
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(Order::find().count(self.base.get_db()).await?)
    }

    /// Sum of order totals, cancelled orders excluded
    pub async fn revenue(&self) -> Result<Decimal, ServiceError> {
        let sum: Option<Option<Decimal>> = Order::find()
            .select_only()
            .column_as(Column::Total.sum(), "revenue")
            .filter(Column::Status.ne(OrderStatus::Cancelado))
            .into_tuple()
            .one(self.base.get_db())
            .await?;
        Ok(sum.flatten().unwrap_or(Decimal::ZERO).round_dp(2))
    }
}
