use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::user::{self, ActiveModel as UserActiveModel, UserRole};
use crate::errors::ServiceError;
use crate::repositories::book_repository::BookRepository;
use crate::repositories::order_repository::OrderRepository;
use crate::repositories::user_repository::UserRepository;

/// Dashboard counters
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_orders: u64,
    pub total_users: u64,
    pub total_books: u64,
    /// Sum of order totals, cancelled orders excluded
    #[schema(value_type = f64)]
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for AdminUserView {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Body of `PATCH /api/admin/users/:id`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    #[schema(example = "ADMIN")]
    pub role: String,
}

/// Reporting and account administration for the back office
#[derive(Clone)]
pub struct AdminService {
    books: BookRepository,
    orders: OrderRepository,
    users: UserRepository,
}

impl AdminService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            books: BookRepository::new(db_pool.clone()),
            orders: OrderRepository::new(db_pool.clone()),
            users: UserRepository::new(db_pool),
        }
    }

    pub async fn stats(&self) -> Result<StoreStats, ServiceError> {
        let (total_orders, total_users, total_books, total_revenue) = tokio::try_join!(
            self.orders.count(),
            self.users.count(),
            self.books.count(),
            self.orders.revenue(),
        )?;
        Ok(StoreStats {
            total_orders,
            total_users,
            total_books,
            total_revenue,
        })
    }

    /// Newest accounts first
    pub async fn list_users(&self) -> Result<Vec<AdminUserView>, ServiceError> {
        Ok(self
            .users
            .list()
            .await?
            .into_iter()
            .map(AdminUserView::from)
            .collect())
    }

    #[instrument(skip(self, request))]
    pub async fn update_role(
        &self,
        user_id: Uuid,
        request: UpdateRoleRequest,
    ) -> Result<AdminUserView, ServiceError> {
        let role = UserRole::from_str(request.role.trim())
            .map_err(|_| ServiceError::ValidationError("Role inválido".to_string()))?;

        let existing = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Usuário não encontrado.".to_string()))?;
        if existing.role == role {
            return Ok(AdminUserView::from(existing));
        }

        let mut active: UserActiveModel = existing.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now());
        let updated = self.users.update(active).await?;
        info!(user_id = %user_id, role = %role, "role changed");
        Ok(AdminUserView::from(updated))
    }
}
