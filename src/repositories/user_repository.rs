use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{BaseRepository, Repository};
use crate::entities::user::{ActiveModel as UserActiveModel, Column, Entity as User, Model};
use crate::errors::ServiceError;

/// Repository for account operations
#[derive(Debug, Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, ServiceError> {
        Ok(User::find_by_id(id).one(self.base.get_db()).await?)
    }

    /// Emails are stored lowercased, so lookups are exact
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Model>, ServiceError> {
        Ok(User::find()
            .filter(Column::Email.eq(email))
            .one(self.base.get_db())
            .await?)
    }

    /// True when `email` belongs to an account other than `user_id`
    pub async fn email_taken_by_other(
        &self,
        email: &str,
        user_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let count = User::find()
            .filter(Column::Email.eq(email))
            .filter(Column::Id.ne(user_id))
            .count(self.base.get_db())
            .await?;
        Ok(count > 0)
    }

    pub async fn create(&self, user: UserActiveModel) -> Result<Model, ServiceError> {
        Ok(user.insert(self.base.get_db()).await?)
    }

    pub async fn update(&self, user: UserActiveModel) -> Result<Model, ServiceError> {
        Ok(user.update(self.base.get_db()).await?)
    }

    /// Orders (and their items) are removed by ON DELETE CASCADE
    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = User::delete_by_id(id).exec(self.base.get_db()).await?;
        Ok(result.rows_affected > 0)
    }

    /// Every account, newest first
    pub async fn list(&self) -> Result<Vec<Model>, ServiceError> {
        Ok(User::find()
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await?)
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(User::find().count(self.base.get_db()).await?)
    }
}
