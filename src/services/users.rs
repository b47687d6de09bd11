use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::Set;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::db::DbPool;
use crate::entities::user::{self, ActiveModel as UserActiveModel, Preferences, UserRole};
use crate::errors::ServiceError;
use crate::repositories::user_repository::UserRepository;
use crate::services::accounts::normalize_email;

/// What `GET /api/users/me` returns
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub address_street: Option<String>,
    pub address_number: Option<String>,
    pub address_complement: Option<String>,
    pub address_neighborhood: Option<String>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub preferences: Option<Preferences>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for ProfileView {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            cpf: user.cpf,
            birthdate: user.birthdate,
            address_street: user.address_street,
            address_number: user.address_number,
            address_complement: user.address_complement,
            address_neighborhood: user.address_neighborhood,
            address_city: user.address_city,
            address_state: user.address_state,
            address_zip: user.address_zip,
            preferences: user.preferences,
            created_at: user.created_at,
        }
    }
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of `PATCH /api/users/me`. Blank name or email leave the value unchanged;
/// `null` clears phone, cpf or birthdate.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>, nullable)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>, nullable)]
    pub cpf: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>, format = Date, nullable)]
    pub birthdate: Option<Option<NaiveDate>>,
}

/// Body and response of `PATCH /api/users/me/address`; the whole address is replaced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AddressRequest {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl From<&user::Model> for AddressRequest {
    fn from(user: &user::Model) -> Self {
        Self {
            street: user.address_street.clone(),
            number: user.address_number.clone(),
            complement: user.address_complement.clone(),
            neighborhood: user.address_neighborhood.clone(),
            city: user.address_city.clone(),
            state: user.address_state.clone(),
            zip: user.address_zip.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "A nova senha deve ter pelo menos 6 caracteres."))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreferencesView {
    pub preferences: Option<Preferences>,
}

/// Self-service profile management for the signed-in account
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            users: UserRepository::new(db_pool),
        }
    }

    async fn load(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Usuário não encontrado.".to_string()))
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<ProfileView, ServiceError> {
        self.load(user_id).await.map(ProfileView::from)
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<ProfileView, ServiceError> {
        let existing = self.load(user_id).await?;
        let mut active: UserActiveModel = existing.into();

        if let Some(name) = request.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            active.name = Set(name);
        }
        if let Some(email) = request
            .email
            .map(|e| normalize_email(&e))
            .filter(|e| !e.is_empty())
        {
            if !validator::validate_email(&email) {
                return Err(ServiceError::ValidationError("E-mail inválido".to_string()));
            }
            if self.users.email_taken_by_other(&email, user_id).await? {
                return Err(ServiceError::ValidationError(
                    "E-mail já está em uso.".to_string(),
                ));
            }
            active.email = Set(email);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(phone);
        }
        if let Some(cpf) = request.cpf {
            active.cpf = Set(cpf);
        }
        if let Some(birthdate) = request.birthdate {
            active.birthdate = Set(birthdate);
        }
        active.updated_at = Set(Utc::now());

        self.users.update(active).await.map(ProfileView::from)
    }

    pub async fn update_address(
        &self,
        user_id: Uuid,
        address: AddressRequest,
    ) -> Result<AddressRequest, ServiceError> {
        let mut active: UserActiveModel = self.load(user_id).await?.into();
        active.address_street = Set(address.street);
        active.address_number = Set(address.number);
        active.address_complement = Set(address.complement);
        active.address_neighborhood = Set(address.neighborhood);
        active.address_city = Set(address.city);
        active.address_state = Set(address.state);
        active.address_zip = Set(address.zip);
        active.updated_at = Set(Utc::now());

        let updated = self.users.update(active).await?;
        Ok(AddressRequest::from(&updated))
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        if request.current_password.is_empty() || request.new_password.is_empty() {
            return Err(ServiceError::ValidationError(
                "Preencha todos os campos.".to_string(),
            ));
        }
        request.validate()?;

        let existing = self.load(user_id).await?;
        if !verify_password(&request.current_password, &existing.password_hash) {
            return Err(ServiceError::Unauthorized(
                "Senha atual incorreta.".to_string(),
            ));
        }

        let mut active: UserActiveModel = existing.into();
        active.password_hash = Set(hash_password(&request.new_password)?);
        active.updated_at = Set(Utc::now());
        self.users.update(active).await?;
        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    pub async fn update_preferences(
        &self,
        user_id: Uuid,
        preferences: Preferences,
    ) -> Result<PreferencesView, ServiceError> {
        let mut active: UserActiveModel = self.load(user_id).await?.into();
        active.preferences = Set(Some(preferences));
        active.updated_at = Set(Utc::now());
        let updated = self.users.update(active).await?;
        Ok(PreferencesView {
            preferences: updated.preferences,
        })
    }

    /// Deletes the account together with its orders
    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if !self.users.delete(user_id).await? {
            return Err(ServiceError::NotFound("Usuário não encontrado.".to_string()));
        }
        info!(user_id = %user_id, "account deleted");
        Ok(())
    }
}
