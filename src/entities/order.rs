use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of an order.
///
/// `PENDENTE -> PAGO` happens only through a confirmed payment event.
/// `PAGO -> ENVIADO -> ENTREGUE` and cancellation are back-office actions.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDENTE")]
    Pendente,
    #[sea_orm(string_value = "PAGO")]
    Pago,
    #[sea_orm(string_value = "ENVIADO")]
    Enviado,
    #[sea_orm(string_value = "ENTREGUE")]
    Entregue,
    #[sea_orm(string_value = "CANCELADO")]
    Cancelado,
}

impl OrderStatus {
    pub fn is_cancelled(self) -> bool {
        matches!(self, OrderStatus::Cancelado)
    }

    /// Edges of the order state machine.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pendente, Pago) | (Pago, Enviado) | (Enviado, Entregue) => true,
            (from, Cancelado) => from != Cancelado,
            _ => false,
        }
    }

    /// Transitions an administrator may request. Payment confirmation is
    /// reserved for the payment webhook.
    pub fn admin_can_transition_to(self, next: OrderStatus) -> bool {
        next != OrderStatus::Pago && self.can_transition_to(next)
    }
}

/// Delivery address captured at checkout.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Postal code (CEP), digits only once normalized
    pub cep: String,
    /// Street name
    pub address: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// The `orders` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub shipping_service: String,
    pub status: OrderStatus,
    pub tracking_code: Option<String>,
    pub address: ShippingAddress,
    /// Processor payment id, known once the intent is opened.
    pub stripe_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
