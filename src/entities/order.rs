use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checkout::Address;

/// Immutable record of a committed sale. Monetary fields and addresses are
/// copied verbatim from the source checkout at materialization time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-facing sequential number, assigned by the database on insert.
    #[sea_orm(unique)]
    pub order_number: i64,

    pub email: String,
    pub subtotal: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub payment_provider: String,

    /// Provider-issued payment identifier. Unique across all orders; the
    /// idempotency resolver depends on this constraint.
    #[sea_orm(unique)]
    pub payment_id: String,

    #[sea_orm(column_type = "Json", nullable)]
    pub shipping_address: Option<Address>,
    #[sea_orm(column_type = "Json", nullable)]
    pub billing_address: Option<Address>,
    pub shipping_method: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
