use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock delta a movement row records. Quantities are stored
/// positive; the sign is implied by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    Reserve,
    Release,
    Commit,
    Inbound,
    Outbound,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Reserve => "RESERVE",
            MovementType::Release => "RELEASE",
            MovementType::Commit => "COMMIT",
            MovementType::Inbound => "INBOUND",
            MovementType::Outbound => "OUTBOUND",
        }
    }
}

/// What caused a movement, together with `ref_id` pointing at the owning
/// order, reservation or transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementRefType {
    OrderCheckout,
    OrderPayment,
    OrderCancelled,
    ReservationExpired,
    Transfer,
}

impl MovementRefType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementRefType::OrderCheckout => "ORDER_CHECKOUT",
            MovementRefType::OrderPayment => "ORDER_PAYMENT",
            MovementRefType::OrderCancelled => "ORDER_CANCELLED",
            MovementRefType::ReservationExpired => "RESERVATION_EXPIRED",
            MovementRefType::Transfer => "TRANSFER",
        }
    }
}

/// Append-only audit row. Movements are written in the same transaction as
/// the stock mutation they describe and are never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub movement_type: String,
    pub qty: i32,
    pub ref_type: String,
    pub ref_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
