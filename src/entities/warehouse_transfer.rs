use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transfer workflow states. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Requested,
    Approved,
    InTransit,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Requested => "REQUESTED",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::InTransit => "IN_TRANSIT",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "REQUESTED" => Some(TransferStatus::Requested),
            "APPROVED" => Some(TransferStatus::Approved),
            "IN_TRANSIT" => Some(TransferStatus::InTransit),
            "COMPLETED" => Some(TransferStatus::Completed),
            "CANCELLED" => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    /// Allowed edges of the transfer state machine.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        match self {
            TransferStatus::Requested => {
                matches!(next, TransferStatus::Approved | TransferStatus::Cancelled)
            }
            TransferStatus::Approved => {
                matches!(next, TransferStatus::InTransit | TransferStatus::Cancelled)
            }
            TransferStatus::InTransit => {
                matches!(next, TransferStatus::Completed | TransferStatus::Cancelled)
            }
            TransferStatus::Completed | TransferStatus::Cancelled => false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransferStatus::Requested | TransferStatus::Approved | TransferStatus::InTransit
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::warehouse_transfer_item::Entity")]
    Items,
}

impl Related<super::warehouse_transfer_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
