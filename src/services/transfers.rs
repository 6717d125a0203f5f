//! Warehouse-to-warehouse transfer engine.
//!
//! Transfers walk REQUESTED -> APPROVED -> IN_TRANSIT -> COMPLETED with
//! CANCELLED reachable from every non-terminal state. `execute_transfer`
//! performs the whole physical move in one transaction; the intermediate
//! IN_TRANSIT update exists so the movement log's temporal ordering matches
//! the physical model, even though the two status writes collapse
//! observably to COMPLETED.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::stock_movement::{MovementRefType, MovementType};
use crate::entities::warehouse;
use crate::entities::warehouse_transfer::{self, TransferStatus};
use crate::entities::warehouse_transfer_item;
use crate::errors::ServiceError;
use crate::stock::{ledger, movements};

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateTransferItemRequest {
    pub product_id: String,
    #[validate(range(min = 1, message = "transfer quantity must be at least 1"))]
    pub qty: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransferRequest {
    pub from_warehouse_id: String,
    pub to_warehouse_id: String,
    #[validate(
        length(min = 1, message = "transfer must contain at least one item"),
        nested
    )]
    pub items: Vec<CreateTransferItemRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub qty: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferResponse {
    pub id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<TransferItemResponse>,
}

#[derive(Clone)]
pub struct TransferService {
    db: Arc<DatabaseConnection>,
}

impl TransferService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, req))]
    pub async fn create_transfer(
        &self,
        req: CreateTransferRequest,
    ) -> Result<TransferResponse, ServiceError> {
        req.validate()?;

        let from_id = parse_uuid(&req.from_warehouse_id, "from_warehouse_id")?;
        let to_id = parse_uuid(&req.to_warehouse_id, "to_warehouse_id")?;

        if from_id == to_id {
            return Err(ServiceError::Validation(
                "cannot transfer to the same warehouse".to_string(),
            ));
        }

        let mut item_lines = Vec::with_capacity(req.items.len());
        for item in &req.items {
            let product_id = parse_uuid(&item.product_id, "product_id")?;
            item_lines.push((product_id, item.qty));
        }

        let db = &*self.db;
        let from_warehouse = load_warehouse(db, from_id).await?;
        if !from_warehouse.is_active {
            return Err(ServiceError::Validation(
                "source warehouse is not active".to_string(),
            ));
        }
        let to_warehouse = load_warehouse(db, to_id).await?;
        if !to_warehouse.is_active {
            return Err(ServiceError::Validation(
                "destination warehouse is not active".to_string(),
            ));
        }
        if from_warehouse.shop_id != to_warehouse.shop_id {
            return Err(ServiceError::Validation(
                "warehouses must belong to the same shop".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let transfer_id = Uuid::new_v4();
        let transfer_row = warehouse_transfer::ActiveModel {
            id: Set(transfer_id),
            from_warehouse_id: Set(from_id),
            to_warehouse_id: Set(to_id),
            status: Set(TransferStatus::Requested.as_str().to_string()),
            created_at: Set(Utc::now()),
        };
        let transfer = transfer_row.insert(&txn).await.map_err(ServiceError::db_error)?;

        let item_rows: Vec<warehouse_transfer_item::ActiveModel> = item_lines
            .iter()
            .map(|(product_id, qty)| warehouse_transfer_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                transfer_id: Set(transfer_id),
                product_id: Set(*product_id),
                qty: Set(*qty),
            })
            .collect();
        warehouse_transfer_item::Entity::insert_many(item_rows)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(transfer_id = %transfer_id, "transfer created");
        self.get_transfer(transfer.id).await
    }

    /// Applies a caller-requested status change. Setting IN_TRANSIT is the
    /// trigger that executes the physical move; `execute_transfer` then owns
    /// the IN_TRANSIT -> COMPLETED walk.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        transfer_id: Uuid,
        new_status: TransferStatus,
    ) -> Result<(), ServiceError> {
        let transfer = self.load_transfer(transfer_id).await?;
        let current = parse_status(&transfer.status)?;

        if !current.can_transition_to(new_status) {
            return Err(ServiceError::Validation(format!(
                "invalid status transition from {} to {}",
                current.as_str(),
                new_status.as_str()
            )));
        }

        if new_status == TransferStatus::InTransit {
            return self.execute_transfer(transfer_id).await;
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let updated = transition_transfer(&txn, transfer_id, &[current], new_status).await?;
        if !updated {
            return Err(ServiceError::Validation(format!(
                "transfer {transfer_id} changed state concurrently"
            )));
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(transfer_id = %transfer_id, status = new_status.as_str(), "transfer status updated");
        Ok(())
    }

    /// Moves the stock: per item, reserve-and-commit out of the source with
    /// an OUTBOUND movement, then add into the destination with an INBOUND
    /// movement. The entire move is one transaction; on any failure neither
    /// side changes.
    #[instrument(skip(self))]
    pub async fn execute_transfer(&self, transfer_id: Uuid) -> Result<(), ServiceError> {
        let transfer = self.load_transfer(transfer_id).await?;
        let current = parse_status(&transfer.status)?;

        if !matches!(current, TransferStatus::Requested | TransferStatus::Approved) {
            return Err(ServiceError::Validation(format!(
                "cannot execute transfer with status {}",
                current.as_str()
            )));
        }

        let items = warehouse_transfer_item::Entity::find()
            .filter(warehouse_transfer_item::Column::TransferId.eq(transfer_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        for item in &items {
            let reserved = ledger::try_reserve(
                &txn,
                item.product_id,
                transfer.from_warehouse_id,
                item.qty,
            )
            .await?;
            if !reserved {
                return Err(ServiceError::Validation(format!(
                    "insufficient stock for product {} in source warehouse",
                    item.product_id
                )));
            }

            movements::append(
                &txn,
                item.product_id,
                transfer.from_warehouse_id,
                MovementType::Outbound,
                item.qty,
                MovementRefType::Transfer,
                transfer_id,
            )
            .await?;

            ledger::commit(&txn, item.product_id, transfer.from_warehouse_id, item.qty).await?;
        }

        // Claims the transfer against a concurrent execute: the loser sees
        // zero rows and the whole transaction rolls back.
        let claimed = transition_transfer(
            &txn,
            transfer_id,
            &[TransferStatus::Requested, TransferStatus::Approved],
            TransferStatus::InTransit,
        )
        .await?;
        if !claimed {
            return Err(ServiceError::Validation(format!(
                "transfer {transfer_id} changed state concurrently"
            )));
        }

        for item in &items {
            movements::append(
                &txn,
                item.product_id,
                transfer.to_warehouse_id,
                MovementType::Inbound,
                item.qty,
                MovementRefType::Transfer,
                transfer_id,
            )
            .await?;

            ledger::add(&txn, item.product_id, transfer.to_warehouse_id, item.qty).await?;
        }

        let completed = transition_transfer(
            &txn,
            transfer_id,
            &[TransferStatus::InTransit],
            TransferStatus::Completed,
        )
        .await?;
        if !completed {
            return Err(ServiceError::Internal(format!(
                "transfer {transfer_id} lost its in-transit state mid-move"
            )));
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(transfer_id = %transfer_id, "transfer executed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_transfer(&self, transfer_id: Uuid) -> Result<TransferResponse, ServiceError> {
        let transfer = self.load_transfer(transfer_id).await?;
        let items = warehouse_transfer_item::Entity::find()
            .filter(warehouse_transfer_item::Column::TransferId.eq(transfer_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(to_response(transfer, items))
    }

    /// Transfers touching a warehouse as source or destination, newest
    /// first.
    #[instrument(skip(self))]
    pub async fn get_transfers_by_warehouse(
        &self,
        warehouse_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<TransferResponse>, u64), ServiceError> {
        let db = &*self.db;

        let touching = Condition::any()
            .add(warehouse_transfer::Column::FromWarehouseId.eq(warehouse_id))
            .add(warehouse_transfer::Column::ToWarehouseId.eq(warehouse_id));

        let total = warehouse_transfer::Entity::find()
            .filter(touching.clone())
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        let transfers = warehouse_transfer::Entity::find()
            .filter(touching)
            .order_by_desc(warehouse_transfer::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<Uuid> = transfers.iter().map(|t| t.id).collect();
        let mut items_by_transfer: HashMap<Uuid, Vec<warehouse_transfer_item::Model>> =
            HashMap::new();
        if !ids.is_empty() {
            let items = warehouse_transfer_item::Entity::find()
                .filter(warehouse_transfer_item::Column::TransferId.is_in(ids))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;
            for item in items {
                items_by_transfer.entry(item.transfer_id).or_default().push(item);
            }
        }

        let responses = transfers
            .into_iter()
            .map(|t| {
                let items = items_by_transfer.remove(&t.id).unwrap_or_default();
                to_response(t, items)
            })
            .collect();

        Ok((responses, total))
    }

    /// Whether any transfer touching the warehouse is still REQUESTED,
    /// APPROVED or IN_TRANSIT. Used by the warehouse deactivation guard.
    pub async fn has_active_transfers(&self, warehouse_id: Uuid) -> Result<bool, ServiceError> {
        let active: Vec<&str> = [
            TransferStatus::Requested,
            TransferStatus::Approved,
            TransferStatus::InTransit,
        ]
        .iter()
        .map(|s| s.as_str())
        .collect();

        let count = warehouse_transfer::Entity::find()
            .filter(
                Condition::any()
                    .add(warehouse_transfer::Column::FromWarehouseId.eq(warehouse_id))
                    .add(warehouse_transfer::Column::ToWarehouseId.eq(warehouse_id)),
            )
            .filter(warehouse_transfer::Column::Status.is_in(active))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(count > 0)
    }

    async fn load_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<warehouse_transfer::Model, ServiceError> {
        warehouse_transfer::Entity::find_by_id(transfer_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("transfer {transfer_id} not found")))
    }
}

async fn transition_transfer(
    txn: &DatabaseTransaction,
    transfer_id: Uuid,
    from: &[TransferStatus],
    to: TransferStatus,
) -> Result<bool, ServiceError> {
    let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
    let result = warehouse_transfer::Entity::update_many()
        .col_expr(warehouse_transfer::Column::Status, Expr::value(to.as_str()))
        .filter(warehouse_transfer::Column::Id.eq(transfer_id))
        .filter(warehouse_transfer::Column::Status.is_in(from_strs))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(result.rows_affected > 0)
}

async fn load_warehouse(
    db: &DatabaseConnection,
    warehouse_id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    warehouse::Entity::find_by_id(warehouse_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("warehouse {warehouse_id} not found")))
}

fn parse_status(raw: &str) -> Result<TransferStatus, ServiceError> {
    TransferStatus::from_str(raw)
        .ok_or_else(|| ServiceError::Internal(format!("unknown transfer status {raw}")))
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid {field} format: {raw}")))
}

fn to_response(
    transfer: warehouse_transfer::Model,
    items: Vec<warehouse_transfer_item::Model>,
) -> TransferResponse {
    TransferResponse {
        id: transfer.id,
        from_warehouse_id: transfer.from_warehouse_id,
        to_warehouse_id: transfer.to_warehouse_id,
        status: transfer.status,
        created_at: transfer.created_at,
        items: items
            .into_iter()
            .map(|item| TransferItemResponse {
                id: item.id,
                product_id: item.product_id,
                qty: item.qty,
            })
            .collect(),
    }
}
