//! Warehouse reads and the deactivation guard.

use std::sync::Arc;

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::warehouse;
use crate::errors::ServiceError;
use crate::services::transfers::TransferService;

#[derive(Clone)]
pub struct WarehouseService {
    db: Arc<DatabaseConnection>,
    transfers: TransferService,
}

impl WarehouseService {
    pub fn new(db: Arc<DatabaseConnection>, transfers: TransferService) -> Self {
        Self { db, transfers }
    }

    #[instrument(skip(self))]
    pub async fn get_warehouse(&self, warehouse_id: Uuid) -> Result<warehouse::Model, ServiceError> {
        warehouse::Entity::find_by_id(warehouse_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {warehouse_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_by_shop(&self, shop_id: Uuid) -> Result<Vec<warehouse::Model>, ServiceError> {
        warehouse::Entity::find()
            .filter(warehouse::Column::ShopId.eq(shop_id))
            .order_by_desc(warehouse::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Activates or deactivates a warehouse.
    ///
    /// Deactivation is rejected while any transfer touching the warehouse is
    /// still in flight. Pending reservations do not block deactivation; they
    /// stay valid until committed, released or expired.
    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        warehouse_id: Uuid,
        is_active: bool,
    ) -> Result<(), ServiceError> {
        // Existence check first so an unknown id is NOT_FOUND, not a guard
        // failure.
        self.get_warehouse(warehouse_id).await?;

        if !is_active && self.transfers.has_active_transfers(warehouse_id).await? {
            return Err(ServiceError::PreconditionFailed(
                "cannot deactivate warehouse with active transfers".to_string(),
            ));
        }

        warehouse::Entity::update_many()
            .col_expr(warehouse::Column::IsActive, Expr::value(is_active))
            .filter(warehouse::Column::Id.eq(warehouse_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(warehouse_id = %warehouse_id, is_active, "warehouse active flag updated");
        Ok(())
    }
}
