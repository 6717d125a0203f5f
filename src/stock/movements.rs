//! Append-only stock movement log.
//!
//! Rows are written in the same transaction as the mutation they describe
//! and never read back for decision-making; they exist for audit and
//! reconciliation.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use uuid::Uuid;

use crate::entities::stock_movement::{self, MovementRefType, MovementType};
use crate::errors::ServiceError;

pub async fn append<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    movement_type: MovementType,
    qty: i32,
    ref_type: MovementRefType,
    ref_id: Uuid,
) -> Result<(), ServiceError> {
    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        warehouse_id: Set(warehouse_id),
        movement_type: Set(movement_type.as_str().to_string()),
        qty: Set(qty),
        ref_type: Set(ref_type.as_str().to_string()),
        ref_id: Set(ref_id),
        created_at: Set(Utc::now()),
    };

    movement
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(())
}
