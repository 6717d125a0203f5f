//! Guarded mutations of the `(on_hand, reserved)` counters.
//!
//! Every function issues a single UPDATE whose WHERE clause carries the
//! invariant, so concurrent callers are linearized by the database row: the
//! statement either applies atomically or affects zero rows. None of these
//! functions opens a transaction; they run on whatever connection or
//! transaction the caller passes in, and the caller appends the matching
//! movement row in the same transaction.

use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::product_stock;
use crate::errors::ServiceError;

/// Earmarks `qty` units for a pending order.
///
/// Returns `false` when the warehouse cannot cover the quantity; policy is
/// left to the caller.
pub async fn try_reserve<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i32,
) -> Result<bool, ServiceError> {
    let result = product_stock::Entity::update_many()
        .col_expr(
            product_stock::Column::Reserved,
            Expr::col(product_stock::Column::Reserved).add(qty),
        )
        .col_expr(product_stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_stock::Column::ProductId.eq(product_id))
        .filter(product_stock::Column::WarehouseId.eq(warehouse_id))
        .filter(
            Expr::col(product_stock::Column::OnHand)
                .sub(Expr::col(product_stock::Column::Reserved))
                .gte(qty),
        )
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(result.rows_affected > 0)
}

/// Returns `qty` previously reserved units to the available pool.
///
/// The caller has already established, through the owning reservation's
/// state, that the units were reserved; a zero-row update therefore means
/// the counters are corrupt and is reported as an internal error.
pub async fn release<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i32,
) -> Result<(), ServiceError> {
    let result = product_stock::Entity::update_many()
        .col_expr(
            product_stock::Column::Reserved,
            Expr::col(product_stock::Column::Reserved).sub(qty),
        )
        .col_expr(product_stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_stock::Column::ProductId.eq(product_id))
        .filter(product_stock::Column::WarehouseId.eq(warehouse_id))
        .filter(Expr::col(product_stock::Column::Reserved).gte(qty))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Internal(format!(
            "releasing {qty} unit(s) of product {product_id} in warehouse {warehouse_id} \
             would drive reserved below zero"
        )));
    }

    Ok(())
}

/// Moves `qty` units from reserved to gone: both counters drop together.
pub async fn commit<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i32,
) -> Result<(), ServiceError> {
    let result = product_stock::Entity::update_many()
        .col_expr(
            product_stock::Column::OnHand,
            Expr::col(product_stock::Column::OnHand).sub(qty),
        )
        .col_expr(
            product_stock::Column::Reserved,
            Expr::col(product_stock::Column::Reserved).sub(qty),
        )
        .col_expr(product_stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_stock::Column::ProductId.eq(product_id))
        .filter(product_stock::Column::WarehouseId.eq(warehouse_id))
        .filter(Expr::col(product_stock::Column::OnHand).gte(qty))
        .filter(Expr::col(product_stock::Column::Reserved).gte(qty))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Internal(format!(
            "committing {qty} unit(s) of product {product_id} in warehouse {warehouse_id} \
             would drive a stock counter below zero"
        )));
    }

    Ok(())
}

/// Adds `qty` units of physical stock, creating the `(product, warehouse)`
/// row on first contact. Used for transfer arrivals and initial stocking.
pub async fn add<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i32,
) -> Result<(), ServiceError> {
    let result = product_stock::Entity::update_many()
        .col_expr(
            product_stock::Column::OnHand,
            Expr::col(product_stock::Column::OnHand).add(qty),
        )
        .col_expr(product_stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_stock::Column::ProductId.eq(product_id))
        .filter(product_stock::Column::WarehouseId.eq(warehouse_id))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        let row = product_stock::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            warehouse_id: Set(warehouse_id),
            on_hand: Set(qty),
            reserved: Set(0),
            updated_at: Set(Utc::now()),
        };
        product_stock::Entity::insert(row)
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
    }

    Ok(())
}
