//! Reservation persistence and status transitions.
//!
//! Every transition is conditional on the row still being PENDING, so a
//! retried or raced call can never move a terminal reservation. All
//! functions run on the caller's connection or transaction.

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::stock_reservation::{self, ReservationStatus};
use crate::errors::ServiceError;

/// Input for a reservation row created during checkout or transfer staging.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub qty: i32,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Bulk-inserts PENDING reservations.
pub async fn create_many<C: ConnectionTrait>(
    conn: &C,
    reservations: &[NewReservation],
) -> Result<(), ServiceError> {
    if reservations.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let rows = reservations.iter().map(|res| stock_reservation::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(res.order_id),
        product_id: Set(res.product_id),
        warehouse_id: Set(res.warehouse_id),
        qty: Set(res.qty),
        status: Set(ReservationStatus::Pending.as_str().to_string()),
        expires_at: Set(res.expires_at),
        created_at: Set(now),
        updated_at: Set(now),
    });

    stock_reservation::Entity::insert_many(rows)
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(())
}

/// Returns up to `limit` PENDING reservations whose expiry has passed,
/// taking row-level write locks and skipping rows already locked by a
/// concurrent transaction.
///
/// The skip-locked clause is what lets several reaper workers run against
/// the same table without blocking on each other; it only exists on
/// Postgres, so other backends (the SQLite test harness) fall back to a
/// plain scan.
pub async fn pick_expired_for_update<C: ConnectionTrait>(
    conn: &C,
    limit: u64,
) -> Result<Vec<stock_reservation::Model>, ServiceError> {
    let mut query = stock_reservation::Entity::find()
        .filter(stock_reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
        .filter(stock_reservation::Column::ExpiresAt.lte(Utc::now()))
        .order_by_asc(stock_reservation::Column::ExpiresAt)
        .limit(limit);

    if conn.get_database_backend() == DbBackend::Postgres {
        query = query.lock_with_behavior(LockType::Update, LockBehavior::SkipLocked);
    }

    query.all(conn).await.map_err(ServiceError::db_error)
}

/// PENDING -> EXPIRED for a single reservation.
pub async fn mark_expired<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
    stock_reservation::Entity::update_many()
        .col_expr(
            stock_reservation::Column::Status,
            Expr::value(ReservationStatus::Expired.as_str()),
        )
        .col_expr(stock_reservation::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_reservation::Column::Id.eq(id))
        .filter(stock_reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(())
}

/// PENDING -> COMMITTED for every reservation of an order.
pub async fn mark_committed<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<(), ServiceError> {
    set_status_for_order(conn, order_id, ReservationStatus::Committed).await
}

/// PENDING -> RELEASED for every reservation of an order.
pub async fn mark_released<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<(), ServiceError> {
    set_status_for_order(conn, order_id, ReservationStatus::Released).await
}

async fn set_status_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    status: ReservationStatus,
) -> Result<(), ServiceError> {
    stock_reservation::Entity::update_many()
        .col_expr(
            stock_reservation::Column::Status,
            Expr::value(status.as_str()),
        )
        .col_expr(stock_reservation::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_reservation::Column::OrderId.eq(order_id))
        .filter(stock_reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(())
}

/// Number of PENDING reservations still attached to an order.
pub async fn pending_count<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<u64, ServiceError> {
    stock_reservation::Entity::find()
        .filter(stock_reservation::Column::OrderId.eq(order_id))
        .filter(stock_reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn get_by_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<stock_reservation::Model>, ServiceError> {
    stock_reservation::Entity::find()
        .filter(stock_reservation::Column::OrderId.eq(order_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn retrieve<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<stock_reservation::Model, ServiceError> {
    stock_reservation::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("reservation {id} not found")))
}
