//! Reclamation of expired reservations.
//!
//! One transaction per batch: the rows are locked with a skip-locked scan,
//! released in the ledger, marked EXPIRED, and any order left without
//! pending reservations is moved to EXPIRED. A failure anywhere aborts the
//! whole batch and the rows are picked up again on the next tick.

use std::collections::BTreeSet;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::stock_movement::{MovementRefType, MovementType};
use crate::errors::ServiceError;
use crate::services::orders::transition_order;
use crate::services::reservations;
use crate::stock::{ledger, movements};

/// Result of one reaper pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReleaseOutcome {
    /// Reservations released and marked EXPIRED in this pass.
    pub released: u64,
    /// Orders transitioned to EXPIRED because no pending reservation
    /// remained.
    pub orders_expired: u64,
}

#[derive(Clone)]
pub struct StockReleaseService {
    db: Arc<DatabaseConnection>,
}

impl StockReleaseService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn process_expired_reservations(
        &self,
        batch_size: u64,
    ) -> Result<ReleaseOutcome, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let expired = reservations::pick_expired_for_update(&txn, batch_size).await?;
        if expired.is_empty() {
            txn.commit().await.map_err(ServiceError::db_error)?;
            return Ok(ReleaseOutcome::default());
        }

        info!(count = expired.len(), "processing expired reservations");

        for reservation in &expired {
            ledger::release(
                &txn,
                reservation.product_id,
                reservation.warehouse_id,
                reservation.qty,
            )
            .await?;
            movements::append(
                &txn,
                reservation.product_id,
                reservation.warehouse_id,
                MovementType::Release,
                reservation.qty,
                MovementRefType::ReservationExpired,
                reservation.id,
            )
            .await?;
            reservations::mark_expired(&txn, reservation.id).await?;
        }

        let touched_orders: BTreeSet<Uuid> = expired.iter().map(|r| r.order_id).collect();
        let mut orders_expired = 0u64;
        for order_id in touched_orders {
            if reservations::pending_count(&txn, order_id).await? > 0 {
                continue;
            }
            let updated = transition_order(
                &txn,
                order_id,
                &[OrderStatus::AwaitingPayment, OrderStatus::Pending],
                OrderStatus::Expired,
            )
            .await?;
            if updated {
                orders_expired += 1;
                info!(order_id = %order_id, "order expired, all reservations released");
            }
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        Ok(ReleaseOutcome {
            released: expired.len() as u64,
            orders_expired,
        })
    }
}
