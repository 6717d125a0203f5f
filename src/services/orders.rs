//! Order engine: checkout, payment confirmation and cancellation.
//!
//! Each operation is exactly one database transaction. Concurrent confirms
//! and cancels of the same order are serialized by the guarded UPDATE on the
//! order row; concurrent checkouts against the same stock are serialized by
//! the ledger's guarded UPDATE on `product_stock`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::idempotency_request;
use crate::entities::order::{self, OrderStatus};
use crate::entities::order_item;
use crate::entities::stock_movement::{MovementRefType, MovementType};
use crate::entities::stock_reservation::ReservationStatus;
use crate::errors::ServiceError;
use crate::services::reservations::{self, NewReservation};
use crate::stock::{ledger, movements, picker};

const CHECKOUT_ENDPOINT: &str = "checkout";
const MAX_PAGE_LIMIT: u64 = 100;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CheckoutItem {
    pub product_id: String,
    #[validate(range(min = 1, message = "item quantity must be greater than 0"))]
    pub qty: i32,
    #[validate(range(min = 1, message = "item price must be greater than 0"))]
    pub price: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutInput {
    pub shop_id: String,
    #[validate(
        length(min = 1, message = "order must contain at least one item"),
        nested
    )]
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub reservation_minutes: Option<i64>,
    #[serde(default)]
    pub idem_key: Option<String>,
    #[serde(default)]
    pub payload_hash: Option<String>,
}

/// Checkout result. Serialized verbatim into the idempotency record so a
/// replay returns a byte-identical body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOutput {
    pub order_id: Uuid,
    pub total: i64,
    pub status: String,
    pub reservation_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub qty: i32,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shop_id: Uuid,
    pub status: String,
    pub total: i64,
    pub reservation_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderListItem {
    pub order_id: Uuid,
    pub total: i64,
    pub status: String,
    pub item_count: usize,
    pub reservation_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    default_reservation_ttl: Duration,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, default_reservation_ttl: Duration) -> Self {
        Self {
            db,
            default_reservation_ttl,
        }
    }

    /// Creates an order, its items and one PENDING reservation per line,
    /// all inside a single transaction.
    ///
    /// When `idem_key` is present the whole operation is replay-safe: the
    /// key row is claimed with an insert-on-conflict-do-nothing, and the
    /// serialized response is written back before commit, so a retry either
    /// replays the cached response or fails with CONFLICT.
    #[instrument(skip(self, input), fields(shop_id = %input.shop_id, user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        input: CheckoutInput,
    ) -> Result<CheckoutOutput, ServiceError> {
        input.validate()?;

        let shop_id = parse_uuid(&input.shop_id, "shop_id")?;
        let ttl = resolve_reservation_ttl(input.reservation_minutes, self.default_reservation_ttl);

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(input.items.len());
        let mut total: i64 = 0;
        for item in &input.items {
            let product_id = parse_uuid(&item.product_id, "product_id")?;
            if !seen.insert(product_id) {
                return Err(ServiceError::Validation(format!(
                    "duplicate product {product_id} in order"
                )));
            }
            total += i64::from(item.qty) * item.price;
            lines.push((product_id, item.qty, item.price));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        if let Some(key) = input.idem_key.as_deref() {
            let payload_hash = input.payload_hash.clone().unwrap_or_default();
            let is_new = begin_idempotency_key(&txn, key, &payload_hash).await?;

            if !is_new {
                let record = idempotency_request::Entity::find_by_id((
                    key.to_string(),
                    CHECKOUT_ENDPOINT.to_string(),
                ))
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::Conflict("idempotency record is not visible yet".to_string())
                })?;

                if record.payload_hash != payload_hash {
                    return Err(ServiceError::Conflict(
                        "idempotency key reused with a different payload".to_string(),
                    ));
                }

                if let Some(body) = record.response_body {
                    let replayed: CheckoutOutput = serde_json::from_str(&body).map_err(|e| {
                        ServiceError::Internal(format!(
                            "failed to deserialize stored checkout response: {e}"
                        ))
                    })?;
                    info!(order_id = %replayed.order_id, "checkout replayed from idempotency record");
                    return Ok(replayed);
                }

                return Err(ServiceError::Conflict(
                    "checkout with this idempotency key is still in flight".to_string(),
                ));
            }
        }

        // Probe stock before writing anything order-shaped; the later
        // reservation-time pick stays authoritative.
        for (product_id, qty, _) in &lines {
            picker::pick(&txn, *product_id, *qty, shop_id).await?;
        }

        let now = Utc::now();
        let reservation_expires_at = now + ttl;
        let order_id = Uuid::new_v4();

        let order_row = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            shop_id: Set(shop_id),
            status: Set(OrderStatus::AwaitingPayment.as_str().to_string()),
            total: Set(total),
            reservation_expires_at: Set(Some(reservation_expires_at)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        order_row.insert(&txn).await.map_err(ServiceError::db_error)?;

        let item_rows = lines.iter().map(|(product_id, qty, price)| order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(*product_id),
            qty: Set(*qty),
            price: Set(*price),
        });
        order_item::Entity::insert_many(item_rows)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let mut new_reservations = Vec::with_capacity(lines.len());
        for (product_id, qty, _) in &lines {
            let warehouse_id = picker::pick(&txn, *product_id, *qty, shop_id).await?;

            let reserved = ledger::try_reserve(&txn, *product_id, warehouse_id, *qty).await?;
            if !reserved {
                return Err(ServiceError::OutOfStock(format!(
                    "insufficient stock to reserve product {product_id}"
                )));
            }

            movements::append(
                &txn,
                *product_id,
                warehouse_id,
                MovementType::Reserve,
                *qty,
                MovementRefType::OrderCheckout,
                order_id,
            )
            .await?;

            new_reservations.push(NewReservation {
                order_id,
                product_id: *product_id,
                warehouse_id,
                qty: *qty,
                expires_at: reservation_expires_at,
            });
        }

        reservations::create_many(&txn, &new_reservations).await?;

        let output = CheckoutOutput {
            order_id,
            total,
            status: OrderStatus::AwaitingPayment.as_str().to_string(),
            reservation_expires_at,
        };

        if let Some(key) = input.idem_key.as_deref() {
            let body = serde_json::to_string(&output).map_err(|e| {
                ServiceError::Internal(format!("failed to serialize checkout response: {e}"))
            })?;
            save_idempotency_response(&txn, key, order_id, &body).await?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(order_id = %order_id, total = total, "checkout completed");
        Ok(output)
    }

    /// Commits every reservation of an AWAITING_PAYMENT order and moves it
    /// to PAID. Payment itself is a signal delivered by the caller.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order_row = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

        if order_row.status != OrderStatus::AwaitingPayment.as_str() {
            return Err(ServiceError::Validation(
                "order cannot be confirmed in its current status".to_string(),
            ));
        }

        // The guarded transition doubles as the lock that serializes racing
        // confirms and cancels on this order.
        let updated = transition_order(&txn, order_id, &[OrderStatus::AwaitingPayment], OrderStatus::Paid).await?;
        if !updated {
            return Err(ServiceError::Validation(
                "order cannot be confirmed in its current status".to_string(),
            ));
        }

        let order_reservations = reservations::get_by_order(&txn, order_id).await?;
        if order_reservations.is_empty() {
            return Err(ServiceError::Validation(
                "no reservations found for order".to_string(),
            ));
        }

        let now = Utc::now();
        for reservation in &order_reservations {
            if reservation.status != ReservationStatus::Pending.as_str() {
                return Err(ServiceError::Validation(
                    "reservation is not in pending status".to_string(),
                ));
            }
            if reservation.expires_at <= now {
                return Err(ServiceError::Validation(
                    "reservation has expired".to_string(),
                ));
            }
        }

        for reservation in &order_reservations {
            ledger::commit(
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
                MovementType::Commit,
                reservation.qty,
                MovementRefType::OrderPayment,
                order_id,
            )
            .await?;
        }

        reservations::mark_committed(&txn, order_id).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(order_id = %order_id, "payment confirmed, stock committed");
        Ok(())
    }

    /// Releases every PENDING reservation of the order and moves it to
    /// CANCELLED. Terminal reservations are left untouched.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order_row = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

        let cancellable = order_row.status == OrderStatus::AwaitingPayment.as_str()
            || order_row.status == OrderStatus::Pending.as_str();
        if !cancellable {
            return Err(ServiceError::Validation(
                "order cannot be cancelled in its current status".to_string(),
            ));
        }

        let updated = transition_order(
            &txn,
            order_id,
            &[OrderStatus::AwaitingPayment, OrderStatus::Pending],
            OrderStatus::Cancelled,
        )
        .await?;
        if !updated {
            return Err(ServiceError::Validation(
                "order cannot be cancelled in its current status".to_string(),
            ));
        }

        let order_reservations = reservations::get_by_order(&txn, order_id).await?;
        for reservation in &order_reservations {
            if reservation.status != ReservationStatus::Pending.as_str() {
                continue;
            }
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
                MovementRefType::OrderCancelled,
                order_id,
            )
            .await?;
        }

        reservations::mark_released(&txn, order_id).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(order_id = %order_id, "order cancelled, reservations released");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_order_details(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db;

        let order_row = order::Entity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(OrderDetails {
            id: order_row.id,
            user_id: order_row.user_id,
            shop_id: order_row.shop_id,
            status: order_row.status,
            total: order_row.total,
            reservation_expires_at: order_row.reservation_expires_at,
            created_at: order_row.created_at,
            updated_at: order_row.updated_at,
            items: items
                .into_iter()
                .map(|item| OrderItemDetail {
                    id: item.id,
                    product_id: item.product_id,
                    qty: item.qty,
                    price: item.price,
                })
                .collect(),
        })
    }

    /// The caller's orders, newest first.
    #[instrument(skip(self))]
    pub async fn get_user_orders(
        &self,
        user_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderListItem>, u64), ServiceError> {
        if page == 0 || limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ServiceError::InvalidArgument(format!(
                "page must be >= 1 and limit between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        let db = &*self.db;

        let paginator = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let orders = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut item_counts: HashMap<Uuid, usize> = HashMap::new();
        if !order_ids.is_empty() {
            let items = order_item::Entity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;
            for item in items {
                *item_counts.entry(item.order_id).or_default() += 1;
            }
        }

        let list = orders
            .into_iter()
            .map(|o| OrderListItem {
                order_id: o.id,
                total: o.total,
                status: o.status,
                item_count: item_counts.get(&o.id).copied().unwrap_or(0),
                reservation_expires_at: o.reservation_expires_at,
                created_at: o.created_at,
            })
            .collect();

        Ok((list, total))
    }
}

/// Guarded order status transition: applies only when the current status is
/// one of `from`. Returns whether a row was updated.
pub(crate) async fn transition_order(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    from: &[OrderStatus],
    to: OrderStatus,
) -> Result<bool, ServiceError> {
    let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
    let result = order::Entity::update_many()
        .col_expr(order::Column::Status, Expr::value(to.as_str()))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.is_in(from_strs))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(result.rows_affected > 0)
}

async fn begin_idempotency_key(
    txn: &DatabaseTransaction,
    key: &str,
    payload_hash: &str,
) -> Result<bool, ServiceError> {
    let row = idempotency_request::ActiveModel {
        key: Set(key.to_string()),
        endpoint: Set(CHECKOUT_ENDPOINT.to_string()),
        payload_hash: Set(payload_hash.to_string()),
        order_id: Set(None),
        response_body: Set(None),
        created_at: Set(Utc::now()),
    };

    let inserted = idempotency_request::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                idempotency_request::Column::Key,
                idempotency_request::Column::Endpoint,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(txn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(inserted > 0)
}

async fn save_idempotency_response(
    txn: &DatabaseTransaction,
    key: &str,
    order_id: Uuid,
    body: &str,
) -> Result<(), ServiceError> {
    idempotency_request::Entity::update_many()
        .col_expr(idempotency_request::Column::OrderId, Expr::value(order_id))
        .col_expr(idempotency_request::Column::ResponseBody, Expr::value(body))
        .filter(idempotency_request::Column::Key.eq(key))
        .filter(idempotency_request::Column::Endpoint.eq(CHECKOUT_ENDPOINT))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(())
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid {field} format: {raw}")))
}

/// TTL resolution order: explicit minutes on the request, then the
/// configured default, then 15 minutes.
fn resolve_reservation_ttl(reservation_minutes: Option<i64>, default_ttl: Duration) -> Duration {
    match reservation_minutes {
        Some(minutes) if minutes > 0 => Duration::minutes(minutes),
        _ => {
            if default_ttl > Duration::zero() {
                default_ttl
            } else {
                Duration::minutes(15)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_minutes_take_precedence() {
        let ttl = resolve_reservation_ttl(Some(10), Duration::minutes(45));
        assert_eq!(ttl, Duration::minutes(10));
    }

    #[test]
    fn configured_default_applies_when_minutes_absent() {
        let ttl = resolve_reservation_ttl(None, Duration::minutes(45));
        assert_eq!(ttl, Duration::minutes(45));

        let ttl = resolve_reservation_ttl(Some(0), Duration::minutes(45));
        assert_eq!(ttl, Duration::minutes(45));
    }

    #[test]
    fn fifteen_minutes_is_the_last_resort() {
        let ttl = resolve_reservation_ttl(None, Duration::zero());
        assert_eq!(ttl, Duration::minutes(15));

        let ttl = resolve_reservation_ttl(Some(-5), Duration::minutes(-1));
        assert_eq!(ttl, Duration::minutes(15));
    }

    #[test]
    fn checkout_output_serialization_is_stable() {
        let output = CheckoutOutput {
            order_id: Uuid::nil(),
            total: 300,
            status: "AWAITING_PAYMENT".to_string(),
            reservation_expires_at: chrono::DateTime::parse_from_rfc3339(
                "2025-03-01T12:00:00Z",
            )
            .unwrap()
            .with_timezone(&Utc),
        };

        let first = serde_json::to_string(&output).unwrap();
        let second = serde_json::to_string(&output).unwrap();
        assert_eq!(first, second);

        let round_tripped: CheckoutOutput = serde_json::from_str(&first).unwrap();
        assert_eq!(round_tripped, output);
    }
}
