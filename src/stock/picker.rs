//! Warehouse selection for an order line.

use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, Order, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use uuid::Uuid;

use crate::entities::{product_stock, warehouse};
use crate::errors::ServiceError;

/// Picks one active warehouse of `shop_id` whose available stock covers
/// `qty` units of `product_id`.
///
/// Tie-break: greatest available quantity first, then lowest warehouse id,
/// so repeated picks over identical stock are deterministic. The picker only
/// reads; the subsequent `ledger::try_reserve` is the authority on whether
/// the stock is still there.
pub async fn pick<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    qty: i32,
    shop_id: Uuid,
) -> Result<Uuid, ServiceError> {
    let available = Expr::col((product_stock::Entity, product_stock::Column::OnHand))
        .sub(Expr::col((product_stock::Entity, product_stock::Column::Reserved)));

    let picked: Option<Uuid> = product_stock::Entity::find()
        .select_only()
        .column(product_stock::Column::WarehouseId)
        .join(JoinType::InnerJoin, product_stock::Relation::Warehouse.def())
        .filter(product_stock::Column::ProductId.eq(product_id))
        .filter(warehouse::Column::ShopId.eq(shop_id))
        .filter(warehouse::Column::IsActive.eq(true))
        .filter(available.clone().gte(qty))
        .order_by(available, Order::Desc)
        .order_by_asc(product_stock::Column::WarehouseId)
        .limit(1)
        .into_tuple()
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    picked.ok_or_else(|| {
        ServiceError::OutOfStock(format!(
            "no warehouse can satisfy {qty} unit(s) of product {product_id}"
        ))
    })
}
