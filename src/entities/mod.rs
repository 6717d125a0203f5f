pub mod idempotency_request;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_stock;
pub mod shop;
pub mod stock_movement;
pub mod stock_reservation;
pub mod warehouse;
pub mod warehouse_transfer;
pub mod warehouse_transfer_item;
