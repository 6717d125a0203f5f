pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_catalog_tables;
mod m20250301_000002_create_product_stock_table;
mod m20250301_000003_create_orders_tables;
mod m20250301_000004_create_stock_reservations_table;
mod m20250301_000005_create_stock_movements_table;
mod m20250301_000006_create_warehouse_transfers_tables;
mod m20250301_000007_create_idempotency_requests_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_catalog_tables::Migration),
            Box::new(m20250301_000002_create_product_stock_table::Migration),
            Box::new(m20250301_000003_create_orders_tables::Migration),
            Box::new(m20250301_000004_create_stock_reservations_table::Migration),
            Box::new(m20250301_000005_create_stock_movements_table::Migration),
            Box::new(m20250301_000006_create_warehouse_transfers_tables::Migration),
            Box::new(m20250301_000007_create_idempotency_requests_table::Migration),
        ]
    }
}
