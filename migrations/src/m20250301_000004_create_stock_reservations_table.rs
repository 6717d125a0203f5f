use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockReservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockReservations::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockReservations::OrderId).uuid().not_null())
                    .col(ColumnDef::new(StockReservations::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockReservations::WarehouseId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockReservations::Qty)
                            .integer()
                            .not_null()
                            .check(Expr::col(StockReservations::Qty).gt(0)),
                    )
                    .col(ColumnDef::new(StockReservations::Status).string().not_null())
                    .col(
                        ColumnDef::new(StockReservations::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_reservations_order_id")
                    .table(StockReservations::Table)
                    .col(StockReservations::OrderId)
                    .to_owned(),
            )
            .await?;

        // The reaper scans PENDING rows by expiry; keep the composite index
        // aligned with that predicate.
        manager
            .create_index(
                Index::create()
                    .name("idx_stock_reservations_status_expires_at")
                    .table(StockReservations::Table)
                    .col(StockReservations::Status)
                    .col(StockReservations::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockReservations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StockReservations {
    Table,
    Id,
    OrderId,
    ProductId,
    WarehouseId,
    Qty,
    Status,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
