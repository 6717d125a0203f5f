use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WarehouseTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WarehouseTransfers::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTransfers::FromWarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTransfers::ToWarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WarehouseTransfers::Status).string().not_null())
                    .col(
                        ColumnDef::new(WarehouseTransfers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_warehouse_transfers_from")
                    .table(WarehouseTransfers::Table)
                    .col(WarehouseTransfers::FromWarehouseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_warehouse_transfers_to")
                    .table(WarehouseTransfers::Table)
                    .col(WarehouseTransfers::ToWarehouseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WarehouseTransferItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WarehouseTransferItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTransferItems::TransferId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTransferItems::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTransferItems::Qty)
                            .integer()
                            .not_null()
                            .check(Expr::col(WarehouseTransferItems::Qty).gt(0)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_warehouse_transfer_items_transfer")
                            .from(
                                WarehouseTransferItems::Table,
                                WarehouseTransferItems::TransferId,
                            )
                            .to(WarehouseTransfers::Table, WarehouseTransfers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_warehouse_transfer_items_transfer_id")
                    .table(WarehouseTransferItems::Table)
                    .col(WarehouseTransferItems::TransferId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WarehouseTransferItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WarehouseTransfers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum WarehouseTransfers {
    Table,
    Id,
    FromWarehouseId,
    ToWarehouseId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum WarehouseTransferItems {
    Table,
    Id,
    TransferId,
    ProductId,
    Qty,
}
