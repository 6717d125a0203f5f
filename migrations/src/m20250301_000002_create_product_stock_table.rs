use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductStock::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ProductStock::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(ProductStock::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ProductStock::WarehouseId).uuid().not_null())
                    .col(
                        ColumnDef::new(ProductStock::OnHand)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(ProductStock::OnHand).gte(0)),
                    )
                    .col(
                        ColumnDef::new(ProductStock::Reserved)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(
                                Expr::col(ProductStock::Reserved)
                                    .gte(0)
                                    .and(Expr::col(ProductStock::Reserved).lte(Expr::col(ProductStock::OnHand))),
                            ),
                    )
                    .col(
                        ColumnDef::new(ProductStock::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_product_stock_product_warehouse")
                    .table(ProductStock::Table)
                    .col(ProductStock::ProductId)
                    .col(ProductStock::WarehouseId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductStock::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ProductStock {
    Table,
    Id,
    ProductId,
    WarehouseId,
    OnHand,
    Reserved,
    UpdatedAt,
}
