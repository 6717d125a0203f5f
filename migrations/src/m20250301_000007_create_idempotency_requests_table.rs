use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IdempotencyRequests::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IdempotencyRequests::Key).string().not_null())
                    .col(ColumnDef::new(IdempotencyRequests::Endpoint).string().not_null())
                    .col(
                        ColumnDef::new(IdempotencyRequests::PayloadHash)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IdempotencyRequests::OrderId).uuid().null())
                    .col(ColumnDef::new(IdempotencyRequests::ResponseBody).text().null())
                    .col(
                        ColumnDef::new(IdempotencyRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(IdempotencyRequests::Key)
                            .col(IdempotencyRequests::Endpoint),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IdempotencyRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum IdempotencyRequests {
    Table,
    Key,
    Endpoint,
    PayloadHash,
    OrderId,
    ResponseBody,
    CreatedAt,
}
