use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Polls::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Polls::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Polls::Question).string_len(500).not_null())
                    // Ordered [{id, text, order}] array
                    .col(ColumnDef::new(Polls::Options).json_binary().not_null())
                    .col(
                        ColumnDef::new(Polls::CreatedBy)
                            .string_len(64)
                            .not_null()
                            .default("Anonymous"),
                    )
                    .col(
                        ColumnDef::new(Polls::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Polls::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Polls::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing filters on the active flag and sorts newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_polls_active_created")
                    .table(Polls::Table)
                    .col(Polls::IsActive)
                    .col(Polls::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Polls::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Polls {
    Table,
    Id,
    Question,
    Options,
    CreatedBy,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
