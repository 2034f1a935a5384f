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
                    .table(AuthRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthRecords::UId)
                            .string_len(12)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AuthRecords::Username)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AuthRecords::Email)
                            .string_len(254)
                            .not_null()
                            .unique_key(),
                    )
                    // Argon2id PHC string
                    .col(ColumnDef::new(AuthRecords::Password).text().not_null())
                    .col(
                        ColumnDef::new(AuthRecords::AvatarColor)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuthRecords {
    Table,
    Id,
    UId,
    Username,
    Email,
    Password,
    AvatarColor,
    CreatedAt,
}
