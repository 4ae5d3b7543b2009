//! Create warning table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Warning::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Warning::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Warning::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Warning::IssuedBy).string_len(32).not_null())
                    .col(ColumnDef::new(Warning::Reason).string_len(512).not_null())
                    .col(ColumnDef::new(Warning::Description).text())
                    .col(ColumnDef::new(Warning::Points).integer().not_null().default(1))
                    .col(ColumnDef::new(Warning::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Warning::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Warning::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Warning::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_warning_user")
                            .from(Warning::Table, Warning::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_warning_user_id_expires_at")
                    .table(Warning::Table)
                    .col(Warning::UserId)
                    .col(Warning::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Warning::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Warning {
    Table,
    Id,
    UserId,
    IssuedBy,
    Reason,
    Description,
    Points,
    IsActive,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
