//! Create suspension table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Suspension::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Suspension::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Suspension::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Suspension::IssuedBy).string_len(32).not_null())
                    .col(ColumnDef::new(Suspension::Reason).string_len(512).not_null())
                    .col(ColumnDef::new(Suspension::Description).text())
                    .col(ColumnDef::new(Suspension::Kind).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Suspension::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Suspension::StartsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Suspension::ExpiresAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Suspension::LiftedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Suspension::LiftedBy).string_len(32))
                    .col(
                        ColumnDef::new(Suspension::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Suspension::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_suspension_user")
                            .from(Suspension::Table, Suspension::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_suspension_user_id_is_active")
                    .table(Suspension::Table)
                    .col(Suspension::UserId)
                    .col(Suspension::IsActive)
                    .to_owned(),
            )
            .await?;

        // Expiry sweeps and effective-set listings
        manager
            .create_index(
                Index::create()
                    .name("idx_suspension_expires_at")
                    .table(Suspension::Table)
                    .col(Suspension::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Suspension::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Suspension {
    Table,
    Id,
    UserId,
    IssuedBy,
    Reason,
    Description,
    Kind,
    IsActive,
    StartsAt,
    ExpiresAt,
    LiftedAt,
    LiftedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
