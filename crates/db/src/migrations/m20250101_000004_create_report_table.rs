//! Create report table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Report::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Report::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Report::ReporterId).string_len(32).not_null())
                    .col(ColumnDef::new(Report::ReportedUserId).string_len(32).not_null())
                    .col(ColumnDef::new(Report::TargetType).string_len(16).not_null())
                    .col(ColumnDef::new(Report::TargetId).string_len(32))
                    .col(ColumnDef::new(Report::Reason).string_len(512).not_null())
                    .col(ColumnDef::new(Report::Category).string_len(64).not_null())
                    .col(ColumnDef::new(Report::Description).text())
                    .col(
                        ColumnDef::new(Report::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Report::Priority)
                            .string_len(16)
                            .not_null()
                            .default("normal"),
                    )
                    .col(ColumnDef::new(Report::AssignedTo).string_len(32))
                    .col(ColumnDef::new(Report::ResolvedBy).string_len(32))
                    .col(ColumnDef::new(Report::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::ResolutionNotes).text())
                    .col(
                        ColumnDef::new(Report::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Report::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Triage queue: status filter, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_report_status_created_at")
                    .table(Report::Table)
                    .col(Report::Status)
                    .col(Report::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_report_reported_user_id")
                    .table(Report::Table)
                    .col(Report::ReportedUserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Report::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Report {
    Table,
    Id,
    ReporterId,
    ReportedUserId,
    TargetType,
    TargetId,
    Reason,
    Category,
    Description,
    Status,
    Priority,
    AssignedTo,
    ResolvedBy,
    ResolvedAt,
    ResolutionNotes,
    CreatedAt,
    UpdatedAt,
}
