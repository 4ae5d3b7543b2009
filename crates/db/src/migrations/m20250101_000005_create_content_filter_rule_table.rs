//! Create content_filter_rule table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentFilterRule::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentFilterRule::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ContentFilterRule::FilterType)
                            .string_len(16)
                            .not_null()
                            .default("word"),
                    )
                    .col(
                        ColumnDef::new(ContentFilterRule::Pattern)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentFilterRule::Replacement)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ContentFilterRule::IsRegex)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ContentFilterRule::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ContentFilterRule::CreatedBy)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentFilterRule::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ContentFilterRule::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Snapshot loads read active rules in creation order
        manager
            .create_index(
                Index::create()
                    .name("idx_content_filter_rule_active_created_at")
                    .table(ContentFilterRule::Table)
                    .col(ContentFilterRule::IsActive)
                    .col(ContentFilterRule::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentFilterRule::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ContentFilterRule {
    Table,
    Id,
    FilterType,
    Pattern,
    Replacement,
    IsRegex,
    IsActive,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
