//! Create moderation_log table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ModerationLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModerationLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ModerationLog::ModeratorId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ModerationLog::Action).string_len(32).not_null())
                    .col(ColumnDef::new(ModerationLog::TargetUserId).string_len(32))
                    .col(ColumnDef::new(ModerationLog::TargetPostId).string_len(32))
                    .col(ColumnDef::new(ModerationLog::TargetThreadId).string_len(32))
                    .col(ColumnDef::new(ModerationLog::Reason).text())
                    .col(
                        ColumnDef::new(ModerationLog::Details)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(ModerationLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_moderation_log_moderator_id")
                    .table(ModerationLog::Table)
                    .col(ModerationLog::ModeratorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_moderation_log_target_user_id")
                    .table(ModerationLog::Table)
                    .col(ModerationLog::TargetUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_moderation_log_created_at")
                    .table(ModerationLog::Table)
                    .col(ModerationLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModerationLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ModerationLog {
    Table,
    Id,
    ModeratorId,
    Action,
    TargetUserId,
    TargetPostId,
    TargetThreadId,
    Reason,
    Details,
    CreatedAt,
}
