//! Moderation log entity.
//!
//! Append-only. The repository exposes no update or delete.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Action recorded by a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    #[sea_orm(string_value = "suspend")]
    Suspend,
    #[sea_orm(string_value = "ban")]
    Ban,
    #[sea_orm(string_value = "unsuspend")]
    Unsuspend,
    #[sea_orm(string_value = "edit_suspension")]
    EditSuspension,
    #[sea_orm(string_value = "delete_suspension")]
    DeleteSuspension,
    #[sea_orm(string_value = "warn")]
    Warn,
    #[sea_orm(string_value = "edit_warning")]
    EditWarning,
    #[sea_orm(string_value = "delete_warning")]
    DeleteWarning,
    #[sea_orm(string_value = "assign_report")]
    AssignReport,
    #[sea_orm(string_value = "reassign_report")]
    ReassignReport,
    #[sea_orm(string_value = "resolve_report")]
    ResolveReport,
    #[sea_orm(string_value = "dismiss_report")]
    DismissReport,
    #[sea_orm(string_value = "create_filter")]
    CreateFilter,
    #[sea_orm(string_value = "update_filter")]
    UpdateFilter,
    #[sea_orm(string_value = "delete_filter")]
    DeleteFilter,
}

impl ModerationAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Ban => "ban",
            Self::Unsuspend => "unsuspend",
            Self::EditSuspension => "edit_suspension",
            Self::DeleteSuspension => "delete_suspension",
            Self::Warn => "warn",
            Self::EditWarning => "edit_warning",
            Self::DeleteWarning => "delete_warning",
            Self::AssignReport => "assign_report",
            Self::ReassignReport => "reassign_report",
            Self::ResolveReport => "resolve_report",
            Self::DismissReport => "dismiss_report",
            Self::CreateFilter => "create_filter",
            Self::UpdateFilter => "update_filter",
            Self::DeleteFilter => "delete_filter",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "moderation_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(indexed)]
    pub moderator_id: String,
    pub action: ModerationAction,
    #[sea_orm(nullable, indexed)]
    pub target_user_id: Option<String>,
    #[sea_orm(nullable)]
    pub target_post_id: Option<String>,
    #[sea_orm(nullable)]
    pub target_thread_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    /// Action-specific payload (record ids, before/after values).
    #[sea_orm(column_type = "JsonBinary")]
    pub details: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
