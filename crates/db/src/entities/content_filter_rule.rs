//! Content filter rule entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a rule is meant to catch. All three share the same literal matcher
/// unless `is_regex` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    #[sea_orm(string_value = "word")]
    Word,
    #[sea_orm(string_value = "url")]
    Url,
    #[sea_orm(string_value = "phrase")]
    Phrase,
}

/// Platform-wide content filter rule applied to submitted posts and threads.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_filter_rule")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub filter_type: FilterType,

    /// Literal text or regular expression.
    pub pattern: String,

    /// Text substituted for each match. Empty means the configured default.
    #[sea_orm(default_value = "")]
    pub replacement: String,

    #[sea_orm(default_value = false)]
    pub is_regex: bool,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Admin who created this rule.
    pub created_by: String,

    /// Rules apply in `created_at` order; earlier rules win overlaps.
    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
