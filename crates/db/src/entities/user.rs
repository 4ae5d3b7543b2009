//! User entity.
//!
//! Accounts are owned by the identity provider. This table only carries the
//! columns the moderation core reads (roles) and writes (the synchronized
//! trust state).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub username: String,

    /// Is this user an admin?
    #[sea_orm(default_value = false)]
    pub is_admin: bool,

    /// Is this user a moderator?
    #[sea_orm(default_value = false)]
    pub is_moderator: bool,

    /// Synchronized trust flag: some active, non-expired suspension exists.
    #[sea_orm(default_value = false)]
    pub is_suspended: bool,

    /// Latest expiry among active temporary suspensions.
    /// NULL while suspended means open-ended (permanent or super-ban).
    #[sea_orm(nullable)]
    pub suspended_until: Option<DateTimeWithTimeZone>,

    /// Set when a recompute could not complete after a suspension was
    /// written; readers must treat the user as blocked until cleared.
    #[sea_orm(default_value = false)]
    pub trust_state_stale: bool,

    /// Last successful trust recompute.
    #[sea_orm(nullable)]
    pub trust_synced_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether this user holds a staff role.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.is_admin || self.is_moderator
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::suspension::Entity")]
    Suspensions,

    #[sea_orm(has_many = "super::warning::Entity")]
    Warnings,
}

impl Related<super::suspension::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Suspensions.def()
    }
}

impl Related<super::warning::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warnings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
