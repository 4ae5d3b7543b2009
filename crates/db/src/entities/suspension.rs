//! Suspension entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Severity of a suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum SuspensionKind {
    /// Ends at `expires_at`.
    #[sea_orm(string_value = "temporary")]
    Temporary,
    /// Open-ended until lifted.
    #[sea_orm(string_value = "permanent")]
    Permanent,
    /// Open-ended; only admins may issue it.
    #[sea_orm(string_value = "super_ban")]
    SuperBan,
}

impl SuspensionKind {
    /// Whether suspensions of this kind carry an expiry.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(self, Self::Temporary)
    }
}

/// Effective status of a suspension at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionStatus {
    /// Enforced.
    Active,
    /// Lifted manually by staff.
    Lifted,
    /// Past its expiry; `is_active` may still be true in storage.
    Expired,
}

/// Suspension model. Several rows may exist per user; the union of the
/// effective ones decides whether the user is blocked.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "suspension")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// The suspended user.
    #[sea_orm(indexed)]
    pub user_id: String,
    /// The staff member who issued the suspension.
    pub issued_by: String,
    /// Reason shown to the user.
    pub reason: String,
    /// Internal staff notes.
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub kind: SuspensionKind,
    /// Cleared only by a lift.
    pub is_active: bool,
    pub starts_at: DateTimeWithTimeZone,
    /// Always NULL unless `kind` is temporary.
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(nullable)]
    pub lifted_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(nullable)]
    pub lifted_by: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether this suspension blocks the user at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.kind {
            SuspensionKind::Temporary => self.expires_at.is_some_and(|at| now < at),
            SuspensionKind::Permanent | SuspensionKind::SuperBan => true,
        }
    }

    /// Derived status at `now`. Manual lift and passive expiry stay distinct.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> SuspensionStatus {
        if !self.is_active || self.lifted_by.is_some() {
            SuspensionStatus::Lifted
        } else if self.is_effective_at(now) {
            SuspensionStatus::Active
        } else {
            SuspensionStatus::Expired
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn suspension(kind: SuspensionKind, expires_in: Option<Duration>) -> Model {
        let now = Utc::now();
        Model {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            issued_by: "m1".to_string(),
            reason: "spam".to_string(),
            description: None,
            kind,
            is_active: true,
            starts_at: now.into(),
            expires_at: expires_in.map(|d| (now + d).into()),
            lifted_at: None,
            lifted_by: None,
            created_at: now.into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_temporary_expires_lazily() {
        let s = suspension(SuspensionKind::Temporary, Some(Duration::days(7)));
        let now = Utc::now();
        assert!(s.is_effective_at(now));
        assert_eq!(s.status_at(now), SuspensionStatus::Active);

        let later = now + Duration::days(8);
        assert!(!s.is_effective_at(later));
        assert_eq!(s.status_at(later), SuspensionStatus::Expired);
    }

    #[test]
    fn test_permanent_never_expires() {
        let s = suspension(SuspensionKind::Permanent, None);
        assert!(s.is_effective_at(Utc::now() + Duration::days(36_500)));
    }

    #[test]
    fn test_lifted_is_distinct_from_expired() {
        let mut s = suspension(SuspensionKind::Temporary, Some(Duration::days(1)));
        s.is_active = false;
        s.lifted_by = Some("m2".to_string());
        s.lifted_at = Some(Utc::now().into());
        assert_eq!(s.status_at(Utc::now()), SuspensionStatus::Lifted);
    }

    #[test]
    fn test_temporary_without_expiry_is_not_effective() {
        let s = suspension(SuspensionKind::Temporary, None);
        assert!(!s.is_effective_at(Utc::now()));
    }
}
