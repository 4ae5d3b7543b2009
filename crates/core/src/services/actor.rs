//! Acting user and role checks.
//!
//! The identity provider authenticates the caller; services only see the
//! claimed id and role and decide what that role may do.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use warden_common::{AppError, AppResult};

/// Role of the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "mod",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "mod" | "moderator" => Ok(Self::Moderator),
            "user" | "" => Ok(Self::User),
            other => Err(AppError::Validation(format!("Unknown role: {other}"))),
        }
    }
}

/// The user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }

    #[must_use]
    pub fn moderator(id: impl Into<String>) -> Self {
        Self::new(id, Role::Moderator)
    }

    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, Role::User)
    }

    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Moderator)
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Fails with `Forbidden` unless the actor is a moderator or admin.
    pub fn require_staff(&self, what: &str) -> AppResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Only moderators can {what}")))
        }
    }

    /// Fails with `Forbidden` unless the actor is an admin.
    pub fn require_admin(&self, what: &str) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Only admins can {what}")))
        }
    }
}
