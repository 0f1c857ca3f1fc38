//! Core type definitions shared by every component.
//!
//! Identifiers are UUID aliases so they can flow through PostgreSQL, JSON and
//! JWT claims without conversion.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Catalog program identifier
pub type ProgramId = Uuid;

/// Lesson identifier
pub type LessonId = Uuid;

/// Enrollment identifier
pub type EnrollmentId = Uuid;

/// Registered account identifier (issued by the auth collaborator)
pub type AccountId = Uuid;

/// Progress record identifier
pub type ProgressId = Uuid;

/// Normalize an email so it can be used as the learner join key.
#[inline]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Caller role as asserted by the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" | "user" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Authenticated caller identity.
///
/// Produced by the bearer-token middleware; the core never sees the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub account_id: AccountId,
    /// Always normalized (see [`normalize_email`])
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl Caller {
    pub fn new(account_id: AccountId, email: &str, role: Role) -> Self {
        Self {
            account_id,
            email: normalize_email(email),
            name: None,
            role,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
