//! Enrollment FSM
//!
//! Status IDs are the SMALLINT values stored in PostgreSQL.
//!
//! ```text
//! pending ──ConfirmPayment──► confirmed ──Activate──► active
//!                                 │                     │
//!                                 └──────Complete───────┴──► completed
//! AdminOverride: any ──► any
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Enrollment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum EnrollmentStatus {
    /// Submitted, awaiting payment
    Pending = 0,
    /// Paid, not started
    Confirmed = 10,
    /// Learner has opened program content
    Active = 20,
    Completed = 30,
    Cancelled = -10,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 5] = [
        EnrollmentStatus::Pending,
        EnrollmentStatus::Confirmed,
        EnrollmentStatus::Active,
        EnrollmentStatus::Completed,
        EnrollmentStatus::Cancelled,
    ];

    /// Statuses that block a second enrollment in the same program
    pub const STANDING: [EnrollmentStatus; 3] = [
        EnrollmentStatus::Confirmed,
        EnrollmentStatus::Active,
        EnrollmentStatus::Completed,
    ];

    /// A learner in this status holds the program
    #[inline]
    pub fn is_standing(&self) -> bool {
        Self::STANDING.contains(self)
    }

    /// Lesson access and progress tracking are granted.
    ///
    /// `completed` keeps access so finishing a program never locks the learner
    /// out of material they paid for.
    #[inline]
    pub fn grants_access(&self) -> bool {
        self.is_standing()
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(EnrollmentStatus::Pending),
            10 => Some(EnrollmentStatus::Confirmed),
            20 => Some(EnrollmentStatus::Active),
            30 => Some(EnrollmentStatus::Completed),
            -10 => Some(EnrollmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Confirmed => "confirmed",
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid enrollment status: {}", s))
    }
}

/// Payment sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum PaymentStatus {
    Pending = 0,
    Paid = 10,
    Failed = -10,
    /// Does not revert the enrollment status
    Refunded = -20,
}

impl PaymentStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PaymentStatus::Pending),
            10 => Some(PaymentStatus::Paid),
            -10 => Some(PaymentStatus::Failed),
            -20 => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named transitions of the enrollment FSM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Successful provider verification
    ConfirmPayment,
    /// First content access by a paid learner
    Activate,
    /// All published lessons completed
    Complete,
    /// Unconditional administrative change
    AdminOverride(EnrollmentStatus),
}

impl Transition {
    /// Target status, or `None` when the transition is not allowed from `from`
    pub fn apply(self, from: EnrollmentStatus) -> Option<EnrollmentStatus> {
        use EnrollmentStatus::*;
        match (self, from) {
            (Transition::ConfirmPayment, Pending) => Some(Confirmed),
            (Transition::Activate, Confirmed) => Some(Active),
            (Transition::Complete, Confirmed | Active) => Some(Completed),
            (Transition::AdminOverride(to), _) => Some(to),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::ConfirmPayment => "confirm_payment",
            Transition::Activate => "activate",
            Transition::Complete => "complete",
            Transition::AdminOverride(_) => "admin_override",
        }
    }
}
