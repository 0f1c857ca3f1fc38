//! Enrollment Core - e-learning enrollment and progress engine
//!
//! Programs are sold through external payment providers; a confirmed payment
//! grants access to the program's lessons, and lesson completions drive the
//! learner's progress until the program is completed.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier aliases, roles and the authenticated caller
//! - [`catalog`] - Programs, lessons and quizzes (read-mostly)
//! - [`enrollment`] - Enrollment state machine, payment recording, dashboard
//! - [`payment`] - Paystack / Stripe adapters behind one provider contract
//! - [`progress`] - Per-learner progress, quiz grading and notes
//! - [`access`] - Lesson access decisions
//! - [`notify`] - Outbound notifications
//! - [`store`] / [`db`] - In-memory and PostgreSQL persistence
//! - [`gateway`] - HTTP API (axum) and OpenAPI docs

// Core types - must be first!
pub mod core_types;
pub mod error;

pub mod access;
pub mod catalog;
pub mod enrollment;
pub mod notify;
pub mod payment;
pub mod progress;

// Persistence
pub mod db;
pub mod store;

// Service shell
pub mod config;
pub mod gateway;
pub mod logging;

#[cfg(test)]
mod integration_tests;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Caller, EnrollmentId, LessonId, ProgramId, Role};
pub use enrollment::{EnrollmentService, EnrollmentStatus, PaymentStatus};
pub use error::CoreError;
pub use progress::ProgressTracker;
