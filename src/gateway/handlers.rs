//! HTTP handlers, one module per route group

mod catalog;
mod enrollments;
mod health;
mod lessons;
mod payments;
mod student;

pub use catalog::*;
pub use enrollments::*;
pub use health::*;
pub use lessons::*;
pub use payments::*;
pub use student::*;
