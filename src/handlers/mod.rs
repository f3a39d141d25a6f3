pub mod common;
pub mod enrollments;
pub mod health;
pub mod payments;

pub use crate::AppState;
