//! Shared types and error taxonomy for Rampart

pub mod errors;

pub use errors::{AppError, AppResult};
