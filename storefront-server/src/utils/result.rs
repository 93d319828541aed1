//! Unified Result types

use super::AppError;

/// Application-level Result type
///
/// Used in HTTP handlers and application logic
pub type AppResult<T> = Result<T, AppError>;
