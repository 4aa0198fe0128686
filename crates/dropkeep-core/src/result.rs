//! Convenience result type alias for Dropkeep.

use crate::error::AppError;

/// A specialized `Result` type for Dropkeep operations.
pub type AppResult<T> = Result<T, AppError>;
