pub mod busy;
pub mod health;
pub mod run;

use crate::error::AppError;

/// Fallback for unmatched paths and methods.
pub async fn not_found() -> AppError {
    AppError::not_found()
}
