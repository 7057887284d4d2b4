//! Shared error types for the provider fallback system

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SharedError {
    #[error("Invalid request: {field} {reason}")]
    InvalidRequest { field: String, reason: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
