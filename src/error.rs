//! Wire error taxonomy and the component-boundary error types that map onto it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The wire-level `error_code` values returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    AuthFailed = 1,
    AuthNotFound = 2,
    AuthExists = 3,
    DbFailed = 4,
    Restricted = 5,
    ValidationError = 6,
}

/// Raised by [`crate::auth::LoginSystem`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown user")]
    NotFound,
    #[error("verifier mismatch or account creation failed")]
    Failed,
    #[error("username already registered")]
    Exists,
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            AuthError::NotFound => ErrorCode::AuthNotFound,
            AuthError::Failed => ErrorCode::AuthFailed,
            AuthError::Exists => ErrorCode::AuthExists,
            AuthError::Storage(_) => ErrorCode::DbFailed,
        }
    }
}

/// Raised by [`crate::handshake`].
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("no challenge is in progress for this session")]
    NotChallenged,
    #[error("client proof did not match")]
    ProofMismatch,
}

impl HandshakeError {
    pub fn to_error_code(&self) -> ErrorCode {
        ErrorCode::AuthFailed
    }
}

/// Raised by [`crate::ledger`] and [`crate::order_book`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Failed(#[from] anyhow::Error),
}

impl StorageError {
    pub fn to_error_code(&self) -> ErrorCode {
        ErrorCode::DbFailed
    }
}

/// Raised by [`crate::dispatcher`] while validating a request payload.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("session has not completed authentication")]
    Restricted,
    #[error("request payload failed validation: {0}")]
    Validation(String),
}

impl DispatchError {
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            DispatchError::Restricted => ErrorCode::Restricted,
            DispatchError::Validation(_) => ErrorCode::ValidationError,
        }
    }
}
