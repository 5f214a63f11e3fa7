use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Concurrent update detected")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tenant could not be resolved: {0}")]
    UnresolvedTenant(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a retry may succeed. The webhook pipeline returns 500 for
    /// retryable errors (the provider redelivers) and 200 otherwise, because
    /// validation failures will not change on replay.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(_) => true,
            AppError::Conflict => true,
            AppError::Internal(_) => true,

            AppError::InvalidCredentials => false,
            AppError::Forbidden => false,
            AppError::InvalidSignature => false,
            AppError::InvalidInput(_) => false,
            AppError::UnresolvedTenant(_) => false,
            AppError::NotFound => false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    Conflict,
    InvalidCredentials,
    Forbidden,
    InvalidSignature,
    InvalidInput,
    UnresolvedTenant,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::UnresolvedTenant => "UNRESOLVED_TENANT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
