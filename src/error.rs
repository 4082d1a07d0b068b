use thiserror::Error;

/// Errors raised by domain operations before anything is persisted.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("{value:?} is not an available {field}")]
    NotAnOption { field: &'static str, value: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid email or password")]
    AuthFailed,

    #[error("template not found: {0}")]
    TemplateMissing(String),

    #[error("{field} {stale:?} no longer exists")]
    UnresolvedReference { field: &'static str, stale: String },

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::EmptyField(_) | DomainError::NotAnOption { .. } => "validation_failed",
            DomainError::Invalid { .. } => "validation_failed",
            DomainError::NotFound(_) | DomainError::IndexOutOfRange { .. } => "not_found",
            DomainError::AlreadyExists(_) => "conflict",
            DomainError::AuthFailed => "auth_failed",
            DomainError::TemplateMissing(_) => "template_missing",
            DomainError::UnresolvedReference { .. } => "unresolved_reference",
            DomainError::Storage(_) => "db_query_failed",
        }
    }
}
