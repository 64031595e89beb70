use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Account not found")]
    AccountNotFound,

    #[error("Profile not found")]
    ProfileNotFound,

    #[error("Content item not found")]
    ContentNotFound,

    #[error("Profile name already in use: {0}")]
    ProfileNameTaken(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// Reserved; not produced by any current operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Entity-absence errors the boundary layer maps to 404
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::AccountNotFound
                | ServiceError::ProfileNotFound
                | ServiceError::ContentNotFound
        )
    }

    /// Uniqueness-violation errors the boundary layer maps to 409
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::ProfileNameTaken(_) | ServiceError::AccountExists(_)
        )
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        ServiceError::Database(err.to_string())
    }
}
