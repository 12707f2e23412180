use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Deserialization error: {context}")]
    Deserialization { context: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Optimistic lock conflict")]
    OptimisticLockConflict,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network transient error: {0}")]
    NetworkTransient(String),

    #[error("Upstream returned status {status}: {snippet}")]
    UpstreamStatus { status: u16, snippet: String },

    #[error("Upstream content invalid: {0}")]
    ContentInvalid(String),

    #[error("Lock contended: {0}")]
    LockContended(String),

    #[error("Storage conflict (ignored): {0}")]
    StorageConflict(String),

    #[error("Missing refresh inputs: {0}")]
    MissingRefreshInputs(String),
}

impl Error {
    /// Whether this error represents the `LockContended` recovery path, which
    /// must not touch the source's status per the propagation policy.
    #[must_use]
    pub const fn is_lock_contended(&self) -> bool {
        matches!(self, Self::LockContended(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Map "no rows" to NotFound
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            // Map unique constraint violations to AlreadyExists
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL unique_violation
                    "23505" => {
                        let detail = db_err.message().to_string();
                        if detail.contains("stream_hash") {
                            // A concurrent upsert created the same content-addressed
                            // stream first; the caller treats this as a no-op, not a failure.
                            Error::StorageConflict("stream_hash already exists".to_string())
                        } else if detail.contains("group") && detail.contains("name") {
                            Error::AlreadyExists("Group name already exists".to_string())
                        } else {
                            Error::AlreadyExists("Resource already exists".to_string())
                        }
                    }
                    // PostgreSQL foreign_key_violation
                    "23503" => Error::NotFound("Referenced resource not found".to_string()),
                    // PostgreSQL check_violation
                    "23514" => Error::InvalidInput("Constraint check failed".to_string()),
                    // PostgreSQL not_null_violation
                    "23502" => Error::InvalidInput("Required field is missing".to_string()),
                    _ => Error::Database(err),
                }
            }
            _ => Error::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
