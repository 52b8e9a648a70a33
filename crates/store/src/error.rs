use thiserror::Error;

/// Errors from the tracking store.
///
/// Store failures abort the current chunk or query; the batch itself stays
/// valid and can be resumed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid batch request: {0}")]
    InvalidBatch(String),

    #[error("no batch found with id: {0}")]
    BatchNotFound(String),

    #[error("no tracking row with id: {0}")]
    RowNotFound(i64),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}
