use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Database connection failed: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Write actor unavailable: {0}")]
    Writer(String),

    #[error("Stored row is not valid JSON: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for daypack_core::Error {
    fn from(err: StorageError) -> Self {
        daypack_core::Error::storage(err.to_string())
    }
}
