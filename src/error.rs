use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Payment not found: {0}")]
    NotFound(String),
    #[error("Status oracle error: {0}")]
    OracleError(String),
    #[error("Identity resolver error: {0}")]
    IdentityError(String),
    #[error("Transfer issuer error: {0}")]
    TransferError(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, ReconError>;
