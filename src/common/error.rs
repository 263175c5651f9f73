use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Metastore {kind}: {message}")]
    Metastore { kind: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Size unavailable for {location}: {reason}")]
    SizeUnavailable { location: String, reason: String },

    #[error("Unrecognized location: {0}")]
    UnrecognizedLocation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that only affect a single table and must not abort a run.
    pub fn is_per_table(&self) -> bool {
        matches!(
            self,
            Error::SizeUnavailable { .. } | Error::UnrecognizedLocation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
