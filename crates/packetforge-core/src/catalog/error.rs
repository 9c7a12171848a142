use thiserror::Error;

/// Errors raised while loading or querying the protocol catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate protocol definition: {id}")]
    DuplicateProtocol { id: String },
    #[error("base protocol {id} is not defined in the catalog")]
    UnknownBaseProtocol { id: String },
    #[error("unknown protocol: {id}")]
    UnknownProtocol { id: String },
}
