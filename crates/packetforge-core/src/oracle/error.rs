use thiserror::Error;

/// Errors returned by the reconstruction oracle, plus the transport
/// failures a remote oracle can add on top of them.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("oracle protocol error: {0}")]
    Protocol(String),
    #[error("decode failed: {message}")]
    DecodeFailed { message: String },
    #[error("unknown protocol: {id}")]
    UnknownProtocol { id: String },
    #[error("append rejected for {id}: {message}")]
    AppendRejected { id: String, message: String },
    #[error("layer stack is empty")]
    EmptyStack,
    #[error("no field {field_id} in protocol {protocol_id}")]
    InvalidFieldId {
        protocol_id: String,
        field_id: String,
    },
    #[error("value out of range for {field_id}: {message}")]
    ValueOutOfRange { field_id: String, message: String },
    #[error("expression error for {field_id}: {message}")]
    ExpressionError { field_id: String, message: String },
}
