//! Query error types
//!
//! Defines all error conditions that can occur while validating, sending
//! and decoding a query.

use super::kind::QueryKind;
use crate::client::TransportError;
use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Required parameters for the query kind are missing
    #[error("Query parameters are insufficient for {kind}; check the query API docs for required arguments")]
    InvalidParameters { kind: QueryKind },

    /// The request could not be completed below the HTTP layer
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The service answered with a failure status or an error envelope
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A success envelope carried neither a result nor an error
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A typed accessor received a result of another primitive type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// The request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

/// Result type for query operations
pub type KeenResult<T> = Result<T, QueryError>;
