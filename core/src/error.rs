//! Error types for the Pipedrive client.
//!
//! # Design
//! Three failure families reach the caller: the transport failed before a
//! response was fully received, the body was not JSON, or the JSON did not
//! have the shape the operation expects. Shape failures always carry the
//! serialized response so a caller can see what Pipedrive actually said.

use thiserror::Error;

/// Errors raised by a `Transport` while executing a request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be constructed.
    #[error("failed to set up http client: {0}")]
    Setup(String),

    /// The connection failed before a response arrived.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The configured request timeout elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The response started but its body could not be read to the end.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Errors returned by the gateway and the entity operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("error making {endpoint} request to Pipedrive: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid JSON in {endpoint} response from Pipedrive: {source}")]
    Deserialization {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported http method: {0}")]
    InvalidMethod(String),

    /// The body parsed but lacks `data.id` (or is not an object at all).
    #[error("unexpected response from Pipedrive {endpoint}: {response}")]
    UnexpectedResponse { endpoint: String, response: String },

    /// Pipedrive answered without `"success": true`.
    #[error("could not {action}: {response}")]
    Rejected {
        action: &'static str,
        response: String,
    },
}
