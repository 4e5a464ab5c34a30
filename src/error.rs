//! Error types for bridge operations.

use serde::Serialize;
use thiserror::Error;

use crate::registry::ConnectionId;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge errors, one variant per wire-visible kind.
///
/// Every driver-level failure is caught at the operation boundary and
/// translated into exactly one of these, with the driver's own message
/// preserved as `detail`. No retries happen anywhere; a failed operation
/// is reported once and left to the caller.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Driver, network or authentication failure while opening a session.
    #[error("failed to connect to database: {detail}")]
    Connection { detail: String },

    /// The handle was never issued or its session is already gone.
    #[error("invalid connection id {id}")]
    InvalidConnection { id: ConnectionId },

    /// The server or driver reported a failure while closing a session.
    #[error("failed to disconnect: {detail}")]
    Disconnect { detail: String },

    /// The server rejected the SQL or the query faulted while streaming.
    #[error("query execution failed: {detail}")]
    Query { detail: String },

    /// The server rejected the statement or its execution faulted.
    #[error("command execution failed: {detail}")]
    Execute { detail: String },

    /// Malformed call: unknown method, missing or wrongly-typed argument.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl BridgeError {
    pub fn connection(detail: impl std::fmt::Display) -> Self {
        Self::Connection {
            detail: detail.to_string(),
        }
    }

    pub fn invalid_connection(id: ConnectionId) -> Self {
        Self::InvalidConnection { id }
    }

    pub fn disconnect(detail: impl std::fmt::Display) -> Self {
        Self::Disconnect {
            detail: detail.to_string(),
        }
    }

    pub fn query(detail: impl std::fmt::Display) -> Self {
        Self::Query {
            detail: detail.to_string(),
        }
    }

    pub fn execute(detail: impl std::fmt::Display) -> Self {
        Self::Execute {
            detail: detail.to_string(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Stable wire code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "ConnectionError",
            Self::InvalidConnection { .. } => "InvalidConnection",
            Self::Disconnect { .. } => "DisconnectError",
            Self::Query { .. } => "QueryError",
            Self::Execute { .. } => "ExecuteError",
            Self::InvalidRequest { .. } => "InvalidRequest",
        }
    }

    /// Human-readable message without the driver detail.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "failed to connect to database",
            Self::InvalidConnection { .. } => "invalid connection id",
            Self::Disconnect { .. } => "failed to disconnect",
            Self::Query { .. } => "query execution failed",
            Self::Execute { .. } => "command execution failed",
            Self::InvalidRequest { .. } => "invalid request",
        }
    }

    /// The underlying driver message, or the validation description for
    /// caller errors.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Connection { detail }
            | Self::Disconnect { detail }
            | Self::Query { detail }
            | Self::Execute { detail } => Some(detail),
            Self::InvalidRequest { message } => Some(message),
            Self::InvalidConnection { .. } => None,
        }
    }

    /// Wire-shaped `{code, message, detail}` triple.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.message().to_string(),
            detail: self.detail().map(str::to_string),
        }
    }
}

/// Serialized error triple matching the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
