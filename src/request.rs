//! Typed operation requests and the loosely-typed call boundary.

use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::registry::ConnectionId;
use crate::session::ConnectionParams;

/// One bridge operation with its required fields already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Connect(ConnectionParams),
    Disconnect {
        connection_id: ConnectionId,
    },
    Query {
        connection_id: ConnectionId,
        sql: String,
    },
    Execute {
        connection_id: ConnectionId,
        sql: String,
    },
    TestConnection(ConnectionParams),
    PlatformVersion,
}

impl Request {
    /// Decodes a method name plus argument mapping into a typed request.
    ///
    /// Fails fast with [`BridgeError::InvalidRequest`] on an unknown
    /// method or a missing or wrongly-typed field, so no malformed value
    /// ever reaches the driver.
    pub fn parse(method: &str, args: &Value) -> BridgeResult<Request> {
        match method {
            "connect" => Ok(Request::Connect(connection_params(args)?)),
            "disconnect" => Ok(Request::Disconnect {
                connection_id: required_id(args, "connectionId")?,
            }),
            "query" => Ok(Request::Query {
                connection_id: required_id(args, "connectionId")?,
                sql: required_str(args, "sql")?,
            }),
            "execute" => Ok(Request::Execute {
                connection_id: required_id(args, "connectionId")?,
                sql: required_str(args, "sql")?,
            }),
            "testConnection" => Ok(Request::TestConnection(connection_params(args)?)),
            "getPlatformVersion" => Ok(Request::PlatformVersion),
            other => Err(BridgeError::invalid_request(format!(
                "unknown method '{other}'"
            ))),
        }
    }
}

fn connection_params(args: &Value) -> BridgeResult<ConnectionParams> {
    Ok(ConnectionParams {
        server: required_str(args, "server")?,
        database: required_str(args, "database")?,
        username: required_str(args, "username")?,
        password: required_str(args, "password")?,
    })
}

fn required_str(args: &Value, field: &str) -> BridgeResult<String> {
    match args.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(BridgeError::invalid_request(format!(
            "field '{field}' must be a string"
        ))),
        None => Err(BridgeError::invalid_request(format!(
            "missing required field '{field}'"
        ))),
    }
}

fn required_id(args: &Value, field: &str) -> BridgeResult<ConnectionId> {
    match args.get(field) {
        Some(value) => value.as_i64().ok_or_else(|| {
            BridgeError::invalid_request(format!("field '{field}' must be an integer"))
        }),
        None => Err(BridgeError::invalid_request(format!(
            "missing required field '{field}'"
        ))),
    }
}
