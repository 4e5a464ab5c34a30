//! Operation dispatch and the concurrent execution surface.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::registry::{ConnectionId, SessionRegistry};
use crate::request::Request;
use crate::session::{ConnectionParams, MssqlSession, ResultSet};

/// Tuning knobs for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Skip server-certificate validation while still encrypting traffic.
    /// Defaults to `true`, preserving the historical behavior; set it to
    /// `false` to require a validating trust chain.
    pub trust_server_certificate: bool,

    /// Optional deadline applied to every driver-touching operation.
    /// `None` (the default) lets a hung call block its worker
    /// indefinitely; expiry is reported under the operation's own error
    /// kind.
    pub operation_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            trust_server_certificate: true,
            operation_timeout: None,
        }
    }
}

/// Success payload for one operation, shaped like the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// `connect`: the freshly issued handle.
    Connected(ConnectedPayload),
    /// `query`: the fully materialized result set.
    ResultSet(ResultSet),
    /// `execute`: the affected-row count.
    RowsAffected(u64),
    /// `disconnect` and `testConnection`: a plain acknowledgement.
    Ack(bool),
    /// `getPlatformVersion`: crate identification string.
    Version(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub connection_id: ConnectionId,
    pub success: bool,
}

/// The connection-registry and request-dispatch core.
///
/// Cheap to clone; every clone shares one session registry. Operations on
/// different handles run concurrently, operations on the same handle
/// serialize on that handle's slot.
///
/// # Examples
///
/// ```rust,no_run
/// use rust_mssql::{Bridge, Payload};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), rust_mssql::BridgeError> {
/// let bridge = Bridge::default();
/// let payload = bridge
///     .call("connect", &json!({
///         "server": "localhost:1433",
///         "database": "master",
///         "username": "sa",
///         "password": "secret",
///     }))
///     .await?;
/// if let Payload::Connected(connected) = payload {
///     bridge
///         .call("query", &json!({
///             "connectionId": connected.connection_id,
///             "sql": "SELECT 1 AS one",
///         }))
///         .await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Bridge {
    registry: Arc<SessionRegistry<MssqlSession>>,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            config,
        }
    }

    /// Decodes and runs one loosely-typed call to completion.
    pub async fn call(&self, method: &str, args: &Value) -> BridgeResult<Payload> {
        self.dispatch(Request::parse(method, args)?).await
    }

    /// Schedules a loosely-typed call on its own task. Returns
    /// immediately; the single terminal outcome arrives on the receiver.
    pub fn submit_call(
        &self,
        method: impl Into<String>,
        args: Value,
    ) -> oneshot::Receiver<BridgeResult<Payload>> {
        let bridge = self.clone();
        let method = method.into();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let outcome = bridge.call(&method, &args).await;
            // the caller may have dropped the receiver; the outcome is
            // terminal either way
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Schedules a typed request on its own task.
    pub fn submit(&self, request: Request) -> oneshot::Receiver<BridgeResult<Payload>> {
        let bridge = self.clone();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(bridge.dispatch(request).await);
        });
        rx
    }

    /// Runs one typed request to completion.
    pub async fn dispatch(&self, request: Request) -> BridgeResult<Payload> {
        match request {
            Request::Connect(params) => self.connect(params).await,
            Request::Disconnect { connection_id } => self.disconnect(connection_id).await,
            Request::Query { connection_id, sql } => self.query(connection_id, &sql).await,
            Request::Execute { connection_id, sql } => self.execute(connection_id, &sql).await,
            Request::TestConnection(params) => self.test_connection(params).await,
            Request::PlatformVersion => Ok(Payload::Version(platform_version())),
        }
    }

    /// Number of currently registered sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Closes every registered session best-effort and clears the
    /// registry. A slot still busy with an in-flight operation is left to
    /// close when that task drops its reference. Idempotent.
    pub async fn shutdown(&self) {
        let slots = self.registry.drain();
        let count = slots.len();
        for slot in slots {
            if let Ok(mut guard) = slot.try_lock() {
                if let Some(session) = guard.take() {
                    if let Err(err) = session.close().await {
                        debug!(error = %err, "close failed during shutdown");
                    }
                }
            }
        }
        if count > 0 {
            info!(sessions = count, "bridge shut down");
        }
    }

    async fn connect(&self, params: ConnectionParams) -> BridgeResult<Payload> {
        let session = self
            .deadline(
                MssqlSession::connect(&params, self.config.trust_server_certificate),
                |detail| BridgeError::Connection { detail },
            )
            .await?;
        let connection_id = self.registry.insert(session);
        info!(connection_id, server = %params.server, "session registered");
        Ok(Payload::Connected(ConnectedPayload {
            connection_id,
            success: true,
        }))
    }

    async fn disconnect(&self, id: ConnectionId) -> BridgeResult<Payload> {
        let slot = self
            .registry
            .remove(id)
            .ok_or(BridgeError::InvalidConnection { id })?;
        let session = slot
            .lock()
            .await
            .take()
            .ok_or(BridgeError::InvalidConnection { id })?;
        self.deadline(session.close(), |detail| BridgeError::Disconnect { detail })
            .await?;
        info!(connection_id = id, "session closed");
        Ok(Payload::Ack(true))
    }

    async fn query(&self, id: ConnectionId, sql: &str) -> BridgeResult<Payload> {
        let slot = self
            .registry
            .get(id)
            .ok_or(BridgeError::InvalidConnection { id })?;
        let mut guard = slot.lock().await;
        let session = guard
            .as_mut()
            .ok_or(BridgeError::InvalidConnection { id })?;
        let result = self
            .deadline(session.query(sql), |detail| BridgeError::Query { detail })
            .await?;
        debug!(connection_id = id, rows = result.row_count, "query complete");
        Ok(Payload::ResultSet(result))
    }

    async fn execute(&self, id: ConnectionId, sql: &str) -> BridgeResult<Payload> {
        let slot = self
            .registry
            .get(id)
            .ok_or(BridgeError::InvalidConnection { id })?;
        let mut guard = slot.lock().await;
        let session = guard
            .as_mut()
            .ok_or(BridgeError::InvalidConnection { id })?;
        let affected = self
            .deadline(session.execute(sql), |detail| BridgeError::Execute { detail })
            .await?;
        debug!(connection_id = id, affected, "statement complete");
        Ok(Payload::RowsAffected(affected))
    }

    /// Opens a probe session and closes it again without ever touching
    /// the registry. The probe's close failure does not change the
    /// caller-visible outcome.
    async fn test_connection(&self, params: ConnectionParams) -> BridgeResult<Payload> {
        let session = self
            .deadline(
                MssqlSession::connect(&params, self.config.trust_server_certificate),
                |detail| BridgeError::Connection { detail },
            )
            .await?;
        if let Err(err) = session.close().await {
            warn!(error = %err, "probe session close failed");
        }
        Ok(Payload::Ack(true))
    }

    async fn deadline<T>(
        &self,
        operation: impl Future<Output = BridgeResult<T>>,
        kind: fn(String) -> BridgeError,
    ) -> BridgeResult<T> {
        match self.config.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(outcome) => outcome,
                Err(_) => Err(kind(format!("operation timed out after {limit:?}"))),
            },
            None => operation.await,
        }
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

fn platform_version() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_defaults_preserve_historical_behavior() {
        let config = BridgeConfig::default();
        assert!(config.trust_server_certificate);
        assert!(config.operation_timeout.is_none());
    }

    #[test]
    fn payloads_serialize_like_the_wire_contract() {
        let connected = Payload::Connected(ConnectedPayload {
            connection_id: 0,
            success: true,
        });
        assert_eq!(
            serde_json::to_value(&connected).unwrap(),
            json!({ "connectionId": 0, "success": true })
        );
        assert_eq!(serde_json::to_value(Payload::Ack(true)).unwrap(), json!(true));
        assert_eq!(
            serde_json::to_value(Payload::RowsAffected(3)).unwrap(),
            json!(3)
        );
    }

    #[test]
    fn version_names_the_crate() {
        assert!(platform_version().starts_with("rust_mssql "));
    }
}
