//! SQL Server session establishment and result materialization.

use std::collections::HashMap;

use futures::stream::TryStreamExt;
use serde::Serialize;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, QueryItem};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::value::CellValue;

/// Parameters required to open a session. All fields are required; the
/// server may carry an explicit port as `host:port` or `host,port`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// A single row keyed by column name.
pub type Row = HashMap<String, CellValue>;

/// One fully materialized query result. The whole set is resident in
/// memory before it is returned; large results are not chunked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

type TdsClient = Client<Compat<TcpStream>>;

/// A live connection to the server, exclusively owned by its registry
/// slot. A session whose driver connection has errored stays registered
/// until the caller disconnects it.
pub struct MssqlSession {
    client: TdsClient,
}

impl MssqlSession {
    /// Opens a session. Transport encryption is always requested;
    /// certificate validation is skipped when `trust_server_certificate`
    /// is set.
    pub async fn connect(
        params: &ConnectionParams,
        trust_server_certificate: bool,
    ) -> BridgeResult<MssqlSession> {
        let (host, port) = split_server(&params.server);
        let mut config = Config::new();
        config.host(host);
        if let Some(port) = port {
            config.port(port);
        }
        config.database(&params.database);
        config.authentication(AuthMethod::sql_server(&params.username, &params.password));
        config.encryption(EncryptionLevel::Required);
        if trust_server_certificate {
            config.trust_cert();
        }

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(BridgeError::connection)?;
        tcp.set_nodelay(true).map_err(BridgeError::connection)?;
        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(BridgeError::connection)?;
        debug!(server = %params.server, database = %params.database, "session established");
        Ok(MssqlSession { client })
    }

    /// Runs a query and materializes its first result set. Column order
    /// is taken from the stream metadata once and reused for every row;
    /// duplicate column names are kept as-is.
    pub async fn query(&mut self, sql: &str) -> BridgeResult<ResultSet> {
        let mut stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(BridgeError::query)?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        let mut result_sets = 0usize;
        // Drain the stream fully so the connection stays usable, but only
        // the first result set is returned.
        while let Some(item) = stream.try_next().await.map_err(BridgeError::query)? {
            match item {
                QueryItem::Metadata(meta) => {
                    result_sets += 1;
                    if result_sets == 1 {
                        columns = meta
                            .columns()
                            .iter()
                            .map(|column| column.name().to_string())
                            .collect();
                    }
                }
                QueryItem::Row(row) => {
                    if result_sets <= 1 {
                        rows.push(materialize_row(row, &columns));
                    }
                }
            }
        }

        let row_count = rows.len();
        Ok(ResultSet {
            columns,
            rows,
            row_count,
        })
    }

    /// Runs a statement and returns the affected-row count.
    pub async fn execute(&mut self, sql: &str) -> BridgeResult<u64> {
        let result = self
            .client
            .execute(sql, &[])
            .await
            .map_err(BridgeError::execute)?;
        Ok(result.total())
    }

    /// Closes the session, reporting a server-side close failure.
    pub async fn close(self) -> BridgeResult<()> {
        self.client.close().await.map_err(BridgeError::disconnect)
    }
}

fn materialize_row(row: tiberius::Row, columns: &[String]) -> Row {
    columns
        .iter()
        .cloned()
        .zip(row.into_iter().map(CellValue::from_column_data))
        .collect()
}

// Accepts `host`, `host:port` and `host,port`; anything unparsable is
// treated as a bare host so the driver default port applies. IPv6
// literals are not special-cased.
fn split_server(server: &str) -> (&str, Option<u16>) {
    for separator in [':', ','] {
        if let Some((host, port)) = server.rsplit_once(separator) {
            if let Ok(port) = port.parse() {
                return (host, Some(port));
            }
        }
    }
    (server, None)
}
