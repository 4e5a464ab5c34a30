//! Contract tests that run without a reachable SQL Server.
//!
//! Everything here exercises the dispatch surface up to (but never
//! across) real database I/O: handle bookkeeping, argument validation,
//! error taxonomy, and the concurrent submit surface.

use std::time::Duration;

use anyhow::Result;
use rust_mssql::{Bridge, BridgeConfig, BridgeError, Payload, Request, SessionRegistry};
use serde_json::json;

#[tokio::test]
async fn query_on_unknown_handle_is_rejected_without_io() {
    let bridge = Bridge::default();
    let err = bridge
        .call("query", &json!({ "connectionId": 7, "sql": "SELECT 1" }))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidConnection { id: 7 }));
}

#[tokio::test]
async fn execute_on_unknown_handle_is_rejected_without_io() {
    let bridge = Bridge::default();
    let err = bridge
        .call("execute", &json!({ "connectionId": 0, "sql": "DELETE FROM t" }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidConnection");
}

#[tokio::test]
async fn disconnect_on_unknown_handle_is_rejected() {
    let bridge = Bridge::default();
    let err = bridge
        .call("disconnect", &json!({ "connectionId": 12345 }))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidConnection { id: 12345 }));

    // a second attempt on the same handle behaves identically
    let err = bridge
        .dispatch(Request::Disconnect {
            connection_id: 12345,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidConnection");
}

#[tokio::test]
async fn missing_required_argument_fails_before_any_io() {
    let bridge = Bridge::default();
    let err = bridge
        .call("query", &json!({ "connectionId": 0 }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidRequest");
    assert!(err.to_string().contains("'sql'"));

    let err = bridge
        .call("connect", &json!({ "server": "localhost" }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidRequest");
}

#[tokio::test]
async fn unknown_method_is_a_caller_error() {
    let bridge = Bridge::default();
    let err = bridge.call("prepare", &json!({})).await.unwrap_err();
    assert_eq!(err.code(), "InvalidRequest");
    assert!(err.to_string().contains("prepare"));
}

#[tokio::test]
async fn platform_version_identifies_the_crate() -> Result<()> {
    let bridge = Bridge::default();
    match bridge.call("getPlatformVersion", &json!({})).await? {
        Payload::Version(version) => assert!(version.starts_with("rust_mssql ")),
        other => panic!("unexpected payload: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let bridge = Bridge::default();
    bridge.shutdown().await;
    bridge.shutdown().await;
    assert_eq!(bridge.session_count(), 0);
}

#[tokio::test]
async fn submit_delivers_exactly_one_outcome() {
    let bridge = Bridge::default();
    let rx = bridge.submit_call("query", json!({ "connectionId": 1, "sql": "SELECT 1" }));
    let outcome = rx.await.expect("worker dropped without reporting");
    assert!(matches!(
        outcome,
        Err(BridgeError::InvalidConnection { id: 1 })
    ));
}

#[tokio::test]
async fn submitted_caller_errors_also_arrive_on_the_channel() {
    let bridge = Bridge::default();
    let rx = bridge.submit_call("execute", json!({ "connectionId": 1 }));
    let outcome = rx.await.expect("worker dropped without reporting");
    assert_eq!(outcome.unwrap_err().code(), "InvalidRequest");
}

#[tokio::test]
async fn connect_failure_reports_connection_error_with_detail() -> Result<()> {
    // port 1 refuses immediately on loopback; the deadline is a backstop
    let bridge = Bridge::new(BridgeConfig {
        trust_server_certificate: true,
        operation_timeout: Some(Duration::from_secs(10)),
    });
    let err = bridge
        .call(
            "connect",
            &json!({
                "server": "127.0.0.1:1",
                "database": "master",
                "username": "sa",
                "password": "wrong",
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ConnectionError");
    let payload = err.to_payload();
    assert_eq!(payload.message, "failed to connect to database");
    assert!(payload.detail.is_some());
    assert_eq!(bridge.session_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_connection_failure_reports_connection_error_and_no_handle() {
    let bridge = Bridge::new(BridgeConfig {
        trust_server_certificate: true,
        operation_timeout: Some(Duration::from_secs(10)),
    });
    let err = bridge
        .call(
            "testConnection",
            &json!({
                "server": "127.0.0.1:1",
                "database": "master",
                "username": "sa",
                "password": "wrong",
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ConnectionError");
    assert_eq!(bridge.session_count(), 0);
}

#[test]
fn registry_handles_are_distinct_within_a_run() {
    let registry: SessionRegistry<&str> = SessionRegistry::new();
    let mut seen = Vec::new();
    for session in ["a", "b", "c", "d"] {
        let id = registry.insert(session);
        assert!(!seen.contains(&id));
        seen.push(id);
    }
    registry.remove(seen[1]);
    let reissued = registry.insert("e");
    assert!(!seen.contains(&reissued));
}
