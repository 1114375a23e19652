mod common;

use std::time::Duration;

use coder_bridge::bridge_ipc::{ClientMessage, ServerMessage, Transport};
use common::{closed_port, FakeCli, WAIT};
use serde_json::json;
use tokio::time::timeout;

#[tokio::test]
async fn connect_send_and_receive() {
    let cli = FakeCli::bind().await;
    let mut transport = Transport::new();
    let mut inbound = transport.subscribe();

    let (connected, mut conn) = tokio::join!(transport.connect(cli.port), cli.accept());
    assert!(connected);
    assert!(transport.is_connected());
    assert_eq!(transport.state().port, Some(cli.port));

    transport.send(&ClientMessage::DiagnosticsResponse {
        diagnostics: Vec::new(),
    });
    assert_eq!(
        conn.recv_json().await,
        json!({"type": "diagnostics_response", "diagnostics": []})
    );

    conn.send_json(json!({"type": "connection_ack", "cliVersion": "1.4.0", "protocolVersion": "1"}))
        .await;
    let msg = timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
    assert_eq!(
        msg,
        ServerMessage::ConnectionAck {
            cli_version: "1.4.0".into(),
            protocol_version: "1".into()
        }
    );
}

#[tokio::test]
async fn unknown_and_malformed_frames_keep_connection() {
    let cli = FakeCli::bind().await;
    let mut transport = Transport::new();
    let mut inbound = transport.subscribe();
    let (_, mut conn) = tokio::join!(transport.connect(cli.port), cli.accept());

    conn.send_json(json!({"type": "brand_new_feature", "x": 1})).await;
    conn.send_json(json!({"type": "close_diff"})).await;
    conn.send_json(json!({"type": "close_diff", "id": "ok"})).await;

    let msg = timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
    assert_eq!(msg, ServerMessage::CloseDiff { id: "ok".into() });
    assert!(transport.is_connected());
}

#[tokio::test]
async fn new_subscriber_replaces_previous() {
    let cli = FakeCli::bind().await;
    let mut transport = Transport::new();
    let mut first = transport.subscribe();
    let (_, mut conn) = tokio::join!(transport.connect(cli.port), cli.accept());
    let mut second = transport.subscribe();

    conn.send_json(json!({"type": "status", "model": "m"})).await;
    let msg = timeout(WAIT, second.recv()).await.unwrap().unwrap();
    assert_eq!(msg, ServerMessage::Status { model: Some("m".into()) });
    assert!(first.try_recv().is_err());
}

#[tokio::test]
async fn failed_connect_reports_false() {
    let mut transport = Transport::new().with_connect_timeout(Duration::from_secs(2));
    assert!(!transport.connect(closed_port().await).await);
    assert!(!transport.is_connected());
    // Dropped with a warning.
    transport.send(&ClientMessage::DiagnosticsResponse {
        diagnostics: Vec::new(),
    });
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let cli = FakeCli::bind().await;
    let mut transport = Transport::new();
    let (_, mut conn) = tokio::join!(transport.connect(cli.port), cli.accept());

    transport.disconnect();
    transport.disconnect();
    assert!(!transport.is_connected());
    assert!(conn.recv_json_within(Duration::from_secs(2)).await.is_none());
}

#[tokio::test]
async fn server_close_marks_disconnected() {
    let cli = FakeCli::bind().await;
    let mut transport = Transport::new();
    let (_, mut conn) = tokio::join!(transport.connect(cli.port), cli.accept());

    let mut connection = transport.watch_connection();
    assert!(*connection.borrow());

    conn.close().await;
    timeout(WAIT, connection.wait_for(|connected| !connected))
        .await
        .unwrap()
        .unwrap();
    assert!(!transport.is_connected());
}
