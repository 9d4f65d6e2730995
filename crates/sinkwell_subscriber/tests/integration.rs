use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use sinkwell_protocol::types::{
    DataPoint, DiscoverShapesResponse, DisposeResponse, ErrorPayload, InitResponse,
    ReceiveDataPointResponse, TestConnectionResponse,
};
use sinkwell_protocol::{Message, OpCode};
use sinkwell_subscriber::{ServerConfig, ShapeCatalog, SubscriberHandler, SubscriberServer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// Generate a random port in the ephemeral range to avoid collisions
fn random_test_port() -> u16 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let pid = std::process::id() as u64;
    ((seed ^ pid) % 10000 + 50000) as u16 // Ports 50000-59999
}

async fn bind_server(
    handler: Arc<SubscriberHandler>,
) -> Result<(JoinHandle<Result<()>>, mpsc::Sender<()>, String)> {
    let mut last_err = None;
    for _ in 0..25 {
        let port = random_test_port();
        let bind_addr = format!("tcp://127.0.0.1:{}", port);
        let config = ServerConfig {
            bind_addr: bind_addr.clone(),
        };
        match SubscriberServer::bind(config, Arc::clone(&handler)).await {
            Ok((server, shutdown_tx)) => {
                let join = tokio::spawn(server.run());
                return Ok((join, shutdown_tx, bind_addr));
            }
            Err(err) => {
                last_err = Some(err);
            }
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind subscriber server after multiple attempts: {:?}",
        last_err
    ))
}

async fn call<T: Serialize>(
    socket: &mut DealerSocket,
    opcode: OpCode,
    body: &T,
) -> Result<Message> {
    let msg = Message::encode(opcode, body)?;
    let (header, payload) = msg.pack()?;

    let mut multipart = ZmqMessage::from(header);
    multipart.push_back(payload.into());
    socket.send(multipart).await?;

    let reply = timeout(Duration::from_secs(5), socket.recv()).await??;
    let frames: Vec<Vec<u8>> = reply.into_vec().into_iter().map(|b| b.to_vec()).collect();
    Ok(Message::unpack(&frames)?)
}

fn read_records(path: &Path) -> Vec<DataPoint> {
    let content = std::fs::read_to_string(path).unwrap();
    content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_lifecycle_over_socket() -> Result<()> {
    let handler = Arc::new(SubscriberHandler::new(ShapeCatalog::default()));
    let (join, shutdown_tx, bind_addr) = bind_server(handler).await?;

    let mut client = DealerSocket::new();
    client.connect(&bind_addr).await?;

    // Liveness probe is legal before Init.
    let reply = call(&mut client, OpCode::TestConnection, &json!({})).await?;
    assert_eq!(reply.header.opcode, OpCode::TestConnection);
    let response: TestConnectionResponse = reply.decode()?;
    assert!(response.success);
    assert_eq!(response.message, "OK");

    let dir = tempfile::tempdir()?;
    let sink_path = dir.path().join("received.jsonl");
    let reply = call(
        &mut client,
        OpCode::Init,
        &json!({"Settings": {"file": sink_path.to_str().unwrap()}}),
    )
    .await?;
    assert_eq!(reply.header.opcode, OpCode::Init);
    let response: InitResponse = reply.decode()?;
    assert!(response.success);
    assert_eq!(response.message, "OK");
    assert!(sink_path.exists());

    let reply = call(&mut client, OpCode::DiscoverShapes, &json!({})).await?;
    let response: DiscoverShapesResponse = reply.decode()?;
    assert_eq!(response.shapes.len(), 1);
    assert_eq!(response.shapes[0].name, "test-shape");
    assert_eq!(response.shapes[0].keys, vec!["ID".to_string()]);

    for i in 0..3 {
        let reply = call(
            &mut client,
            OpCode::ReceiveDataPoint,
            &json!({"DataPoint": {"ID": i, "Name": format!("rec-{i}")}}),
        )
        .await?;
        assert_eq!(reply.header.opcode, OpCode::ReceiveDataPoint);
        let response: ReceiveDataPointResponse = reply.decode()?;
        assert!(response.success);
    }

    let reply = call(&mut client, OpCode::Dispose, &json!({})).await?;
    assert_eq!(reply.header.opcode, OpCode::Dispose);
    let response: DisposeResponse = reply.decode()?;
    assert!(response.success);

    // A duplicate Dispose is a sequence error, reconciled to an Err reply.
    let reply = call(&mut client, OpCode::Dispose, &json!({})).await?;
    assert_eq!(reply.header.opcode, OpCode::Err);
    let payload: ErrorPayload = reply.decode()?;
    assert!(payload.message.contains("not valid"));

    let _ = shutdown_tx.send(()).await;
    join.await??;

    let records = read_records(&sink_path);
    assert_eq!(records.len(), 3);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["ID"], i as u64);
        assert_eq!(record["Name"], format!("rec-{i}"));
    }

    Ok(())
}

#[tokio::test]
async fn test_receive_before_init_gets_err_reply() -> Result<()> {
    let handler = Arc::new(SubscriberHandler::new(ShapeCatalog::default()));
    let (join, shutdown_tx, bind_addr) = bind_server(handler).await?;

    let mut client = DealerSocket::new();
    client.connect(&bind_addr).await?;

    let reply = call(
        &mut client,
        OpCode::ReceiveDataPoint,
        &json!({"DataPoint": {"ID": 1}}),
    )
    .await?;
    assert_eq!(reply.header.opcode, OpCode::Err);
    let payload: ErrorPayload = reply.decode()?;
    assert!(payload.message.contains("ReceiveDataPoint"));
    assert!(payload.message.contains("created"));

    let _ = shutdown_tx.send(()).await;
    join.await??;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_disposes_initialized_handler() -> Result<()> {
    let handler = Arc::new(SubscriberHandler::new(ShapeCatalog::default()));
    let (join, shutdown_tx, bind_addr) = bind_server(handler).await?;

    let mut client = DealerSocket::new();
    client.connect(&bind_addr).await?;

    let dir = tempfile::tempdir()?;
    let sink_path = dir.path().join("received.jsonl");
    let reply = call(
        &mut client,
        OpCode::Init,
        &json!({"Settings": {"file": sink_path.to_str().unwrap()}}),
    )
    .await?;
    let response: InitResponse = reply.decode()?;
    assert!(response.success);

    for i in 0..2 {
        let reply = call(
            &mut client,
            OpCode::ReceiveDataPoint,
            &json!({"DataPoint": {"ID": i}}),
        )
        .await?;
        let response: ReceiveDataPointResponse = reply.decode()?;
        assert!(response.success);
    }

    // No Dispose from the orchestrator: the shutdown hook must close the sink.
    let _ = shutdown_tx.send(()).await;
    join.await??;

    let records = read_records(&sink_path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["ID"], 0);
    assert_eq!(records[1]["ID"], 1);

    Ok(())
}

#[tokio::test]
async fn test_init_without_file_persists_nothing() -> Result<()> {
    let handler = Arc::new(SubscriberHandler::new(ShapeCatalog::default()));
    let (join, shutdown_tx, bind_addr) = bind_server(handler).await?;

    let mut client = DealerSocket::new();
    client.connect(&bind_addr).await?;

    let reply = call(&mut client, OpCode::Init, &json!({"Settings": {}})).await?;
    let response: InitResponse = reply.decode()?;
    assert!(response.success);

    let reply = call(
        &mut client,
        OpCode::ReceiveDataPoint,
        &json!({"DataPoint": {"ID": 1}}),
    )
    .await?;
    let response: ReceiveDataPointResponse = reply.decode()?;
    assert!(response.success);

    let _ = shutdown_tx.send(()).await;
    join.await??;
    Ok(())
}
