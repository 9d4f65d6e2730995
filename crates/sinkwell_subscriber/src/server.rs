//! ZeroMQ transport for the subscriber.
//!
//! A router socket accepts orchestrator connections; each request is one
//! multipart message `[identity, header, payload]`. The server decodes the
//! payload for the header's opcode, invokes the matching [`Subscriber`]
//! operation, and replies to the same identity. Operation failures become
//! `OpCode::Err` replies carrying an [`ErrorPayload`] - the error is the
//! authoritative failure signal, so it wins over any response body.

use anyhow::Result;
use sinkwell_protocol::types::{
    DisposeRequest, ErrorPayload, InitRequest, ReceiveDataPointRequest,
};
use sinkwell_protocol::{Header, Message, OpCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zeromq::{RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::handler::{Subscriber, SubscriberError};

/// Server configuration (plain data)
pub struct ServerConfig {
    /// Listen address, e.g. `tcp://127.0.0.1:7700`
    pub bind_addr: String,
}

/// Active subscriber server with a bound socket.
pub struct SubscriberServer<S> {
    socket: RouterSocket,
    handler: Arc<S>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<S: Subscriber> SubscriberServer<S> {
    /// Bind the listen socket and create the server.
    /// Returns (Server, ShutdownHandle) - call run() on Server, use handle for shutdown.
    pub async fn bind(config: ServerConfig, handler: Arc<S>) -> Result<(Self, mpsc::Sender<()>)> {
        let mut socket = RouterSocket::new();
        socket.bind(&config.bind_addr).await?;

        info!("Subscriber listening on {}", config.bind_addr);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Ok((
            Self {
                socket,
                handler,
                shutdown_rx,
            },
            shutdown_tx,
        ))
    }

    /// Main event loop - consumes self (can only be called once).
    ///
    /// On shutdown the handler is disposed before returning, so a configured
    /// sink is flushed and closed even when the orchestrator never sent
    /// `Dispose`.
    pub async fn run(mut self) -> Result<()> {
        info!("Entering event loop...");

        loop {
            tokio::select! {
                biased;

                // Branch 1: Shutdown signal (highest priority)
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }

                // Branch 2: Lifecycle requests from the orchestrator
                recv_result = tokio::time::timeout(Duration::from_millis(100), self.socket.recv()) => {
                    match recv_result {
                        Ok(Ok(multipart)) => {
                            let parts: Vec<Vec<u8>> = multipart
                                .into_vec()
                                .into_iter()
                                .map(|b| b.to_vec())
                                .collect();

                            if parts.len() >= 3 {
                                let identity = parts[0].clone();
                                match Message::unpack(&[parts[1].clone(), parts[2].clone()]) {
                                    Ok(msg) => {
                                        let reply = self.handle_request(msg);
                                        if let Err(e) = self.send_reply(identity, reply).await {
                                            error!("Failed to send reply: {}", e);
                                        }
                                    }
                                    Err(e) => warn!("Failed to unpack message: {}", e),
                                }
                            } else {
                                warn!("Expected 3 frames [identity, header, payload], got {}", parts.len());
                            }
                        }
                        Ok(Err(e)) => {
                            error!("Socket recv error: {}", e);
                            break;
                        }
                        Err(_) => {} // Timeout - continue loop
                    }
                }
            }
        }

        self.dispose_handler();
        info!("Subscriber stopped");
        Ok(())
    }

    /// Dispatch one request and build the reply message.
    fn handle_request(&self, msg: Message) -> Message {
        let opcode = msg.header.opcode;
        debug!("Dispatching {:?}", opcode);

        match self.dispatch(opcode, msg) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{:?} failed: {}", opcode, e);
                error_reply(&e)
            }
        }
    }

    fn dispatch(&self, opcode: OpCode, msg: Message) -> Result<Message> {
        let reply = match opcode {
            OpCode::Init => {
                let request: InitRequest = msg.decode()?;
                let response = self.handler.init(request)?;
                Message::encode(opcode, &response)?
            }
            OpCode::TestConnection => {
                let request = msg.decode()?;
                let response = self.handler.test_connection(request)?;
                Message::encode(opcode, &response)?
            }
            OpCode::DiscoverShapes => {
                let request = msg.decode()?;
                let response = self.handler.discover_shapes(request)?;
                Message::encode(opcode, &response)?
            }
            OpCode::ReceiveDataPoint => {
                let request: ReceiveDataPointRequest = msg.decode()?;
                let response = self.handler.receive_data_point(request)?;
                Message::encode(opcode, &response)?
            }
            OpCode::Dispose => {
                let request = msg.decode()?;
                let response = self.handler.dispose(request)?;
                Message::encode(opcode, &response)?
            }
            OpCode::Unknown | OpCode::Err => {
                anyhow::bail!("unexpected request opcode: {:?}", opcode)
            }
        };
        Ok(reply)
    }

    async fn send_reply(&mut self, identity: Vec<u8>, reply: Message) -> Result<()> {
        let (header, payload) = reply.pack()?;
        let mut multipart = ZmqMessage::from(identity);
        multipart.push_back(header.into());
        multipart.push_back(payload.into());
        self.socket.send(multipart).await?;
        Ok(())
    }

    /// Shutdown hook: dispose the handler deterministically so the sink is
    /// released even without an orchestrator-sent `Dispose`.
    fn dispose_handler(&self) {
        match self.handler.dispose(DisposeRequest::default()) {
            Ok(_) => info!("Disposed subscriber handler on shutdown"),
            Err(SubscriberError::Sequence { .. }) => {
                debug!("Handler already disposed, nothing to release")
            }
            Err(e) => error!("Failed to dispose handler on shutdown: {}", e),
        }
    }
}

fn error_reply(error: &anyhow::Error) -> Message {
    let payload = ErrorPayload {
        message: error.to_string(),
    };
    Message::encode(OpCode::Err, &payload).unwrap_or_else(|_| Message {
        header: Header::new(OpCode::Err, 0),
        payload: Vec::new(),
    })
}
