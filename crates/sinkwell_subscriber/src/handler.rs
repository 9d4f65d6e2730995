//! Subscriber lifecycle state machine.
//!
//! Design principles:
//! - Phase is tracked explicitly (`Created -> Initialized -> Disposed`,
//!   monotonic); out-of-phase calls are rejected, not undefined behavior
//! - The sink is an owned `Option` behind the state mutex: created at most
//!   once during `Init`, taken and closed exactly once during `Dispose`
//! - Every operation runs under one lock acquisition, so concurrent
//!   `ReceiveDataPoint` calls never interleave lines and `Dispose` waits
//!   for in-flight appends before closing

use sinkwell_protocol::error::SettingsError;
use sinkwell_protocol::types::{
    DiscoverShapesRequest, DiscoverShapesResponse, DisposeRequest, DisposeResponse, InitRequest,
    InitResponse, ReceiveDataPointRequest, ReceiveDataPointResponse, TestConnectionRequest,
    TestConnectionResponse,
};
use sinkwell_sink::{JsonlSink, SinkError};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::ShapeCatalog;

/// Lifecycle phase of a subscriber session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Initialized,
    Disposed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Initialized => "initialized",
            Phase::Disposed => "disposed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscriber operation errors.
#[derive(Debug, Error)]
pub enum SubscriberError {
    /// Sink acquisition failed during `Init`. The handler stays in the
    /// `Created` phase and a retried `Init` is valid.
    #[error("couldn't open file: {source}")]
    OpenSink {
        #[source]
        source: SinkError,
    },

    /// A call arrived in a phase where it is not legal.
    #[error("{op} is not valid while the subscriber is {phase}")]
    Sequence { op: &'static str, phase: Phase },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("subscriber state lock poisoned")]
    StatePoisoned,
}

/// The five lifecycle operations an orchestrator can invoke.
///
/// Transports decode inbound requests into these calls and encode the
/// returned responses. An `Err` is the authoritative failure signal; the
/// transport reconciles it into a wire-level failure reply.
pub trait Subscriber: Send + Sync {
    fn init(&self, request: InitRequest) -> Result<InitResponse, SubscriberError>;
    fn test_connection(
        &self,
        request: TestConnectionRequest,
    ) -> Result<TestConnectionResponse, SubscriberError>;
    fn discover_shapes(
        &self,
        request: DiscoverShapesRequest,
    ) -> Result<DiscoverShapesResponse, SubscriberError>;
    fn receive_data_point(
        &self,
        request: ReceiveDataPointRequest,
    ) -> Result<ReceiveDataPointResponse, SubscriberError>;
    fn dispose(&self, request: DisposeRequest) -> Result<DisposeResponse, SubscriberError>;
}

struct HandlerState {
    phase: Phase,
    sink: Option<JsonlSink>,
}

/// Stateful subscriber session: one shape catalog, at most one sink.
pub struct SubscriberHandler {
    catalog: ShapeCatalog,
    state: Mutex<HandlerState>,
}

impl SubscriberHandler {
    pub fn new(catalog: ShapeCatalog) -> Self {
        Self {
            catalog,
            state: Mutex::new(HandlerState {
                phase: Phase::Created,
                sink: None,
            }),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, HandlerState>, SubscriberError> {
        self.state.lock().map_err(|_| SubscriberError::StatePoisoned)
    }
}

impl Subscriber for SubscriberHandler {
    fn init(&self, request: InitRequest) -> Result<InitResponse, SubscriberError> {
        let mut state = self.state()?;
        debug!("Init in phase {}", state.phase);

        if state.phase != Phase::Created {
            return Err(SubscriberError::Sequence {
                op: "Init",
                phase: state.phase,
            });
        }

        // Any failure below leaves the state untouched: still Created,
        // holding no resource, so a retried Init remains valid.
        if let Some(path) = request.settings.file_path()? {
            let sink =
                JsonlSink::create(&path).map_err(|source| SubscriberError::OpenSink { source })?;
            info!("Persisting data points to {}", path.display());
            state.sink = Some(sink);
        } else {
            info!("No file configured, persistence disabled");
        }

        state.phase = Phase::Initialized;
        Ok(InitResponse {
            success: true,
            message: "OK".to_string(),
        })
    }

    fn test_connection(
        &self,
        _request: TestConnectionRequest,
    ) -> Result<TestConnectionResponse, SubscriberError> {
        // Pure liveness probe, legal in every phase.
        debug!("TestConnection");
        Ok(TestConnectionResponse {
            success: true,
            message: "OK".to_string(),
        })
    }

    fn discover_shapes(
        &self,
        _request: DiscoverShapesRequest,
    ) -> Result<DiscoverShapesResponse, SubscriberError> {
        debug!("DiscoverShapes");
        Ok(DiscoverShapesResponse {
            shapes: self.catalog.shapes().to_vec(),
        })
    }

    fn receive_data_point(
        &self,
        request: ReceiveDataPointRequest,
    ) -> Result<ReceiveDataPointResponse, SubscriberError> {
        let mut state = self.state()?;

        if state.phase != Phase::Initialized {
            return Err(SubscriberError::Sequence {
                op: "ReceiveDataPoint",
                phase: state.phase,
            });
        }

        info!(datapoint = ?request.data_point, "Received data point");

        // No sink configured: receiving is a pure no-op.
        if let Some(sink) = state.sink.as_mut() {
            sink.append(&request.data_point)?;
        }

        Ok(ReceiveDataPointResponse { success: true })
    }

    fn dispose(&self, _request: DisposeRequest) -> Result<DisposeResponse, SubscriberError> {
        let mut state = self.state()?;
        debug!("Dispose in phase {}", state.phase);

        if state.phase == Phase::Disposed {
            return Err(SubscriberError::Sequence {
                op: "Dispose",
                phase: state.phase,
            });
        }

        // Advance the phase before closing: even a failed close leaves the
        // handler terminally disposed with the resource relinquished.
        state.phase = Phase::Disposed;
        if let Some(sink) = state.sink.take() {
            let rows = sink.rows_written();
            sink.close()?;
            info!("Sink closed with {} rows", rows);
        }

        Ok(DisposeResponse { success: true })
    }
}
