//! Sinkwell subscriber: a pipeline data-sink endpoint.
//!
//! An orchestrator drives a subscriber through a fixed lifecycle:
//! `Init` once, then any mix of `TestConnection` / `DiscoverShapes` /
//! `ReceiveDataPoint`, then `Dispose` once. Received data points are
//! persisted to an optional append-only JSONL sink configured via the
//! `"file"` setting.

pub mod catalog;
pub mod handler;
pub mod server;

pub use catalog::ShapeCatalog;
pub use handler::{Phase, Subscriber, SubscriberError, SubscriberHandler};
pub use server::{ServerConfig, SubscriberServer};
