//! Append-only JSONL sink for received data points.
//!
//! The sink is the only externally observable effect of a subscriber session:
//! one serialized record per newline-terminated line, record order == arrival
//! order, no compaction, no indexing.

use sinkwell_protocol::types::DataPoint;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors returned by sink acquisition and writing.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create sink file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize record for sink {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to append to sink {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to close sink {path}: {source}")]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Line-oriented JSON log backed by a single file.
///
/// Created (truncating) once per session, appended to per record, closed
/// exactly once. Closing is enforced by ownership: [`JsonlSink::close`]
/// consumes the sink. The sink itself is not thread-safe; callers that share
/// it across tasks must serialize access around it.
pub struct JsonlSink {
    path: PathBuf,
    file: File,
    rows_written: u64,
}

impl JsonlSink {
    /// Create (truncating) a sink at `path`.
    ///
    /// On failure no partial state is retained; the caller holds nothing.
    pub fn create(path: impl Into<PathBuf>) -> SinkResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|source| SinkError::Create {
            path: path.clone(),
            source,
        })?;

        debug!("Created JSONL sink: {}", path.display());

        Ok(Self {
            path,
            file,
            rows_written: 0,
        })
    }

    /// Append one record as a single newline-terminated JSON line.
    ///
    /// The line is written with one `write_all` call, so a serialized caller
    /// never leaves a partial line behind another record's.
    pub fn append(&mut self, record: &DataPoint) -> SinkResult<()> {
        let mut line = serde_json::to_vec(record).map_err(|source| SinkError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })?;

        self.rows_written += 1;
        debug!(
            "Appended record to {} (total: {})",
            self.path.display(),
            self.rows_written
        );
        Ok(())
    }

    /// Flush and close the sink, consuming it.
    pub fn close(self) -> SinkResult<()> {
        self.file.sync_all().map_err(|source| SinkError::Close {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            "Closed JSONL sink: {} ({} rows)",
            self.path.display(),
            self.rows_written
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}
