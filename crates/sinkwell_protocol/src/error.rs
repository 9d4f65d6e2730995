//! Protocol error taxonomy.

use thiserror::Error;

/// Errors raised while packing or unpacking wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid opcode: {0}")]
    InvalidOpCode(u8),

    #[error("Protocol version mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    VersionMismatch { expected: u8, got: u8 },

    #[error("Header too short: expected {expected} bytes, got {got}")]
    HeaderTooShort { expected: usize, got: usize },

    #[error("Payload too large: {size} bytes exceeds maximum of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid frame count: expected {expected}, got {got}")]
    InvalidFrameCount { expected: usize, got: usize },

    #[error("Payload length mismatch: header declares {expected} bytes, got {got}")]
    PayloadLengthMismatch { expected: usize, got: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while interpreting subscriber settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("setting '{key}' must be a string, got {found}")]
    NotAString { key: &'static str, found: &'static str },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
