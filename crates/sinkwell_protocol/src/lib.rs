//! Subscriber lifecycle protocol.
//!
//! Wire format for Orchestrator <-> Subscriber communication. Each lifecycle
//! call is one request message and one reply message.
//!
//! # Protocol Specification
//!
//! Header Format: 8 bytes, Network Byte Order / Big Endian
//! ```text
//! [VER:1][OP:1][RES:2][LEN:4]
//! ```
//!
//! - VER (u8): Protocol version (0x01)
//! - OP (u8): OpCode
//! - RES (u16): Reserved for future use
//! - LEN (u32): Payload length in bytes
//!
//! The payload is a JSON document; its schema depends on the opcode and
//! direction (see [`types`]).

pub mod error;
pub mod types;

// Re-export types for convenience
pub use types::{
    DataPoint, DiscoverShapesRequest, DiscoverShapesResponse, DisposeRequest, DisposeResponse,
    ErrorPayload, InitRequest, InitResponse, PropertyDefinition, ReceiveDataPointRequest,
    ReceiveDataPointResponse, Settings, ShapeDefinition, TestConnectionRequest,
    TestConnectionResponse,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use error::{ProtocolError, Result};
use std::io::Cursor;

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Lifecycle OpCodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Unknown = 0,

    // Orchestrator -> Subscriber (Session setup)
    Init = 1, // "Here are your settings. Acquire your sink."

    // Orchestrator -> Subscriber (Liveness probe)
    TestConnection = 2, // "Are you reachable?"

    // Orchestrator -> Subscriber (Schema discovery)
    DiscoverShapes = 3, // "What data shapes do you accept?"

    // Orchestrator -> Subscriber (Data plane)
    ReceiveDataPoint = 4, // "Persist this record."

    // Orchestrator -> Subscriber (Teardown)
    Dispose = 5, // "Session over. Release your sink."

    // Subscriber -> Orchestrator (Error)
    Err = 6, // "That call failed."
}

impl OpCode {
    /// Convert u8 to OpCode
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(OpCode::Unknown),
            1 => Ok(OpCode::Init),
            2 => Ok(OpCode::TestConnection),
            3 => Ok(OpCode::DiscoverShapes),
            4 => Ok(OpCode::ReceiveDataPoint),
            5 => Ok(OpCode::Dispose),
            6 => Ok(OpCode::Err),
            _ => Err(ProtocolError::InvalidOpCode(value)),
        }
    }

    /// Convert OpCode to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub opcode: OpCode,
    pub reserved: u16,
    pub payload_len: u32,
}

impl Header {
    /// Create a new header
    pub fn new(opcode: OpCode, payload_len: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            opcode,
            reserved: 0,
            payload_len,
        }
    }

    /// Pack header into 8-byte buffer
    pub fn pack(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut buf = [0u8; HEADER_SIZE];
        let mut cursor = Cursor::new(&mut buf[..]);

        cursor.write_u8(self.version)?;
        cursor.write_u8(self.opcode.as_u8())?;
        cursor.write_u16::<BigEndian>(self.reserved)?;
        cursor.write_u32::<BigEndian>(self.payload_len)?;

        Ok(buf)
    }

    /// Unpack header from 8-byte buffer
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::HeaderTooShort {
                expected: HEADER_SIZE,
                got: data.len(),
            });
        }

        let mut cursor = Cursor::new(&data[..HEADER_SIZE]);

        let version = cursor.read_u8()?;
        let op_raw = cursor.read_u8()?;
        let reserved = cursor.read_u16::<BigEndian>()?;
        let payload_len = cursor.read_u32::<BigEndian>()?;

        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }

        let opcode = OpCode::from_u8(op_raw)?;

        Ok(Self {
            version,
            opcode,
            reserved,
            payload_len,
        })
    }
}

/// Protocol message (header + payload)
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Maximum payload size (4GB - 1, the max value of u32)
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

impl Message {
    /// Create a new message
    ///
    /// Returns an error if payload exceeds MAX_PAYLOAD_SIZE.
    pub fn new(opcode: OpCode, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let header = Header::new(opcode, payload.len() as u32);
        Ok(Self { header, payload })
    }

    /// Create a message whose payload is the JSON encoding of `body`.
    pub fn encode<T: serde::Serialize>(opcode: OpCode, body: &T) -> Result<Self> {
        Self::new(opcode, serde_json::to_vec(body)?)
    }

    /// Decode the payload as the JSON type expected for this opcode.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Pack message into socket frames (header, payload)
    pub fn pack(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let header_bytes = self.header.pack()?.to_vec();
        Ok((header_bytes, self.payload.clone()))
    }

    /// Unpack message from socket frames
    pub fn unpack(frames: &[Vec<u8>]) -> Result<Self> {
        if frames.len() < 2 {
            return Err(ProtocolError::InvalidFrameCount {
                expected: 2,
                got: frames.len(),
            });
        }

        let header = Header::unpack(&frames[0])?;
        let payload = frames[1].clone();

        // Validate payload length
        if payload.len() != header.payload_len as usize {
            return Err(ProtocolError::PayloadLengthMismatch {
                expected: header.payload_len as usize,
                got: payload.len(),
            });
        }

        Ok(Self { header, payload })
    }
}
