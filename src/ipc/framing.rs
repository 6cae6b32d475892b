//! Fixed 4-byte frame header for the remote CAPI protocol.
//!
//! Every request and every response is one header followed by exactly
//! `length` payload bytes.
//!
//! # Wire Format
//!
//! ```text
//! ┌───────────┬───────────┬─────────┬─────────┐
//! │ length lo │ length hi │ command │ status  │
//! │  1 byte   │  1 byte   │ 1 byte  │ 1 byte  │
//! └───────────┴───────────┴─────────┴─────────┘
//! ```
//!
//! `status` is always 0 on requests; on responses 0 means success.

use std::io::{Read, Write};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload a header can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length in bytes.
    pub length: u16,
    /// Raw wire command id, not validated here.
    pub command: u8,
    pub status: u8,
}

impl FrameHeader {
    /// A request header: status is always zero.
    pub fn request(command: u8, length: u16) -> Self {
        Self {
            length,
            command,
            status: 0,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let [lo, hi] = self.length.to_le_bytes();
        [lo, hi, self.command, self.status]
    }

    pub fn decode(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            length: u16::from(bytes[0]) | (u16::from(bytes[1]) << 8),
            command: bytes[2],
            status: bytes[3],
        }
    }
}

/// Write a request header followed by its payload.
///
/// The header length is taken from `payload`; callers must have checked it
/// against [`MAX_PAYLOAD_SIZE`].
pub fn write_frame<W: Write>(writer: &mut W, command: u8, payload: &[u8]) -> std::io::Result<()> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);
    let header = FrameHeader::request(command, payload.len() as u16);

    writer.write_all(&header.encode())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Block until a full header has been read.
///
/// End of stream before four bytes arrive is an `UnexpectedEof` error.
pub fn read_header<R: Read>(reader: &mut R) -> std::io::Result<FrameHeader> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;
    Ok(FrameHeader::decode(bytes))
}
