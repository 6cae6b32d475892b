//! Remote CAPI transport: connection setup, framing and transactions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐            TCP             ┌─────────────────────┐
//! │  CAPI app       │  ◄───────────────────────► │     capi server     │
//! │  (Session)      │   4-byte header + payload  │   (mirror side)     │
//! └─────────────────┘                            └─────────────────────┘
//! ```
//!
//! # Protocol
//!
//! Strictly one request, then one response, per session:
//!
//! ```text
//! client: [len_lo len_hi cmd 0] <len bytes>
//! server: [len_lo len_hi cmd 0] <len bytes>
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use capi_remote::ipc::{connect, Session};
//! use capi_remote::models::WireCommand;
//!
//! let mut session = Session::new(connect("capi.example", "2662")?);
//! let mut selector = 1u32.to_le_bytes();
//! session.transact(WireCommand::Start, &mut selector)?;
//! ```

mod client;
mod connector;
mod framing;

pub use client::{Session, TransactionError, Transport};
pub use connector::{
    connect, connect_candidates, resolve, service_port, DEFAULT_CAPI_PORT, SOCKET_BUFFER_SIZE,
};
pub use framing::{read_header, write_frame, FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
