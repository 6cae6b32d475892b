//! Byte-order conversion of CAPI request payloads.
//!
//! Callers hand the dispatcher host-order structures; the server expects the
//! numeric fields little-endian. Each payload shape gets a pair of pure
//! conversions, [`WirePayload::to_wire`] and [`WirePayload::from_wire`], and
//! [`forward`] / [`reverse`] apply them to the leading bytes of a raw buffer.
//! Fields a shape does not name are left untouched.

use thiserror::Error;

use crate::models::{Marshalling, REGISTER_REQ_SIZE, WORD_REQ_SIZE};

/// The buffer is too short to hold the record being converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Payload holds {got} bytes, record needs {needed}")]
pub struct ShortPayload {
    pub needed: usize,
    pub got: usize,
}

/// A fixed-layout record living at the start of a control-operation payload.
pub trait WirePayload: Copy {
    /// Bytes of the buffer the record occupies.
    const SIZE: usize;

    /// Read the record from caller memory, host byte order.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`Self::SIZE`].
    fn read_host(buf: &[u8]) -> Self;

    /// Store the record back into caller memory, host byte order.
    fn write_host(&self, buf: &mut [u8]);

    /// Host order to wire order.
    fn to_wire(self) -> Self;

    /// Wire order to host order.
    fn from_wire(self) -> Self;
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_ne_bytes(word)
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

/// `struct capi_register_req`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterParams {
    pub max_logical_connections: u32,
    pub max_b_data_blocks: u32,
    pub max_b_data_len: u32,
    pub max_msg_data_size: u32,
    /// Filled in by the server on success.
    pub app_id: u32,
}

impl RegisterParams {
    fn map(self, f: fn(u32) -> u32) -> Self {
        Self {
            max_logical_connections: f(self.max_logical_connections),
            max_b_data_blocks: f(self.max_b_data_blocks),
            max_b_data_len: f(self.max_b_data_len),
            max_msg_data_size: f(self.max_msg_data_size),
            app_id: f(self.app_id),
        }
    }
}

impl WirePayload for RegisterParams {
    const SIZE: usize = REGISTER_REQ_SIZE;

    fn read_host(buf: &[u8]) -> Self {
        Self {
            max_logical_connections: read_u32(buf, 0),
            max_b_data_blocks: read_u32(buf, 4),
            max_b_data_len: read_u32(buf, 8),
            max_msg_data_size: read_u32(buf, 12),
            app_id: read_u32(buf, 16),
        }
    }

    fn write_host(&self, buf: &mut [u8]) {
        write_u32(buf, 0, self.max_logical_connections);
        write_u32(buf, 4, self.max_b_data_blocks);
        write_u32(buf, 8, self.max_b_data_len);
        write_u32(buf, 12, self.max_msg_data_size);
        write_u32(buf, 16, self.app_id);
    }

    fn to_wire(self) -> Self {
        self.map(u32::to_le)
    }

    fn from_wire(self) -> Self {
        self.map(u32::from_le)
    }
}

/// Leading controller number of the manufacturer, version, serial and
/// profile queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerSelector(pub u32);

impl WirePayload for ControllerSelector {
    const SIZE: usize = WORD_REQ_SIZE;

    fn read_host(buf: &[u8]) -> Self {
        Self(read_u32(buf, 0))
    }

    fn write_host(&self, buf: &mut [u8]) {
        write_u32(buf, 0, self.0);
    }

    fn to_wire(self) -> Self {
        Self(self.0.to_le())
    }

    fn from_wire(self) -> Self {
        Self(u32::from_le(self.0))
    }
}

fn check_len<P: WirePayload>(buf: &[u8]) -> Result<(), ShortPayload> {
    if buf.len() < P::SIZE {
        return Err(ShortPayload {
            needed: P::SIZE,
            got: buf.len(),
        });
    }
    Ok(())
}

/// Convert the `P` record at the start of `buf` from host to wire order.
///
/// A buffer shorter than `P::SIZE` is left untouched.
pub fn forward<P: WirePayload>(buf: &mut [u8]) -> Result<(), ShortPayload> {
    check_len::<P>(buf)?;
    P::read_host(buf).to_wire().write_host(buf);
    Ok(())
}

/// Convert the `P` record at the start of `buf` from wire to host order.
pub fn reverse<P: WirePayload>(buf: &mut [u8]) -> Result<(), ShortPayload> {
    check_len::<P>(buf)?;
    P::read_host(buf).from_wire().write_host(buf);
    Ok(())
}

/// Apply the forward conversion selected by `marshalling`.
pub fn to_wire(marshalling: Marshalling, buf: &mut [u8]) -> Result<(), ShortPayload> {
    match marshalling {
        Marshalling::Register => forward::<RegisterParams>(buf),
        Marshalling::Controller => forward::<ControllerSelector>(buf),
        Marshalling::None => Ok(()),
    }
}

/// Apply the reverse conversion selected by `marshalling`.
pub fn from_wire(marshalling: Marshalling, buf: &mut [u8]) -> Result<(), ShortPayload> {
    match marshalling {
        Marshalling::Register => reverse::<RegisterParams>(buf),
        Marshalling::Controller => reverse::<ControllerSelector>(buf),
        Marshalling::None => Ok(()),
    }
}
