//! Control-operation dispatcher: the entry point CAPI applications call.
//!
//! [`RemoteApp::dispatch`] takes an ioctl-style operation code and the
//! caller's payload buffer and either runs one wire transaction, toggles the
//! socket, or answers locally. Any wire-level failure is logged and reported
//! as [`CapiError::TransactionFailed`]; callers cannot tell a rejected
//! request from a broken connection.

use std::net::TcpStream;

use tracing::{debug, warn};

use crate::error::CapiError;
use crate::ipc::{Session, TransactionError, Transport};
use crate::marshal::{self, ControllerSelector, RegisterParams, WirePayload};
use crate::models::{
    ControlOp, OpAction, MANUFACTURER_REQ_SIZE, PROFILE_REQ_SIZE, REGISTER_REQ_SIZE,
    SERIAL_REQ_SIZE, VERSION_REQ_SIZE, WORD_REQ_SIZE,
};

/// Size of the CAPI profile block returned by a profile query.
pub const PROFILE_SIZE: usize = PROFILE_REQ_SIZE - WORD_REQ_SIZE;

/// Version numbers reported for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapiVersion {
    pub major: u32,
    pub minor: u32,
    pub manufacturer_major: u32,
    pub manufacturer_minor: u32,
}

/// An application registered against a remote capi server.
///
/// Owns its [`Session`]; dropping the application closes the connection.
/// Calls block until the server has answered and must not overlap.
#[derive(Debug)]
pub struct RemoteApp<T: Transport = TcpStream> {
    session: Session<T>,
}

impl<T: Transport> RemoteApp<T> {
    pub fn new(session: Session<T>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Run control operation `code` over `data`.
    ///
    /// `data` must hold at least the operation's declared payload length;
    /// only that many leading bytes are sent and overwritten.
    pub fn dispatch(&mut self, code: u32, data: &mut [u8]) -> Result<(), CapiError> {
        let Some(op) = ControlOp::from_code(code) else {
            debug!("Rejecting unknown control operation {:#010x}", code);
            return Err(CapiError::UnsupportedOperation(code));
        };

        match op.action() {
            OpAction::PassThrough => self.pass_through(data),
            OpAction::Local => {
                debug!("{} handled locally", op.as_str());
                Ok(())
            }
            OpAction::Wire(command, marshalling) => {
                let needed = op.payload_len();
                let got = data.len();
                let Some(payload) = data.get_mut(..needed) else {
                    let err = TransactionError::BufferTooSmall { needed, got };
                    warn!("{} failed: {}", op.as_str(), err);
                    return Err(CapiError::TransactionFailed);
                };

                let fail = |err: &dyn std::fmt::Display| {
                    warn!("{} failed: {}", op.as_str(), err);
                    CapiError::TransactionFailed
                };

                marshal::to_wire(marshalling, payload).map_err(|e| fail(&e))?;
                let result = self.session.transact(command, payload);
                let restored = marshal::from_wire(marshalling, payload);

                result.map_err(|e| fail(&e))?;
                restored.map_err(|e| fail(&e))
            }
        }
    }

    /// `FIONBIO`: a non-zero native-endian int enables non-blocking mode.
    fn pass_through(&mut self, data: &[u8]) -> Result<(), CapiError> {
        let flag = data.get(..WORD_REQ_SIZE).ok_or_else(|| {
            CapiError::PassThrough(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "FIONBIO needs an int argument",
            ))
        })?;
        let nonblocking = i32::from_ne_bytes([flag[0], flag[1], flag[2], flag[3]]) != 0;
        self.session
            .set_nonblocking(nonblocking)
            .map_err(CapiError::PassThrough)
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), CapiError> {
        let mut data = i32::from(nonblocking).to_ne_bytes();
        self.dispatch(ControlOp::NonBlockingIo.code(), &mut data)
    }

    /// Register with the server. The returned record carries the assigned
    /// `app_id`.
    pub fn register(&mut self, params: RegisterParams) -> Result<RegisterParams, CapiError> {
        let mut data = [0u8; REGISTER_REQ_SIZE];
        params.write_host(&mut data);
        self.dispatch(ControlOp::Register.code(), &mut data)?;
        Ok(RegisterParams::read_host(&data))
    }

    fn controller_query<const N: usize>(
        &mut self,
        op: ControlOp,
        controller: u32,
    ) -> Result<[u8; N], CapiError> {
        let mut data = [0u8; N];
        ControllerSelector(controller).write_host(&mut data);
        self.dispatch(op.code(), &mut data)?;
        Ok(data)
    }

    /// Manufacturer name of `controller`.
    pub fn manufacturer(&mut self, controller: u32) -> Result<String, CapiError> {
        let data =
            self.controller_query::<MANUFACTURER_REQ_SIZE>(ControlOp::GetManufacturer, controller)?;
        Ok(c_string(&data[WORD_REQ_SIZE..]))
    }

    pub fn version(&mut self, controller: u32) -> Result<CapiVersion, CapiError> {
        let data = self.controller_query::<VERSION_REQ_SIZE>(ControlOp::GetVersion, controller)?;
        let word = |i: usize| {
            let at = WORD_REQ_SIZE + 4 * i;
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        Ok(CapiVersion {
            major: word(0),
            minor: word(1),
            manufacturer_major: word(2),
            manufacturer_minor: word(3),
        })
    }

    pub fn serial(&mut self, controller: u32) -> Result<String, CapiError> {
        let data = self.controller_query::<SERIAL_REQ_SIZE>(ControlOp::GetSerial, controller)?;
        Ok(c_string(&data[WORD_REQ_SIZE..]))
    }

    /// Raw CAPI profile block of `controller` (controller 0 asks for the
    /// number of installed controllers).
    pub fn profile(&mut self, controller: u32) -> Result<[u8; PROFILE_SIZE], CapiError> {
        let data = self.controller_query::<PROFILE_REQ_SIZE>(ControlOp::GetProfile, controller)?;
        let mut profile = [0u8; PROFILE_SIZE];
        profile.copy_from_slice(&data[WORD_REQ_SIZE..]);
        Ok(profile)
    }

    /// Start the D-channel of `controller`. The selector is sent as-is.
    pub fn start_d_channel(&mut self, controller: u32) -> Result<(), CapiError> {
        let mut data = controller.to_ne_bytes();
        self.dispatch(ControlOp::StartDChannel.code(), &mut data)
    }
}

/// Text up to the first NUL, lossily decoded.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{ioc, CAPI_IOCTL_TEST_REQ, CAPI_SET_STACK_VERSION_REQ, IOC_INOUT};
    use std::io::{Cursor, Read, Write};

    /// Transport that fails the test if the wire is touched.
    #[derive(Default)]
    struct SilentTransport {
        nonblocking: Option<bool>,
        touched: bool,
    }

    impl Read for SilentTransport {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            self.touched = true;
            Ok(0)
        }
    }

    impl Write for SilentTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.touched = true;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Transport for SilentTransport {
        fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
            self.nonblocking = Some(nonblocking);
            Ok(())
        }
    }

    /// Transport replaying one canned response.
    struct EchoTransport {
        written: Vec<u8>,
        reply: Cursor<Vec<u8>>,
    }

    impl Read for EchoTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for EchoTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Transport for EchoTransport {
        fn set_nonblocking(&mut self, _nonblocking: bool) -> std::io::Result<()> {
            Err(std::io::Error::from_raw_os_error(22))
        }
    }

    fn echo_app(command: u8, payload: &[u8]) -> RemoteApp<EchoTransport> {
        let mut reply = (payload.len() as u16).to_le_bytes().to_vec();
        reply.extend_from_slice(&[command, 0]);
        reply.extend_from_slice(payload);
        RemoteApp::new(Session::new(EchoTransport {
            written: Vec::new(),
            reply: Cursor::new(reply),
        }))
    }

    #[test]
    fn test_local_operations_never_touch_wire() {
        let mut app = RemoteApp::new(Session::new(SilentTransport::default()));
        for code in [CAPI_SET_STACK_VERSION_REQ, CAPI_IOCTL_TEST_REQ] {
            app.dispatch(code, &mut [0u8; 4]).unwrap();
        }
        assert!(!app.session().get_ref().touched);
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let mut app = RemoteApp::new(Session::new(SilentTransport::default()));
        let code = ioc(IOC_INOUT, b'C', 42, 4);
        let err = app.dispatch(code, &mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert!(matches!(err, CapiError::UnsupportedOperation(c) if c == code));
        assert!(!app.session().get_ref().touched);
    }

    #[test]
    fn test_fionbio_passes_through() {
        let mut app = RemoteApp::new(Session::new(SilentTransport::default()));
        app.set_nonblocking(true).unwrap();
        assert_eq!(app.session().get_ref().nonblocking, Some(true));
        app.set_nonblocking(false).unwrap();
        assert_eq!(app.session().get_ref().nonblocking, Some(false));
        assert!(!app.session().get_ref().touched);
    }

    #[test]
    fn test_fionbio_failure_surfaces_unchanged() {
        let mut app = echo_app(0, &[]);
        let err = app.set_nonblocking(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PassThrough);
        assert_eq!(err.errno(), 22);
    }

    #[test]
    fn test_short_buffer_is_a_failure_without_wire_traffic() {
        let mut app = RemoteApp::new(Session::new(SilentTransport::default()));
        let err = app
            .dispatch(ControlOp::Register.code(), &mut [0u8; 8])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionFailed);
        assert!(!app.session().get_ref().touched);
    }

    #[test]
    fn test_start_d_channel_is_not_marshalled() {
        let selector = 0x0102_0304u32.to_ne_bytes();
        let mut app = echo_app(6, &selector);
        app.start_d_channel(0x0102_0304).unwrap();

        let written = &app.session().get_ref().written;
        assert_eq!(&written[..4], &[4, 0, 6, 0]);
        assert_eq!(&written[4..], &selector);
    }

    #[test]
    fn test_manufacturer_decodes_name() {
        let mut payload = vec![0u8; MANUFACTURER_REQ_SIZE];
        payload[..4].copy_from_slice(&1u32.to_le_bytes());
        payload[4..12].copy_from_slice(b"AVM GmbH");
        let mut app = echo_app(2, &payload);

        assert_eq!(app.manufacturer(1).unwrap(), "AVM GmbH");
        let written = &app.session().get_ref().written;
        assert_eq!(&written[4..8], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_version_decodes_fields() {
        let mut payload = Vec::new();
        for value in [1u32, 2, 0, 1, 3] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        let mut app = echo_app(3, &payload);

        assert_eq!(
            app.version(1).unwrap(),
            CapiVersion {
                major: 2,
                minor: 0,
                manufacturer_major: 1,
                manufacturer_minor: 3,
            }
        );
    }

    #[test]
    fn test_failed_query_flattens_to_transaction_failed() {
        // Echoes the wrong command.
        let mut app = echo_app(5, &[0u8; SERIAL_REQ_SIZE]);
        let err = app.serial(1).unwrap_err();
        assert!(matches!(err, CapiError::TransactionFailed));
        assert_eq!(err.errno(), crate::error::ENOTTY);
    }

    #[test]
    fn test_c_string() {
        assert_eq!(c_string(b"abc\0def"), "abc");
        assert_eq!(c_string(b"abc"), "abc");
        assert_eq!(c_string(b""), "");
    }
}
