//! Synchronous request/response engine over one connected stream.
//!
//! A [`Session`] owns the stream and runs exactly one transaction at a time:
//! write a framed request, block for the framed response, validate the echo,
//! and read the response payload back over the request buffer. There is no
//! timeout and no resynchronization; after any failure the stream should be
//! considered unusable.

use std::io::{Read, Write};
use std::net::TcpStream;

use thiserror::Error;
use tracing::debug;

use crate::ipc::framing::{read_header, write_frame, MAX_PAYLOAD_SIZE};
use crate::models::WireCommand;

/// A byte stream the session can run transactions over.
///
/// Besides plain reads and writes the dispatcher needs the socket's
/// non-blocking switch, which it exposes to callers unchanged.
pub trait Transport: Read + Write {
    fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()>;
}

impl Transport for TcpStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }
}

#[cfg(unix)]
impl Transport for std::os::unix::net::UnixStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_nonblocking(self, nonblocking)
    }
}

/// Why a transaction failed.
///
/// Only used for diagnostics. The dispatcher reports every variant as the
/// same failure.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Short write, short read, or end of stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),

    #[error("Payload buffer holds {got} bytes, operation needs {needed}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("Response command {got} does not match request command {expected}")]
    CommandMismatch { expected: u8, got: u8 },

    #[error("Server reported status {0}")]
    Status(u8),

    #[error("Response length {got} does not match request length {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

/// One connection to a capi server, owned by one application.
#[derive(Debug)]
pub struct Session<T: Transport = TcpStream> {
    stream: T,
}

impl<T: Transport> Session<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    /// Toggle non-blocking mode on the underlying stream.
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
        self.stream.set_nonblocking(nonblocking)
    }

    /// Send `buf` as a `command` request and replace it with the response.
    ///
    /// # Protocol
    ///
    /// 1. Write the request header (`status` 0) and `buf`
    /// 2. Block for the 4-byte response header
    /// 3. Check it echoes `command` and `buf.len()` with status 0
    /// 4. Read exactly `buf.len()` bytes back into `buf`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `buf` is longer than a frame can describe (`PayloadTooLarge`)
    /// - A write or read comes up short, including end of stream (`Io`)
    /// - The response names another command (`CommandMismatch`)
    /// - The server reports a non-zero status (`Status`)
    /// - The response length differs from the request (`LengthMismatch`)
    ///
    /// On failure `buf` may hold a partial response and must not be
    /// trusted. The stream is not resynchronized.
    pub fn transact(
        &mut self,
        command: WireCommand,
        buf: &mut [u8],
    ) -> Result<(), TransactionError> {
        let len = buf.len();
        if len > MAX_PAYLOAD_SIZE {
            return Err(TransactionError::PayloadTooLarge(len));
        }

        debug!("-> {} ({} bytes)", command.as_str(), len);
        write_frame(&mut self.stream, command.id(), buf)?;

        let header = read_header(&mut self.stream)?;
        debug!(
            "<- command={} status={} length={}",
            header.command, header.status, header.length
        );

        if header.command != command.id() {
            return Err(TransactionError::CommandMismatch {
                expected: command.id(),
                got: header.command,
            });
        }
        if header.status != 0 {
            return Err(TransactionError::Status(header.status));
        }
        if usize::from(header.length) != len {
            return Err(TransactionError::LengthMismatch {
                expected: len,
                got: usize::from(header.length),
            });
        }

        self.stream.read_exact(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory transport: records what the client writes and replays a
    /// canned server response.
    struct ScriptedTransport {
        written: Vec<u8>,
        response: Cursor<Vec<u8>>,
        write_limit: Option<usize>,
    }

    impl ScriptedTransport {
        fn new(response: Vec<u8>) -> Self {
            Self {
                written: Vec::new(),
                response: Cursor::new(response),
                write_limit: None,
            }
        }
    }

    impl Read for ScriptedTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.response.read(buf)
        }
    }

    impl Write for ScriptedTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(limit) = self.write_limit {
                let room = limit.saturating_sub(self.written.len());
                let n = room.min(buf.len());
                self.written.extend_from_slice(&buf[..n]);
                return Ok(n);
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Transport for ScriptedTransport {
        fn set_nonblocking(&mut self, _nonblocking: bool) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn response(length: u16, command: u8, status: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = length.to_le_bytes().to_vec();
        bytes.push(command);
        bytes.push(status);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_transact_echo_success() {
        let reply = response(4, 3, 0, &[4, 3, 2, 1]);
        let mut session = Session::new(ScriptedTransport::new(reply));
        let mut buf = [1u8, 2, 3, 4];

        session.transact(WireCommand::Version, &mut buf).unwrap();

        assert_eq!(buf, [4, 3, 2, 1]);
        assert_eq!(session.get_ref().written, vec![4, 0, 3, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_transact_rejects_wrong_command() {
        let reply = response(4, 4, 0, &[0; 4]);
        let mut session = Session::new(ScriptedTransport::new(reply));
        let err = session.transact(WireCommand::Version, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::CommandMismatch { expected: 3, got: 4 }
        ));
    }

    #[test]
    fn test_transact_rejects_nonzero_status() {
        let reply = response(4, 3, 1, &[0; 4]);
        let mut session = Session::new(ScriptedTransport::new(reply));
        let err = session.transact(WireCommand::Version, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, TransactionError::Status(1)));
    }

    #[test]
    fn test_transact_rejects_wrong_length() {
        let reply = response(8, 3, 0, &[0; 8]);
        let mut session = Session::new(ScriptedTransport::new(reply));
        let err = session.transact(WireCommand::Version, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::LengthMismatch { expected: 4, got: 8 }
        ));
    }

    #[test]
    fn test_transact_fails_on_truncated_payload() {
        let reply = response(4, 3, 0, &[9, 9]);
        let mut session = Session::new(ScriptedTransport::new(reply));
        let err = session.transact(WireCommand::Version, &mut [0u8; 4]).unwrap_err();
        match err {
            TransactionError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_transact_fails_on_missing_header() {
        let mut session = Session::new(ScriptedTransport::new(Vec::new()));
        let err = session.transact(WireCommand::Start, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, TransactionError::Io(_)));
    }

    #[test]
    fn test_transact_fails_on_short_write() {
        let mut transport = ScriptedTransport::new(response(4, 6, 0, &[0; 4]));
        transport.write_limit = Some(6);
        let mut session = Session::new(transport);
        let err = session.transact(WireCommand::Start, &mut [0u8; 4]).unwrap_err();
        match err {
            TransactionError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::WriteZero),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_transact_rejects_oversized_payload() {
        let mut session = Session::new(ScriptedTransport::new(Vec::new()));
        let mut buf = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let err = session.transact(WireCommand::Message, &mut buf).unwrap_err();
        assert!(matches!(err, TransactionError::PayloadTooLarge(_)));
        assert!(session.get_ref().written.is_empty());
    }

    #[test]
    fn test_transact_empty_payload() {
        let reply = response(0, 0, 0, &[]);
        let mut session = Session::new(ScriptedTransport::new(reply));
        session.transact(WireCommand::Message, &mut []).unwrap();
        assert_eq!(session.get_ref().written, vec![0, 0, 0, 0]);
    }
}
