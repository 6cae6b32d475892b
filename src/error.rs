//! Error types surfaced to callers of the remote CAPI client.
//!
//! Everything that goes wrong on the wire is collapsed into
//! [`CapiError::TransactionFailed`] before it leaves the dispatcher. The
//! detailed cause is logged, never returned.

use thiserror::Error;

/// `ENOTTY`, the errno a CAPI ioctl caller expects for a failed or unknown
/// control operation. Same value on Linux and the BSDs.
pub const ENOTTY: i32 = 25;

/// Coarse classification of a [`CapiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectFailed,
    TransactionFailed,
    UnsupportedOperation,
    PassThrough,
}

/// Errors returned by the connector and the command dispatcher.
#[derive(Debug, Error)]
pub enum CapiError {
    /// Address resolution failed or no candidate address accepted a connection.
    #[error("Connection to {host}:{service} failed: {source}")]
    ConnectFailed {
        host: String,
        service: String,
        #[source]
        source: std::io::Error,
    },

    /// The operation was sent but did not complete cleanly.
    #[error("Remote CAPI operation failed")]
    TransactionFailed,

    /// The control operation code is not part of the dispatch table.
    #[error("Unsupported control operation {0:#010x}")]
    UnsupportedOperation(u32),

    /// The delegated socket control call failed.
    #[error("Socket control failed: {0}")]
    PassThrough(#[source] std::io::Error),
}

impl CapiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CapiError::ConnectFailed { .. } => ErrorKind::ConnectFailed,
            CapiError::TransactionFailed => ErrorKind::TransactionFailed,
            CapiError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            CapiError::PassThrough(_) => ErrorKind::PassThrough,
        }
    }

    /// The errno an ioctl-style caller would observe for this error.
    ///
    /// Pass-through failures keep the OS error; everything else reads as
    /// `ENOTTY`.
    pub fn errno(&self) -> i32 {
        match self {
            CapiError::PassThrough(err) => err.raw_os_error().unwrap_or(ENOTTY),
            CapiError::ConnectFailed { source, .. } => source.raw_os_error().unwrap_or(ENOTTY),
            CapiError::TransactionFailed | CapiError::UnsupportedOperation(_) => ENOTTY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capi_error_display() {
        assert_eq!(
            CapiError::TransactionFailed.to_string(),
            "Remote CAPI operation failed"
        );
        assert_eq!(
            CapiError::UnsupportedOperation(0xc004_4309).to_string(),
            "Unsupported control operation 0xc0044309"
        );

        let err = CapiError::ConnectFailed {
            host: "capi.example".to_string(),
            service: "2662".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(
            err.to_string(),
            "Connection to capi.example:2662 failed: refused"
        );
    }

    #[test]
    fn test_errno_flattening() {
        assert_eq!(CapiError::TransactionFailed.errno(), ENOTTY);
        assert_eq!(CapiError::UnsupportedOperation(1).errno(), ENOTTY);

        let os = CapiError::PassThrough(std::io::Error::from_raw_os_error(9));
        assert_eq!(os.errno(), 9);
        assert_eq!(os.kind(), ErrorKind::PassThrough);
    }
}
