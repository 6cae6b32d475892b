//! Opening the TCP connection to a capi server.
//!
//! Every candidate socket is tuned before `connect`: Nagle is disabled and
//! both kernel buffers are cut down to [`SOCKET_BUFFER_SIZE`] so the peer has
//! to acknowledge every few frames.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, info, warn};

use crate::error::CapiError;

/// Send and receive buffer size applied to every candidate socket.
pub const SOCKET_BUFFER_SIZE: usize = 1500;

/// Registered TCP port of the `bintec-capi` service.
pub const DEFAULT_CAPI_PORT: u16 = 2662;

/// Map a service name or numeric port string to a port number.
pub fn service_port(service: &str) -> Option<u16> {
    let service = service.trim();
    if let Ok(port) = service.parse::<u16>() {
        return Some(port);
    }
    match service.to_ascii_lowercase().as_str() {
        "capi" | "bintec-capi" => Some(DEFAULT_CAPI_PORT),
        _ => None,
    }
}

/// Resolve `host`/`service` to candidate addresses, IPv4 and IPv6 alike.
pub fn resolve(host: &str, service: &str) -> std::io::Result<Vec<SocketAddr>> {
    let port = service_port(service).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unknown service {:?}", service),
        )
    })?;

    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses for {}", host),
        ));
    }
    Ok(addrs)
}

/// Create a stream socket for `addr` with the latency tuning applied.
///
/// Option failures are logged and ignored; only socket creation can fail.
fn tuned_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;

    if let Err(e) = socket.set_nodelay(true) {
        debug!("TCP_NODELAY on {}: {}", addr, e);
    }
    if let Err(e) = socket.set_send_buffer_size(SOCKET_BUFFER_SIZE) {
        debug!("SO_SNDBUF on {}: {}", addr, e);
    }
    if let Err(e) = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
        debug!("SO_RCVBUF on {}: {}", addr, e);
    }

    Ok(socket)
}

/// Try each address in order and return the first connected stream.
///
/// Candidates that fail to produce a socket or to connect are skipped. If
/// none connects the last error is returned.
pub fn connect_candidates(addrs: &[SocketAddr]) -> std::io::Result<TcpStream> {
    let mut last_error = None;

    for addr in addrs {
        let socket = match tuned_socket(addr) {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Skipping {}: socket: {}", addr, e);
                last_error = Some(e);
                continue;
            }
        };

        match socket.connect(&SockAddr::from(*addr)) {
            Ok(()) => {
                info!("Connected to capi server at {}", addr);
                return Ok(TcpStream::from(socket));
            }
            Err(e) => {
                warn!("Skipping {}: connect: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "no candidate address to connect to",
        )
    }))
}

/// Resolve and connect to a capi server.
///
/// # Errors
///
/// Returns `CapiError::ConnectFailed` if:
/// - `service` is neither a port number nor a known service name
/// - `host` does not resolve to any address
/// - No resolved address accepts a connection
///
/// # Example
///
/// ```ignore
/// let stream = connect("capi.example", "2662")?;
/// let mut session = Session::new(stream);
/// ```
pub fn connect(host: &str, service: &str) -> Result<TcpStream, CapiError> {
    let failed = |source| CapiError::ConnectFailed {
        host: host.to_string(),
        service: service.to_string(),
        source,
    };

    let addrs = resolve(host, service).map_err(failed)?;
    debug!("{}:{} resolved to {:?}", host, service, addrs);
    connect_candidates(&addrs).map_err(failed)
}
