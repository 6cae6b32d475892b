//! Remote CAPI client library.
//!
//! Lets a CAPI 2.0 application drive ISDN controllers that live on a capi
//! server, over a plain TCP connection:
//!
//! - `ipc` - connection setup, frame codec and the transaction engine
//! - `marshal` - host/wire byte-order conversion of request payloads
//! - `dispatch` - control-operation dispatcher (`RemoteApp`)
//! - `backend` / `config` - where the server is and how apps get connected
//! - `models` - wire commands and control-operation codes
//!
//! # Usage
//!
//! ```ignore
//! use capi_remote::{BackendConfig, ClientBackend, RegisterParams};
//!
//! let backend = ClientBackend::new(BackendConfig::new("capi.example", "2662"));
//! let mut app = backend.alloc_app()?;
//! let registered = app.register(RegisterParams {
//!     max_logical_connections: 2,
//!     max_b_data_blocks: 7,
//!     max_b_data_len: 2048,
//!     max_msg_data_size: 1024,
//!     app_id: 0,
//! })?;
//! println!("app id {}", registered.app_id);
//! ```

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ipc;
pub mod marshal;
pub mod models;

pub use backend::{BackendType, ClientBackend};
pub use config::BackendConfig;
pub use dispatch::{CapiVersion, RemoteApp};
pub use error::{CapiError, ErrorKind};
pub use marshal::RegisterParams;
