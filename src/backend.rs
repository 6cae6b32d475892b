//! The remote client backend: allocates applications bound to a capi server.

use tracing::info;

use crate::config::BackendConfig;
use crate::dispatch::RemoteApp;
use crate::error::CapiError;
use crate::ipc::{connect, Session};

/// Kind of CAPI backend an application runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Controllers live on a remote capi server.
    Client,
}

/// Backend that hands out applications connected to one capi server.
#[derive(Debug, Clone)]
pub struct ClientBackend {
    config: BackendConfig,
}

impl ClientBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn backend_type(&self) -> BackendType {
        BackendType::Client
    }

    /// Connect a new application to the server.
    ///
    /// Each application gets its own connection. Nothing is left allocated
    /// when the connection cannot be made.
    pub fn alloc_app(&self) -> Result<RemoteApp, CapiError> {
        let stream = connect(&self.config.host, &self.config.service)?;
        info!(
            "Allocated remote CAPI application on {}:{}",
            self.config.host, self.config.service
        );
        Ok(RemoteApp::new(Session::new(stream)))
    }
}
