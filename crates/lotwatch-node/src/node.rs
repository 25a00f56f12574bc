//! Lotwatch Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with one RocksDB storage instance
//! - A scope controller owning the operator's selection and cached lots
//! - Unix admin socket for local operations (lotwatch-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::controller::ScopeController;
use crate::error::Result;
use crate::storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a Lotwatch node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// Admin socket path (for lotwatch-admin CLI)
    pub admin_socket: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("LOTWATCH_DATA_DIR").ok(),
            std::env::var("LOTWATCH_ADMIN_SOCKET").ok(),
        )
    }

    fn from_vars(data_dir: Option<String>, admin_socket: Option<String>) -> Self {
        let data_dir = PathBuf::from(data_dir.unwrap_or_else(|| "./lotwatch-data".to_string()));
        let admin_socket = admin_socket
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("admin.sock"));

        Self {
            data_dir,
            admin_socket,
        }
    }
}

/// A Lotwatch node instance.
pub struct LotwatchNode {
    controller: Arc<ScopeController<Storage>>,
    config: NodeConfig,
}

impl LotwatchNode {
    /// Open storage and restore the remembered selection.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = Arc::new(Storage::open(config.data_dir.join("db"))?);
        let controller = Arc::new(ScopeController::new(storage)?);
        controller.refresh().await?;

        let view = controller.view().await;
        tracing::info!("Restored selection {} / {}", view.phase, view.block);

        Ok(Self { controller, config })
    }

    pub fn controller(&self) -> Arc<ScopeController<Storage>> {
        Arc::clone(&self.controller)
    }

    /// Run the node until the admin socket stops.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Lotwatch node starting");
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        let socket_path = self.config.admin_socket.to_string_lossy().into_owned();
        let admin_socket = AdminSocket::new(self.controller(), &socket_path);
        admin_socket.run().await
    }
}
