//! Lotwatch Node - Lot Registry Daemon
//!
//! Persists the Phase → Block → Lot hierarchy and the resident registry, and
//! serves reconciled lot views to operators.
//!
//! # Architecture
//!
//! - **Repository**: traits the controller talks to ([`LotRepository`], [`PreferenceStore`])
//! - **Storage**: RocksDB-backed implementation of both
//! - **Controller**: selection state and generation-stamped lot loads
//! - **Admin Socket**: Unix socket for local commands (lotwatch-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use lotwatch_node::{LotwatchNode, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env();
//!     let node = LotwatchNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod controller;
pub mod error;
pub mod node;
pub mod repository;
pub mod storage;

pub use controller::{ApplyOutcome, LoadOutcome, LoadTicket, ScopeController, Snapshot};
pub use error::{Error, Result};
pub use node::{LotwatchNode, NodeConfig};
pub use repository::{LotRepository, PreferenceStore};
pub use storage::Storage;
