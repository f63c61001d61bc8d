//! Fetches server snapshots from the SCP API using the live credential.

pub mod error;
pub mod scp;
pub mod time;
pub mod types;

use async_trait::async_trait;

pub use error::CollectorError;
pub use scp::ScpServerCollector;
pub use time::time_between;
pub use types::{Disk, Maintenance, NetworkInterface, Server, ServerListMinimal, ServerLiveInfo, ServerState, StorageOptimization};

/// Source of server snapshots.
#[async_trait]
pub trait ServerCollector: Send + Sync {
    async fn collect_server_data(&self) -> Result<Vec<Server>, CollectorError>;
}
