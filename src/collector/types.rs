//! Wire types of the SCP REST API, limited to the fields the exporter reads.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Entry of `GET /api/v1/servers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerListMinimal {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
}

/// Snapshot returned by `GET /api/v1/servers/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub max_cpu_count: u32,
    #[serde(default)]
    pub rescue_system_active: bool,
    #[serde(default)]
    pub server_live_info: Option<ServerLiveInfo>,
}

impl Server {
    pub fn nickname(&self) -> &str {
        self.nickname.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLiveInfo {
    #[serde(default)]
    pub state: ServerState,
    #[serde(default)]
    pub uptime_in_seconds: u64,
    #[serde(default, rename = "maxServerMemoryInMiB")]
    pub max_server_memory_in_mib: u64,
    #[serde(default)]
    pub latest_qemu: bool,
    #[serde(default)]
    pub required_storage_optimization: StorageOptimization,
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub disks: Vec<Disk>,
}

/// Libvirt domain state as reported by SCP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerState {
    Running,
    Shutoff,
    Paused,
    Crashed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageOptimization {
    #[default]
    No,
    Compat,
    Virtio,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default)]
    pub mac: String,
    #[serde(default, rename = "rxMonthlyInMiB")]
    pub rx_monthly_in_mib: u64,
    #[serde(default, rename = "txMonthlyInMiB")]
    pub tx_monthly_in_mib: u64,
    #[serde(default)]
    pub traffic_throttled: bool,
    #[serde(default)]
    pub ipv4_addresses: Vec<String>,
    #[serde(default)]
    pub ipv6_network_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    #[serde(default)]
    pub dev: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default, rename = "capacityInMiB")]
    pub capacity_in_mib: u64,
    #[serde(default, rename = "allocationInMiB")]
    pub allocation_in_mib: u64,
}

/// Announced maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    pub start_at: DateTime<Utc>,
    pub finish_at: DateTime<Utc>,
}

/// `GET /api/v1/maintenance` is documented as a list but served as a single
/// object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum MaintenanceResponse {
    Many(Vec<Maintenance>),
    One(Maintenance),
}

impl MaintenanceResponse {
    pub fn into_vec(self) -> Vec<Maintenance> {
        match self {
            Self::Many(list) => list,
            Self::One(single) => vec![single],
        }
    }
}
