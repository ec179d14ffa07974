use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Raw records as handed over by a runtime collaborator. Every field the
// engine may omit is optional; the formatter decides how to default them.

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContainerRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Image reference the container was created from (tag or digest).
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    /// Lifecycle state as reported by the engine, e.g. "running".
    #[serde(default)]
    pub state: Option<String>,
    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub health: Option<String>,
    #[serde(default)]
    pub networks: Vec<NetworkEndpoint>,
    /// Port specification in declaration order.
    #[serde(default)]
    pub ports: Vec<PortBinding>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub mounts: Vec<MountRecord>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub restart_policy: Option<String>,
    #[serde(default)]
    pub env: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NetworkEndpoint {
    pub name: String,
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PortBinding {
    /// Container side, e.g. "80/tcp".
    pub container_port: String,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub host_port: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MountRecord {
    /// "volume", "bind", "tmpfs", ...
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One non-streaming stats reading. `pre_*` values are the engine's previous
/// sample, used to compute a CPU delta.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StatsRecord {
    #[serde(default)]
    pub cpu_total_usage: Option<u64>,
    #[serde(default)]
    pub pre_cpu_total_usage: Option<u64>,
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    #[serde(default)]
    pub pre_system_cpu_usage: Option<u64>,
    #[serde(default)]
    pub online_cpus: Option<u64>,
    #[serde(default)]
    pub percpu_count: Option<usize>,
    #[serde(default)]
    pub memory_usage: Option<u64>,
    #[serde(default)]
    pub memory_limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VersionInfo {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SystemInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server_version: String,
    #[serde(default)]
    pub operating_system: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub containers: i64,
    #[serde(default)]
    pub images: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub size_bytes: i64,
    /// Unix seconds.
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VolumeRecord {
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub created: Option<String>,
}
