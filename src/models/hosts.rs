use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const LOCAL_HOST_ID: &str = "local";
pub const LOCAL_SOCKET_ADDRESS: &str = "unix:///var/run/docker.sock";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostProfile {
    pub id: String,
    pub name: String,
    pub address: String,
    pub tls_verify: bool,
    pub cert_path: Option<PathBuf>,
    pub description: String,
    pub is_default: bool,
}

impl HostProfile {
    pub fn from_entry(id: &str, entry: &HostEntry) -> Self {
        Self {
            id: id.to_string(),
            name: entry.name.clone(),
            address: entry.address.clone(),
            tls_verify: entry.tls_verify,
            cert_path: entry.cert_path.clone().filter(|p| !p.as_os_str().is_empty()),
            description: entry.description.clone(),
            is_default: entry.is_default,
        }
    }

    /// Profiles that talk to the engine on this machine get the extra
    /// socket fallbacks.
    pub fn is_local(&self) -> bool {
        self.id == LOCAL_HOST_ID || self.address.starts_with("unix://")
    }

    pub fn is_tcp(&self) -> bool {
        self.address.starts_with("tcp://")
    }
}

/// On-disk shape of one profile; the id is the map key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostEntry {
    pub name: String,
    #[serde(alias = "host")]
    pub address: String,
    #[serde(default)]
    pub tls_verify: bool,
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "default")]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostsFile {
    #[serde(default)]
    pub hosts: IndexMap<String, HostEntry>,
    #[serde(default = "default_current_host")]
    pub current_host: String,
}

fn default_current_host() -> String {
    LOCAL_HOST_ID.to_string()
}

impl Default for HostsFile {
    fn default() -> Self {
        let mut hosts = IndexMap::new();
        hosts.insert(
            LOCAL_HOST_ID.to_string(),
            HostEntry {
                name: "Local Docker".to_string(),
                address: LOCAL_SOCKET_ADDRESS.to_string(),
                tls_verify: false,
                cert_path: None,
                description: "Local Docker daemon".to_string(),
                is_default: true,
            },
        );
        Self {
            hosts,
            current_host: default_current_host(),
        }
    }
}

/// Registry snapshot handed to the API layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostsSnapshot {
    pub hosts: Vec<HostProfile>,
    pub current_host: String,
}

/// Add/update/test payload as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "host")]
    pub address: String,
    #[serde(default)]
    pub tls_verify: bool,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl HostPayload {
    /// Turn an unsaved payload into a profile for a connection test.
    pub fn to_profile(&self) -> HostProfile {
        let id = if self.id.trim().is_empty() {
            "unsaved".to_string()
        } else {
            self.id.trim().to_string()
        };
        HostProfile {
            id,
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            tls_verify: self.tls_verify,
            cert_path: self
                .cert_path
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            description: self.description.trim().to_string(),
            is_default: false,
        }
    }
}
