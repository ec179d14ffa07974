pub mod connector;
pub mod docker;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod sampler;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::models::hosts::HostProfile;
use crate::models::records::{
    ContainerRecord, ImageRecord, NetworkRecord, StatsRecord, SystemInfo, VersionInfo,
    VolumeRecord,
};

/// Hardcoded sockets tried after the configured address for local profiles.
pub const LOCAL_SOCKET_FALLBACKS: &[&str] = &["/var/run/docker.sock", "/run/docker.sock"];

/// The container engine as seen by the dashboard.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn ping(&self) -> Result<(), RuntimeError>;
    async fn version(&self) -> Result<VersionInfo, RuntimeError>;
    async fn info(&self) -> Result<SystemInfo, RuntimeError>;
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>, RuntimeError>;
    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord, RuntimeError>;
    /// A single non-streaming stats reading.
    async fn container_stats(&self, id: &str) -> Result<StatsRecord, RuntimeError>;
    async fn list_images(&self) -> Result<Vec<ImageRecord>, RuntimeError>;
    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>, RuntimeError>;
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>, RuntimeError>;
}

/// Builds a transport for one connection strategy. Opening does not talk to
/// the engine; the connector verifies it with a version round trip.
pub trait RuntimeFactory: Send + Sync {
    fn open(
        &self,
        strategy: &Strategy,
        timeout: Duration,
    ) -> Result<Arc<dyn RuntimeClient>, RuntimeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Tls { address: String, cert_dir: PathBuf },
    Direct { address: String },
    /// Whatever the process environment points at (`DOCKER_HOST`).
    Environment,
    LocalSocket { path: String },
}

impl Strategy {
    /// Connection attempts for a profile, in the order they are tried.
    pub fn plan(profile: &HostProfile) -> Vec<Strategy> {
        let mut plan = Vec::new();
        match (&profile.cert_path, profile.tls_verify) {
            (Some(dir), true) => plan.push(Strategy::Tls {
                address: profile.address.clone(),
                cert_dir: dir.clone(),
            }),
            _ => plan.push(Strategy::Direct {
                address: profile.address.clone(),
            }),
        }

        if profile.is_local() {
            plan.push(Strategy::Environment);
            for path in LOCAL_SOCKET_FALLBACKS {
                let socket = Strategy::LocalSocket {
                    path: path.to_string(),
                };
                let duplicate = profile.address == format!("unix://{}", path);
                if !duplicate {
                    plan.push(socket);
                }
            }
        }
        plan
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Tls { address, .. } => write!(f, "TLS connection to {}", address),
            Strategy::Direct { address } => write!(f, "direct connection to {}", address),
            Strategy::Environment => write!(f, "environment defaults"),
            Strategy::LocalSocket { path } => write!(f, "local socket {}", path),
        }
    }
}

/// A verified connection bound to one profile id.
#[derive(Clone)]
pub struct RuntimeHandle {
    pub profile_id: String,
    pub client: Arc<dyn RuntimeClient>,
}

impl RuntimeHandle {
    pub fn same_client(&self, other: &RuntimeHandle) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("profile_id", &self.profile_id)
            .finish()
    }
}
