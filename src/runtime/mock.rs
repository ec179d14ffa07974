//! In-memory runtime used by tests. Built only with the `testing` feature.
//!
//! [`MockRuntime`] serves canned containers, images, volumes and networks.
//! Inspect answers with the listed record unless a richer detail record or a
//! failure was registered for that id.
//! [`MockFactory`] hands registered runtimes to the connector by address and
//! records every strategy it was asked to open.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::RuntimeError;
use crate::models::records::{
    ContainerRecord, ImageRecord, NetworkRecord, PortBinding, StatsRecord, SystemInfo,
    VersionInfo, VolumeRecord,
};

use super::{RuntimeClient, RuntimeFactory, Strategy};

#[derive(Debug, Clone)]
pub enum StatsReply {
    Ready(StatsRecord),
    Fail(String),
    Delayed(Duration, StatsRecord),
    /// Never answers.
    Hang,
}

#[derive(Default)]
pub struct MockRuntime {
    containers: Vec<ContainerRecord>,
    details: HashMap<String, ContainerRecord>,
    inspect_fails: HashSet<String>,
    stats: HashMap<String, StatsReply>,
    images: Vec<ImageRecord>,
    volumes: Vec<VolumeRecord>,
    networks: Vec<NetworkRecord>,
    info: SystemInfo,
    hang: bool,
    ping_fails: AtomicBool,
    list_fails: AtomicBool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            info: SystemInfo {
                name: "mock".to_string(),
                server_version: "27.0.0".to_string(),
                operating_system: "MockOS".to_string(),
                architecture: "x86_64".to_string(),
                ..SystemInfo::default()
            },
            ..Self::default()
        }
    }

    /// Every call blocks forever.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn with_container(mut self, record: ContainerRecord) -> Self {
        self.containers.push(record);
        self
    }

    /// Inspect payload for a listed container, replacing the list record.
    pub fn with_detail(mut self, record: ContainerRecord) -> Self {
        if let Some(id) = record.id.clone() {
            self.details.insert(id, record);
        }
        self
    }

    pub fn with_inspect_failure(mut self, id: &str) -> Self {
        self.inspect_fails.insert(id.to_string());
        self
    }

    pub fn with_stats(mut self, id: &str, reply: StatsReply) -> Self {
        self.stats.insert(id.to_string(), reply);
        self
    }

    pub fn with_image(mut self, image: ImageRecord) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_volume(mut self, volume: VolumeRecord) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_network(mut self, network: NetworkRecord) -> Self {
        self.networks.push(network);
        self
    }

    pub fn set_ping_fails(&self, fails: bool) {
        self.ping_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_list_fails(&self, fails: bool) {
        self.list_fails.store(fails, Ordering::SeqCst);
    }

    async fn gate(&self) {
        if self.hang {
            std::future::pending::<()>().await;
        }
    }

    fn find(&self, id: &str) -> Option<&ContainerRecord> {
        self.containers.iter().find(|c| {
            c.id.as_deref().is_some_and(|cid| cid.starts_with(id))
                || c.name.as_deref().is_some_and(|n| n.trim_start_matches('/') == id)
        })
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.gate().await;
        if self.ping_fails.load(Ordering::SeqCst) {
            return Err(RuntimeError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    async fn version(&self) -> Result<VersionInfo, RuntimeError> {
        self.gate().await;
        Ok(VersionInfo {
            version: self.info.server_version.clone(),
            api_version: "1.46".to_string(),
        })
    }

    async fn info(&self) -> Result<SystemInfo, RuntimeError> {
        self.gate().await;
        let mut info = self.info.clone();
        info.containers = self.containers.len() as i64;
        info.images = self.images.len() as i64;
        Ok(info)
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>, RuntimeError> {
        self.gate().await;
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(RuntimeError::Api("list failed".to_string()));
        }
        Ok(self
            .containers
            .iter()
            .filter(|c| all || c.state.as_deref() == Some("running"))
            .cloned()
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord, RuntimeError> {
        self.gate().await;
        let listed = self
            .find(id)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {}", id)))?;
        let full_id = listed.id.clone().unwrap_or_default();
        if self.inspect_fails.contains(&full_id) {
            return Err(RuntimeError::Api(format!("inspect {} failed", id)));
        }
        Ok(self.details.get(&full_id).unwrap_or(listed).clone())
    }

    async fn container_stats(&self, id: &str) -> Result<StatsRecord, RuntimeError> {
        self.gate().await;
        let reply = self.find(id).and_then(|c| {
            c.id.as_ref().and_then(|cid| self.stats.get(cid)).cloned()
        });
        match reply {
            Some(StatsReply::Ready(s)) => Ok(s),
            Some(StatsReply::Fail(msg)) => Err(RuntimeError::Api(msg)),
            Some(StatsReply::Delayed(d, s)) => {
                tokio::time::sleep(d).await;
                Ok(s)
            }
            Some(StatsReply::Hang) => std::future::pending().await,
            None => Err(RuntimeError::NotFound(format!("stats for {}", id))),
        }
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, RuntimeError> {
        self.gate().await;
        Ok(self.images.clone())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>, RuntimeError> {
        self.gate().await;
        Ok(self.volumes.clone())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>, RuntimeError> {
        self.gate().await;
        Ok(self.networks.clone())
    }
}

/// Resolves strategies to registered runtimes. Keys are the strategy
/// address, `env` for the environment strategy, and `unix://<path>` for
/// socket fallbacks. Unknown keys fail with "connection refused".
#[derive(Default)]
pub struct MockFactory {
    runtimes: Mutex<HashMap<String, Arc<MockRuntime>>>,
    opened: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: &str, runtime: MockRuntime) -> Arc<MockRuntime> {
        let rt = Arc::new(runtime);
        self.runtimes
            .lock()
            .unwrap()
            .insert(key.to_string(), rt.clone());
        rt
    }

    /// Strategies opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl RuntimeFactory for MockFactory {
    fn open(
        &self,
        strategy: &Strategy,
        _timeout: Duration,
    ) -> Result<Arc<dyn RuntimeClient>, RuntimeError> {
        self.opened.lock().unwrap().push(strategy.to_string());
        let key = match strategy {
            Strategy::Tls { address, .. } | Strategy::Direct { address } => address.clone(),
            Strategy::Environment => "env".to_string(),
            Strategy::LocalSocket { path } => format!("unix://{}", path),
        };
        match self.runtimes.lock().unwrap().get(&key) {
            Some(rt) => Ok(rt.clone() as Arc<dyn RuntimeClient>),
            None => Err(RuntimeError::Transport(format!(
                "connection refused: {}",
                key
            ))),
        }
    }
}

/// A container record with the fields every test needs.
pub fn container(id: &str, name: &str, image: &str, state: &str) -> ContainerRecord {
    ContainerRecord {
        id: Some(id.to_string()),
        name: Some(format!("/{}", name)),
        image: Some(image.to_string()),
        image_id: Some(format!("sha256:{}", id)),
        state: Some(state.to_string()),
        created: Some("2024-05-01T10:00:00Z".to_string()),
        ..ContainerRecord::default()
    }
}

pub fn published(container_port: &str, host_port: &str) -> PortBinding {
    PortBinding {
        container_port: container_port.to_string(),
        host_ip: Some("0.0.0.0".to_string()),
        host_port: Some(host_port.to_string()),
    }
}
