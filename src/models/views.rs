use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::hosts::HostProfile;
use super::records::NetworkEndpoint;

pub const DEFAULT_ICON_URL: &str = "https://cdn.jsdelivr.net/gh/selfhst/icons/png/docker.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Exited,
    Created,
    Paused,
    #[default]
    Other,
    /// The record itself could not be formatted.
    Error,
}

impl ContainerStatus {
    pub fn from_raw(s: &str) -> Self {
        match s {
            "running" => ContainerStatus::Running,
            "exited" => ContainerStatus::Exited,
            "created" => ContainerStatus::Created,
            "paused" => ContainerStatus::Paused,
            _ => ContainerStatus::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Created => "created",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Other => "other",
            ContainerStatus::Error => "error",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    Full,
    #[default]
    Lightweight,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResourceSnapshot {
    pub cpu_percent: f64,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_percent: f64,
    pub sampled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceSnapshot {
    pub fn unsampled() -> Self {
        Self::default()
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerView {
    pub id: String,
    pub name: String,
    pub image_display: String,
    pub status: ContainerStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub health: Option<String>,
    pub networks: Vec<NetworkEndpoint>,
    pub ports: Vec<String>,
    pub first_reachable_url: Option<String>,
    pub icon_url: String,
    pub labels: BTreeMap<String, String>,
    pub resource: ResourceSnapshot,
    pub host_id: String,
    pub host_name: String,
    pub command: String,
    pub network_mode: String,
    pub restart_policy: String,
    pub env_vars: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContainerView {
    /// Minimal record used when the raw container could not be read at all.
    pub fn failed(id: String, name: String, profile: &HostProfile, error: String) -> Self {
        Self {
            id,
            name,
            image_display: "unknown".to_string(),
            status: ContainerStatus::Error,
            created_at: None,
            health: None,
            networks: Vec::new(),
            ports: Vec::new(),
            first_reachable_url: None,
            icon_url: DEFAULT_ICON_URL.to_string(),
            labels: BTreeMap::new(),
            resource: ResourceSnapshot::unsampled(),
            host_id: profile.id.clone(),
            host_name: profile.name.clone(),
            command: String::new(),
            network_mode: "unknown".to_string(),
            restart_policy: "unknown".to_string(),
            env_vars: Vec::new(),
            error: Some(error),
        }
    }
}

/// The five display buckets in their fixed order. Error records land in `other`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StatusBuckets {
    pub running: Vec<ContainerView>,
    pub exited: Vec<ContainerView>,
    pub created: Vec<ContainerView>,
    pub paused: Vec<ContainerView>,
    pub other: Vec<ContainerView>,
}

impl StatusBuckets {
    pub fn push(&mut self, view: ContainerView) {
        match view.status {
            ContainerStatus::Running => self.running.push(view),
            ContainerStatus::Exited => self.exited.push(view),
            ContainerStatus::Created => self.created.push(view),
            ContainerStatus::Paused => self.paused.push(view),
            ContainerStatus::Other | ContainerStatus::Error => self.other.push(view),
        }
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts {
            running: self.running.len(),
            exited: self.exited.len(),
            created: self.created.len(),
            paused: self.paused.len(),
            other: self.other.len(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerView> {
        self.running
            .iter()
            .chain(&self.exited)
            .chain(&self.created)
            .chain(&self.paused)
            .chain(&self.other)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct StatusCounts {
    pub running: usize,
    pub exited: usize,
    pub created: usize,
    pub paused: usize,
    pub other: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.running + self.exited + self.created + self.paused + self.other
    }

    pub fn add(&mut self, o: &StatusCounts) {
        self.running += o.running;
        self.exited += o.exited;
        self.created += o.created;
        self.paused += o.paused;
        self.other += o.other;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HostTotals {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: usize,
    pub image_count: usize,
    pub runtime_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostAggregateView {
    pub profile: HostProfile,
    pub connected: bool,
    pub error: Option<String>,
    pub containers_by_status: StatusBuckets,
    pub totals: HostTotals,
}

impl HostAggregateView {
    pub fn disconnected(profile: HostProfile, error: String) -> Self {
        Self {
            profile,
            connected: false,
            error: Some(error),
            containers_by_status: StatusBuckets::default(),
            totals: HostTotals {
                runtime_version: "N/A".to_string(),
                ..HostTotals::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GlobalTotals {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: usize,
    pub image_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalView {
    pub hosts: Vec<HostAggregateView>,
    pub totals: GlobalTotals,
    pub connected_host_count: usize,
    pub total_host_count: usize,
    pub generated_at: DateTime<Utc>,
}

// --- Unused resources ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnusedImage {
    pub id: String,
    pub tags: Vec<String>,
    pub size: String,
    pub size_bytes: i64,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnusedVolume {
    pub name: String,
    pub driver: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnusedNetwork {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UnusedResources {
    pub images: Vec<UnusedImage>,
    pub volumes: Vec<UnusedVolume>,
    pub networks: Vec<UnusedNetwork>,
}

/// Successful "test connection" summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    pub docker_version: String,
    pub api_version: String,
    pub system_name: String,
    pub os: String,
    pub architecture: String,
    pub containers: i64,
    pub images: i64,
    pub host_url: String,
}
