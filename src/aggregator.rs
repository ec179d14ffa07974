use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::{ConnectionError, DashboardError, RuntimeError};
use crate::formatter::Formatter;
use crate::helpers::{human_bytes, short_id};
use crate::models::hosts::HostProfile;
use crate::models::records::{ContainerRecord, ImageRecord, NetworkRecord, VolumeRecord};
use crate::models::views::{
    ConnectionTest, ContainerView, FormatMode, GlobalTotals, GlobalView, HostAggregateView,
    HostTotals, ResourceSnapshot, StatusBuckets, UnusedImage, UnusedNetwork, UnusedResources,
    UnusedVolume,
};
use crate::runtime::RuntimeHandle;
use crate::runtime::connector::Connector;

/// Networks every engine creates for itself.
const BUILTIN_NETWORKS: &[&str] = &["bridge", "host", "none"];

#[derive(Debug, Clone, Copy)]
pub struct QueryTimeouts {
    /// Any single list/info/inspect call.
    pub query: Duration,
    /// Per-container deadline when sampling a whole listing.
    pub bulk_sample: Duration,
    /// Deadline for explicit detail and stats requests.
    pub detail_sample: Duration,
}

pub struct Aggregator {
    connector: Arc<Connector>,
    formatter: Formatter,
    timeouts: QueryTimeouts,
}

impl Aggregator {
    pub fn new(connector: Arc<Connector>, formatter: Formatter, timeouts: QueryTimeouts) -> Self {
        Self {
            connector,
            formatter,
            timeouts,
        }
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    /// Builds the dashboard model for every profile. Hosts are processed
    /// concurrently; the result keeps the order of `profiles`.
    pub async fn aggregate(&self, profiles: &[HostProfile], mode: FormatMode) -> GlobalView {
        let hosts = join_all(profiles.iter().map(|p| self.host_view(p, mode))).await;

        let mut totals = GlobalTotals::default();
        let mut connected_host_count = 0;
        for host in hosts.iter().filter(|h| h.connected) {
            connected_host_count += 1;
            totals.counts.add(&host.totals.counts);
            totals.total += host.totals.total;
            totals.image_count += host.totals.image_count;
        }

        info!(
            "aggregated {} containers from {}/{} hosts",
            totals.total,
            connected_host_count,
            hosts.len()
        );

        GlobalView {
            total_host_count: hosts.len(),
            connected_host_count,
            totals,
            hosts,
            generated_at: Utc::now(),
        }
    }

    /// One host's slice of the dashboard. Never fails; problems are recorded
    /// on the returned view.
    pub async fn host_view(&self, profile: &HostProfile, mode: FormatMode) -> HostAggregateView {
        let handle = match self.connector.connect(profile).await {
            Ok(h) => h,
            Err(e) => {
                warn!("host {} unavailable: {}", profile.id, e);
                return HostAggregateView::disconnected(profile.clone(), e.to_string());
            }
        };

        let records = match self.bounded(handle.client.list_containers(true)).await {
            Ok(r) => r,
            Err(e) => {
                warn!("listing containers on {} failed: {}", profile.id, e);
                self.connector.cache().invalidate_if_same(&handle);
                return HostAggregateView::disconnected(profile.clone(), e.to_string());
            }
        };

        let (runtime_version, image_count) = tokio::join!(
            async {
                match self.bounded(handle.client.info()).await {
                    Ok(info) => info.server_version,
                    Err(e) => {
                        warn!("system info for {} failed: {}", profile.id, e);
                        "unknown".to_string()
                    }
                }
            },
            async {
                match self.bounded(handle.client.list_images()).await {
                    Ok(images) => images.len(),
                    Err(e) => {
                        warn!("listing images on {} failed: {}", profile.id, e);
                        0
                    }
                }
            }
        );

        let mut buckets = StatusBuckets::default();
        for view in self.format_all(&handle, records, profile, mode).await {
            buckets.push(view);
        }
        let counts = buckets.counts();

        HostAggregateView {
            profile: profile.clone(),
            connected: true,
            error: None,
            totals: HostTotals {
                counts,
                total: counts.total(),
                image_count,
                runtime_version,
            },
            containers_by_status: buckets,
        }
    }

    /// All containers on one host in list order.
    pub async fn list_containers(
        &self,
        profile: &HostProfile,
        mode: FormatMode,
    ) -> Result<Vec<ContainerView>, DashboardError> {
        let handle = self.connector.connect(profile).await?;
        let records = self.bounded(handle.client.list_containers(true)).await?;
        Ok(self.format_all(&handle, records, profile, mode).await)
    }

    /// Full view of one container, sampled when it is running and stats are
    /// enabled.
    pub async fn container_detail(
        &self,
        profile: &HostProfile,
        container_id: &str,
    ) -> Result<ContainerView, DashboardError> {
        let handle = self.connector.connect(profile).await?;
        let record = self
            .bounded(handle.client.inspect_container(container_id))
            .await?;
        Ok(self
            .formatter
            .format(
                &handle,
                &record,
                profile,
                FormatMode::Full,
                self.timeouts.detail_sample,
            )
            .await)
    }

    /// Snapshots for every running container, keyed by short id. This is an
    /// explicit request, so it samples regardless of the stats switch.
    pub async fn bulk_stats(
        &self,
        profile: &HostProfile,
    ) -> Result<IndexMap<String, ResourceSnapshot>, DashboardError> {
        let handle = self.connector.connect(profile).await?;
        let running = self.bounded(handle.client.list_containers(false)).await?;
        let ids: Vec<String> = running.iter().filter_map(|c| c.id.clone()).collect();

        let samples = self
            .formatter
            .sampler()
            .sample_many(&handle, &ids, self.timeouts.detail_sample)
            .await;
        Ok(samples
            .into_iter()
            .map(|(id, snap)| (short_id(&id), snap))
            .collect())
    }

    pub async fn unused_resources(
        &self,
        profile: &HostProfile,
    ) -> Result<UnusedResources, DashboardError> {
        let handle = self.connector.connect(profile).await?;
        let client = &handle.client;
        let (containers, images, volumes, networks) = tokio::try_join!(
            self.bounded(client.list_containers(true)),
            self.bounded(client.list_images()),
            self.bounded(client.list_volumes()),
            self.bounded(client.list_networks()),
        )?;
        Ok(find_unused(&containers, &images, &volumes, &networks))
    }

    /// Tries a profile that may not be saved yet. The handle cache is left
    /// untouched.
    pub async fn test_connection(
        &self,
        profile: &HostProfile,
    ) -> Result<ConnectionTest, ConnectionError> {
        let (client, version) = self.connector.probe_unsaved(profile).await?;
        let limit = self.connector.test_timeout();
        let info = bounded(limit, client.info())
            .await
            .map_err(|e| ConnectionError {
                address: profile.address.clone(),
                message: e.to_string(),
            })?;

        Ok(ConnectionTest {
            success: true,
            message: format!("Successfully connected to {}", profile.address),
            docker_version: version.version,
            api_version: version.api_version,
            system_name: info.name,
            os: info.operating_system,
            architecture: info.architecture,
            containers: info.containers,
            images: info.images,
            host_url: profile.address.clone(),
        })
    }

    pub async fn health(&self, profile: &HostProfile) -> Result<(), ConnectionError> {
        self.connector.connect(profile).await.map(|_| ())
    }

    /// Formats every record in order. Full mode first swaps each list record
    /// for its inspect payload; with stats enabled the running containers are
    /// then sampled together under the bulk deadline.
    async fn format_all(
        &self,
        handle: &RuntimeHandle,
        records: Vec<ContainerRecord>,
        profile: &HostProfile,
        mode: FormatMode,
    ) -> Vec<ContainerView> {
        let records = match mode {
            FormatMode::Full => self.with_details(handle, records, profile).await,
            FormatMode::Lightweight => records,
        };

        let mut views: Vec<ContainerView> = records
            .iter()
            .map(|r| self.formatter.format_record(r, profile, mode))
            .collect();

        let (slots, ids): (Vec<usize>, Vec<String>) = views
            .iter()
            .enumerate()
            .filter(|(_, v)| self.formatter.wants_sample(v, mode))
            .filter_map(|(i, _)| records[i].id.clone().map(|id| (i, id)))
            .unzip();
        if ids.is_empty() {
            return views;
        }

        let samples = self
            .formatter
            .sampler()
            .sample_many(handle, &ids, self.timeouts.bulk_sample)
            .await;
        for (slot, (_, snap)) in slots.into_iter().zip(samples) {
            views[slot].resource = snap;
        }
        views
    }

    /// Inspects every listed container concurrently, each under the query
    /// timeout. A failed inspect keeps the list record.
    async fn with_details(
        &self,
        handle: &RuntimeHandle,
        records: Vec<ContainerRecord>,
        profile: &HostProfile,
    ) -> Vec<ContainerRecord> {
        join_all(records.into_iter().map(|record| async move {
            let Some(id) = record.id.clone() else {
                return record;
            };
            match self.bounded(handle.client.inspect_container(&id)).await {
                Ok(detail) if detail.id.is_some() => detail,
                Ok(_) => record,
                Err(e) => {
                    debug!(
                        "inspect {} on {} failed, using list record: {}",
                        short_id(&id),
                        profile.id,
                        e
                    );
                    record
                }
            }
        }))
        .await
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, RuntimeError>>,
    ) -> Result<T, RuntimeError> {
        bounded(self.timeouts.query, fut).await
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, RuntimeError>>,
) -> Result<T, RuntimeError> {
    match time::timeout(limit, fut).await {
        Ok(r) => r,
        Err(_) => Err(RuntimeError::Timeout(limit.as_millis())),
    }
}

/// Tagged images no container was created from, volumes no container
/// mounts, and user networks with nothing attached.
pub fn find_unused(
    containers: &[ContainerRecord],
    images: &[ImageRecord],
    volumes: &[VolumeRecord],
    networks: &[NetworkRecord],
) -> UnusedResources {
    let used_images: HashSet<&str> = containers
        .iter()
        .filter_map(|c| c.image_id.as_deref())
        .collect();
    let used_volumes: HashSet<&str> = containers
        .iter()
        .flat_map(|c| &c.mounts)
        .filter(|m| m.kind == "volume")
        .filter_map(|m| m.name.as_deref())
        .collect();
    let used_networks: HashSet<&str> = containers
        .iter()
        .flat_map(|c| &c.networks)
        .map(|n| n.name.as_str())
        .collect();

    let images = images
        .iter()
        .filter(|img| img.tags.iter().any(|t| t != "<none>:<none>"))
        .filter(|img| !used_images.contains(img.id.as_str()))
        .map(|img| UnusedImage {
            id: short_id(&img.id),
            tags: img.tags.clone(),
            size: human_bytes(img.size_bytes.max(0) as u64),
            size_bytes: img.size_bytes,
            created: DateTime::<Utc>::from_timestamp(img.created, 0),
        })
        .collect();

    let volumes = volumes
        .iter()
        .filter(|v| !used_volumes.contains(v.name.as_str()))
        .map(|v| UnusedVolume {
            name: v.name.clone(),
            driver: v.driver.clone(),
            created: v.created_at.clone().unwrap_or_else(|| "unknown".to_string()),
        })
        .collect();

    let networks = networks
        .iter()
        .filter(|n| !BUILTIN_NETWORKS.contains(&n.name.as_str()))
        .filter(|n| !used_networks.contains(n.name.as_str()))
        .map(|n| UnusedNetwork {
            id: short_id(&n.id),
            name: n.name.clone(),
            driver: n.driver.clone(),
            created: n.created.clone().unwrap_or_else(|| "unknown".to_string()),
        })
        .collect();

    UnusedResources {
        images,
        volumes,
        networks,
    }
}
