use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions, Stats, StatsOptions};
use bollard::errors::Error as BollardError;
use bollard::image::ListImagesOptions;
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, MountPoint, PortBinding as EnginePortBinding,
};
use bollard::{API_DEFAULT_VERSION, Docker};
use chrono::DateTime;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::models::records::{
    ContainerRecord, ImageRecord, MountRecord, NetworkEndpoint, NetworkRecord, PortBinding,
    StatsRecord, SystemInfo, VersionInfo, VolumeRecord,
};

use super::{RuntimeClient, RuntimeFactory, Strategy};

/// Opens Docker Engine API connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerFactory;

impl RuntimeFactory for DockerFactory {
    fn open(
        &self,
        strategy: &Strategy,
        timeout: Duration,
    ) -> Result<Arc<dyn RuntimeClient>, RuntimeError> {
        let secs = timeout.as_secs().max(1);
        let docker = match strategy {
            Strategy::Tls { address, cert_dir } => {
                let key = cert_dir.join("key.pem");
                let cert = cert_dir.join("cert.pem");
                let ca = cert_dir.join("ca.pem");
                for f in [&key, &cert, &ca] {
                    if !f.is_file() {
                        return Err(RuntimeError::Transport(format!(
                            "certificate file {} does not exist (no such file)",
                            f.display()
                        )));
                    }
                }
                Docker::connect_with_ssl(address, &key, &cert, &ca, secs, API_DEFAULT_VERSION)
            }
            Strategy::Direct { address } if address.starts_with("unix://") => {
                Docker::connect_with_unix(address, secs, API_DEFAULT_VERSION)
            }
            Strategy::Direct { address } => {
                Docker::connect_with_http(address, secs, API_DEFAULT_VERSION)
            }
            Strategy::Environment => Docker::connect_with_local_defaults(),
            Strategy::LocalSocket { path } => {
                Docker::connect_with_unix(path, secs, API_DEFAULT_VERSION)
            }
        }
        .map_err(engine_error)?;

        Ok(Arc::new(DockerRuntime { docker }))
    }
}

pub struct DockerRuntime {
    docker: Docker,
}

fn engine_error(e: BollardError) -> RuntimeError {
    match e {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Api(format!("engine returned {}: {}", status_code, message)),
        BollardError::RequestTimeoutError => RuntimeError::Transport("request timeout".to_string()),
        other => RuntimeError::Transport(other.to_string()),
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await.map_err(engine_error)?;
        Ok(())
    }

    async fn version(&self) -> Result<VersionInfo, RuntimeError> {
        let v = self.docker.version().await.map_err(engine_error)?;
        Ok(VersionInfo {
            version: v.version.unwrap_or_else(|| "Unknown".to_string()),
            api_version: v.api_version.unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    async fn info(&self) -> Result<SystemInfo, RuntimeError> {
        let i = self.docker.info().await.map_err(engine_error)?;
        Ok(SystemInfo {
            name: i.name.unwrap_or_else(|| "Unknown".to_string()),
            server_version: i.server_version.unwrap_or_else(|| "N/A".to_string()),
            operating_system: i.operating_system.unwrap_or_else(|| "Unknown".to_string()),
            architecture: i.architecture.unwrap_or_else(|| "Unknown".to_string()),
            containers: i.containers.unwrap_or(0),
            images: i.images.unwrap_or(0),
        })
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>, RuntimeError> {
        let opts = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let list = self
            .docker
            .list_containers(Some(opts))
            .await
            .map_err(engine_error)?;
        Ok(list.into_iter().map(from_summary).collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord, RuntimeError> {
        let c = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(engine_error)?;
        Ok(from_inspect(c))
    }

    async fn container_stats(&self, id: &str) -> Result<StatsRecord, RuntimeError> {
        let opts = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker.stats(id, Some(opts));
        match stream.next().await {
            Some(Ok(s)) => Ok(from_stats(&s)),
            Some(Err(e)) => Err(engine_error(e)),
            None => Err(RuntimeError::Api("empty stats response".to_string())),
        }
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, RuntimeError> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String>::default()))
            .await
            .map_err(engine_error)?;
        Ok(images
            .into_iter()
            .map(|i| ImageRecord {
                id: i.id,
                tags: i
                    .repo_tags
                    .into_iter()
                    .filter(|t| t != "<none>:<none>")
                    .collect(),
                size_bytes: i.size,
                created: i.created,
            })
            .collect())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>, RuntimeError> {
        let resp = self
            .docker
            .list_volumes::<String>(None)
            .await
            .map_err(engine_error)?;
        Ok(resp
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| VolumeRecord {
                name: v.name,
                driver: v.driver,
                created_at: v.created_at,
            })
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>, RuntimeError> {
        let networks = self
            .docker
            .list_networks::<String>(None)
            .await
            .map_err(engine_error)?;
        Ok(networks
            .into_iter()
            .map(|n| NetworkRecord {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
                driver: n.driver.unwrap_or_else(|| "unknown".to_string()),
                created: n.created,
            })
            .collect())
    }
}

/// Health is not part of the list payload; the engine appends it to the
/// human status, e.g. "Up 3 hours (healthy)".
fn health_from_status(status: &str) -> Option<String> {
    let open = status.rfind('(')?;
    let inner = status[open + 1..].strip_suffix(')')?;
    let health = inner.strip_prefix("health: ").unwrap_or(inner);
    match health {
        "healthy" | "unhealthy" | "starting" => Some(health.to_string()),
        _ => None,
    }
}

fn mounts(m: Option<Vec<MountPoint>>) -> Vec<MountRecord> {
    m.unwrap_or_default()
        .into_iter()
        .map(|m| MountRecord {
            kind: m.typ.map(|t| t.to_string()).unwrap_or_default(),
            name: m.name,
        })
        .collect()
}

fn from_summary(c: ContainerSummary) -> ContainerRecord {
    let networks = c
        .network_settings
        .and_then(|n| n.networks)
        .map(|n| {
            let mut v: Vec<_> = n
                .into_iter()
                .map(|(name, ep)| NetworkEndpoint {
                    name,
                    ip: ep.ip_address.unwrap_or_default(),
                })
                .collect();
            v.sort_by(|a, b| a.name.cmp(&b.name));
            v
        })
        .unwrap_or_default();

    // The engine builds this list from a map, so its order is arbitrary.
    let mut ports: Vec<PortBinding> = c
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| {
            let proto = p
                .typ
                .map(|t| t.to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "tcp".to_string());
            PortBinding {
                container_port: format!("{}/{}", p.private_port, proto),
                host_ip: p.ip,
                host_port: p.public_port.map(|hp| hp.to_string()),
            }
        })
        .collect();
    ports.sort_by_key(|p| {
        (
            port_key(&p.container_port),
            p.host_ip.clone(),
            p.host_port.clone(),
        )
    });

    ContainerRecord {
        id: c.id,
        name: c.names.and_then(|n| n.into_iter().next()),
        image: c.image,
        image_id: c.image_id,
        state: c.state,
        created: c
            .created
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|t| t.to_rfc3339()),
        health: c.status.as_deref().and_then(health_from_status),
        networks,
        ports,
        labels: c.labels.unwrap_or_default().into_iter().collect(),
        mounts: mounts(c.mounts),
        command: c.command,
        network_mode: c.host_config.and_then(|h| h.network_mode),
        restart_policy: None,
        env: Vec::new(),
    }
}

/// Orders "80/tcp" style specs by port number, then protocol.
fn port_key(spec: &str) -> (u32, String) {
    let (num, proto) = spec.split_once('/').unwrap_or((spec, ""));
    (num.parse::<u32>().unwrap_or(u32::MAX), proto.to_string())
}

/// The inspect payload carries ports as a map; bindings are ordered by
/// container port number so repeated calls agree.
fn sorted_ports(ports: HashMap<String, Option<Vec<EnginePortBinding>>>) -> Vec<PortBinding> {
    let mut keys: Vec<_> = ports.into_iter().collect();
    keys.sort_by_key(|(spec, _)| port_key(spec));

    let mut out = Vec::new();
    for (spec, bindings) in keys {
        match bindings.filter(|b| !b.is_empty()) {
            Some(bindings) => {
                for b in bindings {
                    out.push(PortBinding {
                        container_port: spec.clone(),
                        host_ip: b.host_ip,
                        host_port: b.host_port.filter(|p| !p.is_empty()),
                    });
                }
            }
            None => out.push(PortBinding {
                container_port: spec,
                host_ip: None,
                host_port: None,
            }),
        }
    }
    out
}

fn from_inspect(c: ContainerInspectResponse) -> ContainerRecord {
    let state = c.state.as_ref();
    let config = c.config.as_ref();
    let host_config = c.host_config.as_ref();
    let settings = c.network_settings.clone();

    let mut networks: Vec<NetworkEndpoint> = settings
        .as_ref()
        .and_then(|s| s.networks.clone())
        .unwrap_or_default()
        .into_iter()
        .map(|(name, ep)| NetworkEndpoint {
            name,
            ip: ep.ip_address.unwrap_or_default(),
        })
        .collect();
    networks.sort_by(|a, b| a.name.cmp(&b.name));

    ContainerRecord {
        id: c.id.clone(),
        name: c.name.clone(),
        image: config.and_then(|cfg| cfg.image.clone()),
        image_id: c.image.clone(),
        state: state.and_then(|s| s.status.as_ref()).map(|s| s.to_string()),
        created: c.created.clone(),
        health: state
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status.as_ref())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty() && s != "none"),
        networks,
        ports: settings
            .and_then(|s| s.ports)
            .map(sorted_ports)
            .unwrap_or_default(),
        labels: config
            .and_then(|cfg| cfg.labels.clone())
            .unwrap_or_default()
            .into_iter()
            .collect(),
        mounts: mounts(c.mounts.clone()),
        command: config
            .and_then(|cfg| cfg.cmd.as_ref())
            .map(|cmd| cmd.join(" ")),
        network_mode: host_config.and_then(|h| h.network_mode.clone()),
        restart_policy: host_config
            .and_then(|h| h.restart_policy.as_ref())
            .and_then(|r| r.name.as_ref())
            .map(|n| n.to_string())
            .map(|n| if n.is_empty() { "no".to_string() } else { n }),
        env: config.and_then(|cfg| cfg.env.clone()).unwrap_or_default(),
    }
}

fn from_stats(s: &Stats) -> StatsRecord {
    StatsRecord {
        cpu_total_usage: Some(s.cpu_stats.cpu_usage.total_usage),
        pre_cpu_total_usage: Some(s.precpu_stats.cpu_usage.total_usage),
        system_cpu_usage: s.cpu_stats.system_cpu_usage,
        pre_system_cpu_usage: s.precpu_stats.system_cpu_usage,
        online_cpus: s.cpu_stats.online_cpus,
        percpu_count: s.cpu_stats.cpu_usage.percpu_usage.as_ref().map(Vec::len),
        memory_usage: s.memory_stats.usage,
        memory_limit: s.memory_stats.limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{Port, PortTypeEnum};

    #[test]
    fn health_is_read_from_status_suffix() {
        assert_eq!(health_from_status("Up 3 hours (healthy)").as_deref(), Some("healthy"));
        assert_eq!(
            health_from_status("Up 2 seconds (health: starting)").as_deref(),
            Some("starting")
        );
        assert_eq!(health_from_status("Exited (0) 5 minutes ago"), None);
        assert_eq!(health_from_status("Up 1 minute"), None);
    }

    #[test]
    fn inspect_ports_are_ordered_by_number() {
        let mut ports = HashMap::new();
        ports.insert(
            "443/tcp".to_string(),
            Some(vec![EnginePortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("8443".to_string()),
            }]),
        );
        ports.insert("9000/tcp".to_string(), None);
        ports.insert(
            "80/tcp".to_string(),
            Some(vec![EnginePortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("8080".to_string()),
            }]),
        );
        let out = sorted_ports(ports);
        let specs: Vec<_> = out.iter().map(|p| p.container_port.as_str()).collect();
        assert_eq!(specs, vec!["80/tcp", "443/tcp", "9000/tcp"]);
        assert_eq!(out[0].host_port.as_deref(), Some("8080"));
        assert_eq!(out[2].host_port, None);
    }

    fn summary_port(private: u16, public: Option<u16>, ip: &str, typ: PortTypeEnum) -> Port {
        Port {
            ip: Some(ip.to_string()),
            private_port: private,
            public_port: public,
            typ: Some(typ),
        }
    }

    #[test]
    fn summary_ports_are_ordered_regardless_of_engine_order() {
        let shuffled = vec![
            summary_port(443, Some(8443), "::", PortTypeEnum::TCP),
            summary_port(53, Some(5353), "0.0.0.0", PortTypeEnum::UDP),
            summary_port(443, Some(8443), "0.0.0.0", PortTypeEnum::TCP),
            summary_port(9000, None, "", PortTypeEnum::TCP),
            summary_port(80, Some(8080), "0.0.0.0", PortTypeEnum::TCP),
            summary_port(53, Some(5353), "0.0.0.0", PortTypeEnum::TCP),
        ];
        let mut reversed = shuffled.clone();
        reversed.reverse();

        let order = |ports: Vec<Port>| -> Vec<(String, Option<String>)> {
            let record = from_summary(ContainerSummary {
                id: Some("abc".to_string()),
                ports: Some(ports),
                ..Default::default()
            });
            record
                .ports
                .into_iter()
                .map(|p| (p.container_port, p.host_ip))
                .collect()
        };

        let first = order(shuffled);
        assert_eq!(first, order(reversed));
        let specs: Vec<_> = first.iter().map(|(spec, _)| spec.as_str()).collect();
        assert_eq!(
            specs,
            vec!["53/tcp", "53/udp", "80/tcp", "443/tcp", "443/tcp", "9000/tcp"]
        );
        assert_eq!(first[3].1.as_deref(), Some("0.0.0.0"));
    }
}
