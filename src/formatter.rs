use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{DerivationError, FormatError};
use crate::helpers::short_id;
use crate::models::hosts::HostProfile;
use crate::models::records::ContainerRecord;
use crate::models::views::{
    ContainerStatus, ContainerView, DEFAULT_ICON_URL, FormatMode, ResourceSnapshot,
};
use crate::runtime::RuntimeHandle;
use crate::runtime::sampler::Sampler;

/// Label keys checked for an icon URL, highest priority first.
const ICON_LABELS: &[&str] = &[
    "icon",
    "icon.url",
    "app.icon",
    "org.opencontainers.image.icon",
    "net.unraid.docker.icon",
    "io.portainer.icon",
];

const ICON_BASE: &str = "https://cdn.jsdelivr.net/gh/selfhst/icons/png";

/// Image-name keywords and the icon they map to. Checked in order.
const IMAGE_ICONS: &[(&[&str], &str)] = &[
    (&["nginx"], "nginx.png"),
    (&["postgres"], "postgresql.png"),
    (&["mysql", "mariadb"], "mysql.png"),
    (&["redis"], "redis.png"),
    (&["mongo"], "mongodb.png"),
    (&["node"], "nodejs.png"),
    (&["python"], "python.png"),
];

#[derive(Debug, Clone, Default)]
pub struct FormatSettings {
    pub stats_enabled: bool,
    /// External base host for links to containers on non-TCP hosts.
    pub host_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    settings: FormatSettings,
    sampler: Sampler,
}

impl Formatter {
    pub fn new(settings: FormatSettings) -> Self {
        Self {
            settings,
            sampler: Sampler::new(),
        }
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Whether a formatted view should get a live resource sample.
    pub fn wants_sample(&self, view: &ContainerView, mode: FormatMode) -> bool {
        mode == FormatMode::Full && self.settings.stats_enabled && view.status.is_running()
    }

    /// Formats a record and, when the mode and settings call for it, samples
    /// its resource usage under `deadline`.
    pub async fn format(
        &self,
        handle: &RuntimeHandle,
        record: &ContainerRecord,
        profile: &HostProfile,
        mode: FormatMode,
        deadline: Duration,
    ) -> ContainerView {
        let mut view = self.format_record(record, profile, mode);
        if self.wants_sample(&view, mode) {
            let id = record.id.as_deref().unwrap_or(&view.id);
            view.resource = self.sampler.sample(handle, id, deadline).await;
        }
        view
    }

    /// Pure derivation of the display record. Resource usage is left unsampled.
    pub fn format_record(
        &self,
        record: &ContainerRecord,
        profile: &HostProfile,
        mode: FormatMode,
    ) -> ContainerView {
        match self.try_format(record, profile, mode) {
            Ok(view) => view,
            Err(e) => {
                let name = record
                    .name
                    .as_deref()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                tracing::error!("formatting container {} on {}: {}", name, profile.id, e);
                let id = record
                    .id
                    .as_deref()
                    .map(short_id)
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                ContainerView::failed(id, name, profile, e.to_string())
            }
        }
    }

    fn try_format(
        &self,
        record: &ContainerRecord,
        profile: &HostProfile,
        mode: FormatMode,
    ) -> Result<ContainerView, FormatError> {
        let full_id = record
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(FormatError::MissingId)?;
        let id = short_id(full_id);

        let name = defaulted(&id, "name", container_name(record), || id.clone());
        let status = container_status(record);
        let image_display = defaulted(&name, "image", image_display(record), || {
            "unknown".to_string()
        });
        let created_at = defaulted(&name, "created", created_at(record).map(Some), || None);
        let first_reachable_url = defaulted(
            &name,
            "first_reachable_url",
            first_reachable_url(record, status, profile, self.settings.host_url.as_deref()),
            || None,
        );
        let icon_url = icon_url(record, &image_display);

        let full = mode == FormatMode::Full;
        let (command, network_mode, restart_policy, env_vars) = if full {
            (
                record.command.clone().unwrap_or_default(),
                record
                    .network_mode
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                record
                    .restart_policy
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                env_vars(record),
            )
        } else {
            (
                String::new(),
                "unknown".to_string(),
                "unknown".to_string(),
                Vec::new(),
            )
        };

        Ok(ContainerView {
            id,
            name,
            image_display,
            status,
            created_at,
            health: health(record),
            networks: record.networks.clone(),
            ports: port_mappings(record),
            first_reachable_url,
            icon_url,
            labels: record.labels.clone(),
            resource: ResourceSnapshot::unsampled(),
            host_id: profile.id.clone(),
            host_name: profile.name.clone(),
            command,
            network_mode,
            restart_policy,
            env_vars,
            error: None,
        })
    }
}

fn defaulted<T>(
    container: &str,
    field: &str,
    derived: Result<T, DerivationError>,
    default: impl FnOnce() -> T,
) -> T {
    derived.unwrap_or_else(|e| {
        debug!("container {}: {} defaulted ({})", container, field, e);
        default()
    })
}

pub fn container_status(record: &ContainerRecord) -> ContainerStatus {
    record
        .state
        .as_deref()
        .map(|s| ContainerStatus::from_raw(&s.to_lowercase()))
        .unwrap_or(ContainerStatus::Other)
}

fn container_name(record: &ContainerRecord) -> Result<String, DerivationError> {
    record
        .name
        .as_deref()
        .map(|n| n.trim_start_matches('/'))
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or(DerivationError::Missing("name"))
}

fn image_display(record: &ContainerRecord) -> Result<String, DerivationError> {
    match record.image.as_deref().map(str::trim) {
        Some(image) if !image.is_empty() && !image.starts_with("sha256:") => Ok(image.to_string()),
        _ => record
            .image_id
            .as_deref()
            .or(record.image.as_deref())
            .map(short_id)
            .filter(|id| !id.is_empty())
            .ok_or(DerivationError::Missing("image")),
    }
}

fn created_at(record: &ContainerRecord) -> Result<DateTime<Utc>, DerivationError> {
    let raw = record
        .created
        .as_deref()
        .ok_or(DerivationError::Missing("created"))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.to_utc())
        .map_err(|_| DerivationError::InvalidTimestamp(raw.to_string()))
}

fn health(record: &ContainerRecord) -> Option<String> {
    record
        .health
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_lowercase)
}

fn port_label(record: &ContainerRecord) -> Option<&str> {
    record
        .labels
        .get("PORT")
        .or_else(|| record.labels.get("port"))
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
}

fn first_host_port(record: &ContainerRecord) -> Option<&str> {
    record
        .ports
        .iter()
        .filter_map(|p| p.host_port.as_deref())
        .find(|p| !p.is_empty())
}

/// Mapping strings in declaration order: "8080:80/tcp" for published ports,
/// "80/tcp" for exposed-only ones, or "<label> (host)" when only a port label
/// is present.
pub fn port_mappings(record: &ContainerRecord) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in &record.ports {
        let mapping = match p.host_port.as_deref().filter(|hp| !hp.is_empty()) {
            Some(hp) => format!("{}:{}", hp, p.container_port),
            None => p.container_port.clone(),
        };
        // IPv4 and IPv6 bindings of the same port show up as separate entries.
        if !out.contains(&mapping) {
            out.push(mapping);
        }
    }
    if out.is_empty() {
        if let Some(label) = port_label(record) {
            out.push(format!("{} (host)", label));
        }
    }
    out
}

/// Host part of container links. TCP profiles use their own host; everything
/// else uses the configured external host, defaulting to `localhost`.
pub fn url_host(profile: &HostProfile, host_url: Option<&str>) -> Result<String, DerivationError> {
    if profile.is_tcp() {
        let invalid = || DerivationError::InvalidAddress(profile.address.clone());
        let parsed = Url::parse(&profile.address).map_err(|_| invalid())?;
        return parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .ok_or_else(invalid);
    }

    let base = host_url
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");
    let base = base.split_once("://").map(|(_, rest)| rest).unwrap_or(base);
    let base = base.split('/').next().unwrap_or(base);
    if base.is_empty() {
        return Err(DerivationError::InvalidAddress(base.to_string()));
    }
    Ok(base.to_string())
}

pub fn first_reachable_url(
    record: &ContainerRecord,
    status: ContainerStatus,
    profile: &HostProfile,
    host_url: Option<&str>,
) -> Result<Option<String>, DerivationError> {
    if !status.is_running() {
        return Ok(None);
    }
    let Some(port) = first_host_port(record).or_else(|| port_label(record)) else {
        return Ok(None);
    };
    let port: u16 = port
        .parse()
        .map_err(|_| DerivationError::InvalidPort(port.to_string()))?;
    let host = url_host(profile, host_url)?;
    Ok(Some(format!("http://{}:{}", host, port)))
}

pub fn icon_url(record: &ContainerRecord, image_display: &str) -> String {
    let from_label = ICON_LABELS.iter().find_map(|key| {
        record
            .labels
            .get(*key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    });
    if let Some(url) = from_label {
        return url.to_string();
    }

    let image = image_display.to_lowercase();
    IMAGE_ICONS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| image.contains(k)))
        .map(|(_, file)| format!("{}/{}", ICON_BASE, file))
        .unwrap_or_else(|| DEFAULT_ICON_URL.to_string())
}

fn env_vars(record: &ContainerRecord) -> Vec<String> {
    record
        .env
        .iter()
        .filter(|e| !e.starts_with("PATH="))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::records::PortBinding;
    use crate::runtime::mock::{container, published};

    fn profile(address: &str) -> HostProfile {
        HostProfile {
            id: "local".to_string(),
            name: "Local Docker".to_string(),
            address: address.to_string(),
            tls_verify: false,
            cert_path: None,
            description: String::new(),
            is_default: true,
        }
    }

    fn local() -> HostProfile {
        profile("unix:///var/run/docker.sock")
    }

    fn formatter() -> Formatter {
        Formatter::new(FormatSettings::default())
    }

    #[test]
    fn unknown_states_bucket_as_other() {
        for raw in ["restarting", "removing", "dead", "", "weird"] {
            let rec = container("abc", "x", "alpine", raw);
            assert_eq!(container_status(&rec), ContainerStatus::Other, "{raw}");
        }
        let mut rec = container("abc", "x", "alpine", "running");
        rec.state = None;
        assert_eq!(container_status(&rec), ContainerStatus::Other);
        assert_eq!(
            container_status(&container("abc", "x", "alpine", "paused")),
            ContainerStatus::Paused
        );
    }

    #[test]
    fn url_uses_first_published_port() {
        let mut rec = container("abc", "web", "nginx", "running");
        rec.ports = vec![
            PortBinding {
                container_port: "9000/tcp".to_string(),
                host_ip: None,
                host_port: None,
            },
            published("80/tcp", "8080"),
            published("443/tcp", "8443"),
        ];
        let view = formatter().format_record(&rec, &local(), FormatMode::Lightweight);
        assert_eq!(view.first_reachable_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(view.ports, vec!["9000/tcp", "8080:80/tcp", "8443:443/tcp"]);
    }

    #[test]
    fn url_is_null_unless_running() {
        for state in ["exited", "created", "paused", "dead"] {
            let mut rec = container("abc", "web", "nginx", state);
            rec.ports = vec![published("80/tcp", "8080")];
            rec.labels.insert("PORT".to_string(), "3000".to_string());
            let view = formatter().format_record(&rec, &local(), FormatMode::Full);
            assert_eq!(view.first_reachable_url, None, "{state}");
        }
    }

    #[test]
    fn port_label_is_the_fallback() {
        let mut rec = container("abc", "ha", "homeassistant", "running");
        rec.labels.insert("port".to_string(), "8123".to_string());
        let view = formatter().format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(view.first_reachable_url.as_deref(), Some("http://localhost:8123"));
        assert_eq!(view.ports, vec!["8123 (host)"]);
    }

    #[test]
    fn no_port_data_means_no_url() {
        let rec = container("abc", "worker", "alpine", "running");
        let view = formatter().format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(view.first_reachable_url, None);
        assert!(view.ports.is_empty());
    }

    #[test]
    fn tcp_profiles_link_to_their_own_host() {
        let mut rec = container("abc", "web", "nginx", "running");
        rec.ports = vec![published("80/tcp", "8080")];
        let f = Formatter::new(FormatSettings {
            host_url: Some("https://dash.example".to_string()),
            ..FormatSettings::default()
        });
        let view = f.format_record(&rec, &profile("tcp://192.168.1.20:2375"), FormatMode::Full);
        assert_eq!(view.first_reachable_url.as_deref(), Some("http://192.168.1.20:8080"));

        let view = f.format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(view.first_reachable_url.as_deref(), Some("http://dash.example:8080"));
    }

    #[test]
    fn external_host_is_stripped_of_scheme() {
        assert_eq!(url_host(&local(), Some("http://nas.lan")).unwrap(), "nas.lan");
        assert_eq!(url_host(&local(), Some("nas.lan")).unwrap(), "nas.lan");
        assert_eq!(url_host(&local(), None).unwrap(), "localhost");
        assert_eq!(url_host(&local(), Some("  ")).unwrap(), "localhost");
    }

    #[test]
    fn bad_port_label_only_drops_the_url() {
        let mut rec = container("abc", "web", "nginx", "running");
        rec.labels.insert("PORT".to_string(), "eighty".to_string());
        rec.health = Some("Healthy".to_string());
        let view = formatter().format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(view.first_reachable_url, None);
        assert_eq!(view.name, "web");
        assert_eq!(view.health.as_deref(), Some("healthy"));
        assert_eq!(view.icon_url, format!("{}/nginx.png", ICON_BASE));
    }

    #[test]
    fn icon_label_beats_image_keyword() {
        let mut rec = container("abc", "db", "postgres:16", "running");
        rec.labels.insert(
            "org.opencontainers.image.icon".to_string(),
            "https://icons.example/pg.svg".to_string(),
        );
        rec.labels.insert("io.portainer.icon".to_string(), "https://other".to_string());
        let view = formatter().format_record(&rec, &local(), FormatMode::Lightweight);
        assert_eq!(view.icon_url, "https://icons.example/pg.svg");
    }

    #[test]
    fn icon_keyword_table_and_default() {
        let rec = container("abc", "db", "mariadb:11", "running");
        assert_eq!(icon_url(&rec, "mariadb:11"), format!("{}/mysql.png", ICON_BASE));
        let mut rec = container("abc", "x", "busybox", "running");
        rec.labels.insert("icon".to_string(), "  ".to_string());
        assert_eq!(icon_url(&rec, "busybox"), DEFAULT_ICON_URL);
    }

    #[test]
    fn image_falls_back_to_short_digest() {
        let mut rec = container("abc", "x", "sha256:ffeeddccbbaa99887766", "exited");
        rec.image_id = None;
        let view = formatter().format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(view.image_display, "ffeeddccbbaa");
        assert_eq!(
            view.created_at.map(|t| t.to_rfc3339()).as_deref(),
            Some("2024-05-01T10:00:00+00:00")
        );
    }

    #[test]
    fn broken_timestamp_is_isolated() {
        let mut rec = container("abc", "x", "alpine", "exited");
        rec.created = Some("yesterday".to_string());
        let view = formatter().format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(view.created_at, None);
        assert_eq!(view.image_display, "alpine");
        assert_eq!(view.status, ContainerStatus::Exited);
    }

    #[test]
    fn unreadable_record_degrades_to_error_view() {
        let mut rec = container("abc", "ghost", "alpine", "running");
        rec.id = None;
        let view = formatter().format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(view.status, ContainerStatus::Error);
        assert_eq!(view.id, "unknown");
        assert_eq!(view.name, "ghost");
        assert!(view.error.is_some());
    }

    #[test]
    fn lightweight_blanks_detail_fields() {
        let mut rec = container("0123456789abcdef", "web", "nginx", "running");
        rec.env = vec!["PATH=/bin".to_string(), "TZ=UTC".to_string()];
        rec.command = Some("nginx -g daemon off;".to_string());
        rec.restart_policy = Some("always".to_string());

        let light = formatter().format_record(&rec, &local(), FormatMode::Lightweight);
        assert_eq!(light.id, "0123456789ab");
        assert!(light.env_vars.is_empty());
        assert_eq!(light.restart_policy, "unknown");
        assert!(!light.resource.sampled);

        let full = formatter().format_record(&rec, &local(), FormatMode::Full);
        assert_eq!(full.env_vars, vec!["TZ=UTC"]);
        assert_eq!(full.command, "nginx -g daemon off;");
        assert_eq!(full.restart_policy, "always");
        assert_eq!(full.host_name, "Local Docker");
    }

    #[test]
    fn sampling_needs_full_mode_running_and_enabled() {
        let enabled = Formatter::new(FormatSettings {
            stats_enabled: true,
            host_url: None,
        });
        let running = container("a", "a", "x", "running");
        let exited = container("b", "b", "x", "exited");
        let running = enabled.format_record(&running, &local(), FormatMode::Full);
        let exited = enabled.format_record(&exited, &local(), FormatMode::Full);
        assert!(enabled.wants_sample(&running, FormatMode::Full));
        assert!(!enabled.wants_sample(&running, FormatMode::Lightweight));
        assert!(!enabled.wants_sample(&exited, FormatMode::Full));
        assert!(!formatter().wants_sample(&running, FormatMode::Full));
    }
}
