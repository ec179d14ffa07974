use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_hosts_file")]
    pub hosts_file: PathBuf,
    #[serde(default = "default_apps_file")]
    pub apps_file: PathBuf,
    #[serde(default)]
    pub stats_enabled: bool,
    #[serde(default = "default_true")]
    pub fast_initial_load: bool,
    /// External base URL used for container links on non-TCP hosts.
    #[serde(default)]
    pub host_url: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_test_connect_secs")]
    pub test_connect_secs: u64,
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,
    #[serde(default = "default_bulk_sample_ms")]
    pub bulk_sample_ms: u64,
    #[serde(default = "default_detail_sample_ms")]
    pub detail_sample_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            test_connect_secs: default_test_connect_secs(),
            probe_secs: default_probe_secs(),
            query_secs: default_query_secs(),
            bulk_sample_ms: default_bulk_sample_ms(),
            detail_sample_ms: default_detail_sample_ms(),
        }
    }
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn test_connect(&self) -> Duration {
        Duration::from_secs(self.test_connect_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }

    pub fn bulk_sample(&self) -> Duration {
        Duration::from_millis(self.bulk_sample_ms)
    }

    pub fn detail_sample(&self) -> Duration {
        Duration::from_millis(self.detail_sample_ms)
    }
}

fn default_listen_port() -> u16 {
    5000
}

fn default_hosts_file() -> PathBuf {
    PathBuf::from("docker_hosts.json")
}

fn default_apps_file() -> PathBuf {
    PathBuf::from("data/self_hosted_apps.json")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_secs() -> u64 {
    10
}

fn default_test_connect_secs() -> u64 {
    5
}

fn default_probe_secs() -> u64 {
    2
}

fn default_query_secs() -> u64 {
    10
}

fn default_bulk_sample_ms() -> u64 {
    1000
}

fn default_detail_sample_ms() -> u64 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            hosts_file: default_hosts_file(),
            apps_file: default_apps_file(),
            stats_enabled: false,
            fast_initial_load: true,
            host_url: None,
            log_level: default_log_level(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Reads the YAML file if present, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut cfg = if path.exists() {
            let data = std::fs::read_to_string(path)
                .map_err(|e| format!("reading config {}: {}", path.display(), e))?;
            serde_yaml::from_str(&data).map_err(|e| format!("parsing config: {}", e))?
        } else {
            Config::default()
        };

        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn apply_env(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(v) = get("ENABLE_STATS") {
            self.stats_enabled = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("FAST_INITIAL_LOAD") {
            self.fast_initial_load = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("HOST_URL").filter(|v| !v.trim().is_empty()) {
            self.host_url = Some(v.trim().to_string());
        }
        if let Some(v) = get("PORT") {
            self.listen_port = v
                .parse()
                .map_err(|e| format!("invalid PORT {:?}: {}", v, e))?;
        }
        if let Some(v) = get("LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log_level = v.to_lowercase();
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn yaml_fields_default_individually() {
        let yaml = "stats_enabled: true\ntimeouts:\n  bulk_sample_ms: 250\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.stats_enabled);
        assert!(cfg.fast_initial_load);
        assert_eq!(cfg.listen_port, 5000);
        assert_eq!(cfg.timeouts.bulk_sample(), Duration::from_millis(250));
        assert_eq!(cfg.timeouts.connect(), Duration::from_secs(10));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("ENABLE_STATS", "TRUE"),
            ("FAST_INITIAL_LOAD", "false"),
            ("HOST_URL", "http://dash.example"),
            ("PORT", "8088"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert!(cfg.stats_enabled);
        assert!(!cfg.fast_initial_load);
        assert_eq!(cfg.host_url.as_deref(), Some("http://dash.example"));
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8088");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut cfg = Config::default();
        assert!(cfg.apply_env(|k| (k == "PORT").then(|| "nope".to_string())).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg.hosts_file, PathBuf::from("docker_hosts.json"));
    }
}
