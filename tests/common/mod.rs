#![allow(dead_code)]

use std::sync::Arc;

use indexmap::IndexMap;
use tempfile::TempDir;

use dockview_console::AppState;
use dockview_console::config::Config;
use dockview_console::runtime::mock::MockFactory;

pub const LOCAL_SOCKET: &str = "unix:///var/run/docker.sock";

/// Writes a hosts file with `(id, address)` entries in the given order, the
/// first one current, and builds state around `factory`.
pub fn state_with_hosts(
    dir: &TempDir,
    hosts: &[(&str, &str)],
    factory: Arc<MockFactory>,
) -> AppState {
    let entries: IndexMap<String, serde_json::Value> = hosts
        .iter()
        .map(|(id, address)| {
            (
                id.to_string(),
                serde_json::json!({
                    "name": format!("{} host", id),
                    "address": address,
                    "is_default": *id == "local",
                }),
            )
        })
        .collect();
    let doc = serde_json::json!({ "hosts": entries, "current_host": hosts[0].0 });
    let hosts_file = dir.path().join("docker_hosts.json");
    std::fs::write(&hosts_file, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let mut config = Config {
        hosts_file,
        apps_file: dir.path().join("data").join("apps.json"),
        ..Config::default()
    };
    config.timeouts.connect_secs = 1;
    config.timeouts.test_connect_secs = 1;
    config.timeouts.probe_secs = 1;
    config.timeouts.query_secs = 1;
    config.timeouts.bulk_sample_ms = 100;
    config.timeouts.detail_sample_ms = 100;

    AppState::new(config, factory).unwrap()
}
