mod common;

use std::sync::Arc;
use tempfile::TempDir;

use dockview_console::models::views::{ContainerStatus, FormatMode};
use dockview_console::runtime::mock::{MockFactory, MockRuntime, container, published};

use common::{LOCAL_SOCKET, state_with_hosts};

fn three_containers() -> MockRuntime {
    let mut web = container("aaa111", "web", "nginx:latest", "running");
    web.ports = vec![published("80/tcp", "8080")];
    let mut tls = container("bbb222", "proxy", "traefik:v3", "running");
    tls.ports = vec![published("443/tcp", "8443")];
    let job = container("ccc333", "backup", "restic/restic", "exited");
    MockRuntime::new()
        .with_container(web)
        .with_container(tls)
        .with_container(job)
}

#[tokio::test]
async fn local_host_with_three_containers() {
    let dir = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::new());
    factory.register(LOCAL_SOCKET, three_containers());
    let state = state_with_hosts(&dir, &[("local", LOCAL_SOCKET)], factory);

    let view = state
        .aggregator
        .aggregate(&state.registry.profiles(), FormatMode::Lightweight)
        .await;

    assert_eq!(view.connected_host_count, 1);
    assert_eq!(view.total_host_count, 1);
    assert_eq!(view.totals.counts.running, 2);
    assert_eq!(view.totals.counts.exited, 1);
    assert_eq!(view.totals.total, 3);

    let host = &view.hosts[0];
    assert!(host.connected);
    let running = &host.containers_by_status.running;
    assert_eq!(running[0].name, "web");
    assert_eq!(
        running[0].first_reachable_url.as_deref(),
        Some("http://localhost:8080")
    );
    assert_eq!(
        running[1].first_reachable_url.as_deref(),
        Some("http://localhost:8443")
    );
    let exited = &host.containers_by_status.exited;
    assert_eq!(exited[0].status, ContainerStatus::Exited);
    assert_eq!(exited[0].first_reachable_url, None);
}

#[tokio::test]
async fn one_unreachable_host_among_many() {
    let dir = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::new());
    factory.register(LOCAL_SOCKET, three_containers());
    factory.register(
        "tcp://10.0.0.2:2375",
        MockRuntime::new().with_container(container("ddd444", "db", "postgres:16", "running")),
    );
    let state = state_with_hosts(
        &dir,
        &[
            ("local", LOCAL_SOCKET),
            ("down", "tcp://10.0.0.9:2375"),
            ("nas", "tcp://10.0.0.2:2375"),
        ],
        factory,
    );

    let view = state
        .aggregator
        .aggregate(&state.registry.profiles(), FormatMode::Lightweight)
        .await;

    assert_eq!(view.total_host_count, 3);
    assert_eq!(view.connected_host_count, 2);
    let ids: Vec<_> = view.hosts.iter().map(|h| h.profile.id.as_str()).collect();
    assert_eq!(ids, vec!["local", "down", "nas"]);

    let down = &view.hosts[1];
    assert!(!down.connected);
    assert!(down.error.is_some());
    assert_eq!(down.containers_by_status.iter().count(), 0);

    assert_eq!(view.totals.counts.running, 3);
    let db = &view.hosts[2].containers_by_status.running[0];
    assert_eq!(db.host_id, "nas");
    assert_eq!(db.first_reachable_url, None);
}

#[tokio::test]
async fn nothing_connected_is_signalled_by_count() {
    let dir = TempDir::new().unwrap();
    let state = state_with_hosts(
        &dir,
        &[("remote", "tcp://10.0.0.9:2375")],
        Arc::new(MockFactory::new()),
    );
    let view = state
        .aggregator
        .aggregate(&state.registry.profiles(), FormatMode::Full)
        .await;
    assert_eq!(view.connected_host_count, 0);
    assert_eq!(view.totals.total, 0);
}

#[tokio::test]
async fn hanging_host_does_not_block_the_dashboard() {
    let dir = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::new());
    factory.register("tcp://stuck:2375", MockRuntime::new().hanging());
    factory.register(LOCAL_SOCKET, three_containers());
    let state = state_with_hosts(
        &dir,
        &[("local", LOCAL_SOCKET), ("stuck", "tcp://stuck:2375")],
        factory,
    );

    let started = std::time::Instant::now();
    let view = state
        .aggregator
        .aggregate(&state.registry.profiles(), FormatMode::Lightweight)
        .await;
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
    assert_eq!(view.connected_host_count, 1);
    assert!(!view.hosts[1].connected);
}
