use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::AppState;
use crate::helpers::{human_bytes, human_time};
use crate::models::apps::AppCategory;
use crate::models::views::{
    ContainerStatus, ContainerView, FormatMode, HostAggregateView, ResourceSnapshot,
};

#[derive(Debug, Clone)]
pub struct Breadcrumb {
    pub label: String,
    pub url: String,
}

fn render_template(tmpl: &impl Template) -> Response {
    match tmpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("template error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn status_class(status: ContainerStatus) -> &'static str {
    match status {
        ContainerStatus::Running => "badge-success",
        ContainerStatus::Exited => "badge-error",
        ContainerStatus::Paused | ContainerStatus::Created => "badge-warning",
        ContainerStatus::Other => "badge-info",
        ContainerStatus::Error => "badge-error",
    }
}

// --- Dashboard ---

// Pre-computed container row for templates
#[derive(Debug, Clone)]
struct ContainerRow {
    id: String,
    name: String,
    image: String,
    status: String,
    status_class: String,
    health: String,
    created_display: String,
    ports: String,
    url: String,
    icon_url: String,
    resource_display: String,
    error: String,
}

impl ContainerRow {
    fn from_view(v: &ContainerView) -> Self {
        Self {
            id: v.id.clone(),
            name: v.name.clone(),
            image: v.image_display.clone(),
            status: v.status.as_str().to_string(),
            status_class: status_class(v.status).to_string(),
            health: v.health.clone().unwrap_or_default(),
            created_display: human_time(v.created_at),
            ports: v.ports.join(", "),
            url: v.first_reachable_url.clone().unwrap_or_default(),
            icon_url: v.icon_url.clone(),
            resource_display: resource_display(&v.resource),
            error: v.error.clone().unwrap_or_default(),
        }
    }
}

fn resource_display(r: &ResourceSnapshot) -> String {
    if !r.sampled {
        return String::new();
    }
    format!(
        "CPU {:.1}% · {} / {} ({:.1}%)",
        r.cpu_percent,
        human_bytes(r.memory_usage_bytes),
        human_bytes(r.memory_limit_bytes),
        r.memory_percent
    )
}

#[derive(Debug, Clone)]
struct BucketView {
    label: String,
    rows: Vec<ContainerRow>,
}

#[derive(Debug, Clone)]
struct HostSection {
    id: String,
    name: String,
    address: String,
    connected: bool,
    error: String,
    runtime_version: String,
    running: usize,
    total: usize,
    image_count: usize,
    buckets: Vec<BucketView>,
}

impl HostSection {
    fn from_view(h: &HostAggregateView) -> Self {
        let b = &h.containers_by_status;
        let buckets = [
            ("Running", &b.running),
            ("Exited", &b.exited),
            ("Created", &b.created),
            ("Paused", &b.paused),
            ("Other", &b.other),
        ]
        .into_iter()
        .filter(|(_, views)| !views.is_empty())
        .map(|(label, views)| BucketView {
            label: label.to_string(),
            rows: views.iter().map(ContainerRow::from_view).collect(),
        })
        .collect();

        Self {
            id: h.profile.id.clone(),
            name: h.profile.name.clone(),
            address: h.profile.address.clone(),
            connected: h.connected,
            error: h.error.clone().unwrap_or_default(),
            runtime_version: h.totals.runtime_version.clone(),
            running: h.totals.counts.running,
            total: h.totals.total,
            image_count: h.totals.image_count,
            buckets,
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    title: String,
    current_nav: String,
    breadcrumbs: Vec<Breadcrumb>,
    connected_hosts: usize,
    total_hosts: usize,
    total: usize,
    running: usize,
    exited: usize,
    other: usize,
    image_count: usize,
    generated_display: String,
    hosts: Vec<HostSection>,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    title: String,
    current_nav: String,
    breadcrumbs: Vec<Breadcrumb>,
    message: String,
    hosts: Vec<HostSection>,
}

pub async fn handle_dashboard(State(state): State<AppState>) -> Response {
    let profiles = state.registry.profiles();
    let mode = if state.config.fast_initial_load {
        FormatMode::Lightweight
    } else {
        FormatMode::Full
    };
    let view = state.aggregator.aggregate(&profiles, mode).await;
    let hosts: Vec<HostSection> = view.hosts.iter().map(HostSection::from_view).collect();
    let breadcrumbs = vec![Breadcrumb {
        label: "Dashboard".to_string(),
        url: "/".to_string(),
    }];

    if view.connected_host_count == 0 {
        let tmpl = ErrorTemplate {
            title: "No hosts available".to_string(),
            current_nav: "dashboard".to_string(),
            breadcrumbs,
            message: "Unable to connect to any Docker host.".to_string(),
            hosts,
        };
        return render_template(&tmpl);
    }

    let c = &view.totals.counts;
    let tmpl = DashboardTemplate {
        title: "Dashboard".to_string(),
        current_nav: "dashboard".to_string(),
        breadcrumbs,
        connected_hosts: view.connected_host_count,
        total_hosts: view.total_host_count,
        total: view.totals.total,
        running: c.running,
        exited: c.exited,
        other: c.created + c.paused + c.other,
        image_count: view.totals.image_count,
        generated_display: view.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        hosts,
    };
    render_template(&tmpl)
}

// --- Hosts ---

#[derive(Debug, Clone)]
struct HostRow {
    id: String,
    name: String,
    address: String,
    description: String,
    tls: bool,
    is_default: bool,
    is_current: bool,
}

#[derive(Template)]
#[template(path = "hosts.html")]
struct HostsTemplate {
    title: String,
    current_nav: String,
    breadcrumbs: Vec<Breadcrumb>,
    hosts: Vec<HostRow>,
}

pub async fn handle_hosts(State(state): State<AppState>) -> Response {
    let snap = state.registry.snapshot();
    let hosts = snap
        .hosts
        .iter()
        .map(|p| HostRow {
            id: p.id.clone(),
            name: p.name.clone(),
            address: p.address.clone(),
            description: p.description.clone(),
            tls: p.tls_verify,
            is_default: p.is_default,
            is_current: p.id == snap.current_host,
        })
        .collect();

    let tmpl = HostsTemplate {
        title: "Hosts".to_string(),
        current_nav: "hosts".to_string(),
        breadcrumbs: vec![
            Breadcrumb {
                label: "Dashboard".to_string(),
                url: "/".to_string(),
            },
            Breadcrumb {
                label: "Hosts".to_string(),
                url: "/hosts".to_string(),
            },
        ],
        hosts,
    };
    render_template(&tmpl)
}

// --- Apps ---

#[derive(Template)]
#[template(path = "apps.html")]
struct AppsTemplate {
    title: String,
    current_nav: String,
    breadcrumbs: Vec<Breadcrumb>,
    categories: Vec<AppCategory>,
}

pub async fn handle_apps(State(state): State<AppState>) -> Response {
    let tmpl = AppsTemplate {
        title: "Self-hosted Apps".to_string(),
        current_nav: "apps".to_string(),
        breadcrumbs: vec![
            Breadcrumb {
                label: "Dashboard".to_string(),
                url: "/".to_string(),
            },
            Breadcrumb {
                label: "Apps".to_string(),
                url: "/apps".to_string(),
            },
        ],
        categories: state.apps.by_category(),
    };
    render_template(&tmpl)
}
