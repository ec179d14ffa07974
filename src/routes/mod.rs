pub mod api;
pub mod ui;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Hosts
        .route(
            "/api/hosts",
            get(api::handle_list_hosts).post(api::handle_add_host),
        )
        .route("/api/hosts/test", post(api::handle_test_unsaved_host))
        .route(
            "/api/hosts/{id}",
            put(api::handle_update_host).delete(api::handle_delete_host),
        )
        .route("/api/hosts/{id}/switch", post(api::handle_switch_host))
        .route("/api/hosts/{id}/test", post(api::handle_test_saved_host))
        // Containers
        .route("/api/containers", get(api::handle_list_containers))
        .route("/api/containers/stats", get(api::handle_container_stats))
        .route("/api/containers/{id}", get(api::handle_get_container))
        .route("/api/unused-resources", get(api::handle_unused_resources))
        .route("/api/dashboard", get(api::handle_dashboard))
        // Apps
        .route(
            "/api/apps",
            get(api::handle_list_apps).post(api::handle_add_app),
        )
        .route("/api/apps/by-category", get(api::handle_apps_by_category))
        .route(
            "/api/apps/{id}",
            get(api::handle_get_app)
                .put(api::handle_update_app)
                .delete(api::handle_delete_app),
        )
        // Health
        .route("/health", get(api::handle_health))
        // Pages
        .route("/", get(ui::handle_dashboard))
        .route("/hosts", get(ui::handle_hosts))
        .route("/apps", get(ui::handle_apps))
        // Static files
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
