use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use dockview_console::AppState;
use dockview_console::config::Config;
use dockview_console::routes;
use dockview_console::runtime::docker::DockerFactory;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .skip(1)
        .zip(std::env::args().skip(2))
        .find_map(|(k, v)| {
            if k == "-config" || k == "--config" {
                Some(v)
            } else {
                None
            }
        })
        .or_else(|| std::env::args().nth(1).filter(|a| !a.starts_with('-')))
        .unwrap_or_else(|| "/etc/dockview-console/config.yaml".to_string());

    let cfg = Config::load(&PathBuf::from(&config_path)).unwrap_or_else(|e| {
        eprintln!("error loading config: {}", e);
        std::process::exit(1);
    });

    let fallback = format!("dockview_console={}", cfg.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&fallback))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dockview_console=info")),
        )
        .init();

    info!(
        "stats {}, fast initial load {}",
        if cfg.stats_enabled { "enabled" } else { "disabled" },
        cfg.fast_initial_load
    );

    let listen_addr = cfg.listen_addr();
    let state = AppState::new(cfg, Arc::new(DockerFactory)).unwrap_or_else(|e| {
        eprintln!("error opening stores: {}", e);
        std::process::exit(1);
    });

    let router = routes::build_router(state);

    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {}", listen_addr, e);
        std::process::exit(1);
    });

    info!("dockview-console listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            eprintln!("server error: {}", e);
            std::process::exit(1);
        });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}
