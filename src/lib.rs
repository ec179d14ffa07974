pub mod aggregator;
pub mod config;
pub mod error;
pub mod formatter;
pub mod helpers;
pub mod models;
pub mod routes;
pub mod runtime;
pub mod store;

use std::sync::Arc;

use aggregator::{Aggregator, QueryTimeouts};
use config::Config;
use error::RegistryError;
use formatter::{FormatSettings, Formatter};
use runtime::RuntimeFactory;
use runtime::connector::{ConnectTimeouts, Connector, HandleCache};
use store::apps::AppStore;
use store::hosts::HostRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<HostRegistry>,
    pub apps: Arc<AppStore>,
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    /// Opens both stores and wires the connector, formatter and aggregator
    /// around `factory`.
    pub fn new(config: Config, factory: Arc<dyn RuntimeFactory>) -> Result<Self, RegistryError> {
        let registry = HostRegistry::open(&config.hosts_file)?;
        let apps = AppStore::open(&config.apps_file)?;

        let t = &config.timeouts;
        let connector = Connector::new(
            factory,
            Arc::new(HandleCache::new()),
            ConnectTimeouts {
                connect: t.connect(),
                test: t.test_connect(),
                probe: t.probe(),
            },
        );
        let formatter = Formatter::new(FormatSettings {
            stats_enabled: config.stats_enabled,
            host_url: config.host_url.clone(),
        });
        let aggregator = Aggregator::new(
            Arc::new(connector),
            formatter,
            QueryTimeouts {
                query: t.query(),
                bulk_sample: t.bulk_sample(),
                detail_sample: t.detail_sample(),
            },
        );

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            apps: Arc::new(apps),
            aggregator: Arc::new(aggregator),
        })
    }
}
