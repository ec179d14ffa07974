use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::{ConnectionError, RuntimeError};
use crate::models::hosts::HostProfile;
use crate::models::records::VersionInfo;

use super::{RuntimeClient, RuntimeFactory, RuntimeHandle, Strategy};

/// Last verified handle per profile id. A single lock covers all profiles;
/// it is never held across an await.
#[derive(Default)]
pub struct HandleCache {
    handles: Mutex<HashMap<String, RuntimeHandle>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, profile_id: &str) -> Option<RuntimeHandle> {
        self.handles.lock().unwrap().get(profile_id).cloned()
    }

    pub fn replace(&self, handle: RuntimeHandle) {
        self.handles
            .lock()
            .unwrap()
            .insert(handle.profile_id.clone(), handle);
    }

    pub fn invalidate(&self, profile_id: &str) -> bool {
        self.handles.lock().unwrap().remove(profile_id).is_some()
    }

    /// Drops the entry only if it still holds `stale`, so a handle installed
    /// by a concurrent request is left alone.
    pub fn invalidate_if_same(&self, stale: &RuntimeHandle) {
        let mut handles = self.handles.lock().unwrap();
        if handles
            .get(&stale.profile_id)
            .is_some_and(|h| h.same_client(stale))
        {
            handles.remove(&stale.profile_id);
        }
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectTimeouts {
    pub connect: Duration,
    pub test: Duration,
    pub probe: Duration,
}

pub struct Connector {
    factory: Arc<dyn RuntimeFactory>,
    cache: Arc<HandleCache>,
    timeouts: ConnectTimeouts,
}

impl Connector {
    pub fn new(
        factory: Arc<dyn RuntimeFactory>,
        cache: Arc<HandleCache>,
        timeouts: ConnectTimeouts,
    ) -> Self {
        Self {
            factory,
            cache,
            timeouts,
        }
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    pub fn invalidate(&self, profile_id: &str) {
        if self.cache.invalidate(profile_id) {
            debug!("dropped cached handle for {}", profile_id);
        }
    }

    /// Returns a live handle for the profile, reusing the cached one when it
    /// still answers a ping.
    pub async fn connect(&self, profile: &HostProfile) -> Result<RuntimeHandle, ConnectionError> {
        if let Some(cached) = self.cache.get(&profile.id) {
            match time::timeout(self.timeouts.probe, cached.client.ping()).await {
                Ok(Ok(())) => return Ok(cached),
                Ok(Err(e)) => warn!("cached handle for {} failed ping: {}", profile.id, e),
                Err(_) => warn!("cached handle for {} timed out on ping", profile.id),
            }
            self.cache.invalidate_if_same(&cached);
        }

        info!("connecting to host '{}': {}", profile.name, profile.address);
        let (client, version) = self.establish(profile, self.timeouts.connect).await?;
        info!(
            "connected to {} (engine {}, api {})",
            profile.id, version.version, version.api_version
        );

        let handle = RuntimeHandle {
            profile_id: profile.id.clone(),
            client,
        };
        self.cache.replace(handle.clone());
        Ok(handle)
    }

    /// Runs the strategy sequence with the shorter test timeout. The cache is
    /// not touched.
    pub async fn probe_unsaved(
        &self,
        profile: &HostProfile,
    ) -> Result<(Arc<dyn RuntimeClient>, VersionInfo), ConnectionError> {
        self.establish(profile, self.timeouts.test).await
    }

    pub fn test_timeout(&self) -> Duration {
        self.timeouts.test
    }

    async fn establish(
        &self,
        profile: &HostProfile,
        timeout: Duration,
    ) -> Result<(Arc<dyn RuntimeClient>, VersionInfo), ConnectionError> {
        if profile.address.trim().is_empty() {
            return Err(ConnectionError {
                address: profile.address.clone(),
                message: "host address is empty".to_string(),
            });
        }

        let mut last_error = String::from("no connection strategy applicable");

        for strategy in Strategy::plan(profile) {
            debug!("attempting {} for {}", strategy, profile.id);
            let client = match self.factory.open(&strategy, timeout) {
                Ok(c) => c,
                Err(e) => {
                    warn!("{} failed for {}: {}", strategy, profile.id, e);
                    last_error = e.to_string();
                    continue;
                }
            };

            match time::timeout(timeout, client.version()).await {
                Ok(Ok(version)) => return Ok((client, version)),
                Ok(Err(e)) => {
                    warn!("{} failed for {}: {}", strategy, profile.id, e);
                    last_error = e.to_string();
                }
                Err(_) => {
                    let e = RuntimeError::Timeout(timeout.as_millis());
                    warn!("{} failed for {}: {}", strategy, profile.id, e);
                    last_error = e.to_string();
                }
            }
        }

        warn!("all connection strategies failed for {}", profile.id);
        Err(ConnectionError {
            address: profile.address.clone(),
            message: last_error,
        })
    }
}
