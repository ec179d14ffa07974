use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;

use crate::error::RegistryError;
use crate::models::hosts::{
    HostEntry, HostPayload, HostProfile, HostsFile, HostsSnapshot, LOCAL_HOST_ID,
};

use super::{read_json, write_json};

/// Named connection profiles plus the id of the active one.
///
/// Invariants kept by every mutation: at least one profile exists, the
/// default profile is never removed, and `current_host` names an existing
/// profile.
pub struct HostRegistry {
    path: PathBuf,
    doc: RwLock<HostsFile>,
}

impl HostRegistry {
    /// Loads the registry, creating the default one on first run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let (mut doc, fresh) = match read_json::<HostsFile>(&path)? {
            Some(doc) => (doc, false),
            None => (HostsFile::default(), true),
        };

        let repaired = repair(&mut doc);
        if fresh || repaired {
            write_json(&path, &doc)?;
        }
        info!(
            "loaded {} host profile(s) from {}, current {}",
            doc.hosts.len(),
            path.display(),
            doc.current_host
        );

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> HostsSnapshot {
        let doc = self.doc.read().unwrap();
        HostsSnapshot {
            hosts: profiles_of(&doc),
            current_host: doc.current_host.clone(),
        }
    }

    /// Every profile in insertion order.
    pub fn profiles(&self) -> Vec<HostProfile> {
        profiles_of(&self.doc.read().unwrap())
    }

    pub fn get(&self, id: &str) -> Result<HostProfile, RegistryError> {
        let doc = self.doc.read().unwrap();
        doc.hosts
            .get(id)
            .map(|e| HostProfile::from_entry(id, e))
            .ok_or_else(|| RegistryError::NotFound(format!("host {}", id)))
    }

    pub fn current_id(&self) -> String {
        self.doc.read().unwrap().current_host.clone()
    }

    pub fn current(&self) -> Result<HostProfile, RegistryError> {
        let id = self.current_id();
        self.get(&id)
    }

    pub fn add(&self, payload: &HostPayload) -> Result<HostProfile, RegistryError> {
        let id = validate_id(&payload.id)?;
        let entry = validate_entry(payload, false)?;
        self.mutate(|doc| {
            if doc.hosts.contains_key(&id) {
                return Err(RegistryError::Conflict(format!(
                    "host {} already exists",
                    id
                )));
            }
            doc.hosts.insert(id.clone(), entry.clone());
            Ok(())
        })?;
        info!("added host {} ({})", id, entry.address);
        Ok(HostProfile::from_entry(&id, &entry))
    }

    /// Replaces a profile's settings. The id and default flag are kept.
    pub fn update(&self, id: &str, payload: &HostPayload) -> Result<HostProfile, RegistryError> {
        let updated = self.mutate(|doc| {
            let existing = doc
                .hosts
                .get_mut(id)
                .ok_or_else(|| RegistryError::NotFound(format!("host {}", id)))?;
            let entry = validate_entry(payload, existing.is_default)?;
            *existing = entry.clone();
            Ok(entry)
        })?;
        info!("updated host {}", id);
        Ok(HostProfile::from_entry(id, &updated))
    }

    pub fn delete(&self, id: &str) -> Result<(), RegistryError> {
        self.mutate(|doc| {
            let entry = doc
                .hosts
                .get(id)
                .ok_or_else(|| RegistryError::NotFound(format!("host {}", id)))?;
            if entry.is_default || id == LOCAL_HOST_ID {
                return Err(RegistryError::Forbidden(
                    "cannot delete the default host".to_string(),
                ));
            }
            if doc.hosts.len() <= 1 {
                return Err(RegistryError::Forbidden(
                    "cannot delete the only host".to_string(),
                ));
            }
            if doc.current_host == id {
                return Err(RegistryError::Forbidden(
                    "cannot delete the active host; switch to another host first".to_string(),
                ));
            }
            doc.hosts.shift_remove(id);
            Ok(())
        })?;
        info!("deleted host {}", id);
        Ok(())
    }

    /// Makes `id` the active profile and returns the one it replaced.
    pub fn switch(&self, id: &str) -> Result<String, RegistryError> {
        let previous = self.mutate(|doc| {
            if !doc.hosts.contains_key(id) {
                return Err(RegistryError::NotFound(format!("host {}", id)));
            }
            Ok(std::mem::replace(&mut doc.current_host, id.to_string()))
        })?;
        info!("switched current host from {} to {}", previous, id);
        Ok(previous)
    }

    /// Applies `f` to a copy of the document and persists it. Memory is only
    /// updated once the file write succeeded.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut HostsFile) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut doc = self.doc.write().unwrap();
        let mut next = doc.clone();
        let out = f(&mut next)?;
        write_json(&self.path, &next)?;
        *doc = next;
        Ok(out)
    }
}

fn profiles_of(doc: &HostsFile) -> Vec<HostProfile> {
    doc.hosts
        .iter()
        .map(|(id, e)| HostProfile::from_entry(id, e))
        .collect()
}

/// Restores the invariants on a document read from disk. Returns whether
/// anything changed.
fn repair(doc: &mut HostsFile) -> bool {
    let mut changed = false;
    if doc.hosts.is_empty() {
        *doc = HostsFile::default();
        changed = true;
    }
    if !doc.hosts.contains_key(&doc.current_host) {
        if let Some(first) = doc.hosts.keys().next() {
            doc.current_host = first.clone();
            changed = true;
        }
    }
    changed
}

fn validate_id(raw: &str) -> Result<String, RegistryError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(RegistryError::Invalid("host id is required".to_string()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RegistryError::Invalid(format!(
            "host id {:?} may only contain letters, digits, '-' and '_'",
            id
        )));
    }
    Ok(id.to_string())
}

fn validate_entry(payload: &HostPayload, is_default: bool) -> Result<HostEntry, RegistryError> {
    let profile = payload.to_profile();
    if profile.name.is_empty() {
        return Err(RegistryError::Invalid("host name is required".to_string()));
    }
    if profile.address.is_empty() {
        return Err(RegistryError::Invalid("host address is required".to_string()));
    }
    Ok(HostEntry {
        name: profile.name,
        address: profile.address,
        tls_verify: profile.tls_verify,
        cert_path: profile.cert_path,
        description: profile.description,
        is_default,
    })
}
