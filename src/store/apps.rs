use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::info;

use crate::error::RegistryError;
use crate::models::apps::{
    AppBookmark, AppCategory, AppEntry, AppPayload, AppsFile, DEFAULT_APP_ICON, DEFAULT_CATEGORY,
    app_id_from_title,
};

use super::{read_json, write_json};

pub struct AppStore {
    path: PathBuf,
    doc: RwLock<AppsFile>,
}

impl AppStore {
    /// Loads bookmarks; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let doc = read_json::<AppsFile>(&path)?.unwrap_or_default();
        info!("loaded {} app bookmark(s) from {}", doc.apps.len(), path.display());
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    pub fn list(&self) -> Vec<AppBookmark> {
        self.doc
            .read()
            .unwrap()
            .apps
            .iter()
            .map(|(id, entry)| bookmark(id, entry))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<AppBookmark, RegistryError> {
        self.doc
            .read()
            .unwrap()
            .apps
            .get(id)
            .map(|e| bookmark(id, e))
            .ok_or_else(|| RegistryError::NotFound(format!("app {}", id)))
    }

    /// Categories in order of first appearance, apps in list order.
    pub fn by_category(&self) -> Vec<AppCategory> {
        let mut groups: IndexMap<String, Vec<AppBookmark>> = IndexMap::new();
        for app in self.list() {
            groups
                .entry(app.entry.category.clone())
                .or_default()
                .push(app);
        }
        groups
            .into_iter()
            .map(|(category, apps)| AppCategory { category, apps })
            .collect()
    }

    pub fn add(&self, payload: &AppPayload) -> Result<AppBookmark, RegistryError> {
        let entry = validate(payload)?;
        let id = app_id_from_title(&entry.title);
        if id.is_empty() {
            return Err(RegistryError::Invalid(format!(
                "title {:?} does not yield a usable id",
                entry.title
            )));
        }
        self.mutate(|doc| {
            if doc.apps.contains_key(&id) {
                return Err(RegistryError::Conflict(format!("app {} already exists", id)));
            }
            doc.apps.insert(id.clone(), entry.clone());
            Ok(())
        })?;
        info!("added app {}", id);
        Ok(bookmark(&id, &entry))
    }

    /// Replaces an app's fields. The id stays the same even if the title
    /// changes.
    pub fn update(&self, id: &str, payload: &AppPayload) -> Result<AppBookmark, RegistryError> {
        let entry = validate(payload)?;
        self.mutate(|doc| match doc.apps.get_mut(id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(RegistryError::NotFound(format!("app {}", id))),
        })?;
        info!("updated app {}", id);
        Ok(bookmark(id, &entry))
    }

    pub fn delete(&self, id: &str) -> Result<(), RegistryError> {
        self.mutate(|doc| match doc.apps.shift_remove(id) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotFound(format!("app {}", id))),
        })?;
        info!("deleted app {}", id);
        Ok(())
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut AppsFile) -> Result<(), RegistryError>,
    ) -> Result<(), RegistryError> {
        let mut doc = self.doc.write().unwrap();
        let mut next = doc.clone();
        f(&mut next)?;
        write_json(&self.path, &next)?;
        *doc = next;
        Ok(())
    }
}

fn bookmark(id: &str, entry: &AppEntry) -> AppBookmark {
    AppBookmark {
        id: id.to_string(),
        entry: entry.clone(),
    }
}

fn validate(payload: &AppPayload) -> Result<AppEntry, RegistryError> {
    let title = payload.title.trim();
    let url = payload.url.trim();
    if title.is_empty() || url.is_empty() {
        return Err(RegistryError::Invalid("title and url are required".to_string()));
    }
    let or_default = |v: &str, default: &str| {
        let v = v.trim();
        if v.is_empty() { default.to_string() } else { v.to_string() }
    };
    Ok(AppEntry {
        title: title.to_string(),
        url: url.to_string(),
        local_url: payload.local_url.trim().to_string(),
        icon_url: or_default(&payload.icon_url, DEFAULT_APP_ICON),
        description: payload.description.trim().to_string(),
        category: or_default(&payload.category, DEFAULT_CATEGORY),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(title: &str, category: &str) -> AppPayload {
        AppPayload {
            title: title.to_string(),
            url: format!("https://{}.example", title.to_lowercase().replace(' ', "")),
            category: category.to_string(),
            ..AppPayload::default()
        }
    }

    fn store(dir: &TempDir) -> AppStore {
        AppStore::open(dir.path().join("data").join("apps.json")).unwrap()
    }

    #[test]
    fn missing_file_is_empty_until_first_write() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(s.list().is_empty());
        assert!(!dir.path().join("data").exists());

        s.add(&payload("Jellyfin", "Media")).unwrap();
        assert!(dir.path().join("data").join("apps.json").exists());
    }

    #[test]
    fn add_fills_defaults_and_derives_id() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let app = s.add(&payload("Home Assistant", "")).unwrap();
        assert_eq!(app.id, "home_assistant");
        assert_eq!(app.entry.category, "Other");
        assert_eq!(app.entry.icon_url, DEFAULT_APP_ICON);

        assert!(matches!(
            s.add(&payload("Home Assistant", "Automation")),
            Err(RegistryError::Conflict(_))
        ));
        assert!(matches!(s.add(&payload("???", "")), Err(RegistryError::Invalid(_))));
        assert!(matches!(
            s.add(&AppPayload {
                title: "No Url".to_string(),
                ..AppPayload::default()
            }),
            Err(RegistryError::Invalid(_))
        ));
    }

    #[test]
    fn round_trip_preserves_unicode_and_empty_fields() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add(&AppPayload {
            description: "Fotos für die Familie 📷".to_string(),
            local_url: String::new(),
            ..payload("Immich", "Médias")
        })
        .unwrap();
        s.add(&payload("Gitea", "Dev")).unwrap();

        let reopened = store(&dir);
        assert_eq!(reopened.list(), s.list());
        let immich = reopened.get("immich").unwrap();
        assert_eq!(immich.entry.category, "Médias");
        assert_eq!(immich.entry.local_url, "");
    }

    #[test]
    fn update_and_delete() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add(&payload("Gitea", "Dev")).unwrap();
        let app = s.update("gitea", &payload("Forgejo", "Dev")).unwrap();
        assert_eq!(app.id, "gitea");
        assert_eq!(app.entry.title, "Forgejo");

        assert!(matches!(
            s.update("nope", &payload("X", "")),
            Err(RegistryError::NotFound(_))
        ));
        s.delete("gitea").unwrap();
        assert!(matches!(s.delete("gitea"), Err(RegistryError::NotFound(_))));
        assert!(matches!(s.get("gitea"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn groups_by_first_appearance() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add(&payload("Plex", "Media")).unwrap();
        s.add(&payload("Gitea", "Dev")).unwrap();
        s.add(&payload("Sonarr", "Media")).unwrap();

        let groups = s.by_category();
        let names: Vec<_> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["Media", "Dev"]);
        let media: Vec<_> = groups[0].apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(media, vec!["plex", "sonarr"]);
    }
}
