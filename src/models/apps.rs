use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_APP_ICON: &str = "https://cdn.jsdelivr.net/gh/selfhst/icons/png/default.png";
pub const DEFAULT_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppEntry {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub local_url: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppsFile {
    #[serde(default)]
    pub apps: IndexMap<String, AppEntry>,
}

/// An app entry together with its key, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppBookmark {
    pub id: String,
    #[serde(flatten)]
    pub entry: AppEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppCategory {
    pub category: String,
    pub apps: Vec<AppBookmark>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub local_url: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// Derive a stable key from an app title: "My App-2" becomes "my_app_2".
pub fn app_id_from_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace([' ', '-'], "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}
