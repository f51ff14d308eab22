//! Gallery items and gallery settings
//!
//! The host CMS is an opaque persistence backend with four actions: list
//! items, save items, get settings, save settings. [`Gallery`] layers item
//! editing and the free-variant item limit on top of any backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::capabilities::Capabilities;
use crate::pdf::{DEFAULT_BASE_SCALE, MAX_SCALE, MIN_SCALE};

pub const MIN_COLUMNS: u8 = 1;
pub const MAX_COLUMNS: u8 = 6;

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("gallery store {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gallery store is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("the free variant is limited to {limit} items")]
    ItemLimit { limit: usize },

    #[error("no item with id {0}")]
    NotFound(String),

    #[error("an item with id {0} already exists")]
    Duplicate(String),

    #[error("invalid item: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl GalleryItem {
    /// New item with a generated id
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            title: title.into(),
            url: url.into(),
            thumbnail: None,
            description: None,
            added_at: Utc::now(),
        }
    }

    fn validate(&self) -> Result<(), GalleryError> {
        if self.id.trim().is_empty() {
            return Err(GalleryError::Invalid("empty id".into()));
        }
        if self.url.trim().is_empty() {
            return Err(GalleryError::Invalid(format!("item {} has no url", self.id)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySettings {
    #[serde(default = "default_columns")]
    pub columns: u8,
    #[serde(default = "default_true")]
    pub show_titles: bool,
    #[serde(default)]
    pub show_ratings: bool,
    #[serde(default = "default_scale")]
    pub default_scale: f32,
}

fn default_columns() -> u8 {
    3
}

fn default_true() -> bool {
    true
}

fn default_scale() -> f32 {
    DEFAULT_BASE_SCALE
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            show_titles: true,
            show_ratings: false,
            default_scale: default_scale(),
        }
    }
}

impl GallerySettings {
    /// Bring every field into its valid range
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.columns = self.columns.clamp(MIN_COLUMNS, MAX_COLUMNS);
        self.default_scale = if self.default_scale.is_finite() {
            self.default_scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            DEFAULT_BASE_SCALE
        };
        self
    }
}

/// Opaque persistence backend for the gallery
pub trait GalleryBackend: Send + Sync {
    fn list_items(&self) -> Result<Vec<GalleryItem>, GalleryError>;
    fn save_items(&self, items: &[GalleryItem]) -> Result<(), GalleryError>;
    fn get_settings(&self) -> Result<GallerySettings, GalleryError>;
    fn save_settings(&self, settings: &GallerySettings) -> Result<(), GalleryError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GalleryDocument {
    #[serde(default)]
    items: Vec<GalleryItem>,
    #[serde(default)]
    settings: GallerySettings,
}

/// Gallery stored as one JSON document on disk
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `gallery.json` next to the settings file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(crate::settings::APP_NAME).join("gallery.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> GalleryError {
        GalleryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> Result<GalleryDocument, GalleryError> {
        if !self.path.exists() {
            return Ok(GalleryDocument::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, doc: &GalleryDocument) -> Result<(), GalleryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let content = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, content).map_err(|e| self.io_error(e))?;
        log::debug!("Saved gallery to {:?}", self.path);
        Ok(())
    }
}

impl GalleryBackend for JsonFileBackend {
    fn list_items(&self) -> Result<Vec<GalleryItem>, GalleryError> {
        Ok(self.read()?.items)
    }

    fn save_items(&self, items: &[GalleryItem]) -> Result<(), GalleryError> {
        let mut doc = self.read()?;
        doc.items = items.to_vec();
        self.write(&doc)
    }

    fn get_settings(&self) -> Result<GallerySettings, GalleryError> {
        Ok(self.read()?.settings)
    }

    fn save_settings(&self, settings: &GallerySettings) -> Result<(), GalleryError> {
        let mut doc = self.read()?;
        doc.settings = settings.clone();
        self.write(&doc)
    }
}

/// Backend that keeps everything in memory
#[derive(Default)]
pub struct MemoryBackend {
    doc: Mutex<GalleryDocument>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GalleryBackend for MemoryBackend {
    fn list_items(&self) -> Result<Vec<GalleryItem>, GalleryError> {
        Ok(self
            .doc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .items
            .clone())
    }

    fn save_items(&self, items: &[GalleryItem]) -> Result<(), GalleryError> {
        self.doc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .items = items.to_vec();
        Ok(())
    }

    fn get_settings(&self) -> Result<GallerySettings, GalleryError> {
        Ok(self
            .doc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .settings
            .clone())
    }

    fn save_settings(&self, settings: &GallerySettings) -> Result<(), GalleryError> {
        self.doc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .settings = settings.clone();
        Ok(())
    }
}

/// Gallery editing over a backend, gated by the session's capabilities
pub struct Gallery<B: GalleryBackend> {
    backend: B,
    capabilities: Capabilities,
}

impl<B: GalleryBackend> Gallery<B> {
    pub fn new(backend: B, capabilities: Capabilities) -> Self {
        Self {
            backend,
            capabilities,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn items(&self) -> Result<Vec<GalleryItem>, GalleryError> {
        self.backend.list_items()
    }

    pub fn item(&self, id: &str) -> Result<GalleryItem, GalleryError> {
        self.items()?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| GalleryError::NotFound(id.to_string()))
    }

    /// Replace the whole list, enforcing ids, urls and the item limit
    pub fn save_items(&self, items: &[GalleryItem]) -> Result<(), GalleryError> {
        if let Some(limit) = self.capabilities.item_limit() {
            if items.len() > limit {
                return Err(GalleryError::ItemLimit { limit });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for item in items {
            item.validate()?;
            if !seen.insert(item.id.as_str()) {
                return Err(GalleryError::Duplicate(item.id.clone()));
            }
        }

        self.backend.save_items(items)
    }

    pub fn add_item(&self, item: GalleryItem) -> Result<(), GalleryError> {
        let mut items = self.items()?;
        items.push(item);
        self.save_items(&items)
    }

    pub fn remove_item(&self, id: &str) -> Result<GalleryItem, GalleryError> {
        let mut items = self.items()?;
        let pos = items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| GalleryError::NotFound(id.to_string()))?;
        let removed = items.remove(pos);
        self.backend.save_items(&items)?;
        Ok(removed)
    }

    /// Move an item to `index` (clamped to the end of the list)
    pub fn move_item(&self, id: &str, index: usize) -> Result<(), GalleryError> {
        let mut items = self.items()?;
        let pos = items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| GalleryError::NotFound(id.to_string()))?;
        let item = items.remove(pos);
        items.insert(index.min(items.len()), item);
        self.backend.save_items(&items)
    }

    /// Stored settings; ratings are hidden in the free variant
    pub fn settings(&self) -> Result<GallerySettings, GalleryError> {
        let mut settings = self.backend.get_settings()?.normalized();
        if !self.capabilities.ratings_enabled() {
            settings.show_ratings = false;
        }
        Ok(settings)
    }

    pub fn save_settings(&self, settings: GallerySettings) -> Result<(), GalleryError> {
        self.backend.save_settings(&settings.normalized())
    }
}
