use anyhow::Context;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::pdf::{
    DEFAULT_BASE_SCALE, DEFAULT_OVERLAY_CACHE_SIZE, MAX_SCALE, MIN_SCALE, SessionConfig,
    ZOOM_MAGNIFICATION, ZOOM_STEP, positive_or,
};

pub const CURRENT_VERSION: u32 = 2;
const SETTINGS_FILENAME: &str = "config.yaml";
pub const APP_NAME: &str = "pdf-gallery";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Base display scale; v1 files call it `pdf_scale`
    #[serde(default = "default_base_scale", alias = "pdf_scale")]
    pub base_scale: f32,

    #[serde(default = "default_min_scale")]
    pub min_scale: f32,

    #[serde(default = "default_max_scale")]
    pub max_scale: f32,

    #[serde(default = "default_zoom_step")]
    pub zoom_step: f32,

    #[serde(default = "default_magnification")]
    pub zoom_magnification: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratings_endpoint: Option<String>,

    /// Anonymous visitor identifier sent with ratings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,

    /// Persisted license flag
    #[serde(default)]
    pub pro: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub onboarding_views: BTreeMap<String, u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dismissed_notices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery_file: Option<PathBuf>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_base_scale() -> f32 {
    DEFAULT_BASE_SCALE
}

fn default_min_scale() -> f32 {
    MIN_SCALE
}

fn default_max_scale() -> f32 {
    MAX_SCALE
}

fn default_zoom_step() -> f32 {
    ZOOM_STEP
}

fn default_magnification() -> f32 {
    ZOOM_MAGNIFICATION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            base_scale: default_base_scale(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            zoom_step: default_zoom_step(),
            zoom_magnification: default_magnification(),
            ratings_endpoint: None,
            visitor_id: None,
            pro: false,
            onboarding_views: BTreeMap::new(),
            dismissed_notices: Vec::new(),
            gallery_file: None,
        }
    }
}

impl Settings {
    /// Render session tunables
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            base_scale: self.base_scale,
            min_scale: self.min_scale,
            max_scale: self.max_scale,
            zoom_step: self.zoom_step,
            magnification: self.zoom_magnification,
            overlay_cache_size: DEFAULT_OVERLAY_CACHE_SIZE,
        }
    }
}

/// Settings plus the file they persist to.
///
/// Ephemeral stores never touch disk.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: Settings,
}

impl SettingsStore {
    pub fn ephemeral() -> Self {
        Self::default()
    }

    /// Load from `path`, creating the file with defaults when missing.
    ///
    /// A file that fails to parse is left untouched and defaults are used.
    pub fn load_from(path: &Path) -> Self {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            settings: Settings::default(),
        };

        if !path.exists() {
            info!("Settings file not found, creating with defaults at {path:?}");
            store.save_or_log();
            return store;
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
                Ok(mut settings) => {
                    debug!("Loaded settings from {path:?}");
                    let migrated = settings.version < CURRENT_VERSION;
                    if migrated {
                        migrate_settings(&mut settings);
                    }
                    normalize_settings(&mut settings);
                    store.settings = settings;
                    if migrated {
                        store.save_or_log();
                    }
                }
                Err(e) => error!("Failed to parse settings file {path:?}: {e}"),
            },
            Err(e) => error!("Failed to read settings file {path:?}: {e}"),
        }

        store
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating config directory {parent:?}"))?;
            }
        }

        let body = serde_yaml::to_string(&self.settings).context("serializing settings")?;
        fs::write(path, format!("{SETTINGS_HEADER}{body}"))
            .with_context(|| format!("writing settings to {path:?}"))?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    fn save_or_log(&self) {
        if let Err(e) = self.save() {
            error!("Failed to save settings: {e:#}");
        }
    }

    /// Mutate and persist
    pub fn update(&mut self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings);
        self.save_or_log();
    }

    pub fn set_base_scale(&mut self, scale: f32) {
        let scale = if scale.is_finite() {
            scale.clamp(self.settings.min_scale, self.settings.max_scale)
        } else {
            DEFAULT_BASE_SCALE
        };
        self.update(|s| s.base_scale = scale);
    }

    pub fn set_pro(&mut self, pro: bool) {
        self.update(|s| s.pro = pro);
    }

    pub fn set_ratings_endpoint(&mut self, endpoint: Option<String>) {
        self.update(|s| s.ratings_endpoint = endpoint);
    }

    /// Visitor id, generated and persisted on first use
    pub fn visitor_id(&mut self) -> String {
        if let Some(id) = &self.settings.visitor_id {
            return id.clone();
        }
        let id = uuid::Uuid::new_v4().to_string();
        info!("Generated visitor id {id}");
        self.update(|s| s.visitor_id = Some(id.clone()));
        id
    }

    /// Count one more view of an onboarding screen, returning the new count
    pub fn record_onboarding_view(&mut self, screen: &str) -> u32 {
        let mut count = 0;
        self.update(|s| {
            let views = s.onboarding_views.entry(screen.to_string()).or_insert(0);
            *views = views.saturating_add(1);
            count = *views;
        });
        count
    }

    #[must_use]
    pub fn onboarding_views(&self, screen: &str) -> u32 {
        self.settings
            .onboarding_views
            .get(screen)
            .copied()
            .unwrap_or(0)
    }

    pub fn dismiss_notice(&mut self, notice: &str) {
        if self.is_notice_dismissed(notice) {
            return;
        }
        self.update(|s| s.dismissed_notices.push(notice.to_string()));
    }

    #[must_use]
    pub fn is_notice_dismissed(&self, notice: &str) -> bool {
        self.settings.dismissed_notices.iter().any(|n| n == notice)
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // v1 kept only the base scale (as `pdf_scale`); serde's alias handles the
    // rename, and bounds that v1 never stored come from defaults.
    settings.version = CURRENT_VERSION;
}

/// Replace scales and magnification that cannot drive a render session
fn normalize_settings(settings: &mut Settings) {
    let before = (
        settings.base_scale,
        settings.min_scale,
        settings.max_scale,
        settings.zoom_step,
        settings.zoom_magnification,
    );

    settings.min_scale = positive_or(settings.min_scale, MIN_SCALE);
    settings.max_scale = positive_or(settings.max_scale, MAX_SCALE);
    if settings.min_scale > settings.max_scale {
        std::mem::swap(&mut settings.min_scale, &mut settings.max_scale);
    }
    settings.zoom_step = positive_or(settings.zoom_step, ZOOM_STEP);
    settings.zoom_magnification = positive_or(settings.zoom_magnification, ZOOM_MAGNIFICATION);
    settings.base_scale = positive_or(settings.base_scale, DEFAULT_BASE_SCALE)
        .clamp(settings.min_scale, settings.max_scale);

    let after = (
        settings.base_scale,
        settings.min_scale,
        settings.max_scale,
        settings.zoom_step,
        settings.zoom_magnification,
    );
    if before != after {
        warn!("Adjusted invalid scale settings {before:?} to {after:?}");
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pdf-gallery settings
# ============================================================================
# base_scale / min_scale / max_scale / zoom_step: page display scale and bounds
# zoom_magnification: click-to-zoom overlay magnification
# ratings_endpoint: URL of the ratings service (omit to disable ratings)

"#;

static SETTINGS: LazyLock<RwLock<SettingsStore>> =
    LazyLock::new(|| RwLock::new(SettingsStore::ephemeral()));

/// Default location of the settings file
pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Initialize the process-wide settings from the default location
pub fn load_settings() {
    match preferred_config_path() {
        Some(path) => load_settings_from(&path),
        None => warn!("Could not determine config directory, using default settings"),
    }
}

/// Initialize the process-wide settings from `path`
pub fn load_settings_from(path: &Path) {
    let store = SettingsStore::load_from(path);
    if let Ok(mut global) = SETTINGS.write() {
        *global = store;
    }
}

/// Replace the process-wide settings with defaults that are never saved
pub fn reset_to_ephemeral() {
    if let Ok(mut global) = SETTINGS.write() {
        *global = SettingsStore::ephemeral();
    }
}

// Public API for accessing/modifying the process-wide settings

pub fn snapshot() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.settings().clone())
        .unwrap_or_default()
}

pub fn session_config() -> SessionConfig {
    snapshot().session_config()
}

pub fn get_base_scale() -> f32 {
    SETTINGS
        .read()
        .map(|s| s.settings().base_scale)
        .unwrap_or_else(|_| default_base_scale())
}

pub fn set_base_scale(scale: f32) {
    if let Ok(mut store) = SETTINGS.write() {
        store.set_base_scale(scale);
    }
}

pub fn is_pro() -> bool {
    SETTINGS.read().map(|s| s.settings().pro).unwrap_or(false)
}

pub fn set_pro(pro: bool) {
    if let Ok(mut store) = SETTINGS.write() {
        store.set_pro(pro);
    }
}

pub fn get_ratings_endpoint() -> Option<String> {
    SETTINGS
        .read()
        .ok()
        .and_then(|s| s.settings().ratings_endpoint.clone())
}

pub fn set_ratings_endpoint(endpoint: Option<String>) {
    if let Ok(mut store) = SETTINGS.write() {
        store.set_ratings_endpoint(endpoint);
    }
}

pub fn get_gallery_file() -> Option<PathBuf> {
    SETTINGS
        .read()
        .ok()
        .and_then(|s| s.settings().gallery_file.clone())
}

pub fn visitor_id() -> String {
    SETTINGS
        .write()
        .map(|mut s| s.visitor_id())
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}

pub fn record_onboarding_view(screen: &str) -> u32 {
    SETTINGS
        .write()
        .map(|mut s| s.record_onboarding_view(screen))
        .unwrap_or(0)
}

pub fn dismiss_notice(notice: &str) {
    if let Ok(mut store) = SETTINGS.write() {
        store.dismiss_notice(notice);
    }
}

pub fn is_notice_dismissed(notice: &str) -> bool {
    SETTINGS
        .read()
        .map(|s| s.is_notice_dismissed(notice))
        .unwrap_or(false)
}
