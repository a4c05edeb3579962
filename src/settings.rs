use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::paged::geometry::{DEFAULT_GAP, DEFAULT_MIN_TWO_UP_SCALE};
use crate::paged::{DEFAULT_CACHE_SIZE, DEFAULT_WORKERS};
use crate::score::ingest::DEFAULT_DURATION_FALLBACK;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "leafview";

/// External optical music recognition command.
///
/// `{input}` and `{output}` in `args` are replaced by the input document
/// and the scratch output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerSettings {
    #[serde(default = "default_recognizer_command")]
    pub command: String,

    #[serde(default = "default_recognizer_args")]
    pub args: Vec<String>,

    #[serde(default = "default_recognizer_timeout")]
    pub timeout_secs: u64,
}

impl RecognizerSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            command: default_recognizer_command(),
            args: default_recognizer_args(),
            timeout_secs: default_recognizer_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Gutter between the pages of a spread
    #[serde(default = "default_gap")]
    pub gap: f32,

    /// Smallest per-page scale at which a spread is still shown
    #[serde(default = "default_min_two_up_scale")]
    pub min_two_up_scale: f32,

    /// Viewport width used when nothing else reports one
    #[serde(default = "default_container_width")]
    pub container_width: f32,

    #[serde(default)]
    pub offset_mode: bool,

    #[serde(default = "default_render_workers")]
    pub render_workers: usize,

    #[serde(default = "default_page_cache_size")]
    pub page_cache_size: usize,

    /// Replacement for non-integer `<duration>` values
    #[serde(default = "default_duration_fallback")]
    pub duration_fallback: u32,

    #[serde(default)]
    pub recognizer: RecognizerSettings,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_gap() -> f32 {
    DEFAULT_GAP
}

fn default_min_two_up_scale() -> f32 {
    DEFAULT_MIN_TWO_UP_SCALE
}

fn default_container_width() -> f32 {
    1280.0
}

fn default_render_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_page_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_duration_fallback() -> u32 {
    DEFAULT_DURATION_FALLBACK
}

fn default_recognizer_command() -> String {
    "audiveris".to_string()
}

fn default_recognizer_args() -> Vec<String> {
    ["-batch", "-export", "-output", "{output}", "--", "{input}"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_recognizer_timeout() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            gap: default_gap(),
            min_two_up_scale: default_min_two_up_scale(),
            container_width: default_container_width(),
            offset_mode: false,
            render_workers: default_render_workers(),
            page_cache_size: default_page_cache_size(),
            duration_fallback: default_duration_fallback(),
            recognizer: RecognizerSettings::default(),
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, creating the file with
/// defaults when it does not exist yet
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

/// Parse a settings document; missing keys take their defaults
pub fn parse_settings(content: &str) -> Result<Settings, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# leafview settings
#
# gap / min_two_up_scale: a spread is shown when
#   (container_width - gap) / 2 / page_width >= min_two_up_scale
# recognizer.args: {input} is the document, {output} the scratch directory

"#;

/// Snapshot of the current settings
pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

/// Replace the in-process settings without touching the file
pub fn replace(settings: Settings) {
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}

pub fn get_container_width() -> f32 {
    SETTINGS
        .read()
        .map(|s| s.container_width)
        .unwrap_or_else(|_| default_container_width())
}

pub fn is_offset_mode() -> bool {
    SETTINGS.read().map(|s| s.offset_mode).unwrap_or(false)
}

pub fn get_recognizer() -> RecognizerSettings {
    SETTINGS
        .read()
        .map(|s| s.recognizer.clone())
        .unwrap_or_default()
}
