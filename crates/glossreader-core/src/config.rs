//! Configuration loading for the reader.
//!
//! Settings live in `conf/config.toml` (or the file named by
//! `GLOSSREADER_CONFIG_PATH`). Missing or invalid entries fall back to
//! defaults so a session can always start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::playback::{MAX_SPEECH_RATE, MIN_SPEECH_RATE};
use crate::selection::SelectionMode;
use crate::translation::{AUTO_LANGUAGE, LanguagePair};
use crate::worker::WorkerMode;

pub const CONFIG_PATH_ENV: &str = "GLOSSREADER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_source_lang")]
    pub source_lang: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    #[serde(default = "default_selection_debounce_ms")]
    pub selection_debounce_ms: u64,
    #[serde(default = "default_hover_debounce_ms")]
    pub hover_debounce_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_speech_rate")]
    pub speech_rate: f32,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_follow_playback")]
    pub follow_playback: bool,
    #[serde(default)]
    pub default_selection_mode: SelectionMode,
    #[serde(default = "default_abbreviations_path")]
    pub abbreviations_path: String,
    #[serde(default)]
    pub worker_mode: WorkerMode,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            selection_debounce_ms: default_selection_debounce_ms(),
            hover_debounce_ms: default_hover_debounce_ms(),
            page_size: default_page_size(),
            speech_rate: default_speech_rate(),
            voice: None,
            follow_playback: default_follow_playback(),
            default_selection_mode: SelectionMode::Word,
            abbreviations_path: default_abbreviations_path(),
            worker_mode: WorkerMode::Threaded,
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Clamp numeric settings into their supported ranges and normalize
    /// blank values.
    pub fn sanitized(mut self) -> Self {
        let page_size = self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        if page_size != self.page_size {
            warn!(requested = self.page_size, page_size, "Clamped page size");
            self.page_size = page_size;
        }
        let rate = if self.speech_rate.is_finite() {
            self.speech_rate.clamp(MIN_SPEECH_RATE, MAX_SPEECH_RATE)
        } else {
            default_speech_rate()
        };
        if rate != self.speech_rate {
            warn!(requested = self.speech_rate, rate, "Clamped speech rate");
            self.speech_rate = rate;
        }
        if self.source_lang.trim().is_empty() {
            self.source_lang = default_source_lang();
        }
        if self.target_lang.trim().is_empty() {
            self.target_lang = default_target_lang();
        }
        self.voice = self
            .voice
            .map(|voice| voice.trim().to_string())
            .filter(|voice| !voice.is_empty());
        self
    }

    pub fn languages(&self) -> LanguagePair {
        LanguagePair::new(self.source_lang.trim(), self.target_lang.trim())
    }

    pub fn selection_delay(&self) -> Duration {
        Duration::from_millis(self.selection_debounce_ms)
    }

    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_debounce_ms)
    }
}

fn default_source_lang() -> String {
    AUTO_LANGUAGE.to_string()
}

fn default_target_lang() -> String {
    "en".to_string()
}

fn default_selection_debounce_ms() -> u64 {
    500
}

fn default_hover_debounce_ms() -> u64 {
    300
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_speech_rate() -> f32 {
    1.0
}

fn default_follow_playback() -> bool {
    true
}

fn default_abbreviations_path() -> String {
    "conf/abbreviations.toml".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Logging verbosity.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Config file location, honoring the environment override.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg.sanitized()
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            AppConfig::default()
        }
    }
}
