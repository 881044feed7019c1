//! Settings snapshot management.
//!
//! This module provides settings loading, saving, and default values for the
//! monitoring subsystem. Coordinators receive an immutable clone of
//! [`Settings`] at launch; a feature toggle tears the subsystem down and
//! relaunches it with a fresh snapshot rather than mutating a live one.

use crate::SettingsError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User-facing settings consumed by the reaction coordinators.
///
/// Every field carries a serde default so partially specified YAML files
/// deserialize cleanly after upgrades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Master switch for network monitoring. When off, no interception is
    /// installed and none of the coordinators run.
    #[serde(default = "crate::defaults::network_monitor_enabled")]
    pub network_monitor_enabled: bool,

    /// Override for the per-site silence threshold, in milliseconds.
    /// `None` uses the value supplied by the site adapter.
    #[serde(default = "crate::defaults::silence_threshold_ms")]
    pub silence_threshold_ms: Option<u64>,

    /// Tab title template. Supported tokens: `{status}`, `{title}`,
    /// `{model}`, `{site}`.
    #[serde(default = "crate::defaults::title_format")]
    pub title_format: String,

    /// Label substituted for the `{model}` title token.
    #[serde(default = "crate::defaults::model_label")]
    pub model_label: String,

    /// Send a desktop notification when a generation completes unseen.
    #[serde(default = "crate::defaults::desktop_notification_enabled")]
    pub desktop_notification_enabled: bool,

    /// Notify even while the page is foregrounded.
    #[serde(default = "crate::defaults::notify_even_when_focused")]
    pub notify_even_when_focused: bool,

    /// Completion chime volume (0-100). 0 disables the chime.
    #[serde(default = "crate::defaults::completion_sound_volume")]
    pub completion_sound_volume: u8,

    /// Request window focus when a generation completes unseen.
    #[serde(default = "crate::defaults::auto_focus_enabled")]
    pub auto_focus_enabled: bool,

    /// Automatically resubmit prompts whose responses were policy-blocked.
    #[serde(default = "crate::defaults::auto_retry_enabled")]
    pub auto_retry_enabled: bool,

    /// Automatic resubmissions allowed per unique prompt fingerprint.
    #[serde(default = "crate::defaults::max_retries")]
    pub max_retries: u32,

    /// Track scroll intent while generating (anti-autoscroll).
    #[serde(default = "crate::defaults::scroll_lock_enabled")]
    pub scroll_lock_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network_monitor_enabled: crate::defaults::network_monitor_enabled(),
            silence_threshold_ms: crate::defaults::silence_threshold_ms(),
            title_format: crate::defaults::title_format(),
            model_label: crate::defaults::model_label(),
            desktop_notification_enabled: crate::defaults::desktop_notification_enabled(),
            notify_even_when_focused: crate::defaults::notify_even_when_focused(),
            completion_sound_volume: crate::defaults::completion_sound_volume(),
            auto_focus_enabled: crate::defaults::auto_focus_enabled(),
            auto_retry_enabled: crate::defaults::auto_retry_enabled(),
            max_retries: crate::defaults::max_retries(),
            scroll_lock_enabled: crate::defaults::scroll_lock_enabled(),
        }
    }
}

impl Settings {
    /// Directory holding the settings file.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chat-sentinel")
    }

    /// Full path to the settings file.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("settings.yaml")
    }

    /// Load settings from file or create the default file.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from an explicit path (used by tests).
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            log::info!("Loading settings from {:?}", path);
            let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
            let settings: Settings =
                serde_yaml_ng::from_str(&contents).map_err(SettingsError::Parse)?;
            settings.validate()?;
            Ok(settings)
        } else {
            log::info!("Settings file not found, creating default at {:?}", path);
            let settings = Self::default();
            if let Err(e) = settings.save_to(path) {
                log::error!("Failed to save default settings: {}", e);
                return Err(e);
            }
            Ok(settings)
        }
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save settings to an explicit path (used by tests).
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        let yaml = serde_yaml_ng::to_string(self).map_err(SettingsError::Parse)?;
        fs::write(path, yaml).map_err(SettingsError::Io)?;
        log::debug!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Semantic validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.silence_threshold_ms == Some(0) {
            return Err(SettingsError::Validation(
                "silence_threshold_ms override must be greater than 0".to_string(),
            ));
        }
        if self.completion_sound_volume > 100 {
            return Err(SettingsError::Validation(format!(
                "completion_sound_volume must be 0-100, got {}",
                self.completion_sound_volume
            )));
        }
        Ok(())
    }
}
