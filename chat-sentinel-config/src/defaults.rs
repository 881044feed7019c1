//! Default value functions for settings.
//!
//! Each `default_*`-style free function here is referenced from
//! `#[serde(default = "crate::defaults::...")]` attributes on `Settings`
//! fields, so that partially specified YAML files pick up the same values
//! as `Settings::default()`.

/// Network monitoring (and therefore all downstream reactions) on by default.
pub fn network_monitor_enabled() -> bool {
    true
}

/// No per-user override; each site adapter supplies its own silence threshold.
pub fn silence_threshold_ms() -> Option<u64> {
    None
}

/// Tab title template. Supported tokens: `{status}`, `{title}`, `{model}`, `{site}`.
pub fn title_format() -> String {
    "{status} {title}".to_string()
}

/// Model label substituted for the `{model}` title token.
pub fn model_label() -> String {
    String::new()
}

pub fn desktop_notification_enabled() -> bool {
    true
}

/// When true, completion notifications fire even while the page is foregrounded.
pub fn notify_even_when_focused() -> bool {
    false
}

/// Completion chime volume (0-100). 0 disables the chime.
pub fn completion_sound_volume() -> u8 {
    40
}

pub fn auto_focus_enabled() -> bool {
    false
}

pub fn auto_retry_enabled() -> bool {
    true
}

/// Automatic resubmissions allowed per unique prompt fingerprint.
pub fn max_retries() -> u32 {
    3
}

pub fn scroll_lock_enabled() -> bool {
    true
}
