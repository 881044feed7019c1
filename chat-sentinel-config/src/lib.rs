//! Settings layer for chat-sentinel.
//!
//! Provides the [`Settings`] snapshot consumed by the reaction coordinators,
//! with YAML persistence under the platform config directory and typed
//! errors for I/O and validation failures.

pub mod defaults;
mod error;
mod settings;

pub use error::SettingsError;
pub use settings::Settings;
