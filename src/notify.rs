//! Desktop notification and completion chime delivery.
//!
//! Alerts fire when a generation completes while the user is elsewhere:
//! a system notification, and a short audio cue behind the `audio` feature.
//! Delivery failures are logged and swallowed; an unreachable notification
//! daemon must never take the monitoring subsystem down with it.

#[cfg(feature = "audio")]
use parking_lot::Mutex;
#[cfg(feature = "audio")]
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};
#[cfg(feature = "audio")]
use std::sync::Arc;
#[cfg(feature = "audio")]
use std::time::Duration;

/// Desktop notification sender.
pub struct Notifier {
    /// When false, notifications are logged but not delivered. Used by
    /// tests and headless embedders.
    enabled: bool,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// A notifier that only logs (safe fallback for tests/headless runs).
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Deliver a notification via the platform notification system.
    pub fn deliver(&self, title: &str, message: &str) {
        log::info!("Notification: {} — {}", title, message);
        if !self.enabled {
            return;
        }

        #[cfg(not(target_os = "macos"))]
        {
            use notify_rust::Notification;
            if let Err(e) = Notification::new()
                .summary(title)
                .body(message)
                .timeout(notify_rust::Timeout::Milliseconds(3000))
                .show()
            {
                log::warn!("Failed to send desktop notification: {}", e);
            }
        }

        #[cfg(target_os = "macos")]
        {
            // macOS notifications via osascript; quotes escaped for AppleScript.
            let escaped_title = title.replace('"', "\\\"");
            let escaped_message = message.replace('"', "\\\"");
            let script = format!(
                r#"display notification "{}" with title "{}""#,
                escaped_message, escaped_title
            );
            if let Err(e) = std::process::Command::new("osascript")
                .arg("-e")
                .arg(&script)
                .output()
            {
                log::warn!("Failed to send macOS desktop notification: {}", e);
            }
        }
    }
}

/// Completion chime player.
pub struct CompletionChime {
    /// Audio output stream handle (kept alive for the duration of the player)
    #[cfg(feature = "audio")]
    stream: Option<OutputStream>,
    /// Audio sink for playback
    #[cfg(feature = "audio")]
    sink: Option<Arc<Mutex<Sink>>>,
}

#[cfg(feature = "audio")]
impl Drop for CompletionChime {
    fn drop(&mut self) {
        // Stop and clear the sink BEFORE forgetting the stream, so the sink
        // never touches a forgotten stream's mixer.
        if let Some(sink_arc) = self.sink.take()
            && let Ok(sink) = Arc::try_unwrap(sink_arc)
        {
            let sink = sink.into_inner();
            sink.stop();
        }
        // Suppress the 'Dropping OutputStream' message by forgetting the stream
        if let Some(stream) = self.stream.take() {
            std::mem::forget(stream);
        }
    }
}

impl CompletionChime {
    /// Open the default audio output.
    #[cfg(feature = "audio")]
    pub fn new() -> Result<Self, String> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| format!("Failed to open audio stream: {}", e))?;
        let sink = Sink::connect_new(stream.mixer());
        Ok(Self {
            stream: Some(stream),
            sink: Some(Arc::new(Mutex::new(sink))),
        })
    }

    /// A silent chime (safe fallback when audio is unavailable).
    pub fn disabled() -> Self {
        #[cfg(feature = "audio")]
        {
            Self {
                stream: None,
                sink: None,
            }
        }
        #[cfg(not(feature = "audio"))]
        {
            Self {}
        }
    }

    /// Play the chime at the given volume (0-100). 0 disables it.
    pub fn play(&self, volume: u8) {
        #[cfg(feature = "audio")]
        {
            if volume == 0 {
                return;
            }
            let sink_arc = match &self.sink {
                Some(s) => s,
                None => return, // Audio disabled
            };
            let volume_f32 = (volume.min(100) as f32) / 100.0;

            // Rising two-tone cue, quiet enough not to startle
            let low = rodio::source::SineWave::new(660.0)
                .take_duration(Duration::from_millis(90))
                .amplify(volume_f32 * 0.25);
            let high = rodio::source::SineWave::new(990.0)
                .take_duration(Duration::from_millis(140))
                .amplify(volume_f32 * 0.25);

            let sink = sink_arc.lock();
            sink.append(low);
            sink.append(high);
        }
        #[cfg(not(feature = "audio"))]
        {
            let _ = volume;
        }
    }
}

impl Default for CompletionChime {
    fn default() -> Self {
        #[cfg(feature = "audio")]
        {
            Self::new().unwrap_or_else(|e| {
                log::warn!("Failed to initialize completion chime: {}", e);
                Self::disabled()
            })
        }
        #[cfg(not(feature = "audio"))]
        {
            Self::disabled()
        }
    }
}
