//! Scroll position guarding during generation.
//!
//! Chat sites force-scroll to the bottom while an answer streams in. When
//! the user has deliberately scrolled up to read earlier turns, that is
//! hostile. This guard tracks the two inputs of that decision, "a
//! generation is running" (bridge events) and "the user scrolled up"
//! (wheel observations), and publishes the suppression intent through a
//! watch channel. It records the intent only; neutralizing the host's own
//! scroll calls is left to the embedder.

use crate::bridge::{BridgeReceiver, Envelope};
use tokio::sync::{mpsc, watch};

/// Distance from the bottom (px) beyond which the user counts as scrolled
/// up, and within which they count as back at the bottom.
pub const BOTTOM_PROXIMITY_PX: f64 = 100.0;

/// One wheel observation on the site's scroll container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSample {
    /// Wheel delta; negative scrolls up, positive scrolls down.
    pub delta_y: f64,
    /// Current distance between the viewport and the container bottom.
    pub distance_from_bottom: f64,
}

/// Tracks whether the host page's autoscroll should be suppressed.
pub struct ScrollGuard {
    enabled: bool,
    is_generating: bool,
    user_scrolled_up: bool,
    intent: watch::Sender<bool>,
}

impl ScrollGuard {
    /// Returns the guard and the receiver embedders watch for intent
    /// changes.
    pub fn new(enabled: bool) -> (Self, watch::Receiver<bool>) {
        let (intent, rx) = watch::channel(false);
        (
            Self {
                enabled,
                is_generating: false,
                user_scrolled_up: false,
                intent,
            },
            rx,
        )
    }

    pub fn should_suppress_autoscroll(&self) -> bool {
        self.enabled && self.is_generating && self.user_scrolled_up
    }

    /// Feed one bridge envelope through the guard.
    pub fn handle_envelope(&mut self, envelope: &Envelope) {
        match envelope {
            Envelope::Start { .. } => {
                self.is_generating = true;
            }
            Envelope::Settle { .. } => {
                // Scroll intent does not outlive the generation it guarded.
                self.is_generating = false;
                self.user_scrolled_up = false;
            }
            Envelope::Init { .. } => {}
        }
        self.publish();
    }

    /// Feed one wheel observation through the guard.
    pub fn handle_wheel(&mut self, sample: WheelSample) {
        if sample.delta_y < 0.0 && sample.distance_from_bottom > BOTTOM_PROXIMITY_PX {
            if !self.user_scrolled_up {
                log::debug!(
                    "User scrolled up ({}px from bottom)",
                    sample.distance_from_bottom
                );
            }
            self.user_scrolled_up = true;
        } else if sample.delta_y > 0.0 && sample.distance_from_bottom <= BOTTOM_PROXIMITY_PX {
            // Scrolled back down to the tail; let the page follow again.
            self.user_scrolled_up = false;
        }
        self.publish();
    }

    fn publish(&self) {
        self.intent.send_replace(self.should_suppress_autoscroll());
    }

    /// Consume bridge envelopes and wheel samples until the bridge closes.
    pub async fn run(
        mut self,
        mut envelopes: BridgeReceiver,
        mut wheel: mpsc::UnboundedReceiver<WheelSample>,
    ) {
        let mut wheel_open = true;
        loop {
            tokio::select! {
                envelope = envelopes.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(&envelope),
                    None => break,
                },
                sample = wheel.recv(), if wheel_open => match sample {
                    Some(sample) => self.handle_wheel(sample),
                    None => wheel_open = false,
                },
            }
        }
        log::debug!("Scroll guard stopped");
    }
}
