//! Generation state machine (tab/notification reactor).
//!
//! Tracks the `Idle → Generating → Completed` cycle from bridge events and
//! fires completion alerts exactly once per cycle:
//! - title re-render through the user's template (always forced on settle)
//! - desktop notification when the page is backgrounded (or forced on)
//! - completion chime
//! - optional window-focus request
//!
//! Alerts are suppressed when the user already "saw" the completion: the
//! page regained foreground visibility while generating and the site's own
//! generation indicator had already stopped.

use crate::adapter::SiteAdapter;
use crate::bridge::{BridgeReceiver, Envelope};
use crate::notify::{CompletionChime, Notifier};
use crate::page::HostPage;
use crate::title::{TitleContext, TitleRenderer};
use chat_sentinel_config::Settings;
use std::sync::Arc;
use tokio::sync::mpsc;

// Status tokens substituted into the title template.
const STATUS_GENERATING: &str = "⏳";
const STATUS_COMPLETED: &str = "✅";
const STATUS_IDLE: &str = "";

/// Where the current generation cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Generating,
    Completed,
}

/// Reacts to `Start`/`Settle` with title, notification, chime and focus
/// side effects. One instance per monitored page; state resets on every
/// new cycle.
pub struct GenerationReactor {
    adapter: Arc<dyn SiteAdapter>,
    page: Arc<dyn HostPage>,
    settings: Settings,
    notifier: Notifier,
    chime: CompletionChime,
    title: TitleRenderer,
    phase: GenerationPhase,
    /// Set when the user saw the finished answer before the settle landed.
    cycle_seen: bool,
    /// Timestamp of the cycle's `Start`, for the duration in the
    /// notification body.
    started_at_ms: Option<u64>,
}

impl GenerationReactor {
    pub fn new(adapter: Arc<dyn SiteAdapter>, page: Arc<dyn HostPage>, settings: Settings) -> Self {
        let notifier = Notifier::new();
        let chime = CompletionChime::default();
        Self::with_outputs(adapter, page, settings, notifier, chime)
    }

    /// Construct with explicit alert outputs (tests, headless embedders).
    pub fn with_outputs(
        adapter: Arc<dyn SiteAdapter>,
        page: Arc<dyn HostPage>,
        settings: Settings,
        notifier: Notifier,
        chime: CompletionChime,
    ) -> Self {
        let title = TitleRenderer::new(settings.title_format.clone());
        Self {
            adapter,
            page,
            settings,
            notifier,
            chime,
            title,
            phase: GenerationPhase::Idle,
            cycle_seen: false,
            started_at_ms: None,
        }
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    /// Feed one bridge envelope through the state machine.
    pub fn handle_envelope(&mut self, envelope: &Envelope) {
        match envelope {
            Envelope::Start { timestamp, .. } => self.on_start(*timestamp),
            Envelope::Settle { timestamp, .. } => self.on_settle(*timestamp),
            Envelope::Init { .. } => {}
        }
    }

    /// The page regained or lost foreground visibility.
    ///
    /// Seeing the page while the site's own indicator reports no active
    /// generation means the user already read the answer; the upcoming
    /// settle must not alert again.
    pub fn handle_visibility_change(&mut self, visible: bool) {
        if visible && self.phase == GenerationPhase::Generating && !self.adapter.is_generating() {
            log::debug!("Completion seen by user before settle, alerts suppressed");
            self.cycle_seen = true;
        }
    }

    fn on_start(&mut self, timestamp: u64) {
        // A new start always restarts the cycle; this is also how a stuck
        // Generating state (lost settle envelope) recovers.
        if self.phase == GenerationPhase::Generating {
            log::debug!("Start while already generating, restarting cycle");
        }
        self.phase = GenerationPhase::Generating;
        self.cycle_seen = false;
        self.started_at_ms = Some(timestamp);
        log::info!("Generation started on {}", self.adapter.name());
        self.render_title(false);
    }

    fn on_settle(&mut self, timestamp: u64) {
        if self.phase != GenerationPhase::Generating {
            // Bare settle with no preceding start (lost envelope, reload).
            log::debug!("Ignoring settle in phase {:?}", self.phase);
            return;
        }
        self.phase = GenerationPhase::Completed;
        let elapsed_secs = self
            .started_at_ms
            .take()
            .map(|started| timestamp.saturating_sub(started) / 1000);
        log::info!(
            "Generation completed on {} ({}s)",
            self.adapter.name(),
            elapsed_secs.unwrap_or(0)
        );

        if self.cycle_seen {
            log::debug!("Cycle already seen, skipping completion alerts");
        } else {
            self.deliver_completion_alerts(elapsed_secs);
        }
        // The title reflects completion regardless of alert suppression.
        self.render_title(true);
    }

    fn deliver_completion_alerts(&self, elapsed_secs: Option<u64>) {
        if self.settings.desktop_notification_enabled
            && (!self.page.is_foreground() || self.settings.notify_even_when_focused)
        {
            let summary = self
                .adapter
                .conversation_title()
                .unwrap_or_else(|| self.adapter.name().to_string());
            let body = match elapsed_secs {
                Some(secs) => format!(
                    "{} finished responding after {} seconds",
                    self.adapter.name(),
                    secs
                ),
                None => format!("{} finished responding", self.adapter.name()),
            };
            self.notifier.deliver(&summary, &body);
        }
        self.chime.play(self.settings.completion_sound_volume);
        if self.settings.auto_focus_enabled {
            self.page.request_focus();
        }
    }

    fn render_title(&mut self, force: bool) {
        let status = match self.phase {
            GenerationPhase::Idle => STATUS_IDLE,
            GenerationPhase::Generating => STATUS_GENERATING,
            GenerationPhase::Completed => STATUS_COMPLETED,
        };
        let conversation = self.adapter.conversation_title().unwrap_or_default();
        let ctx = TitleContext {
            status,
            title: &conversation,
            model: &self.settings.model_label,
            site: self.adapter.name(),
        };
        self.title.render(self.page.as_ref(), &ctx, force);
    }

    /// Consume bridge envelopes and visibility changes until the bridge
    /// closes.
    pub async fn run(
        mut self,
        mut envelopes: BridgeReceiver,
        mut visibility: mpsc::UnboundedReceiver<bool>,
    ) {
        let mut visibility_open = true;
        loop {
            tokio::select! {
                envelope = envelopes.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(&envelope),
                    None => break,
                },
                visible = visibility.recv(), if visibility_open => match visible {
                    Some(visible) => self.handle_visibility_change(visible),
                    None => visibility_open = false,
                },
            }
        }
        log::debug!("Generation reactor stopped");
    }
}
