//! Subsystem lifecycle wiring.
//!
//! Two agents, one per sandbox, share nothing but the bridge:
//!
//! - [`PageAgent`] (host side) waits for the `Init` handshake and runs the
//!   quiescence detector over the page network substrate.
//! - [`LogicAgent`] (isolated side) posts `Init` and runs the three reaction
//!   coordinators, each on its own bridge subscription.
//!
//! Spawn the page agent before launching the logic agent, so the `Init`
//! envelope finds its listener. Both agents are created once per page load
//! and torn down/recreated on a feature toggle; nothing survives the
//! process.

use crate::adapter::SiteAdapter;
use crate::bridge::{Bridge, Envelope};
use crate::generation::GenerationReactor;
use crate::net::PageNetwork;
use crate::page::HostPage;
use crate::quiescence::{MonitorConfig, QuiescenceDetector, ValidationHook};
use crate::retry::RetryCoordinator;
use crate::scroll_guard::{ScrollGuard, WheelSample};
use anyhow::{Result, bail};
use chat_sentinel_config::Settings;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Host-side agent: owns the detector, configured over the bridge.
pub struct PageAgent {
    detector: QuiescenceDetector,
    task: JoinHandle<()>,
}

impl PageAgent {
    /// Subscribe for `Init` and spawn the configuration listener. The
    /// detector stays dormant until a valid `Init` arrives.
    pub fn spawn(
        network: Arc<PageNetwork>,
        bridge: &Bridge,
        validation: Option<ValidationHook>,
    ) -> Self {
        let detector = QuiescenceDetector::new(network, bridge.sender(), validation);
        let mut envelopes = bridge.subscribe();
        let listener = detector.clone();
        let task = tokio::spawn(async move {
            while let Some(envelope) = envelopes.recv().await {
                if let Envelope::Init {
                    url_patterns,
                    silence_threshold_ms,
                } = envelope
                {
                    log::info!("Monitor config received over bridge");
                    // A repeated Init reconfigures. Stop-then-start is safe:
                    // both calls are idempotent and the pair equals a fresh
                    // instance.
                    listener.stop();
                    listener.start(MonitorConfig {
                        url_patterns,
                        silence_threshold_ms,
                    });
                }
            }
            log::debug!("Page agent bridge closed");
        });
        Self { detector, task }
    }

    /// Direct detector access (diagnostics, tests).
    pub fn detector(&self) -> &QuiescenceDetector {
        &self.detector
    }

    /// Stop listening and tear the detector down, restoring the original
    /// network hooks.
    pub fn shutdown(&self) {
        self.task.abort();
        self.detector.stop();
    }
}

impl Drop for PageAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Isolated-side agent: the three reaction coordinators plus their host
/// event inlets.
pub struct LogicAgent {
    visibility_tx: mpsc::UnboundedSender<bool>,
    wheel_tx: mpsc::UnboundedSender<WheelSample>,
    scroll_intent: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl LogicAgent {
    /// Launch the coordinators and post the one-time `Init`.
    ///
    /// Fails when monitoring is disabled in settings or the adapter exposes
    /// no monitor config; both mean there is nothing to run.
    pub fn launch(
        adapter: Arc<dyn SiteAdapter>,
        page: Arc<dyn HostPage>,
        settings: Settings,
        bridge: &Bridge,
    ) -> Result<Self> {
        if !settings.network_monitor_enabled {
            bail!("network monitoring is disabled in settings");
        }
        let Some(mut config) = adapter.network_monitor_config() else {
            bail!("site adapter {} exposes no monitor config", adapter.name());
        };
        if let Some(threshold_ms) = settings.silence_threshold_ms {
            log::debug!("Silence threshold overridden to {} ms", threshold_ms);
            config.silence_threshold_ms = threshold_ms;
        }

        // Subscribe every consumer before posting Init so the detector's
        // first events cannot slip past them.
        let generation_rx = bridge.subscribe();
        let retry_rx = bridge.subscribe();
        let scroll_rx = bridge.subscribe();

        let (visibility_tx, visibility_rx) = mpsc::unbounded_channel();
        let (wheel_tx, wheel_rx) = mpsc::unbounded_channel();

        let generation =
            GenerationReactor::new(Arc::clone(&adapter), Arc::clone(&page), settings.clone());
        let retry = RetryCoordinator::new(Arc::clone(&adapter), Arc::clone(&page), settings.clone());
        let (scroll, scroll_intent) = ScrollGuard::new(settings.scroll_lock_enabled);

        let tasks = vec![
            tokio::spawn(generation.run(generation_rx, visibility_rx)),
            tokio::spawn(retry.run(retry_rx)),
            tokio::spawn(scroll.run(scroll_rx, wheel_rx)),
        ];

        bridge.sender().post(&Envelope::Init {
            url_patterns: config.url_patterns,
            silence_threshold_ms: config.silence_threshold_ms,
        });
        log::info!("Logic agent launched for {}", adapter.name());

        Ok(Self {
            visibility_tx,
            wheel_tx,
            scroll_intent,
            tasks,
        })
    }

    /// Forward a page visibility change to the generation reactor.
    pub fn notify_visibility(&self, visible: bool) {
        let _ = self.visibility_tx.send(visible);
    }

    /// Forward a wheel observation to the scroll guard.
    pub fn observe_wheel(&self, sample: WheelSample) {
        let _ = self.wheel_tx.send(sample);
    }

    /// Watch handle on the autoscroll-suppression intent.
    pub fn scroll_intent(&self) -> watch::Receiver<bool> {
        self.scroll_intent.clone()
    }

    /// Abort the coordinator tasks.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for LogicAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}
