//! Automatic policy-retry coordination.
//!
//! After every settle, once the page has had a moment to render the final
//! turn, the coordinator looks for a policy-block marker in that turn. A
//! blocked prompt is resubmitted automatically, at most `max_retries`
//! times per unique prompt text, keyed by a SHA-256 fingerprint so the
//! budget survives reformatting of the surrounding DOM but not edits to
//! the prompt itself. Budgets live for the page session only.

use crate::adapter::SiteAdapter;
use crate::bridge::{BridgeReceiver, Envelope};
use crate::dom;
use crate::page::HostPage;
use chat_sentinel_config::Settings;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Grace delay after a settle before inspecting the DOM, so the page can
/// finish rendering the turn.
pub const RETRY_GRACE_MS: u64 = 500;

/// Pause between re-inserting the prompt and firing the submit control.
pub const RESUBMIT_PAUSE_MS: u64 = 300;

/// 256-bit digest of prompt text; the retry-budget key.
///
/// Identical text always maps to the same fingerprint, independent of how
/// many times it is blocked or what the page did to the markup around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptFingerprint([u8; 32]);

impl PromptFingerprint {
    pub fn of(text: &str) -> Self {
        Self(Sha256::digest(text.as_bytes()).into())
    }
}

impl fmt::Display for PromptFingerprint {
    /// Short hex prefix, enough to correlate log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Per-fingerprint retry bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryRecord {
    /// Resubmissions performed so far. Never reset within a session.
    pub attempts: u32,
}

/// Watches settled turns for policy blocks and resubmits within budget.
pub struct RetryCoordinator {
    adapter: Arc<dyn SiteAdapter>,
    page: Arc<dyn HostPage>,
    settings: Settings,
    /// Keyed by prompt fingerprint. Entries are never pruned within a
    /// session; the map is bounded by the number of distinct blocked
    /// prompts, which stays small in practice.
    records: HashMap<PromptFingerprint, RetryRecord>,
}

impl RetryCoordinator {
    pub fn new(adapter: Arc<dyn SiteAdapter>, page: Arc<dyn HostPage>, settings: Settings) -> Self {
        Self {
            adapter,
            page,
            settings,
            records: HashMap::new(),
        }
    }

    /// Attempts recorded for a prompt text. Diagnostics and tests.
    pub fn attempts_for(&self, prompt: &str) -> u32 {
        self.records
            .get(&PromptFingerprint::of(prompt))
            .map(|r| r.attempts)
            .unwrap_or(0)
    }

    /// React to one settle: wait out the render grace period, look for a
    /// block marker in the latest turn, resubmit if the budget allows.
    pub async fn handle_settle(&mut self) {
        if !self.settings.auto_retry_enabled {
            return;
        }
        tokio::time::sleep(Duration::from_millis(RETRY_GRACE_MS)).await;

        let Some(turn) = self.adapter.latest_turn() else {
            log::debug!("No conversation turn found after settle");
            return;
        };
        let marker = self.adapter.blocked_marker_selector();
        if dom::find_matching(&turn, marker).is_none() {
            return;
        }
        log::info!("Policy-blocked response detected in latest turn");

        let Some(prompt) = self.adapter.extract_user_query_text(&turn) else {
            log::warn!("Blocked turn found but prompt text could not be recovered");
            return;
        };
        if prompt.is_empty() {
            log::warn!("Blocked turn found but prompt text is empty");
            return;
        }

        let max_retries = self.settings.max_retries;
        let fingerprint = PromptFingerprint::of(&prompt);
        let record = self.records.entry(fingerprint).or_default();
        if record.attempts >= max_retries {
            log::info!(
                "Retry budget exhausted for prompt {} ({}/{})",
                fingerprint,
                record.attempts,
                max_retries
            );
            self.page.show_toast(&format!(
                "Auto-retry given up: {} attempts used for this prompt",
                max_retries
            ));
            return;
        }
        record.attempts += 1;
        let attempt = record.attempts;
        log::info!(
            "Retrying blocked prompt {} (attempt {}/{})",
            fingerprint,
            attempt,
            max_retries
        );
        self.page.show_toast(&format!(
            "Blocked response — retrying ({}/{})",
            attempt, max_retries
        ));
        self.resubmit(&prompt).await;
    }

    /// Clear the input, put the original prompt back, and submit it with a
    /// two-tier fallback: a submit control if one exists, otherwise a
    /// synthetic Enter sequence on the input itself.
    async fn resubmit(&self, prompt: &str) {
        self.adapter.clear_textarea();
        if !self.adapter.insert_prompt(prompt) {
            log::warn!("Could not re-insert prompt text, abandoning retry");
            return;
        }
        tokio::time::sleep(Duration::from_millis(RESUBMIT_PAUSE_MS)).await;

        for selector in self.adapter.submit_button_selectors() {
            if let Some(button) = self.page.query(&selector)
                && button.click()
            {
                log::debug!("Resubmitted via submit control {}", selector);
                return;
            }
        }
        if let Some(textarea) = self.adapter.find_textarea()
            && dom::synthetic_enter(&textarea)
        {
            log::debug!("Resubmitted via synthetic Enter");
            return;
        }
        log::warn!("No submit control accepted the retry");
    }

    /// Consume bridge envelopes until the bridge closes.
    pub async fn run(mut self, mut envelopes: BridgeReceiver) {
        while let Some(envelope) = envelopes.recv().await {
            if matches!(envelope, Envelope::Settle { .. }) {
                self.handle_settle().await;
            }
        }
        log::debug!("Retry coordinator stopped");
    }
}
