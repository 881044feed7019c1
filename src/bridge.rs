//! Cross-sandbox event bridge.
//!
//! The detector (host side) and the reaction coordinators (logic side) share
//! no state; they coordinate by broadcasting JSON envelopes on a shared
//! channel. Delivery is at-most-once and unacknowledged: an envelope posted
//! before a listener subscribes, or past a lagged receiver, is silently
//! lost. Relative order of envelopes from a single sender is preserved.
//!
//! Exactly three envelope kinds exist. Consumers are written to degrade
//! gracefully on any missing or duplicate envelope: a bare `Settle` is a
//! no-op, a lost `Settle` is corrected by the next `Start`/`Settle` pair.

use crate::net::TransportKind;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default envelope buffer per receiver. Small on purpose; the protocol is
/// lossy and consumers only care about the most recent cycle.
pub const BRIDGE_CAPACITY: usize = 64;

/// A bridge envelope. Field names are part of the wire format and must not
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// One-time configuration handshake, logic side → host side.
    Init {
        #[serde(rename = "urlPatterns")]
        url_patterns: Vec<String>,
        #[serde(rename = "silenceThresholdMs")]
        silence_threshold_ms: u64,
    },

    /// A generation cycle began (first matched request of a burst).
    Start {
        url: String,
        timestamp: u64,
        transport: TransportKind,
    },

    /// Matched traffic has been quiet for the silence threshold.
    Settle { url: String, timestamp: u64 },
}

impl Envelope {
    /// Per-kind validation applied on receipt, after parsing.
    ///
    /// Returns a human-readable reason when the envelope must be dropped.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Envelope::Init {
                url_patterns,
                silence_threshold_ms,
            } => {
                if url_patterns.is_empty() {
                    return Err("Init with no url patterns");
                }
                if url_patterns.iter().any(|p| p.is_empty()) {
                    return Err("Init with an empty url pattern");
                }
                if *silence_threshold_ms == 0 {
                    return Err("Init with zero silence threshold");
                }
                Ok(())
            }
            Envelope::Start { url, .. } => {
                if url.is_empty() {
                    return Err("Start with empty url");
                }
                Ok(())
            }
            Envelope::Settle { url, .. } => {
                if url.is_empty() {
                    return Err("Settle with empty url");
                }
                Ok(())
            }
        }
    }
}

/// Decode one raw wire message into a validated envelope.
///
/// Malformed JSON, unknown kinds and envelopes failing per-kind validation
/// are all dropped the same way: logged at debug, `None` returned. The wire
/// is untyped and shared; garbage on it is expected, never an error.
fn decode(raw: &str) -> Option<Envelope> {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(e) => {
            log::debug!("Dropping unparseable bridge message: {}", e);
            return None;
        }
    };
    if let Err(reason) = envelope.validate() {
        log::debug!("Dropping invalid bridge envelope: {}", reason);
        return None;
    }
    Some(envelope)
}

/// The shared broadcast channel both sandboxes post on.
#[derive(Debug)]
pub struct Bridge {
    tx: broadcast::Sender<String>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BRIDGE_CAPACITY)
    }
}

impl Bridge {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// A posting handle. Cheap to clone, usable from either sandbox.
    pub fn sender(&self) -> BridgeSender {
        BridgeSender {
            tx: self.tx.clone(),
        }
    }

    /// Register a new listener. Envelopes posted before this call are gone.
    pub fn subscribe(&self) -> BridgeReceiver {
        BridgeReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Posting half of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSender {
    tx: broadcast::Sender<String>,
}

impl BridgeSender {
    /// Serialize and post an envelope. A post with no live listeners is
    /// silently lost, matching the unacknowledged delivery contract.
    pub fn post(&self, envelope: &Envelope) {
        let raw = match serde_json::to_string(envelope) {
            Ok(raw) => raw,
            Err(e) => {
                // Envelope types are plain data; serialization cannot
                // realistically fail, but the wire must never panic.
                log::warn!("Failed to serialize bridge envelope: {}", e);
                return;
            }
        };
        log::trace!("Bridge post: {}", raw);
        if self.tx.send(raw).is_err() {
            log::trace!("Bridge envelope posted with no listeners");
        }
    }
}

/// Receiving half of the bridge.
#[derive(Debug)]
pub struct BridgeReceiver {
    rx: broadcast::Receiver<String>,
}

impl BridgeReceiver {
    /// Receive the next valid envelope.
    ///
    /// Skips malformed messages and lag gaps (lost envelopes are logged and
    /// tolerated). Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await {
                Ok(raw) => {
                    if let Some(envelope) = decode(&raw) {
                        return Some(envelope);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::debug!("Bridge receiver lagged, {} envelope(s) lost", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
