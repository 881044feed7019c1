//! Activity-quiescence detection.
//!
//! Infers when a remote streaming answer has finished purely from the
//! timing of network calls whose URLs match configured substrings; the
//! host page offers no cooperation. The detector runs on the host side,
//! intercepts traffic through the [`PageNetwork`] substrate, and posts
//! `Start`/`Settle` envelopes on the bridge:
//!
//! - The first matched call of a burst emits `Start`, guarded by a one-shot
//!   debounce gate so N overlapping calls produce exactly one `Start`.
//! - Every completion (success, error and abort alike) decrements the
//!   in-flight counter and re-arms the settle timer. For streamed bodies,
//!   completion means full drain of a teed clone, not header arrival.
//! - When the timer fires with zero calls in flight, and the optional
//!   validation hook agrees, `Settle` is emitted and the gate clears.

use crate::bridge::{BridgeSender, Envelope};
use crate::net::{
    NetworkHooks, PageNetwork, StreamFuture, StreamRequest, StreamResponse, StreamTransport,
    TransportKind, UnaryCallback, UnaryRequest, UnaryTransport,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fixed re-poll interval while the validation hook keeps refusing a settle.
pub const VALIDATION_POLL_MS: u64 = 1000;

/// External validation hook consulted before a settle is emitted. A `false`
/// return defers the settle; the detector re-polls until the hook agrees.
pub type ValidationHook = Arc<dyn Fn() -> bool + Send + Sync>;

/// Current epoch milliseconds, for event timestamps.
pub(crate) fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Network monitoring parameters, supplied once per adapter. Immutable for
/// the life of one monitor installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Substring patterns (not regexes) matched against outgoing URLs.
    pub url_patterns: Vec<String>,
    /// Idle duration required before generation counts as finished.
    pub silence_threshold_ms: u64,
}

impl MonitorConfig {
    /// Whether a URL belongs to monitored generation traffic.
    pub fn matches(&self, url: &str) -> bool {
        self.url_patterns.iter().any(|p| url.contains(p))
    }
}

/// Mutable monitoring state, present only while interception is installed.
struct Monitor {
    config: MonitorConfig,
    /// Outstanding matched calls. Decrements clamp at 0.
    in_flight: u32,
    /// Debounce gate: set on the first matched call of a burst, cleared only
    /// when a `Settle` is actually emitted.
    has_triggered_start: bool,
    /// URL of the most recent matched activity, carried on `Settle`.
    last_matched_url: String,
    /// Pending settle timer (also hosts the validation poll loop).
    settle_task: Option<JoinHandle<()>>,
    /// Hooks to restore byte-for-byte on stop.
    original: Arc<NetworkHooks>,
}

struct Inner {
    network: Arc<PageNetwork>,
    bridge: BridgeSender,
    validation: Option<ValidationHook>,
    /// Private to the detector's own callbacks; never held across an await.
    monitor: Mutex<Option<Monitor>>,
}

impl Inner {
    fn matches(&self, url: &str) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .map(|m| m.config.matches(url))
            .unwrap_or(false)
    }

    /// A matched call left the page: count it, disarm the settle timer,
    /// and emit `Start` once per burst.
    fn on_call_started(&self, url: &str, transport: TransportKind) {
        let emit = {
            let mut guard = self.monitor.lock();
            let Some(monitor) = guard.as_mut() else {
                return;
            };
            monitor.in_flight += 1;
            monitor.last_matched_url = url.to_string();
            if let Some(task) = monitor.settle_task.take() {
                task.abort();
            }
            log::debug!(
                "Matched {:?} call started ({} in flight): {}",
                transport,
                monitor.in_flight,
                url
            );
            if monitor.has_triggered_start {
                false
            } else {
                monitor.has_triggered_start = true;
                true
            }
        };
        if emit {
            log::info!("Generation activity started: {}", url);
            self.bridge.post(&Envelope::Start {
                url: url.to_string(),
                timestamp: now_ms(),
                transport,
            });
        }
    }

    /// A matched call fully completed (drained, failed or aborted): count it
    /// down and re-arm the settle timer.
    fn on_call_completed(self: Arc<Self>, url: &str) {
        let mut guard = self.monitor.lock();
        let Some(monitor) = guard.as_mut() else {
            // Completion of a call dispatched before stop(). Acknowledged
            // race; the counter it would have decremented no longer exists.
            log::trace!("Dropping completion for stopped monitor: {}", url);
            return;
        };
        monitor.in_flight = monitor.in_flight.saturating_sub(1);
        monitor.last_matched_url = url.to_string();
        log::debug!(
            "Matched call completed ({} in flight): {}",
            monitor.in_flight,
            url
        );
        if let Some(task) = monitor.settle_task.take() {
            task.abort();
        }
        let threshold_ms = monitor.config.silence_threshold_ms;
        let inner = Arc::clone(&self);
        monitor.settle_task = Some(tokio::spawn(async move {
            inner.settle_after(threshold_ms).await;
        }));
    }

    /// Settle timer body: wait out the silence threshold, then keep polling
    /// the validation hook until it agrees (indefinitely; bounded only by
    /// new activity or `stop()` aborting this task).
    async fn settle_after(self: Arc<Self>, threshold_ms: u64) {
        tokio::time::sleep(Duration::from_millis(threshold_ms)).await;
        loop {
            {
                let guard = self.monitor.lock();
                let Some(monitor) = guard.as_ref() else {
                    return;
                };
                if monitor.in_flight > 0 {
                    return;
                }
            }
            match &self.validation {
                Some(hook) if !hook() => {
                    log::debug!(
                        "Settle deferred by validation hook, re-polling in {} ms",
                        VALIDATION_POLL_MS
                    );
                    tokio::time::sleep(Duration::from_millis(VALIDATION_POLL_MS)).await;
                }
                _ => break,
            }
        }
        let url = {
            let mut guard = self.monitor.lock();
            let Some(monitor) = guard.as_mut() else {
                return;
            };
            if monitor.in_flight > 0 {
                return;
            }
            monitor.has_triggered_start = false;
            monitor.settle_task = None;
            monitor.last_matched_url.clone()
        };
        log::info!("Generation activity settled: {}", url);
        self.bridge.post(&Envelope::Settle {
            url,
            timestamp: now_ms(),
        });
    }
}

/// Stream hook wrapper: passes unmatched calls straight through; for
/// matched calls, tees the response body and counts completion at full
/// drain of the monitor leg.
struct InterceptingStream {
    inner: Arc<dyn StreamTransport>,
    detector: Arc<Inner>,
}

impl StreamTransport for InterceptingStream {
    fn call(&self, request: StreamRequest) -> StreamFuture {
        if !self.detector.matches(&request.url) {
            return self.inner.call(request);
        }
        let detector = Arc::clone(&self.detector);
        let url = request.url.clone();
        detector.on_call_started(&url, TransportKind::Stream);
        let inner_future = self.inner.call(request);
        Box::pin(async move {
            match inner_future.await {
                Ok(response) => {
                    let StreamResponse {
                        status,
                        url: response_url,
                        body,
                    } = response;
                    let (caller_leg, mut monitor_leg) = body.tee();
                    tokio::spawn(async move {
                        while monitor_leg.next_chunk().await.is_some() {}
                        detector.on_call_completed(&url);
                    });
                    Ok(StreamResponse {
                        status,
                        url: response_url,
                        body: caller_leg,
                    })
                }
                Err(e) => {
                    detector.on_call_completed(&url);
                    Err(e)
                }
            }
        })
    }
}

/// Unary hook wrapper: counts completion when the caller's callback fires,
/// success and failure alike.
struct InterceptingUnary {
    inner: Arc<dyn UnaryTransport>,
    detector: Arc<Inner>,
}

impl UnaryTransport for InterceptingUnary {
    fn send(&self, request: UnaryRequest, on_done: UnaryCallback) {
        if !self.detector.matches(&request.url) {
            return self.inner.send(request, on_done);
        }
        let detector = Arc::clone(&self.detector);
        let url = request.url.clone();
        detector.on_call_started(&url, TransportKind::Xhr);
        let wrapped: UnaryCallback = Box::new(move |result| {
            detector.on_call_completed(&url);
            on_done(result);
        });
        self.inner.send(request, wrapped);
    }
}

/// The activity-quiescence detector.
///
/// `start(config)` installs interception over the page network substrate;
/// `stop()` restores the original hooks and resets all state. Both are
/// idempotent, and `stop(); start(config)` behaves identically to a fresh
/// instance.
#[derive(Clone)]
pub struct QuiescenceDetector {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QuiescenceDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuiescenceDetector").finish_non_exhaustive()
    }
}

impl QuiescenceDetector {
    pub fn new(
        network: Arc<PageNetwork>,
        bridge: BridgeSender,
        validation: Option<ValidationHook>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                network,
                bridge,
                validation,
                monitor: Mutex::new(None),
            }),
        }
    }

    /// Install interception for the given config. No-op when already started.
    pub fn start(&self, config: MonitorConfig) {
        let mut guard = self.inner.monitor.lock();
        if guard.is_some() {
            log::debug!("Quiescence detector already started");
            return;
        }
        if config.url_patterns.is_empty() {
            log::warn!("Refusing to start quiescence detector with no url patterns");
            return;
        }
        let current = self.inner.network.current_hooks();
        let wrapped = Arc::new(NetworkHooks {
            stream: Arc::new(InterceptingStream {
                inner: Arc::clone(&current.stream),
                detector: Arc::clone(&self.inner),
            }),
            unary: Arc::new(InterceptingUnary {
                inner: Arc::clone(&current.unary),
                detector: Arc::clone(&self.inner),
            }),
        });
        let original = self.inner.network.install(wrapped);
        log::info!(
            "Network monitor started: {} pattern(s), {} ms silence threshold",
            config.url_patterns.len(),
            config.silence_threshold_ms
        );
        *guard = Some(Monitor {
            config,
            in_flight: 0,
            has_triggered_start: false,
            last_matched_url: String::new(),
            settle_task: None,
            original,
        });
    }

    /// Remove interception, restore the original hooks and reset all
    /// counters and timers. No-op when already stopped.
    pub fn stop(&self) {
        let mut guard = self.inner.monitor.lock();
        let Some(monitor) = guard.take() else {
            log::debug!("Quiescence detector already stopped");
            return;
        };
        if let Some(task) = monitor.settle_task {
            task.abort();
        }
        self.inner.network.install(monitor.original);
        log::info!("Network monitor stopped");
    }

    /// Whether interception is currently installed.
    pub fn is_started(&self) -> bool {
        self.inner.monitor.lock().is_some()
    }

    /// Outstanding matched calls (0 when stopped). Exposed for tests and
    /// diagnostics.
    pub fn in_flight(&self) -> u32 {
        self.inner
            .monitor
            .lock()
            .as_ref()
            .map(|m| m.in_flight)
            .unwrap_or(0)
    }
}
