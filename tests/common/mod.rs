//! Shared integration test helpers for chat-sentinel.
//!
//! Provides fake implementations of the capability seams (site adapter,
//! host page, DOM nodes, transports) with recorders the tests can assert
//! against.
//!
//! Note: Rust integration tests use `mod common;` (not `use`) to bring in
//! helpers from `tests/common/mod.rs`. The `#![allow(dead_code)]` attribute
//! suppresses warnings when only a subset of helpers are used per file.

#![allow(dead_code)]

use chat_sentinel::adapter::SiteAdapter;
use chat_sentinel::dom::{DomNode, KeyPhase, NodeRef};
use chat_sentinel::net::{
    BodyChunk, BodyStream, PageNetwork, StreamFuture, StreamRequest, StreamResponse,
    StreamTransport, UnaryCallback, UnaryRequest, UnaryTransport,
};
use chat_sentinel::page::HostPage;
use chat_sentinel::quiescence::MonitorConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::mpsc;

/// Marker selector every fake adapter reports for blocked responses.
pub const BLOCKED_MARKER: &str = ".blocked-response";

// ───────────────────────────────────────────────────────────────────────────
// Fake DOM
// ───────────────────────────────────────────────────────────────────────────

/// Scriptable DOM node with interaction recorders.
pub struct FakeNode {
    selector: String,
    text: String,
    children: Vec<NodeRef>,
    clickable: bool,
    accepts_keys: bool,
    pub clicks: AtomicU32,
    pub keys: Mutex<Vec<(KeyPhase, String)>>,
}

impl FakeNode {
    pub fn new(selector: &str) -> Arc<Self> {
        Arc::new(Self {
            selector: selector.to_string(),
            text: String::new(),
            children: Vec::new(),
            clickable: true,
            accepts_keys: true,
            clicks: AtomicU32::new(0),
            keys: Mutex::new(Vec::new()),
        })
    }

    pub fn with_children(selector: &str, children: Vec<NodeRef>) -> Arc<Self> {
        Arc::new(Self {
            selector: selector.to_string(),
            text: String::new(),
            children,
            clickable: true,
            accepts_keys: true,
            clicks: AtomicU32::new(0),
            keys: Mutex::new(Vec::new()),
        })
    }

    pub fn with_text(selector: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            selector: selector.to_string(),
            text: text.to_string(),
            children: Vec::new(),
            clickable: true,
            accepts_keys: true,
            clicks: AtomicU32::new(0),
            keys: Mutex::new(Vec::new()),
        })
    }

    /// A node that refuses clicks and key events.
    pub fn inert(selector: &str) -> Arc<Self> {
        Arc::new(Self {
            selector: selector.to_string(),
            text: String::new(),
            children: Vec::new(),
            clickable: false,
            accepts_keys: false,
            clicks: AtomicU32::new(0),
            keys: Mutex::new(Vec::new()),
        })
    }

    pub fn click_count(&self) -> u32 {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn key_phases(&self) -> Vec<KeyPhase> {
        self.keys.lock().iter().map(|(phase, _)| *phase).collect()
    }
}

impl DomNode for FakeNode {
    fn matches(&self, selector: &str) -> bool {
        self.selector == selector
    }
    fn query(&self, selector: &str) -> Option<NodeRef> {
        self.children
            .iter()
            .find_map(|c| chat_sentinel::dom::find_matching(c, selector))
    }
    fn nested_children(&self) -> Vec<NodeRef> {
        self.children.clone()
    }
    fn text(&self) -> String {
        self.text.clone()
    }
    fn click(&self) -> bool {
        if self.clickable {
            self.clicks.fetch_add(1, Ordering::SeqCst);
        }
        self.clickable
    }
    fn dispatch_key(&self, phase: KeyPhase, key: &str) -> bool {
        if self.accepts_keys {
            self.keys.lock().push((phase, key.to_string()));
        }
        self.accepts_keys
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Fake site adapter
// ───────────────────────────────────────────────────────────────────────────

/// Scriptable site adapter with DOM-mutation recorders.
pub struct FakeAdapter {
    pub site_name: String,
    pub monitor_config: Option<MonitorConfig>,
    pub generating: AtomicBool,
    pub title: Mutex<Option<String>>,
    /// What `latest_turn` returns.
    pub turn: Mutex<Option<NodeRef>>,
    /// What `extract_user_query_text` returns.
    pub prompt_text: Mutex<Option<String>>,
    /// What `find_textarea` returns.
    pub textarea: Mutex<Option<NodeRef>>,
    pub submit_selectors: Vec<String>,
    pub insert_ok: AtomicBool,
    pub inserted: Mutex<Vec<String>>,
    pub clear_count: AtomicU32,
}

impl FakeAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            site_name: "ExampleChat".to_string(),
            monitor_config: Some(MonitorConfig {
                url_patterns: vec!["chat/completions".to_string()],
                silence_threshold_ms: 500,
            }),
            generating: AtomicBool::new(false),
            title: Mutex::new(Some("Trip planning".to_string())),
            turn: Mutex::new(None),
            prompt_text: Mutex::new(None),
            textarea: Mutex::new(None),
            submit_selectors: vec!["button.send".to_string()],
            insert_ok: AtomicBool::new(true),
            inserted: Mutex::new(Vec::new()),
            clear_count: AtomicU32::new(0),
        })
    }

    /// An adapter for a site without network monitoring support.
    pub fn without_monitor_config() -> Arc<Self> {
        let adapter = Self::new();
        let mut adapter = Arc::try_unwrap(adapter).unwrap_or_else(|_| unreachable!());
        adapter.monitor_config = None;
        Arc::new(adapter)
    }

    /// Script a blocked latest turn carrying the given prompt text.
    pub fn set_blocked_turn(&self, prompt: &str) {
        let marker: NodeRef = FakeNode::new(BLOCKED_MARKER);
        let turn = FakeNode::with_children("div.turn", vec![marker]);
        *self.turn.lock() = Some(turn as NodeRef);
        *self.prompt_text.lock() = Some(prompt.to_string());
    }

    /// Script a clean latest turn (no block marker).
    pub fn set_clean_turn(&self) {
        *self.turn.lock() = Some(FakeNode::new("div.turn") as NodeRef);
        *self.prompt_text.lock() = None;
    }

    pub fn inserted_prompts(&self) -> Vec<String> {
        self.inserted.lock().clone()
    }

    pub fn clear_calls(&self) -> u32 {
        self.clear_count.load(Ordering::SeqCst)
    }
}

impl SiteAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.site_name
    }
    fn network_monitor_config(&self) -> Option<MonitorConfig> {
        self.monitor_config.clone()
    }
    fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }
    fn conversation_title(&self) -> Option<String> {
        self.title.lock().clone()
    }
    fn latest_turn(&self) -> Option<NodeRef> {
        self.turn.lock().clone()
    }
    fn blocked_marker_selector(&self) -> &str {
        BLOCKED_MARKER
    }
    fn extract_user_query_text(&self, _turn: &NodeRef) -> Option<String> {
        self.prompt_text.lock().clone()
    }
    fn find_textarea(&self) -> Option<NodeRef> {
        self.textarea.lock().clone()
    }
    fn insert_prompt(&self, text: &str) -> bool {
        if self.insert_ok.load(Ordering::SeqCst) {
            self.inserted.lock().push(text.to_string());
            true
        } else {
            false
        }
    }
    fn clear_textarea(&self) {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
    }
    fn submit_button_selectors(&self) -> Vec<String> {
        self.submit_selectors.clone()
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Fake host page
// ───────────────────────────────────────────────────────────────────────────

/// Scriptable host page with side-effect recorders.
pub struct FakePage {
    pub foreground: AtomicBool,
    pub titles: Mutex<Vec<String>>,
    pub toasts: Mutex<Vec<String>>,
    pub focus_requests: AtomicU32,
    /// Selector → node map served by `query`.
    pub elements: Mutex<HashMap<String, NodeRef>>,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            foreground: AtomicBool::new(false),
            titles: Mutex::new(Vec::new()),
            toasts: Mutex::new(Vec::new()),
            focus_requests: AtomicU32::new(0),
            elements: Mutex::new(HashMap::new()),
        })
    }

    pub fn add_element(&self, selector: &str, node: NodeRef) {
        self.elements.lock().insert(selector.to_string(), node);
    }

    pub fn last_title(&self) -> Option<String> {
        self.titles.lock().last().cloned()
    }

    pub fn title_count(&self) -> usize {
        self.titles.lock().len()
    }

    pub fn toast_messages(&self) -> Vec<String> {
        self.toasts.lock().clone()
    }

    pub fn focus_count(&self) -> u32 {
        self.focus_requests.load(Ordering::SeqCst)
    }
}

impl HostPage for FakePage {
    fn query(&self, selector: &str) -> Option<NodeRef> {
        self.elements.lock().get(selector).cloned()
    }
    fn set_title(&self, title: &str) {
        self.titles.lock().push(title.to_string());
    }
    fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }
    fn request_focus(&self) {
        self.focus_requests.fetch_add(1, Ordering::SeqCst);
    }
    fn show_toast(&self, message: &str) {
        self.toasts.lock().push(message.to_string());
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Scriptable transports
// ───────────────────────────────────────────────────────────────────────────

/// Stream transport whose responses arrive immediately but whose bodies
/// stay open until the test finishes them.
pub struct HeldStream {
    pub bodies: Mutex<Vec<mpsc::UnboundedSender<BodyChunk>>>,
}

impl HeldStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            bodies: Mutex::new(Vec::new()),
        })
    }

    /// End the body of the n-th issued call (0-based), completing it.
    pub fn finish(&self, index: usize) {
        let mut bodies = self.bodies.lock();
        if index < bodies.len() {
            // Replacing with a closed sender drops the held one.
            let (closed, _rx) = mpsc::unbounded_channel();
            bodies[index] = closed;
        }
    }
}

impl StreamTransport for HeldStream {
    fn call(&self, request: StreamRequest) -> StreamFuture {
        let (tx, body) = BodyStream::channel();
        self.bodies.lock().push(tx);
        Box::pin(async move {
            Ok(StreamResponse {
                status: 200,
                url: request.url,
                body,
            })
        })
    }
}

/// Unary transport that parks completion callbacks for the test to fire.
pub struct HeldUnary {
    pub pending: Mutex<Vec<(String, UnaryCallback)>>,
}

impl HeldUnary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Complete the most recently parked call with the given result.
    pub fn finish_next(&self, result: Result<(), chat_sentinel::net::TransportError>) {
        let entry = self.pending.lock().pop();
        if let Some((_url, callback)) = entry {
            callback(result);
        }
    }
}

impl UnaryTransport for HeldUnary {
    fn send(&self, request: UnaryRequest, on_done: UnaryCallback) {
        self.pending.lock().push((request.url, on_done));
    }
}

/// A page network backed by held transports, for timing-controlled tests.
pub fn held_network() -> (Arc<PageNetwork>, Arc<HeldStream>, Arc<HeldUnary>) {
    let stream = HeldStream::new();
    let unary = HeldUnary::new();
    let network = Arc::new(PageNetwork::new(
        Arc::clone(&stream) as Arc<dyn StreamTransport>,
        Arc::clone(&unary) as Arc<dyn UnaryTransport>,
    ));
    (network, stream, unary)
}
