//! Network transport seams and the interception substrate.
//!
//! The host page performs all of its network traffic through a
//! [`PageNetwork`], which holds the pair of transport objects currently in
//! service. The quiescence detector intercepts traffic by swapping wrapped
//! hooks into that substrate and restores the originals, unchanged, when it
//! stops. Nothing is ever patched at construction time, only inside an
//! explicit lifecycle call.

use arc_swap::ArcSwap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Which request shape a call travelled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Future-returning call with a streamed body (fetch-like).
    Stream,
    /// Open/send pair with callback completion (XHR-like).
    Xhr,
}

/// Errors produced by the underlying transports.
///
/// The detector treats every variant identically to a success for counting
/// purposes; these exist so callers of the substrate can distinguish them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call failed before or during the response.
    #[error("request failed: {0}")]
    Failed(String),

    /// The caller aborted the call.
    #[error("request aborted")]
    Aborted,
}

/// One chunk of a streamed response body.
pub type BodyChunk = Result<Vec<u8>, TransportError>;

/// A chunked response body.
///
/// Completion of a streamed call is defined as full drain of this stream,
/// not arrival of the response head.
pub struct BodyStream {
    rx: mpsc::UnboundedReceiver<BodyChunk>,
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream").finish_non_exhaustive()
    }
}

impl BodyStream {
    /// Create a body fed through the returned sender. Dropping the sender
    /// ends the stream.
    pub fn channel() -> (mpsc::UnboundedSender<BodyChunk>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// An already-drained body (e.g. for empty or failed responses).
    pub fn empty() -> Self {
        let (_tx, rx) = mpsc::unbounded_channel();
        Self { rx }
    }

    /// A single-chunk body, useful in tests and for non-streaming callers.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let (tx, body) = Self::channel();
        let _ = tx.send(Ok(bytes));
        body
    }

    /// Receive the next chunk, or `None` once the stream has drained.
    pub async fn next_chunk(&mut self) -> Option<BodyChunk> {
        self.rx.recv().await
    }

    /// Drain the stream into one buffer, stopping at the first error chunk.
    pub async fn collect(mut self) -> Result<Vec<u8>, TransportError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend(chunk?);
        }
        Ok(out)
    }

    /// Duplicate this body into two independently drainable streams.
    ///
    /// A background pump forwards each chunk to both legs; a dropped leg
    /// never stalls the other. This is how the detector observes
    /// end-of-stream without disturbing the caller's own read.
    pub fn tee(mut self) -> (Self, Self) {
        let (tx_a, leg_a) = Self::channel();
        let (tx_b, leg_b) = Self::channel();
        tokio::spawn(async move {
            while let Some(chunk) = self.rx.recv().await {
                let _ = tx_a.send(chunk.clone());
                let _ = tx_b.send(chunk);
            }
        });
        (leg_a, leg_b)
    }
}

/// A fetch-like request routed through the substrate.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub method: String,
    pub url: String,
}

impl StreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
        }
    }
}

/// Response head plus the (possibly still streaming) body.
#[derive(Debug)]
pub struct StreamResponse {
    pub status: u16,
    pub url: String,
    pub body: BodyStream,
}

/// Boxed future returned by [`StreamTransport::call`].
pub type StreamFuture = Pin<Box<dyn Future<Output = Result<StreamResponse, TransportError>> + Send>>;

/// Future-returning transport (fetch-like).
pub trait StreamTransport: Send + Sync {
    fn call(&self, request: StreamRequest) -> StreamFuture;
}

/// An XHR-like request (URL captured at open, dispatched at send).
#[derive(Debug, Clone)]
pub struct UnaryRequest {
    pub method: String,
    pub url: String,
}

/// Completion callback for unary calls. Invoked exactly once, for success,
/// failure and abort alike.
pub type UnaryCallback = Box<dyn FnOnce(Result<(), TransportError>) + Send>;

/// Callback-completion transport (XHR-like open/send pair).
pub trait UnaryTransport: Send + Sync {
    fn send(&self, request: UnaryRequest, on_done: UnaryCallback);
}

/// The pair of transport objects currently serving page traffic.
#[derive(Clone)]
pub struct NetworkHooks {
    pub stream: Arc<dyn StreamTransport>,
    pub unary: Arc<dyn UnaryTransport>,
}

impl std::fmt::Debug for NetworkHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkHooks").finish_non_exhaustive()
    }
}

/// Patch substrate for the host page's network primitives.
///
/// Holds the active [`NetworkHooks`] in an atomically swappable slot. An
/// interceptor calls [`PageNetwork::install`] with wrapped hooks and gets the
/// previous hooks back, so stopping interception restores the exact original
/// transport objects.
pub struct PageNetwork {
    hooks: ArcSwap<NetworkHooks>,
}

impl std::fmt::Debug for PageNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageNetwork").finish_non_exhaustive()
    }
}

impl PageNetwork {
    pub fn new(stream: Arc<dyn StreamTransport>, unary: Arc<dyn UnaryTransport>) -> Self {
        Self {
            hooks: ArcSwap::from_pointee(NetworkHooks { stream, unary }),
        }
    }

    /// The hooks currently in service.
    pub fn current_hooks(&self) -> Arc<NetworkHooks> {
        self.hooks.load_full()
    }

    /// Swap in new hooks, returning the previous ones for later restore.
    pub fn install(&self, hooks: Arc<NetworkHooks>) -> Arc<NetworkHooks> {
        self.hooks.swap(hooks)
    }

    /// Issue a fetch-like call through the active hooks.
    pub fn stream_call(&self, request: StreamRequest) -> StreamFuture {
        self.hooks.load().stream.call(request)
    }

    /// Issue an XHR-like call through the active hooks.
    pub fn unary_send(&self, request: UnaryRequest, on_done: UnaryCallback) {
        self.hooks.load().unary.send(request, on_done);
    }
}
