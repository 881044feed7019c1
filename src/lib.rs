// Library exports.
//
// # Locking policy
//
// chat-sentinel runs single-logical-thread cooperative within each sandbox;
// locks only guard against interleaved async callbacks, never contention.
// New code should follow these rules:
//
//   - `parking_lot::Mutex` — use for detector/coordinator state touched from
//                            timer and completion callbacks. Never hold a
//                            guard across an await.
//
//   - `tokio::sync::*`     — channels only (broadcast for the bridge, mpsc
//                            for host-event inlets, watch for published
//                            intent). No tokio mutexes; nothing here needs
//                            an async-held lock.

/// Application version (root crate version, for use by embedders).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod adapter;
pub mod bridge;
pub mod dom;
pub mod generation;
pub mod net;
pub mod notify;
pub mod page;
pub mod quiescence;
pub mod retry;
pub mod runtime;
pub mod scroll_guard;
pub mod title;

pub use chat_sentinel_config as config;
