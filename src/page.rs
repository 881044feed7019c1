//! Host page surface seam.
//!
//! The document/window-level operations the logic side performs: page-wide
//! element queries, title updates, foreground checks, focus requests and
//! transient toast notices. Implementations absorb their own failures: a
//! toast that cannot render or a focus request the platform refuses is
//! logged by the implementor, never surfaced as an error here.

use crate::dom::NodeRef;

/// Document/window capability surface consumed by the coordinators.
pub trait HostPage: Send + Sync {
    /// Page-level selector query (light DOM only; nested-container search
    /// starts from the nodes this returns).
    fn query(&self, selector: &str) -> Option<NodeRef>;

    /// Replace the page/tab title.
    fn set_title(&self, title: &str);

    /// Whether the page currently has foreground visibility.
    fn is_foreground(&self) -> bool;

    /// Ask the window manager to focus the page's window.
    fn request_focus(&self);

    /// Render a transient, non-blocking notice.
    fn show_toast(&self, message: &str);
}
