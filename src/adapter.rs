//! Site adapter seam.
//!
//! Each supported chat site ships an adapter that knows that site's markup:
//! which URLs its generation traffic hits, where the conversation turns
//! live, how to read and write the prompt input. The coordinators consume
//! only this trait; nothing else in the crate knows one site from another.

use crate::dom::NodeRef;
use crate::quiescence::MonitorConfig;

/// Capability surface a per-site adapter exposes to the coordinators.
pub trait SiteAdapter: Send + Sync {
    /// Short site name, used in titles, notifications and logs.
    fn name(&self) -> &str;

    /// Network monitoring parameters for this site, or `None` when network
    /// monitoring is not supported for it.
    fn network_monitor_config(&self) -> Option<MonitorConfig>;

    /// The site's own generation indicator (spinner, stop button, ...).
    /// Consulted out-of-band to decide whether the user already saw a
    /// completed answer.
    fn is_generating(&self) -> bool;

    /// Current conversation title, if the site exposes one.
    fn conversation_title(&self) -> Option<String>;

    /// Root element of the most recent conversation turn.
    fn latest_turn(&self) -> Option<NodeRef>;

    /// Selector identifying a policy-blocked response inside a turn.
    fn blocked_marker_selector(&self) -> &str;

    /// Original user prompt text for a turn, if it can be recovered.
    fn extract_user_query_text(&self, turn: &NodeRef) -> Option<String>;

    /// The prompt input element.
    fn find_textarea(&self) -> Option<NodeRef>;

    /// Insert prompt text into the input. `false` when the input is missing
    /// or rejected the text.
    fn insert_prompt(&self, text: &str) -> bool;

    /// Clear the prompt input. Missing input is a no-op.
    fn clear_textarea(&self);

    /// Candidate submit control selectors, in preference order.
    fn submit_button_selectors(&self) -> Vec<String>;
}
