//! DOM handle seam and nested-container traversal.
//!
//! Coordinators never touch a real document; they work against the
//! [`DomNode`] capability trait supplied by the embedder. Query faults
//! (missing elements, selector errors, detached nodes) are absorbed as
//! "not found" by the implementor; nothing in this module fails loudly.

use std::sync::Arc;

/// Depth cap for recursive traversal through nested shadow containers.
/// Deep enough for every markup shape seen in practice, small enough to
/// stop runaway recursion on pathological trees.
pub const MAX_TRAVERSAL_DEPTH: usize = 15;

/// Phases of a synthetic key event sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Down,
    Press,
    Up,
}

/// Handle to one element of the host page.
///
/// Implementations must be infallible in the exception sense: a broken
/// selector or a detached node reports `false`/`None`/empty, never panics.
pub trait DomNode: Send + Sync {
    /// Whether this node matches a CSS-style selector.
    fn matches(&self, selector: &str) -> bool;

    /// First descendant of this node matching the selector.
    fn query(&self, selector: &str) -> Option<NodeRef>;

    /// Child elements, including those hosted inside nested shadow
    /// containers rooted at this node.
    fn nested_children(&self) -> Vec<NodeRef>;

    /// Visible text content of this node's subtree.
    fn text(&self) -> String;

    /// Simulate a user click. `false` when the node cannot be clicked.
    fn click(&self) -> bool;

    /// Dispatch one synthetic key event phase. `false` when the node cannot
    /// receive key events.
    fn dispatch_key(&self, phase: KeyPhase, key: &str) -> bool;
}

/// Shared element handle.
pub type NodeRef = Arc<dyn DomNode>;

/// Depth-first search through nested containers, capped at `max_depth`
/// container levels below `root`. The root itself is tested first.
pub fn find_in_nested(
    root: &NodeRef,
    max_depth: usize,
    pred: &dyn Fn(&NodeRef) -> bool,
) -> Option<NodeRef> {
    if pred(root) {
        return Some(Arc::clone(root));
    }
    if max_depth == 0 {
        log::trace!("Nested-container search hit the depth cap");
        return None;
    }
    for child in root.nested_children() {
        if let Some(found) = find_in_nested(&child, max_depth - 1, pred) {
            return Some(found);
        }
    }
    None
}

/// Find a node matching `selector` anywhere in the nested tree under
/// `root`, up to [`MAX_TRAVERSAL_DEPTH`].
pub fn find_matching(root: &NodeRef, selector: &str) -> Option<NodeRef> {
    find_in_nested(root, MAX_TRAVERSAL_DEPTH, &|node| node.matches(selector))
}

/// Dispatch a full synthetic Enter sequence (down/press/up) on a node.
///
/// Returns whether the down phase was accepted; the remaining phases are
/// dispatched regardless so listeners observing only press or up still fire.
pub fn synthetic_enter(node: &NodeRef) -> bool {
    let accepted = node.dispatch_key(KeyPhase::Down, "Enter");
    node.dispatch_key(KeyPhase::Press, "Enter");
    node.dispatch_key(KeyPhase::Up, "Enter");
    accepted
}
