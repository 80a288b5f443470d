//! Reachability of a node from the tree root.
//!
//! Two strategies exist. When the raw node is in-process, the owning
//! document's root element is asked whether it contains it. Otherwise the
//! chain of parent fronts is walked up to the walker's root.

use std::rc::Rc;

use anyhow::{Result, anyhow};
use tracing::trace;

use crate::walker::{NodeFront, RawDocument, RawNode};

/// Parent steps taken before a remote chain is declared not connected.
pub const DEFAULT_MAX_ANCESTOR_DEPTH: usize = 4096;

/// Whether `raw` is contained in its owning document's root element.
///
/// Fails closed: a dead node, a closed view, a missing root element, or any
/// access error all count as not connected.
pub fn local_contains<R: RawNode>(raw: &R) -> bool {
    match try_local_contains(raw) {
        Ok(contained) => contained,
        Err(err) => {
            trace!(node = ?raw, error = %err, "local containment check failed");
            false
        }
    }
}

fn try_local_contains<R: RawNode>(raw: &R) -> Result<bool> {
    if raw.is_dead() {
        return Err(anyhow!("can't access dead node"));
    }
    let document = raw.owner_document()?;
    if document.default_view().is_none() {
        return Ok(false);
    }
    match document.document_element()? {
        Some(root) => root.contains(raw),
        None => Ok(false),
    }
}

/// Whether following `parent_node()` from `start` reaches `root`.
///
/// Identity is `Rc` pointer identity. At most `max_depth` parent steps are
/// taken; a longer chain is reported as not connected.
pub fn reaches_root<F: NodeFront>(start: &Rc<F>, root: &Rc<F>, max_depth: usize) -> bool {
    let mut current = Some(Rc::clone(start));
    let mut steps = 0usize;
    while let Some(node) = current {
        if Rc::ptr_eq(&node, root) {
            return true;
        }
        if steps == max_depth {
            trace!(max_depth, "parent chain exceeded max depth");
            return false;
        }
        steps += 1;
        current = node.parent_node();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NodeType;
    use crate::memory::WalkerMode;
    use crate::test_support::{fixture, fixture_with_mode};

    #[test]
    fn attached_node_is_contained() {
        let fx = fixture();
        assert!(local_contains(&fx.node("a")));
        assert!(local_contains(&fx.node("html")));
    }

    #[test]
    fn removed_node_is_not_contained() {
        let fx = fixture();
        fx.walker.remove(&fx.node("div")).expect("remove");
        assert!(!local_contains(&fx.node("a")));
    }

    #[test]
    fn dead_node_fails_closed() {
        let fx = fixture();
        fx.tree.invalidate(&fx.node("a"));
        assert!(!local_contains(&fx.node("a")));
    }

    #[test]
    fn closed_view_fails_closed() {
        let fx = fixture();
        fx.tree.close_view();
        assert!(!local_contains(&fx.node("a")));
    }

    #[test]
    fn remote_chain_reaches_root_until_detached() {
        let fx = fixture_with_mode(WalkerMode::Remote);
        let front = fx.front("a");
        let root = fx.walker.root().expect("root");
        assert!(reaches_root(&front, &root, 64));

        fx.walker.remove(&fx.node("div")).expect("remove");
        assert!(!reaches_root(&front, &root, 64));
    }

    #[test]
    fn depth_bound_stops_the_walk() {
        let fx = fixture_with_mode(WalkerMode::Remote);
        let front = fx.front("a");
        assert_eq!(front.node_type(), NodeType::Element);
        let root = fx.walker.root().expect("root");
        // a -> div -> body -> html -> #document
        assert!(reaches_root(&front, &root, 4));
        assert!(!reaches_root(&front, &root, 3));
    }
}
