//! End-to-end selection lifecycle over an in-memory walker.
//!
//! These tests drive a `Selection` through selection changes and mutation
//! batches the way an embedding inspector would: attach a walker, select a
//! node, let the tree mutate, then tear down.

use std::cell::RefCell;
use std::rc::Rc;

use inspector::core::types::{MutationKind, MutationRecord, TrackingOptions};
use inspector::events::{EventKind, SelectionEvent};
use inspector::memory::{MemoryWalker, WalkerMode};
use inspector::selection::Selection;
use inspector::test_support::{EventLog, fixture, fixture_with_mode};
use inspector::walker::NodeFront;

/// Full scenario on the sample document:
///
/// 1. Select `a` with reason "test": before/after pairs carry no previous node.
/// 2. Attribute batch on `a`: one `attribute-changed`, selection unchanged.
/// 3. `a` removed from `div`: `detached(div.raw)` then `detached-front(div)`,
///    selection still `a`.
/// 4. `destroy()`: slot cleared, walker detached, later batches ignored.
#[test]
fn select_mutate_detach_destroy() {
    let fx = fixture();
    let selection = Selection::new(Some(Rc::clone(&fx.walker)), TrackingOptions::default());
    let log = EventLog::attach(&selection);

    selection
        .set_node(Some(fx.node("a")), Some("test"))
        .expect("select a");
    let entries = log.entries();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].kind, EventKind::BeforeNewNode);
    assert_eq!(entries[0].node, None);
    assert_eq!(entries[0].incoming.as_deref(), Some("a"));
    assert_eq!(entries[2].kind, EventKind::NewNode);
    assert_eq!(entries[2].node, None);
    assert!(entries.iter().all(|e| e.reason.as_deref() == Some("test")));
    assert_eq!(selection.node(), Some(fx.node("a")));
    assert_eq!(selection.reason(), "test");
    log.clear();

    fx.walker
        .set_attribute(&fx.node("a"), "class", "hot")
        .expect("set attribute");
    fx.walker.flush();
    assert_eq!(log.kinds(), vec![EventKind::AttributeChanged]);
    assert_eq!(selection.node(), Some(fx.node("a")));
    log.clear();

    fx.walker.remove(&fx.node("a")).expect("remove a");
    fx.walker.flush();
    let entries = log.entries();
    assert_eq!(
        log.kinds(),
        vec![EventKind::Detached, EventKind::DetachedFront]
    );
    assert_eq!(entries[0].node.as_deref(), Some("div"));
    assert_eq!(entries[1].node.as_deref(), Some("div"));
    assert_eq!(selection.node(), Some(fx.node("a")));
    assert!(!selection.is_connected());
    assert!(!selection.is_root());
    log.clear();

    selection.destroy();
    assert_eq!(log.kinds().len(), 4);
    assert!(selection.node().is_none());
    log.clear();

    fx.walker
        .set_attribute(&fx.node("b"), "class", "cold")
        .expect("set attribute");
    fx.walker.flush();
    assert!(log.is_empty());
}

/// Removing an ancestor reports the ancestor's parent, once per batch.
#[test]
fn removing_ancestor_reports_first_record_target() {
    let fx = fixture();
    let selection = Selection::new(Some(Rc::clone(&fx.walker)), TrackingOptions::default());
    selection
        .set_node(Some(fx.node("a")), Some("test"))
        .expect("select a");

    let parents = Rc::new(RefCell::new(Vec::new()));
    let _raw = {
        let parents = Rc::clone(&parents);
        selection.on(EventKind::Detached, move |event| {
            if let SelectionEvent::Detached { parent } = event {
                parents.borrow_mut().push(parent.clone());
            }
        })
    };
    let fronts = Rc::new(RefCell::new(Vec::new()));
    let _front = {
        let fronts = Rc::clone(&fronts);
        selection.on(EventKind::DetachedFront, move |event| {
            if let SelectionEvent::DetachedFront { parent } = event {
                fronts.borrow_mut().push(Rc::clone(parent));
            }
        })
    };

    fx.walker.remove(&fx.node("div")).expect("remove div");
    fx.walker.remove(&fx.node("section")).expect("remove section");
    fx.walker.flush();

    assert_eq!(*parents.borrow(), vec![Some(fx.node("body"))]);
    let fronts = fronts.borrow();
    assert_eq!(fronts.len(), 1);
    assert!(Rc::ptr_eq(&fronts[0], &fx.front("body")));
}

/// Connectivity is checked against the tree as it stands when the batch is
/// delivered, so a node moved within one batch is not reported.
#[test]
fn connectivity_is_judged_after_the_whole_batch_is_applied() {
    let fx = fixture();
    let selection = Selection::new(Some(Rc::clone(&fx.walker)), TrackingOptions::default());
    selection
        .set_node(Some(fx.node("a")), None)
        .expect("select a");
    let log = EventLog::attach(&selection);

    fx.walker.remove(&fx.node("a")).expect("remove");
    fx.walker
        .append_child(&fx.node("section"), &fx.node("a"))
        .expect("re-append");
    fx.walker.flush();

    assert!(log.is_empty());
    assert!(selection.is_connected());
}

/// An orphaned handler delivery after `destroy` is ignored.
#[test]
fn direct_delivery_after_destroy_is_ignored() {
    let fx = fixture_with_mode(WalkerMode::Remote);
    let selection: Selection<MemoryWalker> =
        Selection::new(Some(Rc::clone(&fx.walker)), TrackingOptions::default());
    selection.set_node_front(Some(fx.front("a")), None);
    selection.destroy();
    let log = EventLog::attach(&selection);

    selection.handle_mutations(&[
        MutationRecord::new(MutationKind::Attributes, fx.front("a")),
        MutationRecord::new(MutationKind::ChildList, fx.front("div")),
    ]);
    assert!(log.is_empty());
}

/// Predicates never report a root while disconnected.
#[test]
fn root_requires_connectivity() {
    let fx = fixture_with_mode(WalkerMode::Remote);
    let selection = Selection::new(Some(Rc::clone(&fx.walker)), TrackingOptions::default());
    let html = fx.front("html");
    assert!(html.is_document_element());

    selection.set_node_front(Some(Rc::clone(&html)), None);
    assert!(selection.is_root());

    fx.walker.remove(&fx.node("html")).expect("remove html");
    assert!(!selection.is_connected());
    assert!(!selection.is_root());
}
