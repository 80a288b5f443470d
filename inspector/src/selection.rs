//! The selection tracker.
//!
//! A [`Selection`] holds at most one selected node as a pair of handles (the
//! walker's front and, when in-process, the raw node), keeps at most one
//! subscription to its walker's mutation stream, and publishes
//! [`SelectionEvent`]s when the slot changes or a mutation batch affects the
//! selected node.
//!
//! # Events
//!
//! | Event                   | When                                         |
//! |-------------------------|----------------------------------------------|
//! | `before-new-node(-front)` | slot is about to change; old value still held |
//! | `new-node(-front)`      | slot changed; payload is the previous value   |
//! | `attribute-changed`     | batch had an attribute record (if tracked)    |
//! | `detached(-front)`      | batch disconnected the selection (if tracked) |
//!
//! Events are emitted with no internal borrow held, so handlers may read any
//! accessor. Handlers must not call the mutators (`set_*`, `destroy`).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use tracing::{debug, trace, warn};

use crate::core::classifier::classify_mutations;
use crate::core::connectivity::{DEFAULT_MAX_ANCESTOR_DEPTH, local_contains, reaches_root};
use crate::core::types::{MutationRecord, NodeType, TrackingOptions, XHTML_NAMESPACE};
use crate::events::{EventEmitter, EventKind, SelectionEvent, Subscription};
use crate::io::config::TrackerConfig;
use crate::walker::{NodeFront, RawDocument, RawNode, RawOf, Walker};

/// Reason recorded when a caller gives none.
pub const DEFAULT_REASON: &str = "unknown";

type DocumentOf<W> = <RawOf<W> as RawNode>::Document;
type WindowOf<W> = <DocumentOf<W> as RawDocument>::Window;

/// The selected node. Both handles are always replaced together.
struct Selected<F: NodeFront> {
    front: Rc<F>,
    raw: Option<F::Raw>,
}

struct State<W: Walker> {
    walker: Option<Rc<W>>,
    subscription: Option<Subscription>,
    current: Option<Selected<W::Front>>,
    reason: String,
    destroyed: bool,
}

struct Inner<W: Walker> {
    state: RefCell<State<W>>,
    events: EventEmitter<SelectionEvent<W::Front>>,
    options: TrackingOptions,
    max_ancestor_depth: usize,
}

/// Tracks the selected node of a walker's tree.
///
/// Cloning yields another handle to the same tracker.
pub struct Selection<W: Walker> {
    inner: Rc<Inner<W>>,
}

impl<W: Walker> Clone for Selection<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<W: Walker> fmt::Debug for Selection<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Selection")
            .field("front", &state.current.as_ref().map(|c| &c.front))
            .field("reason", &state.reason)
            .field("has_walker", &state.walker.is_some())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

impl<W: Walker + 'static> Selection<W> {
    /// Create a tracker bound to `walker` (if any) with nothing selected.
    pub fn new(walker: Option<Rc<W>>, options: TrackingOptions) -> Self {
        Self::with_limits(walker, options, DEFAULT_MAX_ANCESTOR_DEPTH)
    }

    /// Create a tracker with `node` already selected under the default
    /// reason. Fails when `node` is given without a walker.
    pub fn with_node(
        walker: Option<Rc<W>>,
        node: Option<RawOf<W>>,
        options: TrackingOptions,
    ) -> Result<Self> {
        let selection = Self::new(walker, options);
        selection.set_node(node, None)?;
        Ok(selection)
    }

    pub fn from_config(walker: Option<Rc<W>>, config: &TrackerConfig) -> Self {
        Self::with_limits(walker, config.tracking, config.max_ancestor_depth)
    }

    fn with_limits(walker: Option<Rc<W>>, options: TrackingOptions, max_depth: usize) -> Self {
        let selection = Self {
            inner: Rc::new(Inner {
                state: RefCell::new(State {
                    walker: None,
                    subscription: None,
                    current: None,
                    reason: DEFAULT_REASON.to_string(),
                    destroyed: false,
                }),
                events: EventEmitter::new(),
                options,
                max_ancestor_depth: max_depth,
            }),
        };
        selection.set_walker(walker);
        selection
    }

    pub fn options(&self) -> TrackingOptions {
        self.inner.options
    }

    /// Receive every event this selection publishes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        callback: impl Fn(&SelectionEvent<W::Front>) + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    /// Receive events of one kind only.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&SelectionEvent<W::Front>) + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(move |event| {
            if event.kind() == kind {
                callback(event);
            }
        })
    }

    /// Replace the walker, moving the mutation subscription to the new one.
    ///
    /// The previous subscription is always dropped first, so at most one is
    /// active. Passing the current walker again re-subscribes it.
    /// The walker is called with no internal borrow held, so it may deliver
    /// a batch while subscribing or unsubscribing.
    pub fn set_walker(&self, walker: Option<Rc<W>>) {
        let previous = {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                debug!("ignoring set_walker on destroyed selection");
                return;
            }
            state.walker.clone_from(&walker);
            state.subscription.take()
        };
        drop(previous);

        let Some(walker) = walker else {
            return;
        };
        let weak = Rc::downgrade(&self.inner);
        let handler = move |records: &[MutationRecord<W::Front>]| {
            if let Some(inner) = weak.upgrade() {
                Selection { inner }.handle_mutations(records);
            }
        };
        let subscription = walker.on_mutations(Box::new(handler));

        let displaced = {
            let mut state = self.inner.state.borrow_mut();
            let still_current = state
                .walker
                .as_ref()
                .is_some_and(|current| Rc::ptr_eq(current, &walker));
            if still_current && !state.destroyed {
                state.subscription.replace(subscription)
            } else {
                Some(subscription)
            }
        };
        drop(displaced);
    }

    /// Select the front for `raw`, resolved through the walker.
    ///
    /// Fails only when `raw` is given but no walker is attached. A node the
    /// walker cannot resolve leaves the selection unchanged.
    pub fn set_node(&self, raw: Option<RawOf<W>>, reason: Option<&str>) -> Result<()> {
        if self.is_destroyed() {
            debug!("ignoring set_node on destroyed selection");
            return Ok(());
        }
        let front = match raw {
            None => None,
            Some(raw) => {
                let walker = self.walker().ok_or_else(|| {
                    warn!(node = ?raw, "set_node called without a walker");
                    anyhow!("no walker attached")
                })?;
                match walker.front_for_raw_node(&raw) {
                    Ok(front) => Some(front),
                    Err(err) => {
                        warn!(
                            node = ?raw,
                            error = %err,
                            "cannot resolve front; selection unchanged"
                        );
                        return Ok(());
                    }
                }
            }
        };
        self.set_node_front(front, reason);
        Ok(())
    }

    /// Select `front`. No-op when it is the same `Rc` as the current front.
    ///
    /// `reason` (default `"unknown"`) is recorded even when nothing changes.
    pub fn set_node_front(&self, front: Option<Rc<W::Front>>, reason: Option<&str>) {
        let reason = reason.unwrap_or(DEFAULT_REASON).to_string();
        let (outgoing_raw, outgoing_front) = {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                debug!("ignoring set_node_front on destroyed selection");
                return;
            }
            state.reason.clone_from(&reason);
            let unchanged = match (&state.current, &front) {
                (None, None) => true,
                (Some(current), Some(front)) => Rc::ptr_eq(&current.front, front),
                _ => false,
            };
            if unchanged {
                trace!(reason = %reason, "selection unchanged");
                return;
            }
            let current = state.current.as_ref();
            (
                current.and_then(|c| c.raw.clone()),
                current.map(|c| Rc::clone(&c.front)),
            )
        };

        let incoming_raw = front.as_ref().and_then(|f| f.raw_node());
        self.emit(SelectionEvent::BeforeNewNode {
            outgoing: outgoing_raw,
            incoming: incoming_raw.clone(),
            reason: reason.clone(),
        });
        self.emit(SelectionEvent::BeforeNewNodeFront {
            outgoing: outgoing_front,
            incoming: front.clone(),
            reason: reason.clone(),
        });

        debug!(selected = ?front, reason = %reason, "selection changed");
        let next = front.map(|front| Selected {
            front,
            raw: incoming_raw,
        });
        let previous = std::mem::replace(&mut self.inner.state.borrow_mut().current, next);
        let (previous_raw, previous_front) = match previous {
            Some(selected) => (selected.raw, Some(selected.front)),
            None => (None, None),
        };

        self.emit(SelectionEvent::NewNode {
            previous: previous_raw,
            reason: reason.clone(),
        });
        self.emit(SelectionEvent::NewNodeFront {
            previous: previous_front,
            reason,
        });
    }

    /// Classify one mutation batch and publish the derived events.
    ///
    /// Ignored once destroyed or while no walker is attached.
    pub fn handle_mutations(&self, records: &[MutationRecord<W::Front>]) {
        {
            let state = self.inner.state.borrow();
            if state.destroyed || state.walker.is_none() {
                trace!(records = records.len(), "ignoring mutations without a walker");
                return;
            }
        }

        let summary = classify_mutations(records, &self.inner.options, || self.is_connected());
        if summary.attribute_changed {
            self.emit(SelectionEvent::AttributeChanged);
        }
        if let Some(parent) = summary.detached_parent {
            debug!(parent = ?parent, "selection detached");
            self.emit(SelectionEvent::Detached {
                parent: parent.raw_node(),
            });
            self.emit(SelectionEvent::DetachedFront { parent });
        }
    }

    /// Clear the selection, then detach the walker. Terminal.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.set_node_front(None, None);
        self.set_walker(None);
        self.inner.state.borrow_mut().destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    pub fn walker(&self) -> Option<Rc<W>> {
        self.inner.state.borrow().walker.clone()
    }

    /// Reason given to the last `set_node`/`set_node_front` call.
    pub fn reason(&self) -> String {
        self.inner.state.borrow().reason.clone()
    }

    /// Raw handle of the selection; `None` when remote or nothing is selected.
    pub fn node(&self) -> Option<RawOf<W>> {
        let state = self.inner.state.borrow();
        state.current.as_ref().and_then(|c| c.raw.clone())
    }

    pub fn node_front(&self) -> Option<Rc<W::Front>> {
        let state = self.inner.state.borrow();
        state.current.as_ref().map(|c| Rc::clone(&c.front))
    }

    pub fn document(&self) -> Option<DocumentOf<W>> {
        if !self.is_node() {
            return None;
        }
        let raw = self.node()?;
        match raw.owner_document() {
            Ok(document) => Some(document),
            Err(err) => {
                trace!(error = %err, "owner document lookup failed");
                None
            }
        }
    }

    pub fn window(&self) -> Option<WindowOf<W>> {
        self.document()?.default_view()
    }

    /// Front of the selected node's document, as reported by the walker.
    pub fn document_front(&self) -> Option<Rc<W::Front>> {
        let walker = self.walker()?;
        walker.document(self.node_front().as_ref())
    }

    pub fn is_local(&self) -> bool {
        self.node().is_some()
    }

    /// A front is selected and its raw handle, if any, is still alive.
    pub fn is_node(&self) -> bool {
        let state = self.inner.state.borrow();
        match &state.current {
            None => false,
            Some(selected) => selected.raw.as_ref().is_none_or(|raw| !raw.is_dead()),
        }
    }

    /// Whether the selection is still reachable from the tree root.
    pub fn is_connected(&self) -> bool {
        let Some(front) = self.node_front() else {
            return false;
        };
        if front.actor_id().is_none() {
            return false;
        }
        if let Some(raw) = front.raw_node() {
            return local_contains(&raw);
        }
        let Some(root) = self.walker().and_then(|walker| walker.root_node()) else {
            return false;
        };
        reaches_root(&front, &root, self.inner.max_ancestor_depth)
    }

    pub fn is_root(&self) -> bool {
        self.is_node()
            && self.is_connected()
            && self
                .node_front()
                .is_some_and(|front| front.is_document_element())
    }

    pub fn is_html_node(&self) -> bool {
        self.is_node()
            && self
                .document()
                .and_then(|document| document.namespace_uri())
                .is_some_and(|ns| ns == XHTML_NAMESPACE)
    }

    /// Node type of the selection while [`Self::is_node`] holds.
    pub fn node_type(&self) -> Option<NodeType> {
        if !self.is_node() {
            return None;
        }
        self.node_front().map(|front| front.node_type())
    }

    fn is_node_type(&self, kind: NodeType) -> bool {
        self.node_type() == Some(kind)
    }

    pub fn is_element_node(&self) -> bool {
        self.is_node_type(NodeType::Element)
    }

    pub fn is_attribute_node(&self) -> bool {
        self.is_node_type(NodeType::Attribute)
    }

    pub fn is_text_node(&self) -> bool {
        self.is_node_type(NodeType::Text)
    }

    pub fn is_cdata_node(&self) -> bool {
        self.is_node_type(NodeType::CdataSection)
    }

    pub fn is_entity_ref_node(&self) -> bool {
        self.is_node_type(NodeType::EntityReference)
    }

    pub fn is_entity_node(&self) -> bool {
        self.is_node_type(NodeType::Entity)
    }

    pub fn is_processing_instruction_node(&self) -> bool {
        self.is_node_type(NodeType::ProcessingInstruction)
    }

    pub fn is_comment_node(&self) -> bool {
        self.is_node_type(NodeType::Comment)
    }

    pub fn is_document_node(&self) -> bool {
        self.is_node_type(NodeType::Document)
    }

    pub fn is_document_type_node(&self) -> bool {
        self.is_node_type(NodeType::DocumentType)
    }

    pub fn is_document_fragment_node(&self) -> bool {
        self.is_node_type(NodeType::DocumentFragment)
    }

    pub fn is_notation_node(&self) -> bool {
        self.is_node_type(NodeType::Notation)
    }

    fn emit(&self, event: SelectionEvent<W::Front>) {
        trace!(event = %event.kind(), "emit");
        self.inner.events.emit(&event);
    }
}
