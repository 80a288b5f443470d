//! Replay a trace against a selection over an in-memory tree.
//!
//! Builds the tree, attaches a [`Selection`] to a [`MemoryWalker`], applies
//! each step in order, flushes whatever is still queued at the end, and
//! reports every event the selection published.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::events::{EventKind, SelectionEvent};
use crate::exit_codes;
use crate::io::config::TrackerConfig;
use crate::io::trace_store::{Step, Trace};
use crate::memory::{MemoryFront, MemoryNode, MemoryTree, MemoryWalker};
use crate::selection::Selection;

/// Printable form of one published event.
///
/// `node` is the outgoing node for `before-*` events, the previous node for
/// `new-*` events, and the parent for `detached*` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn raw_label(node: &Option<MemoryNode>) -> Option<String> {
    node.as_ref().map(MemoryNode::label)
}

fn front_label(front: &Option<Rc<MemoryFront>>) -> Option<String> {
    front.as_ref().map(|front| front.label())
}

impl EventRecord {
    pub fn from_event(event: &SelectionEvent<MemoryFront>) -> Self {
        let (node, incoming) = match event {
            SelectionEvent::BeforeNewNode {
                outgoing, incoming, ..
            } => (raw_label(outgoing), raw_label(incoming)),
            SelectionEvent::BeforeNewNodeFront {
                outgoing, incoming, ..
            } => (front_label(outgoing), front_label(incoming)),
            SelectionEvent::NewNode { previous, .. } => (raw_label(previous), None),
            SelectionEvent::NewNodeFront { previous, .. } => (front_label(previous), None),
            SelectionEvent::AttributeChanged => (None, None),
            SelectionEvent::Detached { parent } => (raw_label(parent), None),
            SelectionEvent::DetachedFront { parent } => (Some(parent.label()), None),
        };
        Self {
            kind: event.kind(),
            node,
            incoming,
            reason: event.reason().map(str::to_string),
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match self.kind {
            EventKind::AttributeChanged => {}
            EventKind::BeforeNewNode | EventKind::BeforeNewNodeFront => {
                write!(f, " node={}", self.node.as_deref().unwrap_or("-"))?;
                write!(f, " incoming={}", self.incoming.as_deref().unwrap_or("-"))?;
            }
            _ => write!(f, " node={}", self.node.as_deref().unwrap_or("-"))?,
        }
        if let Some(reason) = &self.reason {
            write!(f, " reason={reason}")?;
        }
        Ok(())
    }
}

/// Result of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayOutcome {
    pub events: Vec<EventRecord>,
    /// Node selected after the last step.
    pub selected: Option<String>,
    pub connected: bool,
}

impl ReplayOutcome {
    pub fn exit_code(&self) -> i32 {
        if self.selected.is_some() && !self.connected {
            exit_codes::DISCONNECTED
        } else {
            exit_codes::OK
        }
    }
}

#[instrument(skip_all, fields(mode = ?trace.mode, steps = trace.steps.len()))]
pub fn replay(trace: &Trace, config: &TrackerConfig) -> Result<ReplayOutcome> {
    config.validate()?;
    let tree = MemoryTree::from_specs(std::slice::from_ref(&trace.tree)).context("build tree")?;
    if !trace.view {
        tree.close_view();
    }
    let walker = MemoryWalker::new(tree, trace.mode);
    let selection = Selection::from_config(Some(Rc::clone(&walker)), config);

    let events = Rc::new(RefCell::new(Vec::new()));
    let subscription = {
        let events = Rc::clone(&events);
        selection.subscribe(move |event| {
            events.borrow_mut().push(EventRecord::from_event(event));
        })
    };

    for (index, step) in trace.steps.iter().enumerate() {
        apply_step(&selection, &walker, step)
            .with_context(|| format!("step {} ({})", index, step.op()))?;
    }
    walker.flush();

    let selected = selection.node_front().map(|front| front.label());
    let connected = selection.is_connected();
    drop(subscription);
    selection.destroy();

    let events = events.take();
    debug!(events = events.len(), ?selected, connected, "replay finished");
    Ok(ReplayOutcome {
        events,
        selected,
        connected,
    })
}

fn lookup(walker: &MemoryWalker, label: &str) -> Result<MemoryNode> {
    walker
        .tree()
        .node(label)
        .ok_or_else(|| anyhow!("unknown node '{}'", label))
}

fn apply_step(
    selection: &Selection<MemoryWalker>,
    walker: &MemoryWalker,
    step: &Step,
) -> Result<()> {
    match step {
        Step::Select { node, reason } => {
            let raw = node
                .as_deref()
                .map(|label| lookup(walker, label))
                .transpose()?;
            selection.set_node(raw, reason.as_deref())?;
        }
        Step::SetAttribute { node, name, value } => {
            walker.set_attribute(&lookup(walker, node)?, name, value)?;
        }
        Step::Append { parent, node } => {
            walker.insert(&lookup(walker, parent)?, node)?;
        }
        Step::Move { node, parent } => {
            walker.append_child(&lookup(walker, parent)?, &lookup(walker, node)?)?;
        }
        Step::Remove { node } => walker.remove(&lookup(walker, node)?)?,
        Step::Invalidate { node } => walker.tree().invalidate(&lookup(walker, node)?),
        Step::Release { node } => walker.release(&lookup(walker, node)?),
        Step::Flush => {
            walker.flush();
        }
    }
    Ok(())
}
