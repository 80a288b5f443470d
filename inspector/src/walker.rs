//! Collaborator seams: the raw tree, its remote fronts, and the walker.
//!
//! A selection holds a node as a pair of handles. The *front* is the proxy the
//! walker hands out and is compared by `Rc` pointer identity. The *raw* node
//! is the live node in its native tree and is only available when the tree
//! lives in the same process. Both directions of resolution go through these
//! traits; the tracker never infers one handle from the other on its own.
//!
//! Methods that touch a raw node return `Result` because the node may have
//! been invalidated. The tracker treats any such error as "not connected".

use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use crate::core::types::{MutationRecord, NodeType};
use crate::events::Subscription;

/// A node in its native, in-process tree.
pub trait RawNode: Clone + fmt::Debug {
    type Document: RawDocument<Node = Self>;

    /// True once the underlying node has been invalidated.
    fn is_dead(&self) -> bool;

    fn owner_document(&self) -> Result<Self::Document>;

    /// Inclusive descendant test, like DOM `Node.contains`.
    fn contains(&self, other: &Self) -> Result<bool>;
}

/// The document owning a [`RawNode`].
pub trait RawDocument: Clone + fmt::Debug {
    type Node;
    type Window: Clone + fmt::Debug;

    /// Window presenting the document, if it is still shown.
    fn default_view(&self) -> Option<Self::Window>;

    fn document_element(&self) -> Result<Option<Self::Node>>;

    fn namespace_uri(&self) -> Option<String>;
}

/// Proxy for a node as known by a walker.
pub trait NodeFront: fmt::Debug {
    type Raw: RawNode;

    /// Stable identity of the remote actor. `None` once released.
    fn actor_id(&self) -> Option<&str>;

    fn node_type(&self) -> NodeType;

    /// True for the root element of its document.
    fn is_document_element(&self) -> bool;

    fn parent_node(&self) -> Option<Rc<Self>>;

    /// Live raw node behind this front, when the tree is in-process.
    fn raw_node(&self) -> Option<Self::Raw>;
}

/// Raw node type reachable through a walker's fronts.
pub type RawOf<W> = <<W as Walker>::Front as NodeFront>::Raw;

/// Callback receiving one mutation batch.
pub type MutationHandler<F> = Box<dyn Fn(&[MutationRecord<F>])>;

/// Upstream tree observer supplying fronts and mutation batches.
pub trait Walker {
    type Front: NodeFront;

    /// Canonical front for a raw node.
    fn front_for_raw_node(
        &self,
        raw: &<Self::Front as NodeFront>::Raw,
    ) -> Result<Rc<Self::Front>>;

    /// Front of the document owning `node`, or of the walker's root
    /// document when `node` is `None`.
    fn document(&self, node: Option<&Rc<Self::Front>>) -> Option<Rc<Self::Front>>;

    /// Front of the tree root.
    fn root_node(&self) -> Option<Rc<Self::Front>>;

    /// Subscribe to mutation batches. Dropping the returned guard unsubscribes.
    fn on_mutations(&self, handler: MutationHandler<Self::Front>) -> Subscription;
}
