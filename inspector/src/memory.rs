//! In-process tree and walker.
//!
//! [`MemoryTree`] is a small arena-backed document. [`MemoryWalker`] hands out
//! cached [`MemoryFront`]s for its nodes and queues mutation records that are
//! published as one batch on [`MemoryWalker::flush`].
//!
//! In [`WalkerMode::Local`] fronts resolve to their raw node. In
//! [`WalkerMode::Remote`] they do not, so consumers must rely on the parent
//! chain of fronts alone.
//!
//! Structural edits live on the walker because they must be recorded.
//! Invalidation and closing the view live on the tree because they produce no
//! records.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::types::{MutationKind, MutationRecord, NodeType};
use crate::events::{EventEmitter, Subscription};
use crate::walker::{MutationHandler, NodeFront, RawDocument, RawNode, Walker};

type NodeId = usize;

const DOCUMENT: NodeId = 0;
const DOCUMENT_LABEL: &str = "#document";

/// Serializable description of a subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSpec {
    /// Unique label used to address the node.
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Tag or node name. Defaults to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(id: &str, node_type: NodeType) -> Self {
        Self {
            id: id.to_string(),
            node_type,
            name: None,
            namespace: None,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn element(id: &str, children: Vec<NodeSpec>) -> Self {
        Self {
            children,
            ..Self::new(id, NodeType::Element)
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
}

struct NodeData {
    label: String,
    node_type: NodeType,
    name: String,
    namespace: Option<String>,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    alive: bool,
}

struct Arena {
    nodes: Vec<NodeData>,
    labels: HashMap<String, NodeId>,
    view_open: bool,
}

impl Arena {
    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id].parent;
        }
        false
    }

    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id].parent.take()?;
        self.nodes[parent].children.retain(|child| *child != id);
        Some(parent)
    }

    fn descendants_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut index = 0;
        while index < out.len() {
            out.extend(self.nodes[out[index]].children.iter().copied());
            index += 1;
        }
        out
    }
}

/// Arena-backed document tree. Cloning shares the same tree.
#[derive(Clone)]
pub struct MemoryTree {
    arena: Rc<RefCell<Arena>>,
}

impl fmt::Debug for MemoryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.borrow();
        f.debug_struct("MemoryTree")
            .field("nodes", &arena.nodes.len())
            .field("view_open", &arena.view_open)
            .finish()
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Empty document with an open view.
    pub fn new() -> Self {
        let document = NodeData {
            label: DOCUMENT_LABEL.to_string(),
            node_type: NodeType::Document,
            name: DOCUMENT_LABEL.to_string(),
            namespace: None,
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            alive: true,
        };
        let mut labels = HashMap::new();
        labels.insert(DOCUMENT_LABEL.to_string(), DOCUMENT);
        Self {
            arena: Rc::new(RefCell::new(Arena {
                nodes: vec![document],
                labels,
                view_open: true,
            })),
        }
    }

    /// Document whose children are built from `specs`.
    pub fn from_specs(specs: &[NodeSpec]) -> Result<Self> {
        let tree = Self::new();
        let document = tree.document_node();
        for spec in specs {
            let node = tree.create_subtree(spec)?;
            tree.append(&document, &node)?;
        }
        Ok(tree)
    }

    pub fn document_node(&self) -> MemoryNode {
        self.handle(DOCUMENT)
    }

    pub fn document(&self) -> MemoryDocument {
        MemoryDocument { tree: self.clone() }
    }

    pub fn node(&self, label: &str) -> Option<MemoryNode> {
        let id = *self.arena.borrow().labels.get(label)?;
        Some(self.handle(id))
    }

    /// Create a detached node. Labels must be unique within the tree.
    pub fn create(
        &self,
        label: &str,
        node_type: NodeType,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<MemoryNode> {
        let mut arena = self.arena.borrow_mut();
        if arena.labels.contains_key(label) {
            bail!("duplicate node id '{}'", label);
        }
        let id = arena.nodes.len();
        arena.nodes.push(NodeData {
            label: label.to_string(),
            node_type,
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            alive: true,
        });
        arena.labels.insert(label.to_string(), id);
        drop(arena);
        Ok(self.handle(id))
    }

    /// Create a detached subtree from `spec`; returns its top node.
    pub fn create_subtree(&self, spec: &NodeSpec) -> Result<MemoryNode> {
        let name = spec.name.as_deref().unwrap_or(&spec.id);
        let node = self.create(&spec.id, spec.node_type, name, spec.namespace.as_deref())?;
        {
            let mut arena = self.arena.borrow_mut();
            arena.nodes[node.id].attributes = spec.attributes.clone();
        }
        for child in &spec.children {
            let child = self.create_subtree(child)?;
            self.append(&node, &child)?;
        }
        Ok(node)
    }

    /// Mark `node` and its descendants dead. Structure is kept.
    pub fn invalidate(&self, node: &MemoryNode) {
        let mut arena = self.arena.borrow_mut();
        for id in arena.descendants_inclusive(node.id) {
            arena.nodes[id].alive = false;
        }
    }

    /// Drop the window presenting the document.
    pub fn close_view(&self) {
        self.arena.borrow_mut().view_open = false;
    }

    fn handle(&self, id: NodeId) -> MemoryNode {
        MemoryNode {
            tree: self.clone(),
            id,
        }
    }

    fn owns(&self, node: &MemoryNode) -> bool {
        Rc::ptr_eq(&self.arena, &node.tree.arena)
    }

    fn check_live(&self, node: &MemoryNode) -> Result<()> {
        if !self.owns(node) {
            bail!("node '{}' belongs to another tree", node.label());
        }
        if node.is_dead() {
            bail!("can't access dead node '{}'", node.label());
        }
        Ok(())
    }

    /// Move `child` under `parent`; returns the previous parent.
    fn append(&self, parent: &MemoryNode, child: &MemoryNode) -> Result<Option<MemoryNode>> {
        self.check_live(parent)?;
        self.check_live(child)?;
        let mut arena = self.arena.borrow_mut();
        if child.id == DOCUMENT {
            bail!("the document cannot be moved");
        }
        if arena.is_ancestor_or_self(child.id, parent.id) {
            bail!(
                "cannot append '{}' under its own descendant '{}'",
                arena.nodes[child.id].label,
                arena.nodes[parent.id].label
            );
        }
        let previous = arena.detach(child.id);
        arena.nodes[child.id].parent = Some(parent.id);
        arena.nodes[parent.id].children.push(child.id);
        drop(arena);
        Ok(previous.map(|id| self.handle(id)))
    }

    /// Detach `node` from its parent; returns the previous parent.
    fn remove(&self, node: &MemoryNode) -> Result<Option<MemoryNode>> {
        self.check_live(node)?;
        let previous = self.arena.borrow_mut().detach(node.id);
        Ok(previous.map(|id| self.handle(id)))
    }

    fn set_attribute(&self, node: &MemoryNode, name: &str, value: &str) -> Result<()> {
        self.check_live(node)?;
        let mut arena = self.arena.borrow_mut();
        let data = &mut arena.nodes[node.id];
        if data.node_type != NodeType::Element {
            bail!("'{}' is not an element", data.label);
        }
        data.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// Raw handle to a node of a [`MemoryTree`].
#[derive(Clone)]
pub struct MemoryNode {
    tree: MemoryTree,
    id: NodeId,
}

impl PartialEq for MemoryNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tree.owns(other)
    }
}

impl Eq for MemoryNode {}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryNode({})", self.label())
    }
}

impl MemoryNode {
    pub fn label(&self) -> String {
        self.tree.arena.borrow().nodes[self.id].label.clone()
    }

    pub fn name(&self) -> String {
        self.tree.arena.borrow().nodes[self.id].name.clone()
    }

    pub fn node_type(&self) -> NodeType {
        self.tree.arena.borrow().nodes[self.id].node_type
    }

    pub fn namespace_uri(&self) -> Option<String> {
        self.tree.arena.borrow().nodes[self.id].namespace.clone()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.tree.arena.borrow().nodes[self.id]
            .attributes
            .get(name)
            .cloned()
    }

    pub fn parent(&self) -> Option<MemoryNode> {
        let parent = self.tree.arena.borrow().nodes[self.id].parent?;
        Some(self.tree.handle(parent))
    }

    pub fn children(&self) -> Vec<MemoryNode> {
        let children = self.tree.arena.borrow().nodes[self.id].children.clone();
        children.into_iter().map(|id| self.tree.handle(id)).collect()
    }
}

impl RawNode for MemoryNode {
    type Document = MemoryDocument;

    fn is_dead(&self) -> bool {
        !self.tree.arena.borrow().nodes[self.id].alive
    }

    fn owner_document(&self) -> Result<MemoryDocument> {
        self.tree.check_live(self)?;
        Ok(self.tree.document())
    }

    fn contains(&self, other: &Self) -> Result<bool> {
        self.tree.check_live(self)?;
        self.tree.check_live(other)?;
        Ok(self.tree.arena.borrow().is_ancestor_or_self(self.id, other.id))
    }
}

/// Document of a [`MemoryTree`].
#[derive(Clone, Debug)]
pub struct MemoryDocument {
    tree: MemoryTree,
}

/// Window presenting a [`MemoryDocument`].
#[derive(Clone, Debug)]
pub struct MemoryWindow {
    tree: MemoryTree,
}

impl MemoryWindow {
    pub fn document(&self) -> MemoryDocument {
        self.tree.document()
    }
}

impl RawDocument for MemoryDocument {
    type Node = MemoryNode;
    type Window = MemoryWindow;

    fn default_view(&self) -> Option<MemoryWindow> {
        self.tree
            .arena
            .borrow()
            .view_open
            .then(|| MemoryWindow {
                tree: self.tree.clone(),
            })
    }

    fn document_element(&self) -> Result<Option<MemoryNode>> {
        let document = self.tree.document_node();
        Ok(document
            .children()
            .into_iter()
            .find(|child| child.node_type() == NodeType::Element))
    }

    fn namespace_uri(&self) -> Option<String> {
        self.document_element().ok().flatten()?.namespace_uri()
    }
}

/// How fronts expose their raw node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkerMode {
    /// Fronts resolve to their raw node.
    #[default]
    Local,
    /// Fronts never expose a raw node.
    Remote,
}

/// Front handed out by a [`MemoryWalker`].
pub struct MemoryFront {
    actor: String,
    released: Cell<bool>,
    node: MemoryNode,
    walker: Weak<MemoryWalker>,
    local: bool,
}

impl fmt::Debug for MemoryFront {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFront")
            .field("actor", &self.actor)
            .field("node", &self.node)
            .field("released", &self.released.get())
            .finish()
    }
}

impl MemoryFront {
    pub fn label(&self) -> String {
        self.node.label()
    }

    /// The node behind this front, regardless of mode.
    pub fn target(&self) -> &MemoryNode {
        &self.node
    }
}

impl NodeFront for MemoryFront {
    type Raw = MemoryNode;

    fn actor_id(&self) -> Option<&str> {
        (!self.released.get()).then_some(self.actor.as_str())
    }

    fn node_type(&self) -> NodeType {
        self.node.node_type()
    }

    fn is_document_element(&self) -> bool {
        self.node.node_type() == NodeType::Element
            && self.node.parent().is_some_and(|parent| parent.id == DOCUMENT)
    }

    fn parent_node(&self) -> Option<Rc<Self>> {
        let walker = self.walker.upgrade()?;
        let parent = self.node.parent()?;
        Some(walker.front(&parent))
    }

    fn raw_node(&self) -> Option<MemoryNode> {
        self.local.then(|| self.node.clone())
    }
}

type Batch = Vec<MutationRecord<MemoryFront>>;

/// Walker over a [`MemoryTree`].
pub struct MemoryWalker {
    tree: MemoryTree,
    mode: WalkerMode,
    this: Weak<MemoryWalker>,
    fronts: RefCell<HashMap<NodeId, Rc<MemoryFront>>>,
    next_actor: Cell<u64>,
    pending: RefCell<Batch>,
    mutations: EventEmitter<Batch>,
}

impl fmt::Debug for MemoryWalker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWalker")
            .field("mode", &self.mode)
            .field("fronts", &self.fronts.borrow().len())
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}

impl MemoryWalker {
    pub fn new(tree: MemoryTree, mode: WalkerMode) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            tree,
            mode,
            this: this.clone(),
            fronts: RefCell::new(HashMap::new()),
            next_actor: Cell::new(1),
            pending: RefCell::new(Vec::new()),
            mutations: EventEmitter::new(),
        })
    }

    pub fn tree(&self) -> &MemoryTree {
        &self.tree
    }

    pub fn mode(&self) -> WalkerMode {
        self.mode
    }

    /// Cached front for `node`, created on first use.
    pub fn front(&self, node: &MemoryNode) -> Rc<MemoryFront> {
        let mut fronts = self.fronts.borrow_mut();
        let front = fronts.entry(node.id).or_insert_with(|| {
            let actor = self.next_actor.get();
            self.next_actor.set(actor + 1);
            Rc::new(MemoryFront {
                actor: format!("node{actor}"),
                released: Cell::new(false),
                node: node.clone(),
                walker: self.this.clone(),
                local: self.mode == WalkerMode::Local,
            })
        });
        Rc::clone(front)
    }

    /// Front of the document node.
    pub fn root(&self) -> Option<Rc<MemoryFront>> {
        Some(self.front(&self.tree.document_node()))
    }

    /// Release the actor behind `node`'s front. The old front loses its
    /// identity; the next lookup creates a new front.
    pub fn release(&self, node: &MemoryNode) {
        if let Some(front) = self.fronts.borrow_mut().remove(&node.id) {
            front.released.set(true);
        }
    }

    pub fn set_attribute(&self, node: &MemoryNode, name: &str, value: &str) -> Result<()> {
        self.tree.set_attribute(node, name, value)?;
        self.record(MutationKind::Attributes, node);
        Ok(())
    }

    pub fn append_child(&self, parent: &MemoryNode, child: &MemoryNode) -> Result<()> {
        let previous = self.tree.append(parent, child)?;
        if let Some(previous) = previous {
            self.record(MutationKind::ChildList, &previous);
        }
        self.record(MutationKind::ChildList, parent);
        Ok(())
    }

    /// Create `spec` and append it under `parent`.
    pub fn insert(&self, parent: &MemoryNode, spec: &NodeSpec) -> Result<MemoryNode> {
        let node = self.tree.create_subtree(spec)?;
        self.append_child(parent, &node)?;
        Ok(node)
    }

    pub fn remove(&self, node: &MemoryNode) -> Result<()> {
        if let Some(previous) = self.tree.remove(node)? {
            self.record(MutationKind::ChildList, &previous);
        }
        Ok(())
    }

    /// Publish queued records as one batch. Returns the batch size.
    pub fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        if batch.is_empty() {
            return 0;
        }
        trace!(records = batch.len(), "flushing mutations");
        self.mutations.emit(&batch);
        batch.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.mutations.subscriber_count()
    }

    fn record(&self, kind: MutationKind, target: &MemoryNode) {
        let record = MutationRecord::new(kind, self.front(target));
        self.pending.borrow_mut().push(record);
    }
}

impl Walker for MemoryWalker {
    type Front = MemoryFront;

    /// Dead nodes still resolve; only nodes of another tree are rejected.
    fn front_for_raw_node(&self, raw: &MemoryNode) -> Result<Rc<MemoryFront>> {
        if !self.tree.owns(raw) {
            return Err(anyhow!(
                "cannot resolve front: node '{}' belongs to another tree",
                raw.label()
            ));
        }
        Ok(self.front(raw))
    }

    fn document(&self, _node: Option<&Rc<MemoryFront>>) -> Option<Rc<MemoryFront>> {
        self.root()
    }

    fn root_node(&self) -> Option<Rc<MemoryFront>> {
        self.root()
    }

    fn on_mutations(&self, handler: MutationHandler<MemoryFront>) -> Subscription {
        self.mutations.subscribe(move |batch: &Batch| handler(batch))
    }
}
