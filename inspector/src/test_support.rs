//! Test-only helpers: a sample document, walker fixtures, and an event log.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;

use crate::core::types::{NodeType, XHTML_NAMESPACE};
use crate::events::{EventKind, Subscription};
use crate::io::trace_store::{Trace, write_trace};
use crate::memory::{MemoryFront, MemoryNode, MemoryTree, MemoryWalker, NodeSpec, WalkerMode};
use crate::replay::EventRecord;
use crate::selection::Selection;

/// Document element used across tests.
///
/// ```text
/// html
/// └── body
///     ├── div
///     │   ├── a (element)
///     │   ├── b (element)
///     │   └── text
///     └── section
///         └── comment
/// ```
pub fn sample_document() -> NodeSpec {
    NodeSpec::element(
        "html",
        vec![NodeSpec::element(
            "body",
            vec![
                NodeSpec::element(
                    "div",
                    vec![
                        NodeSpec::element("a", Vec::new()),
                        NodeSpec::element("b", Vec::new()),
                        NodeSpec::new("text", NodeType::Text),
                    ],
                ),
                NodeSpec::element("section", vec![NodeSpec::new("comment", NodeType::Comment)]),
            ],
        )],
    )
    .with_namespace(XHTML_NAMESPACE)
}

/// A sample tree with its walker.
pub struct Fixture {
    pub tree: MemoryTree,
    pub walker: Rc<MemoryWalker>,
}

impl Fixture {
    pub fn node(&self, label: &str) -> MemoryNode {
        self.tree
            .node(label)
            .unwrap_or_else(|| panic!("fixture has no node '{label}'"))
    }

    pub fn front(&self, label: &str) -> Rc<MemoryFront> {
        self.walker.front(&self.node(label))
    }
}

/// Local-mode fixture over [`sample_document`].
pub fn fixture() -> Fixture {
    fixture_with_mode(WalkerMode::Local)
}

pub fn fixture_with_mode(mode: WalkerMode) -> Fixture {
    let tree = MemoryTree::from_specs(&[sample_document()]).expect("build sample tree");
    let walker = MemoryWalker::new(tree.clone(), mode);
    Fixture { tree, walker }
}

/// Records every event a selection publishes while alive.
pub struct EventLog {
    entries: Rc<RefCell<Vec<EventRecord>>>,
    _subscription: Subscription,
}

impl EventLog {
    pub fn attach(selection: &Selection<MemoryWalker>) -> Self {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let subscription = {
            let entries = Rc::clone(&entries);
            selection.subscribe(move |event| {
                entries.borrow_mut().push(EventRecord::from_event(event));
            })
        };
        Self {
            entries,
            _subscription: subscription,
        }
    }

    pub fn entries(&self) -> Vec<EventRecord> {
        self.entries.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.entries.borrow().iter().map(|entry| entry.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Temp directory holding a trace file.
pub struct TraceDir {
    dir: tempfile::TempDir,
    pub trace_path: PathBuf,
}

impl TraceDir {
    pub fn new(trace: &Trace) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let trace_path = dir.path().join("trace.json");
        write_trace(&trace_path, trace)?;
        Ok(Self { dir, trace_path })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
