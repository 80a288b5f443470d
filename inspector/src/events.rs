//! Publish/subscribe primitive and the events a selection publishes.
//!
//! [`EventEmitter<E>`] keeps its callbacks as weak references; the strong side
//! lives in the [`Subscription`] guard returned by `subscribe`. Dropping the
//! guard unsubscribes, and dead entries are pruned on the next `emit`.
//!
//! Callbacks are collected before any of them runs, so a callback may
//! subscribe, unsubscribe, or emit again without hitting a borrow conflict.
//! Callbacks subscribed during an emit receive events from the next one on.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::walker::NodeFront;

type CallbackRc<E> = Rc<dyn Fn(&E)>;
type CallbackWeak<E> = Weak<dyn Fn(&E)>;

/// Shared list of subscribers for events of type `E`.
///
/// Cloning an emitter yields another handle to the same subscriber list.
pub struct EventEmitter<E> {
    subscribers: Rc<RefCell<Vec<CallbackWeak<E>>>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscriber_count", &self.subscribers.borrow().len())
            .finish()
    }
}

impl<E: 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> EventEmitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register `callback`. It stays registered while the guard is alive.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let strong: CallbackRc<E> = Rc::new(callback);
        self.subscribers.borrow_mut().push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Deliver `event` to every live subscriber in registration order.
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<CallbackRc<E>> = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Keeps a callback registered. Dropping it unsubscribes.
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription")
    }
}

/// Names of the events a selection publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    BeforeNewNode,
    BeforeNewNodeFront,
    NewNode,
    NewNodeFront,
    AttributeChanged,
    Detached,
    DetachedFront,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BeforeNewNode => "before-new-node",
            EventKind::BeforeNewNodeFront => "before-new-node-front",
            EventKind::NewNode => "new-node",
            EventKind::NewNodeFront => "new-node-front",
            EventKind::AttributeChanged => "attribute-changed",
            EventKind::Detached => "detached",
            EventKind::DetachedFront => "detached-front",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event published by a selection over fronts of type `F`.
#[derive(Debug)]
pub enum SelectionEvent<F: NodeFront> {
    /// Fired before the slot changes. `outgoing` is still selected.
    BeforeNewNode {
        outgoing: Option<F::Raw>,
        incoming: Option<F::Raw>,
        reason: String,
    },
    BeforeNewNodeFront {
        outgoing: Option<Rc<F>>,
        incoming: Option<Rc<F>>,
        reason: String,
    },
    /// Fired after the slot changed; `previous` is what it held before.
    NewNode {
        previous: Option<F::Raw>,
        reason: String,
    },
    NewNodeFront {
        previous: Option<Rc<F>>,
        reason: String,
    },
    AttributeChanged,
    /// The selection lost connectivity; `parent` is the raw target of the
    /// record that disconnected it.
    Detached { parent: Option<F::Raw> },
    DetachedFront { parent: Rc<F> },
}

impl<F: NodeFront> SelectionEvent<F> {
    pub fn kind(&self) -> EventKind {
        match self {
            SelectionEvent::BeforeNewNode { .. } => EventKind::BeforeNewNode,
            SelectionEvent::BeforeNewNodeFront { .. } => EventKind::BeforeNewNodeFront,
            SelectionEvent::NewNode { .. } => EventKind::NewNode,
            SelectionEvent::NewNodeFront { .. } => EventKind::NewNodeFront,
            SelectionEvent::AttributeChanged => EventKind::AttributeChanged,
            SelectionEvent::Detached { .. } => EventKind::Detached,
            SelectionEvent::DetachedFront { .. } => EventKind::DetachedFront,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SelectionEvent::BeforeNewNode { reason, .. }
            | SelectionEvent::BeforeNewNodeFront { reason, .. }
            | SelectionEvent::NewNode { reason, .. }
            | SelectionEvent::NewNodeFront { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }
}

impl<F: NodeFront> Clone for SelectionEvent<F> {
    fn clone(&self) -> Self {
        match self {
            SelectionEvent::BeforeNewNode {
                outgoing,
                incoming,
                reason,
            } => SelectionEvent::BeforeNewNode {
                outgoing: outgoing.clone(),
                incoming: incoming.clone(),
                reason: reason.clone(),
            },
            SelectionEvent::BeforeNewNodeFront {
                outgoing,
                incoming,
                reason,
            } => SelectionEvent::BeforeNewNodeFront {
                outgoing: outgoing.clone(),
                incoming: incoming.clone(),
                reason: reason.clone(),
            },
            SelectionEvent::NewNode { previous, reason } => SelectionEvent::NewNode {
                previous: previous.clone(),
                reason: reason.clone(),
            },
            SelectionEvent::NewNodeFront { previous, reason } => SelectionEvent::NewNodeFront {
                previous: previous.clone(),
                reason: reason.clone(),
            },
            SelectionEvent::AttributeChanged => SelectionEvent::AttributeChanged,
            SelectionEvent::Detached { parent } => SelectionEvent::Detached {
                parent: parent.clone(),
            },
            SelectionEvent::DetachedFront { parent } => SelectionEvent::DetachedFront {
                parent: Rc::clone(parent),
            },
        }
    }
}
