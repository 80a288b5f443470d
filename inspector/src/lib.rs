//! Selection tracking over a remotely observed document tree.
//!
//! A [`selection::Selection`] holds the currently selected node of a tree
//! exposed through a walker, keeps that reference meaningful while the tree
//! mutates, and publishes change events. The crate is split as follows:
//!
//! - **[`core`]**: Pure logic (mutation classification, connectivity).
//! - **[`walker`]**: Collaborator traits for raw nodes, fronts, and walkers.
//! - **[`events`]**: Publish/subscribe primitive and the selection events.
//! - **[`selection`]**: The tracker itself.
//! - **[`memory`]**: An in-process tree and walker implementing the traits.
//! - **[`io`]**: Configuration and trace files.
//!
//! [`replay`] ties these together for the `inspector replay` command.

pub mod core;
pub mod events;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod memory;
pub mod replay;
pub mod selection;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod walker;
