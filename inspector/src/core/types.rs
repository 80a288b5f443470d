//! Shared types for selection tracking.
//!
//! These types form the contract between the tracker and the tree
//! collaborators. They carry no behavior beyond conversions.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Namespace URI that marks a document as XHTML.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Kind of a tree node, numbered with the DOM `nodeType` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Element,
    Attribute,
    Text,
    CdataSection,
    EntityReference,
    Entity,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentType,
    DocumentFragment,
    Notation,
}

impl NodeType {
    /// DOM `nodeType` code.
    pub fn code(self) -> u16 {
        match self {
            NodeType::Element => 1,
            NodeType::Attribute => 2,
            NodeType::Text => 3,
            NodeType::CdataSection => 4,
            NodeType::EntityReference => 5,
            NodeType::Entity => 6,
            NodeType::ProcessingInstruction => 7,
            NodeType::Comment => 8,
            NodeType::Document => 9,
            NodeType::DocumentType => 10,
            NodeType::DocumentFragment => 11,
            NodeType::Notation => 12,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let kind = match code {
            1 => NodeType::Element,
            2 => NodeType::Attribute,
            3 => NodeType::Text,
            4 => NodeType::CdataSection,
            5 => NodeType::EntityReference,
            6 => NodeType::Entity,
            7 => NodeType::ProcessingInstruction,
            8 => NodeType::Comment,
            9 => NodeType::Document,
            10 => NodeType::DocumentType,
            11 => NodeType::DocumentFragment,
            12 => NodeType::Notation,
            _ => return None,
        };
        Some(kind)
    }
}

/// Kind tag of a mutation record. Kinds other than `attributes` and
/// `childList` are carried through but never classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Attributes,
    CharacterData,
    ChildList,
    #[serde(other)]
    Other,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Attributes => "attributes",
            MutationKind::CharacterData => "characterData",
            MutationKind::ChildList => "childList",
            MutationKind::Other => "other",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of a mutation batch delivered by a walker.
pub struct MutationRecord<F> {
    pub kind: MutationKind,
    /// Front of the node the mutation happened on. For `childList` records
    /// this is the parent whose child list changed.
    pub target: Rc<F>,
}

impl<F> MutationRecord<F> {
    pub fn new(kind: MutationKind, target: Rc<F>) -> Self {
        Self { kind, target }
    }
}

impl<F> Clone for MutationRecord<F> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            target: Rc::clone(&self.target),
        }
    }
}

impl<F: fmt::Debug> fmt::Debug for MutationRecord<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRecord")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .finish()
    }
}

/// Which derived events a tracker computes and emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    /// Emit `attribute-changed` for batches containing attribute records.
    pub attributes: bool,
    /// Emit `detached`/`detached-front` when a batch disconnects the selection.
    pub detached: bool,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            attributes: true,
            detached: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_codes_are_distinct_and_invertible() {
        for code in 1..=12 {
            let kind = NodeType::from_code(code).expect("known code");
            assert_eq!(kind.code(), code);
        }
        assert_eq!(NodeType::from_code(0), None);
        assert_eq!(NodeType::from_code(13), None);
        assert_ne!(
            NodeType::Comment.code(),
            NodeType::ProcessingInstruction.code()
        );
    }

    #[test]
    fn unknown_mutation_kinds_parse_as_other() {
        let kind: MutationKind = serde_json::from_str("\"pseudoClassLock\"").expect("parse");
        assert_eq!(kind, MutationKind::Other);
        let kind: MutationKind = serde_json::from_str("\"childList\"").expect("parse");
        assert_eq!(kind, MutationKind::ChildList);
    }

    #[test]
    fn tracking_options_default_to_everything() {
        let options: TrackingOptions = toml::from_str("attributes = false").expect("parse");
        assert!(!options.attributes);
        assert!(options.detached);
    }
}
