use crate::node::{char_slice, Attributes, NodeId};
use crate::tree::Tree;

/// Read-only view over part of a text node.
///
/// A proxy does not own characters; it resolves them against the tree on
/// demand and is never stored as a child. Inserting a proxy materializes a
/// new text node with the same attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextProxy {
    pub text: NodeId,
    pub offset_in_text: usize,
    pub length: usize,
}

impl TextProxy {
    pub fn new(text: NodeId, offset_in_text: usize, length: usize) -> Self {
        Self {
            text,
            offset_in_text,
            length,
        }
    }

    pub fn data(&self, tree: &Tree) -> String {
        let full = tree.data(self.text).unwrap_or_default();
        char_slice(full, self.offset_in_text, self.offset_in_text + self.length)
    }

    pub fn attributes<'a>(&self, tree: &'a Tree) -> &'a Attributes {
        tree.attributes(self.text)
    }

    pub fn parent(&self, tree: &Tree) -> Option<NodeId> {
        tree.parent(self.text)
    }

    /// Offset of the proxy's first character inside the parent.
    pub fn start_offset(&self, tree: &Tree) -> Option<usize> {
        tree.start_offset(self.text).map(|start| start + self.offset_in_text)
    }

    pub fn end_offset(&self, tree: &Tree) -> Option<usize> {
        self.start_offset(tree).map(|start| start + self.length)
    }

    /// True when the proxy covers only part of its text node.
    pub fn is_partial(&self, tree: &Tree) -> bool {
        self.offset_in_text != 0 || self.length != tree.offset_size(self.text)
    }
}
