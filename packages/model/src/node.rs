//! # Nodes
//!
//! Node storage types. Nodes never own each other: an element's children are
//! [`NodeId`]s into the [`Tree`](crate::tree::Tree) arena and every node keeps
//! a parent id, so structural edits are cheap index updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::range::Range;
use crate::text_proxy::TextProxy;

/// Attribute map. Values are arbitrary JSON so features can store flags,
/// numbers or strings without the model caring.
pub type Attributes = BTreeMap<String, Value>;

/// Address of a node inside the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Root bookkeeping carried by root elements.
#[derive(Debug, Clone, PartialEq)]
pub struct RootInfo {
    pub name: String,
    pub attached: bool,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        name: String,
        children: Vec<NodeId>,
        root: Option<RootInfo>,
    },
    Text {
        data: String,
    },
    /// Detached container. Markers are staged here until the fragment is
    /// inserted into a document.
    Fragment {
        children: Vec<NodeId>,
        markers: BTreeMap<String, Range>,
    },
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub(crate) parent: Option<NodeId>,
    pub(crate) attributes: Attributes,
    pub(crate) kind: NodeKind,
}

impl NodeData {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn offset_size(&self) -> usize {
        match &self.kind {
            NodeKind::Text { data } => char_len(data),
            _ => 1,
        }
    }
}

/// One insertable item before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(NodeId),
    Text(String),
    Proxy(TextProxy),
}

/// Anything [`Tree::insert_child`](crate::tree::Tree::insert_child) accepts:
/// a single node, a bare string, a text proxy or a list of those.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInput(pub Vec<Item>);

impl From<NodeId> for NodeInput {
    fn from(id: NodeId) -> Self {
        NodeInput(vec![Item::Node(id)])
    }
}

impl From<Vec<NodeId>> for NodeInput {
    fn from(ids: Vec<NodeId>) -> Self {
        NodeInput(ids.into_iter().map(Item::Node).collect())
    }
}

impl From<&str> for NodeInput {
    fn from(text: &str) -> Self {
        NodeInput(vec![Item::Text(text.to_string())])
    }
}

impl From<String> for NodeInput {
    fn from(text: String) -> Self {
        NodeInput(vec![Item::Text(text)])
    }
}

impl From<TextProxy> for NodeInput {
    fn from(proxy: TextProxy) -> Self {
        NodeInput(vec![Item::Proxy(proxy)])
    }
}

impl From<Vec<Item>> for NodeInput {
    fn from(items: Vec<Item>) -> Self {
        NodeInput(items)
    }
}

/// Detached structural snapshot of a node, used by insert operations and
/// their JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeJson {
    Element {
        name: String,
        #[serde(default, skip_serializing_if = "Attributes::is_empty")]
        attributes: Attributes,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<NodeJson>,
    },
    Text {
        data: String,
        #[serde(default, skip_serializing_if = "Attributes::is_empty")]
        attributes: Attributes,
    },
}

impl NodeJson {
    pub fn offset_size(&self) -> usize {
        match self {
            NodeJson::Element { .. } => 1,
            NodeJson::Text { data, .. } => char_len(data),
        }
    }
}

/// Length of `text` in model offsets (Unicode scalar values).
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Slice `text` by model offsets, clamping both ends.
pub fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}
