//! # Node arena
//!
//! Every element, text node and document fragment lives in one [`Tree`].
//! Nodes are never freed; removing a node only clears its parent link, so
//! ids held by operations, positions or callers stay valid.
//!
//! Only operations (through the document) mutate a document-attached part of
//! the tree. Detached nodes and fragments may be edited directly, which is
//! how writers build content before inserting it.

use std::collections::BTreeMap;

use quire_common::{ModelError, ModelResult};
use serde_json::{json, Value};

use crate::node::{char_len, char_slice, Attributes, Item, NodeData, NodeId, NodeInput, NodeJson, NodeKind, RootInfo};
use crate::range::Range;

/// Root holding removed content. Every tree creates it first.
pub const GRAVEYARD: NodeId = NodeId(0);
pub const GRAVEYARD_NAME: &str = "$graveyard";

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.create_root("$root", GRAVEYARD_NAME);
        tree
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        id
    }

    pub fn create_element(&mut self, name: impl Into<String>, attributes: Attributes) -> NodeId {
        self.push(NodeData {
            parent: None,
            attributes,
            kind: NodeKind::Element {
                name: name.into(),
                children: Vec::new(),
                root: None,
            },
        })
    }

    pub fn create_text(&mut self, data: impl Into<String>, attributes: Attributes) -> NodeId {
        self.push(NodeData {
            parent: None,
            attributes,
            kind: NodeKind::Text { data: data.into() },
        })
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeData {
            parent: None,
            attributes: Attributes::new(),
            kind: NodeKind::Fragment {
                children: Vec::new(),
                markers: BTreeMap::new(),
            },
        })
    }

    pub(crate) fn create_root(&mut self, element_name: &str, root_name: &str) -> NodeId {
        self.push(NodeData {
            parent: None,
            attributes: Attributes::new(),
            kind: NodeKind::Element {
                name: element_name.to_string(),
                children: Vec::new(),
                root: Some(RootInfo {
                    name: root_name.to_string(),
                    attached: true,
                }),
            },
        })
    }

    pub fn get(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    // ---- kind queries -------------------------------------------------

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.get(id).kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.get(id).kind, NodeKind::Text { .. })
    }

    pub fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.get(id).kind, NodeKind::Fragment { .. })
    }

    /// True for document root elements.
    pub fn is_root_element(&self, id: NodeId) -> bool {
        self.root_info(id).is_some()
    }

    pub fn root_info(&self, id: NodeId) -> Option<&RootInfo> {
        match &self.get(id).kind {
            NodeKind::Element { root, .. } => root.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn set_root_attached(&mut self, id: NodeId, attached: bool) {
        if let NodeKind::Element { root: Some(info), .. } = &mut self.get_mut(id).kind {
            info.attached = attached;
        }
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn data(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).kind {
            NodeKind::Text { data } => Some(data),
            _ => None,
        }
    }

    // ---- attributes ---------------------------------------------------

    pub fn attributes(&self, id: NodeId) -> &Attributes {
        &self.get(id).attributes
    }

    pub fn get_attribute(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.get(id).attributes.get(key)
    }

    pub fn has_attribute(&self, id: NodeId, key: &str) -> bool {
        self.get(id).attributes.contains_key(key)
    }

    pub fn set_attribute(&mut self, id: NodeId, key: impl Into<String>, value: Value) {
        self.get_mut(id).attributes.insert(key.into(), value);
    }

    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Option<Value> {
        self.get_mut(id).attributes.remove(key)
    }

    pub fn set_attributes_to(&mut self, id: NodeId, attributes: Attributes) {
        self.get_mut(id).attributes = attributes;
    }

    pub(crate) fn rename(&mut self, id: NodeId, new_name: &str) {
        if let NodeKind::Element { name, .. } = &mut self.get_mut(id).kind {
            *name = new_name.to_string();
        }
    }

    // ---- structure ----------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.get(id).kind {
            NodeKind::Element { children, .. } | NodeKind::Fragment { children, .. } => children,
            NodeKind::Text { .. } => &[],
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match &mut self.get_mut(id).kind {
            NodeKind::Element { children, .. } | NodeKind::Fragment { children, .. } => Some(children),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn is_container(&self, id: NodeId) -> bool {
        !self.is_text(id)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn is_empty(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    pub fn offset_size(&self, id: NodeId) -> usize {
        self.get(id).offset_size()
    }

    /// Sum of the children's offset sizes.
    pub fn max_offset(&self, id: NodeId) -> usize {
        self.children(id).iter().map(|child| self.offset_size(*child)).sum()
    }

    pub fn index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn start_offset(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        let mut offset = 0;
        for child in self.children(parent) {
            if *child == id {
                return Some(offset);
            }
            offset += self.offset_size(*child);
        }
        None
    }

    pub fn end_offset(&self, id: NodeId) -> Option<usize> {
        self.start_offset(id).map(|start| start + self.offset_size(id))
    }

    pub fn offset_to_index(&self, id: NodeId, offset: usize) -> usize {
        let mut total = 0;
        for (index, child) in self.children(id).iter().enumerate() {
            let size = self.offset_size(*child);
            if offset >= total && offset < total + size {
                return index;
            }
            total += size;
        }
        self.child_count(id)
    }

    /// Child whose range covers `offset`.
    pub fn child_at_offset(&self, id: NodeId, offset: usize) -> Option<NodeId> {
        self.child(id, self.offset_to_index(id, offset))
    }

    /// Walks `path` from `id` through successive offset lookups.
    ///
    /// Returns `None` when any step leaves the tree (an offset past the last
    /// child, or descending into a text node).
    pub fn get_node_by_path(&self, id: NodeId, path: &[usize]) -> Option<NodeId> {
        let mut node = id;
        for offset in path {
            if !self.is_container(node) {
                return None;
            }
            node = self.child_at_offset(node, *offset)?;
        }
        Some(node)
    }

    /// Offsets from the root down to `id`.
    pub fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut node = id;
        while let Some(offset) = self.start_offset(node) {
            path.push(offset);
            match self.parent(node) {
                Some(parent) => node = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Topmost ancestor of `id` (or `id` itself).
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut node = id;
        while let Some(parent) = self.parent(node) {
            node = parent;
        }
        node
    }

    /// Ancestors from the root down to the parent of `id`.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut node = id;
        while let Some(parent) = self.parent(node) {
            ancestors.push(parent);
            node = parent;
        }
        ancestors.reverse();
        ancestors
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut left = self.ancestors(a);
        left.push(a);
        let mut right = self.ancestors(b);
        right.push(b);
        left.iter()
            .zip(right.iter())
            .take_while(|(x, y)| x == y)
            .last()
            .map(|(x, _)| *x)
    }

    /// True when the node hangs off a document root.
    pub fn belongs_to_document(&self, id: NodeId) -> bool {
        self.is_root_element(self.root_of(id))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.child(parent, self.index(id)? + 1)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index(id)?;
        index.checked_sub(1).and_then(|i| self.child(parent, i))
    }

    // ---- mutation primitives -----------------------------------------

    /// Insert `items` at child `index` of `parent`.
    ///
    /// Strings and text proxies become new text nodes. A node that already
    /// has a parent is detached from it first.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, items: impl Into<NodeInput>) -> ModelResult<Vec<NodeId>> {
        if !self.is_container(parent) {
            return Err(ModelError::new("model-node-not-a-container", "Text nodes cannot have children"));
        }
        let nodes = self.normalize(items.into())?;
        for node in &nodes {
            if *node == parent || self.is_ancestor_of(*node, parent) {
                return Err(ModelError::new("model-node-insert-into-itself", "Cannot insert a node into itself"));
            }
        }

        let mut index = index;
        for node in &nodes {
            if let Some(old_parent) = self.parent(*node) {
                let old_index = self.index(*node);
                if let (Some(old_index), Some(children)) = (old_index, self.children_mut(old_parent)) {
                    children.remove(old_index);
                    if old_parent == parent && old_index < index {
                        index -= 1;
                    }
                }
            }
            self.get_mut(*node).parent = Some(parent);
        }

        if let Some(children) = self.children_mut(parent) {
            let at = index.min(children.len());
            children.splice(at..at, nodes.iter().copied());
        }
        Ok(nodes)
    }

    pub fn append_child(&mut self, parent: NodeId, items: impl Into<NodeInput>) -> ModelResult<Vec<NodeId>> {
        let count = self.child_count(parent);
        self.insert_child(parent, count, items)
    }

    /// Remove `how_many` children starting at `index`; they end up detached.
    pub fn remove_children(&mut self, parent: NodeId, index: usize, how_many: usize) -> Vec<NodeId> {
        let removed: Vec<NodeId> = match self.children_mut(parent) {
            Some(children) => {
                let start = index.min(children.len());
                let end = (index + how_many).min(children.len());
                children.drain(start..end).collect()
            }
            None => Vec::new(),
        };
        for node in &removed {
            self.get_mut(*node).parent = None;
        }
        removed
    }

    pub fn detach(&mut self, id: NodeId) {
        if let (Some(parent), Some(index)) = (self.parent(id), self.index(id)) {
            self.remove_children(parent, index, 1);
        }
    }

    fn normalize(&mut self, input: NodeInput) -> ModelResult<Vec<NodeId>> {
        let mut nodes = Vec::with_capacity(input.0.len());
        for item in input.0 {
            match item {
                Item::Node(id) => {
                    if !self.contains(id) {
                        return Err(ModelError::new("model-node-unknown", "Node does not belong to this tree")
                            .with_context(json!({ "node": id.0 })));
                    }
                    if self.is_fragment(id) {
                        // Inserting a fragment inserts its children.
                        let count = self.child_count(id);
                        nodes.extend(self.remove_children(id, 0, count));
                    } else {
                        nodes.push(id);
                    }
                }
                Item::Text(text) => {
                    if !text.is_empty() {
                        nodes.push(self.create_text(text, Attributes::new()));
                    }
                }
                Item::Proxy(proxy) => {
                    let data = proxy.data(self);
                    let attributes = proxy.attributes(self).clone();
                    nodes.push(self.create_text(data, attributes));
                }
            }
        }
        Ok(nodes)
    }

    // ---- text normalization ------------------------------------------

    /// Make `offset` inside `parent` fall on a node boundary by splitting the
    /// text node that covers it. Returns the child index at that boundary.
    pub(crate) fn split_at_offset(&mut self, parent: NodeId, offset: usize) -> usize {
        let index = self.offset_to_index(parent, offset);
        let Some(node) = self.child(parent, index) else {
            return index;
        };
        let Some(start) = self.start_offset(node) else {
            return index;
        };
        if start == offset || !self.is_text(node) {
            return index;
        }

        let data = self.data(node).unwrap_or_default().to_string();
        let cut = offset - start;
        let head = char_slice(&data, 0, cut);
        let tail = char_slice(&data, cut, char_len(&data));
        let attributes = self.attributes(node).clone();

        if let NodeKind::Text { data } = &mut self.get_mut(node).kind {
            *data = head;
        }
        let tail_node = self.create_text(tail, attributes);
        self.get_mut(tail_node).parent = Some(parent);
        if let Some(children) = self.children_mut(parent) {
            children.insert(index + 1, tail_node);
        }
        index + 1
    }

    /// Merge the text nodes at `index - 1` and `index` when their
    /// attributes are equal.
    pub(crate) fn merge_texts_at(&mut self, parent: NodeId, index: usize) {
        if index == 0 {
            return;
        }
        let (Some(left), Some(right)) = (self.child(parent, index - 1), self.child(parent, index)) else {
            return;
        };
        if !self.is_text(left) || !self.is_text(right) || self.attributes(left) != self.attributes(right) {
            return;
        }
        let right_data = self.data(right).unwrap_or_default().to_string();
        if let NodeKind::Text { data } = &mut self.get_mut(left).kind {
            data.push_str(&right_data);
        }
        self.remove_children(parent, index, 1);
    }

    // ---- snapshots ----------------------------------------------------

    pub fn to_json(&self, id: NodeId) -> NodeJson {
        let data = self.get(id);
        match &data.kind {
            NodeKind::Text { data: text } => NodeJson::Text {
                data: text.clone(),
                attributes: data.attributes.clone(),
            },
            NodeKind::Element { name, children, .. } => NodeJson::Element {
                name: name.clone(),
                attributes: data.attributes.clone(),
                children: children.iter().map(|child| self.to_json(*child)).collect(),
            },
            NodeKind::Fragment { children, .. } => NodeJson::Element {
                name: "$documentFragment".to_string(),
                attributes: Attributes::new(),
                children: children.iter().map(|child| self.to_json(*child)).collect(),
            },
        }
    }

    /// Build detached nodes from a snapshot.
    pub fn from_json(&mut self, json: &NodeJson) -> NodeId {
        match json {
            NodeJson::Text { data, attributes } => self.create_text(data.clone(), attributes.clone()),
            NodeJson::Element { name, attributes, children } => {
                let element = self.create_element(name.clone(), attributes.clone());
                let kids: Vec<NodeId> = children.iter().map(|child| self.from_json(child)).collect();
                for kid in &kids {
                    self.get_mut(*kid).parent = Some(element);
                }
                if let Some(list) = self.children_mut(element) {
                    list.extend(kids);
                }
                element
            }
        }
    }

    /// Copy of `id`; `deep` also copies descendants. Root status and
    /// fragment markers are not copied.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let data = self.get(id).clone();
        match data.kind {
            NodeKind::Text { data: text } => self.create_text(text, data.attributes),
            NodeKind::Element { name, children, .. } => {
                let copy = self.create_element(name, data.attributes);
                if deep {
                    for child in children {
                        let child_copy = self.clone_node(child, true);
                        self.get_mut(child_copy).parent = Some(copy);
                        if let Some(list) = self.children_mut(copy) {
                            list.push(child_copy);
                        }
                    }
                }
                copy
            }
            NodeKind::Fragment { children, .. } => {
                let copy = self.create_fragment();
                if deep {
                    for child in children {
                        let child_copy = self.clone_node(child, true);
                        self.get_mut(child_copy).parent = Some(copy);
                        if let Some(list) = self.children_mut(copy) {
                            list.push(child_copy);
                        }
                    }
                }
                copy
            }
        }
    }

    // ---- fragment markers --------------------------------------------

    pub fn fragment_markers(&self, fragment: NodeId) -> Option<&BTreeMap<String, Range>> {
        match &self.get(fragment).kind {
            NodeKind::Fragment { markers, .. } => Some(markers),
            _ => None,
        }
    }

    pub fn set_fragment_marker(&mut self, fragment: NodeId, name: impl Into<String>, range: Range) -> ModelResult<()> {
        match &mut self.get_mut(fragment).kind {
            NodeKind::Fragment { markers, .. } => {
                markers.insert(name.into(), range);
                Ok(())
            }
            _ => Err(ModelError::new("model-fragment-expected", "Markers can only be staged on a document fragment")),
        }
    }

    pub(crate) fn take_fragment_markers(&mut self, fragment: NodeId) -> BTreeMap<String, Range> {
        match &mut self.get_mut(fragment).kind {
            NodeKind::Fragment { markers, .. } => std::mem::take(markers),
            _ => BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph_with(tree: &mut Tree, texts: &[&str]) -> NodeId {
        let p = tree.create_element("paragraph", Attributes::new());
        for text in texts {
            tree.append_child(p, *text).unwrap();
        }
        p
    }

    #[test]
    fn test_insert_child_normalizes_strings() {
        let mut tree = Tree::new();
        let fragment = tree.create_fragment();
        let inserted = tree.insert_child(fragment, 0, "foo").unwrap();

        assert_eq!(inserted.len(), 1);
        assert_eq!(tree.data(inserted[0]), Some("foo"));
        assert_eq!(tree.parent(inserted[0]), Some(fragment));
        assert_eq!(tree.max_offset(fragment), 3);
    }

    #[test]
    fn test_insert_child_moves_parented_node() {
        let mut tree = Tree::new();
        let a = tree.create_fragment();
        let b = tree.create_fragment();
        let p = tree.create_element("paragraph", Attributes::new());
        tree.append_child(a, p).unwrap();

        tree.append_child(b, p).unwrap();

        assert_eq!(tree.child_count(a), 0);
        assert_eq!(tree.children(b), &[p]);
        assert_eq!(tree.parent(p), Some(b));
    }

    #[test]
    fn test_insert_text_proxy_copies_attributes() {
        let mut tree = Tree::new();
        let mut attrs = Attributes::new();
        attrs.insert("bold".into(), Value::Bool(true));
        let text = tree.create_text("abcdef", attrs.clone());
        let fragment = tree.create_fragment();

        let proxy = crate::text_proxy::TextProxy::new(text, 1, 3);
        let inserted = tree.append_child(fragment, proxy).unwrap();

        assert_eq!(tree.data(inserted[0]), Some("bcd"));
        assert_eq!(tree.attributes(inserted[0]), &attrs);
        assert_eq!(tree.parent(text), None);
    }

    #[test]
    fn test_insert_into_text_is_rejected() {
        let mut tree = Tree::new();
        let text = tree.create_text("x", Attributes::new());
        let err = tree.append_child(text, "y").unwrap_err();
        assert!(err.is("model-node-not-a-container"));
    }

    #[test]
    fn test_insert_into_itself_is_rejected() {
        let mut tree = Tree::new();
        let outer = tree.create_element("blockQuote", Attributes::new());
        let inner = tree.create_element("paragraph", Attributes::new());
        tree.append_child(outer, inner).unwrap();

        let err = tree.append_child(inner, outer).unwrap_err();
        assert!(err.is("model-node-insert-into-itself"));
    }

    #[test]
    fn test_remove_children_detaches() {
        let mut tree = Tree::new();
        let p = paragraph_with(&mut tree, &["a"]);
        let img = tree.create_element("image", Attributes::new());
        tree.append_child(p, img).unwrap();

        let removed = tree.remove_children(p, 0, 2);

        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(|node| tree.parent(*node).is_none()));
        assert_eq!(tree.child_count(p), 0);
    }

    #[test]
    fn test_offset_to_index_clamps() {
        let mut tree = Tree::new();
        let p = paragraph_with(&mut tree, &["abc"]);
        let img = tree.create_element("image", Attributes::new());
        tree.append_child(p, img).unwrap();

        assert_eq!(tree.offset_to_index(p, 0), 0);
        assert_eq!(tree.offset_to_index(p, 2), 0);
        assert_eq!(tree.offset_to_index(p, 3), 1);
        assert_eq!(tree.offset_to_index(p, 4), 2);
        assert_eq!(tree.offset_to_index(p, 40), 2);
    }

    #[test]
    fn test_get_node_by_path() {
        let mut tree = Tree::new();
        let fragment = tree.create_fragment();
        let p = paragraph_with(&mut tree, &["foo"]);
        let img = tree.create_element("image", Attributes::new());
        tree.append_child(fragment, vec![img, p]).unwrap();

        assert_eq!(tree.get_node_by_path(fragment, &[]), Some(fragment));
        assert_eq!(tree.get_node_by_path(fragment, &[1]), Some(p));
        assert_eq!(tree.get_node_by_path(fragment, &[1, 2]), tree.child(p, 0));
        assert_eq!(tree.get_node_by_path(fragment, &[5]), None);
        assert_eq!(tree.get_node_by_path(fragment, &[1, 1, 0]), None);
        assert_eq!(tree.path(tree.child(p, 0).unwrap()), vec![1, 0]);
    }

    #[test]
    fn test_split_and_merge_text() {
        let mut tree = Tree::new();
        let p = paragraph_with(&mut tree, &["foobar"]);

        let index = tree.split_at_offset(p, 3);
        assert_eq!(index, 1);
        assert_eq!(tree.child_count(p), 2);
        assert_eq!(tree.data(tree.child(p, 1).unwrap()), Some("bar"));

        tree.merge_texts_at(p, 1);
        assert_eq!(tree.child_count(p), 1);
        assert_eq!(tree.data(tree.child(p, 0).unwrap()), Some("foobar"));
    }

    #[test]
    fn test_json_snapshot_round_trip() {
        let mut tree = Tree::new();
        let p = paragraph_with(&mut tree, &["foo"]);
        tree.set_attribute(p, "align", Value::from("right"));

        let json = tree.to_json(p);
        let copy = tree.from_json(&json);

        assert_eq!(tree.to_json(copy), json);
        assert_ne!(copy, p);
    }
}
