//! # Writer
//!
//! The only mutation surface handed to feature code. Every call builds one
//! (or a small fixed number of) operations, applies them and records them
//! in the writer's batch. Content outside the document (fragments and
//! detached elements) is edited through the same calls; those operations
//! carry no base version.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use quire_common::{ModelError, ModelResult};
use serde_json::{json, Value};

use crate::batch::Batch;
use crate::document::Document;
use crate::model::Model;
use crate::node::{Attributes, Item, NodeId, NodeInput};
use crate::operation::{
    AttributeOperation, DetachOperation, InsertOperation, MarkerOperation, MergeOperation, MoveOperation, Operation, RenameOperation,
    RootAttributeOperation, RootOperation, SplitOperation,
};
use crate::position::{Position, PositionOffset};
use crate::range::Range;
use crate::selection::{Selectable, Selection};
use crate::tree::GRAVEYARD;
use crate::tree_walker::{TreeWalkerItem, TreeWalkerOptions};

/// Node or range an attribute call applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeTarget {
    Node(NodeId),
    Range(Range),
}

impl From<NodeId> for AttributeTarget {
    fn from(node: NodeId) -> Self {
        AttributeTarget::Node(node)
    }
}

impl From<Range> for AttributeTarget {
    fn from(range: Range) -> Self {
        AttributeTarget::Range(range)
    }
}

impl From<&Range> for AttributeTarget {
    fn from(range: &Range) -> Self {
        AttributeTarget::Range(range.clone())
    }
}

/// Options for [`Writer::add_marker`].
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions {
    pub range: Range,
    pub using_operation: bool,
    pub affects_data: bool,
}

/// Options for [`Writer::update_marker`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerUpdateOptions {
    pub range: Option<Range>,
    pub using_operation: Option<bool>,
    pub affects_data: Option<bool>,
}

/// Result of [`Writer::split`].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    /// Position between the last pair of split elements.
    pub position: Position,
    /// From the end of the first split element to the start of its copy.
    pub range: Range,
}

pub struct Writer<'a> {
    model: &'a Model,
    batch: Rc<RefCell<Batch>>,
}

impl PartialEq for Writer<'_> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.batch, &other.batch)
    }
}

impl std::fmt::Debug for Writer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer").field("batch", &self.batch.borrow().operations().len()).finish()
    }
}

impl<'a> Writer<'a> {
    pub(crate) fn new(model: &'a Model, batch: Rc<RefCell<Batch>>) -> Self {
        Self { model, batch }
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn batch(&self) -> Rc<RefCell<Batch>> {
        Rc::clone(&self.batch)
    }

    fn document(&self) -> Ref<'a, Document> {
        self.model.document()
    }

    fn apply(&self, operation: impl Into<Operation>) -> ModelResult<Operation> {
        self.model.apply_in_batch(operation.into(), &self.batch)
    }

    /// Base version for an operation on content under `root`.
    fn version_for(&self, root: NodeId) -> Option<u64> {
        let document = self.document();
        document.tree().belongs_to_document(root).then(|| document.version())
    }

    fn in_document(&self, root: NodeId) -> bool {
        self.document().tree().belongs_to_document(root)
    }

    // ---- creation ------------------------------------------------------

    pub fn create_text(&self, data: impl Into<String>, attributes: Attributes) -> ModelResult<NodeId> {
        Ok(self.model.document_mut()?.tree_mut().create_text(data, attributes))
    }

    pub fn create_element(&self, name: impl Into<String>, attributes: Attributes) -> ModelResult<NodeId> {
        Ok(self.model.document_mut()?.tree_mut().create_element(name, attributes))
    }

    pub fn create_document_fragment(&self) -> ModelResult<NodeId> {
        Ok(self.model.document_mut()?.tree_mut().create_fragment())
    }

    pub fn clone_element(&self, element: NodeId, deep: bool) -> ModelResult<NodeId> {
        Ok(self.model.document_mut()?.tree_mut().clone_node(element, deep))
    }

    pub fn create_position_at(&self, node: NodeId, offset: impl Into<PositionOffset>) -> ModelResult<Position> {
        Position::create_at(self.document().tree(), node, offset)
    }

    pub fn create_position_before(&self, node: NodeId) -> ModelResult<Position> {
        Position::before(self.document().tree(), node)
    }

    pub fn create_position_after(&self, node: NodeId) -> ModelResult<Position> {
        Position::after(self.document().tree(), node)
    }

    pub fn create_range_in(&self, element: NodeId) -> ModelResult<Range> {
        Range::in_element(self.document().tree(), element)
    }

    pub fn create_range_on(&self, node: NodeId) -> ModelResult<Range> {
        Range::on(self.document().tree(), node)
    }

    // ---- insertion -----------------------------------------------------

    /// Insert `item` at `position`.
    ///
    /// Nodes already in the document are moved; nodes parented outside it
    /// are detached first. Inserting a fragment inserts its children and
    /// promotes its markers when the target is in the document.
    pub fn insert(&self, item: impl Into<NodeInput>, position: &Position) -> ModelResult<()> {
        let mut position = position.clone();
        for item in item.into().0 {
            position = self.insert_item(item, &position)?;
        }
        Ok(())
    }

    /// Insert one item and return the position right after it.
    fn insert_item(&self, item: Item, position: &Position) -> ModelResult<Position> {
        let node = match item {
            Item::Text(text) if text.is_empty() => return Ok(position.clone()),
            Item::Text(text) => self.create_text(text, Attributes::new())?,
            Item::Proxy(proxy) => {
                let (data, attributes) = {
                    let document = self.document();
                    (proxy.data(document.tree()), proxy.attributes(document.tree()).clone())
                };
                self.create_text(data, attributes)?
            }
            Item::Node(node) => node,
        };

        let (is_fragment, parent, is_root) = {
            let document = self.document();
            let tree = document.tree();
            if !tree.contains(node) {
                return Err(ModelError::new("model-node-unknown", "Node does not belong to this model").with_context(json!({ "node": node.index() })));
            }
            (tree.is_fragment(node), tree.parent(node), tree.is_root_element(node))
        };

        if is_root {
            return Err(ModelError::new("model-writer-insert-forbidden-move", "Cannot move a root element"));
        }
        if is_fragment {
            return self.insert_fragment(node, position);
        }
        if parent.is_some() {
            if self.in_document(node) {
                if !self.in_document(position.root) {
                    return Err(ModelError::new("model-writer-insert-forbidden-move", "Cannot move a node from the document to a different tree"));
                }
                let range = self.create_range_on(node)?;
                self.move_range(&range, position)?;
                return self.create_position_after(node);
            }
            self.remove(node)?;
        }

        let operation = {
            let document = self.document();
            let version = document.tree().belongs_to_document(position.root).then(|| document.version());
            InsertOperation::new(document.tree(), position.clone(), vec![node], version)
        };
        let how_many = operation.how_many();
        self.apply(operation)?;
        Ok(position.shifted_forward(how_many))
    }

    fn insert_fragment(&self, fragment: NodeId, position: &Position) -> ModelResult<Position> {
        let (children, markers) = {
            let mut document = self.model.document_mut()?;
            let markers = document.tree_mut().take_fragment_markers(fragment);
            (document.tree().children(fragment).to_vec(), markers)
        };
        if children.is_empty() {
            return Ok(position.clone());
        }

        let operation = {
            let document = self.document();
            let version = document.tree().belongs_to_document(position.root).then(|| document.version());
            InsertOperation::new(document.tree(), position.clone(), children, version)
        };
        let how_many = operation.how_many();
        self.apply(operation)?;

        if self.in_document(position.root) {
            self.promote_markers(markers, &Position::from_parts(fragment, vec![0]), position)?;
        }
        Ok(position.shifted_forward(how_many))
    }

    /// Add (or update) document markers from ranges relative to
    /// `fragment_start`, re-rooted at `position`.
    pub(crate) fn promote_markers(&self, markers: BTreeMap<String, Range>, fragment_start: &Position, position: &Position) -> ModelResult<()> {
        for (name, range) in markers {
            let range = Range::new(
                range.start.get_combined(fragment_start, position),
                range.end.get_combined(fragment_start, position),
            );
            let exists = self.document().markers().has(&name);
            if exists {
                self.update_marker(&name, MarkerUpdateOptions {
                    range: Some(range),
                    using_operation: Some(true),
                    affects_data: Some(true),
                })?;
            } else {
                self.add_marker(&name, MarkerOptions {
                    range,
                    using_operation: true,
                    affects_data: true,
                })?;
            }
        }
        Ok(())
    }

    pub fn insert_text(&self, text: impl Into<String>, attributes: Attributes, position: &Position) -> ModelResult<()> {
        let node = self.create_text(text, attributes)?;
        self.insert(node, position)
    }

    pub fn insert_element(&self, name: impl Into<String>, attributes: Attributes, position: &Position) -> ModelResult<NodeId> {
        let element = self.create_element(name, attributes)?;
        self.insert(element, position)?;
        Ok(element)
    }

    pub fn append(&self, item: impl Into<NodeInput>, parent: NodeId) -> ModelResult<()> {
        let position = self.create_position_at(parent, PositionOffset::End)?;
        self.insert(item, &position)
    }

    // ---- attributes ----------------------------------------------------

    pub fn set_attribute(&self, key: &str, value: Value, target: impl Into<AttributeTarget>) -> ModelResult<()> {
        self.change_attribute(key, Some(value), target.into())
    }

    pub fn remove_attribute(&self, key: &str, target: impl Into<AttributeTarget>) -> ModelResult<()> {
        self.change_attribute(key, None, target.into())
    }

    pub fn set_attributes(&self, attributes: &Attributes, target: impl Into<AttributeTarget>) -> ModelResult<()> {
        let target = target.into();
        for (key, value) in attributes {
            self.change_attribute(key, Some(value.clone()), target.clone())?;
        }
        Ok(())
    }

    /// Remove every attribute from a node, or from every item of a range.
    pub fn clear_attributes(&self, target: impl Into<AttributeTarget>) -> ModelResult<()> {
        let targets: Vec<(AttributeTarget, Vec<String>)> = {
            let document = self.document();
            let tree = document.tree();
            match target.into() {
                AttributeTarget::Node(node) => vec![(AttributeTarget::Node(node), tree.attributes(node).keys().cloned().collect())],
                AttributeTarget::Range(range) => {
                    let mut targets = Vec::new();
                    for item in range.get_items(tree, true) {
                        match item {
                            TreeWalkerItem::Element(node) => targets.push((AttributeTarget::Node(node), tree.attributes(node).keys().cloned().collect())),
                            TreeWalkerItem::Text(proxy) => {
                                let (Some(parent), Some(start)) = (proxy.parent(tree), proxy.start_offset(tree)) else {
                                    continue;
                                };
                                let start = Position::create_at(tree, parent, start)?;
                                let range = Range::from_position_and_shift(&start, proxy.length);
                                targets.push((AttributeTarget::Range(range), proxy.attributes(tree).keys().cloned().collect()));
                            }
                        }
                    }
                    targets
                }
            }
        };
        for (target, keys) in targets {
            for key in keys {
                self.change_attribute(&key, None, target.clone())?;
            }
        }
        Ok(())
    }

    fn change_attribute(&self, key: &str, value: Option<Value>, target: AttributeTarget) -> ModelResult<()> {
        match target {
            AttributeTarget::Node(node) => self.change_attribute_on_item(key, value, node),
            AttributeTarget::Range(range) => {
                let flat_ranges = range.get_minimal_flat_ranges(self.document().tree());
                for flat in flat_ranges {
                    self.change_attribute_on_range(key, value.as_ref(), &flat)?;
                }
                Ok(())
            }
        }
    }

    fn change_attribute_on_item(&self, key: &str, value: Option<Value>, node: NodeId) -> ModelResult<()> {
        let (previous, parentless) = {
            let document = self.document();
            let tree = document.tree();
            (tree.get_attribute(node, key).cloned(), tree.parent(node).is_none())
        };
        if previous == value {
            return Ok(());
        }
        if parentless {
            let version = self.version_for(node);
            self.apply(RootAttributeOperation::new(node, key, previous, value, version))?;
        } else {
            let range = self.create_range_on(node)?;
            let version = self.version_for(range.root());
            self.apply(AttributeOperation::new(range, key, previous, value, version))?;
        }
        Ok(())
    }

    /// Apply one attribute operation per run of equal old values inside a
    /// flat range.
    fn change_attribute_on_range(&self, key: &str, value: Option<&Value>, range: &Range) -> ModelResult<()> {
        let steps: Vec<(Option<Value>, Position)> = {
            let document = self.document();
            let tree = document.tree();
            let options = TreeWalkerOptions {
                shallow: true,
                ..TreeWalkerOptions::default()
            };
            range
                .get_walker(tree, options)?
                .map(|step| {
                    let node = match &step.item {
                        TreeWalkerItem::Element(node) => *node,
                        TreeWalkerItem::Text(proxy) => proxy.text,
                    };
                    (tree.get_attribute(node, key).cloned(), step.next_position)
                })
                .collect()
        };

        let mut last_split = range.start.clone();
        let mut position: Option<Position> = None;
        let mut value_before: Option<Value> = None;
        for (value_after, next_position) in steps {
            if let Some(current) = &position {
                if value_before != value_after {
                    if value_before.as_ref() != value {
                        self.add_attribute_operation(key, &last_split, current, value_before.clone(), value.cloned())?;
                    }
                    last_split = current.clone();
                }
            }
            position = Some(next_position);
            value_before = value_after;
        }
        if let Some(current) = position {
            if current != last_split && value_before.as_ref() != value {
                self.add_attribute_operation(key, &last_split, &current, value_before, value.cloned())?;
            }
        }
        Ok(())
    }

    fn add_attribute_operation(&self, key: &str, start: &Position, end: &Position, old: Option<Value>, new: Option<Value>) -> ModelResult<()> {
        let range = Range::new(start.clone(), end.clone());
        let version = self.version_for(range.root());
        self.apply(AttributeOperation::new(range, key, old, new, version))?;
        Ok(())
    }

    // ---- structure -----------------------------------------------------

    /// Move a flat range to `position`.
    pub fn move_range(&self, range: &Range, position: &Position) -> ModelResult<()> {
        if !range.is_flat() {
            return Err(ModelError::new("writer-move-range-not-flat", "Range to move is not flat"));
        }
        if *position == range.start {
            return Ok(());
        }
        let same_tree = {
            let tree = self.document();
            let tree = tree.tree();
            (tree.belongs_to_document(range.root()) && tree.belongs_to_document(position.root)) || range.root() == position.root
        };
        if !same_tree {
            return Err(ModelError::new("writer-move-different-document", "Range is going to be moved between a document and a different tree"));
        }
        let version = self.version_for(range.root());
        let how_many = range.end.offset() - range.start.offset();
        self.apply(MoveOperation::new(range.start.clone(), how_many, position.clone(), version))?;
        Ok(())
    }

    /// Remove a node or a range. Document content goes to the graveyard;
    /// other content is detached.
    pub fn remove(&self, target: impl Into<AttributeTarget>) -> ModelResult<()> {
        let range = match target.into() {
            AttributeTarget::Node(node) => self.create_range_on(node)?,
            AttributeTarget::Range(range) => range,
        };
        let mut flat_ranges = range.get_minimal_flat_ranges(self.document().tree());
        flat_ranges.reverse();
        for flat in flat_ranges {
            let how_many = flat.end.offset() - flat.start.offset();
            if self.in_document(flat.root()) {
                let version = self.version_for(flat.root());
                let graveyard = Position::from_parts(GRAVEYARD, vec![0]);
                self.apply(MoveOperation::new(flat.start.clone(), how_many, graveyard, version))?;
            } else {
                self.apply(DetachOperation::new(flat.start.clone(), how_many))?;
            }
        }
        Ok(())
    }

    /// Merge the elements on both sides of `position`.
    pub fn merge(&self, position: &Position) -> ModelResult<()> {
        let (before, after) = {
            let document = self.document();
            let tree = document.tree();
            let before = position.node_before(tree).filter(|node| tree.is_element(*node));
            let after = position.node_after(tree).filter(|node| tree.is_element(*node));
            (before, after)
        };
        let before = before.ok_or_else(|| ModelError::new("writer-merge-no-element-before", "Node before merge position must be an element"))?;
        let after = after.ok_or_else(|| ModelError::new("writer-merge-no-element-after", "Node after merge position must be an element"))?;

        if !self.in_document(position.root) {
            let content = self.create_range_in(after)?;
            let target = self.create_position_at(before, PositionOffset::End)?;
            self.move_range(&content, &target)?;
            return self.remove(after);
        }

        let target = self.create_position_at(before, PositionOffset::End)?;
        let source = self.create_position_at(after, 0)?;
        let how_many = self.document().tree().max_offset(after);
        let version = self.version_for(position.root);
        let graveyard = Position::from_parts(GRAVEYARD, vec![0]);
        self.apply(MergeOperation::new(source, how_many, target, graveyard, version))?;
        Ok(())
    }

    /// Split the parent of `position`, and its ancestors up to
    /// `limit_element` (defaults to the grandparent).
    pub fn split(&self, position: &Position, limit_element: Option<NodeId>) -> ModelResult<SplitResult> {
        let (mut split_element, limit) = {
            let document = self.document();
            let tree = document.tree();
            let split_element = position
                .parent(tree)
                .ok_or_else(|| ModelError::new("writer-split-element-no-parent", "Element with no parent can not be split"))?;
            let parent = tree
                .parent(split_element)
                .ok_or_else(|| ModelError::new("writer-split-element-no-parent", "Element with no parent can not be split"))?;
            let limit = limit_element.unwrap_or(parent);
            if limit != split_element && !tree.is_ancestor_of(limit, split_element) {
                return Err(ModelError::new("writer-split-invalid-limit-element", "Limit element is not a position ancestor"));
            }
            (split_element, limit)
        };

        let mut position = position.clone();
        let mut first: Option<(NodeId, Option<NodeId>)> = None;
        loop {
            let operation = {
                let document = self.document();
                let tree = document.tree();
                let version = tree.belongs_to_document(position.root).then(|| document.version());
                let how_many = tree.max_offset(split_element) - position.offset();
                let insertion = SplitOperation::get_insertion_position(&position);
                SplitOperation::new(position.clone(), how_many, insertion, None, version)
            };
            self.apply(operation)?;

            if first.is_none() {
                first = Some((split_element, self.document().tree().next_sibling(split_element)));
            }
            position = self.create_position_after(split_element)?;
            split_element = match position.parent(self.document().tree()) {
                Some(parent) => parent,
                None => break,
            };
            if split_element == limit {
                break;
            }
        }

        let (first_split, first_copy) = first.ok_or_else(|| ModelError::new("writer-split-element-no-parent", "Nothing was split"))?;
        let first_copy = first_copy.ok_or_else(|| ModelError::new("writer-split-element-no-parent", "Split did not create a copy"))?;
        let range = Range::new(
            self.create_position_at(first_split, PositionOffset::End)?,
            self.create_position_at(first_copy, 0)?,
        );
        Ok(SplitResult { position, range })
    }

    /// Wrap a flat range in a new, empty, detached element.
    pub fn wrap(&self, range: &Range, element: NodeId) -> ModelResult<()> {
        if !range.is_flat() {
            return Err(ModelError::new("writer-wrap-range-not-flat", "Range to wrap is not flat"));
        }
        {
            let document = self.document();
            let tree = document.tree();
            if !tree.is_empty(element) {
                return Err(ModelError::new("writer-wrap-element-not-empty", "Element to wrap with is not empty"));
            }
            if tree.parent(element).is_some() {
                return Err(ModelError::new("writer-wrap-element-attached", "Element to wrap with is already attached to tree model"));
            }
        }
        self.insert(element, &range.start)?;
        let shifted = Range::new(range.start.get_shifted_by(1), range.end.get_shifted_by(1));
        let target = self.create_position_at(element, 0)?;
        self.move_range(&shifted, &target)
    }

    /// Wrap a flat range in a new element called `name`.
    pub fn wrap_in(&self, range: &Range, name: &str) -> ModelResult<NodeId> {
        let element = self.create_element(name, Attributes::new())?;
        self.wrap(range, element)?;
        Ok(element)
    }

    /// Replace `element` with its children.
    pub fn unwrap(&self, element: NodeId) -> ModelResult<()> {
        if self.document().tree().parent(element).is_none() {
            return Err(ModelError::new("writer-unwrap-element-no-parent", "Trying to unwrap an element which has no parent"));
        }
        let content = self.create_range_in(element)?;
        let after = self.create_position_after(element)?;
        self.move_range(&content, &after)?;
        self.remove(element)
    }

    pub fn rename(&self, element: NodeId, new_name: &str) -> ModelResult<()> {
        let old_name = {
            let document = self.document();
            let tree = document.tree();
            if !tree.is_element(element) {
                return Err(ModelError::new("writer-rename-not-element-instance", "Trying to rename an object which is not an instance of Element"));
            }
            tree.name(element).unwrap_or_default().to_string()
        };
        let position = self.create_position_before(element)?;
        let version = self.version_for(position.root);
        self.apply(RenameOperation::new(position, old_name, new_name, version))?;
        Ok(())
    }

    // ---- markers -------------------------------------------------------

    pub fn add_marker(&self, name: &str, options: MarkerOptions) -> ModelResult<()> {
        if self.document().markers().has(name) {
            return Err(ModelError::new("writer-addmarker-marker-exists", "Marker with provided name already exists").with_context(json!({ "name": name })));
        }
        if !options.using_operation {
            self.model.set_marker_directly(name, options.range, options.affects_data)?;
            return Ok(());
        }
        self.apply_marker_operation(name, None, Some(options.range), options.affects_data)
    }

    pub fn update_marker(&self, name: &str, options: MarkerUpdateOptions) -> ModelResult<()> {
        let marker = self
            .document()
            .markers()
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::new("writer-updatemarker-marker-not-exists", "Marker with provided name does not exist").with_context(json!({ "name": name })))?;

        if options.range.is_none() && options.using_operation.is_none() && options.affects_data.is_none() {
            return Err(ModelError::new("writer-updatemarker-wrong-options", "One of the options is required"));
        }
        let affects_data = options.affects_data.unwrap_or(marker.affects_data);
        let updated = options.range.unwrap_or_else(|| marker.range.clone());

        if let Some(using_operation) = options.using_operation {
            if using_operation != marker.managed_using_operation {
                if using_operation {
                    self.apply_marker_operation(name, None, Some(updated), affects_data)?;
                } else {
                    self.apply_marker_operation(name, Some(marker.range), None, affects_data)?;
                    self.model.set_marker_directly(name, updated, affects_data)?;
                }
                return Ok(());
            }
        }

        if marker.managed_using_operation {
            self.apply_marker_operation(name, Some(marker.range), Some(updated), affects_data)
        } else {
            self.model.set_marker_directly(name, updated, affects_data)
        }
    }

    pub fn remove_marker(&self, name: &str) -> ModelResult<()> {
        let marker = self
            .document()
            .markers()
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::new("writer-removemarker-no-marker", "Trying to remove marker which does not exist").with_context(json!({ "name": name })))?;
        if !marker.managed_using_operation {
            return self.model.remove_marker_directly(name);
        }
        self.apply_marker_operation(name, Some(marker.range), None, marker.affects_data)
    }

    fn apply_marker_operation(&self, name: &str, old_range: Option<Range>, new_range: Option<Range>, affects_data: bool) -> ModelResult<()> {
        let version = self.document().version();
        self.apply(MarkerOperation::new(name, old_range, new_range, affects_data, Some(version)))?;
        Ok(())
    }

    // ---- roots ---------------------------------------------------------

    /// Add (or re-attach) a root.
    pub fn add_root(&self, root_name: &str, element_name: &str) -> ModelResult<NodeId> {
        let attached = {
            let document = self.document();
            document.get_root(root_name).is_some_and(|root| document.is_root_attached(root))
        };
        if attached {
            return Err(ModelError::new("writer-addroot-root-exists", "Root with provided name already exists").with_context(json!({ "rootName": root_name })));
        }
        let version = self.document().version();
        self.apply(RootOperation::new(root_name, element_name, true, Some(version)))?;
        self.document()
            .get_root(root_name)
            .ok_or_else(|| ModelError::new("writer-addroot-root-exists", "Root was not created"))
    }

    /// Empty a root, drop its markers and attributes, and detach it.
    pub fn detach_root(&self, root_name: &str) -> ModelResult<()> {
        let root = {
            let document = self.document();
            document.get_root(root_name).filter(|root| *root != GRAVEYARD && document.is_root_attached(*root))
        };
        let root = root.ok_or_else(|| ModelError::new("writer-detachroot-no-root", "Root does not exist or is already detached").with_context(json!({ "rootName": root_name })))?;

        let (markers, keys, element_name) = {
            let document = self.document();
            let markers: Vec<String> = document.markers().iter().filter(|marker| marker.range.root() == root).map(|marker| marker.name.clone()).collect();
            let keys: Vec<String> = document.tree().attributes(root).keys().cloned().collect();
            let element_name = document.tree().name(root).unwrap_or_default().to_string();
            (markers, keys, element_name)
        };
        for marker in markers {
            self.remove_marker(&marker)?;
        }
        for key in keys {
            self.remove_attribute(&key, root)?;
        }
        let content = self.create_range_in(root)?;
        if !content.is_collapsed() {
            self.remove(content)?;
        }
        let version = self.document().version();
        self.apply(RootOperation::new(root_name, element_name, false, Some(version)))?;
        Ok(())
    }

    // ---- selection -----------------------------------------------------

    pub fn set_selection(&self, selectable: impl Into<Selectable>, backward: bool) -> ModelResult<()> {
        let selection = {
            let document = self.document();
            let selection = Selection::new(document.tree(), selectable, backward)?;
            for range in selection.ranges() {
                if !document.tree().is_root_element(range.root()) || range.root() == GRAVEYARD {
                    return Err(ModelError::new("writer-set-selection-not-in-document", "Selection ranges must be in a document root"));
                }
            }
            selection
        };
        self.model.document_mut()?.set_selection(selection);
        self.model.flush_document_events();
        Ok(())
    }

    pub fn set_selection_focus(&self, position: Position) -> ModelResult<()> {
        self.model.document_mut()?.set_selection_focus(position)?;
        self.model.flush_document_events();
        Ok(())
    }

    pub fn set_selection_attribute(&self, key: &str, value: Value) -> ModelResult<()> {
        self.model.document_mut()?.set_selection_attribute(key, value);
        self.model.flush_document_events();
        Ok(())
    }

    pub fn remove_selection_attribute(&self, key: &str) -> ModelResult<()> {
        self.model.document_mut()?.remove_selection_attribute(key);
        self.model.flush_document_events();
        Ok(())
    }
}
