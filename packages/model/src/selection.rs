//! # Selections
//!
//! [`Selection`] is a plain value: ranges plus a direction. The document
//! owns one live [`DocumentSelection`] that is moved through every applied
//! operation and carries the attributes new text would receive.

use std::collections::BTreeMap;

use quire_common::{ModelError, ModelResult};
use serde_json::Value;
use tracing::warn;

use crate::node::{Attributes, NodeId};
use crate::operation::Operation;
use crate::position::{Position, PositionOffset};
use crate::range::Range;
use crate::tree::{Tree, GRAVEYARD};
use crate::tree_walker::TreeWalkerItem;

/// Where a selection goes relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPlace {
    /// Across the node's whole content.
    In,
    /// Around the node itself.
    On,
    /// Collapsed at an offset inside the node (or before/after it).
    At(PositionOffset),
}

/// Anything a selection can be set to.
#[derive(Debug, Clone, PartialEq)]
pub enum Selectable {
    None,
    Position(Position),
    Range(Range),
    Ranges(Vec<Range>),
    Node(NodeId, SelectionPlace),
    Selection(Selection),
}

impl From<Position> for Selectable {
    fn from(position: Position) -> Self {
        Selectable::Position(position)
    }
}

impl From<Range> for Selectable {
    fn from(range: Range) -> Self {
        Selectable::Range(range)
    }
}

impl From<Vec<Range>> for Selectable {
    fn from(ranges: Vec<Range>) -> Self {
        Selectable::Ranges(ranges)
    }
}

impl From<Selection> for Selectable {
    fn from(selection: Selection) -> Self {
        Selectable::Selection(selection)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ranges: Vec<Range>,
    backward: bool,
}

impl Selection {
    pub fn new(tree: &Tree, selectable: impl Into<Selectable>, backward: bool) -> ModelResult<Self> {
        let mut selection = Self::default();
        selection.set_to(tree, selectable, backward)?;
        Ok(selection)
    }

    pub fn collapsed_at(position: Position) -> Self {
        Self {
            ranges: vec![Range::collapsed(position)],
            backward: false,
        }
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_backward(&self) -> bool {
        self.backward && !self.is_collapsed()
    }

    pub fn is_collapsed(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_collapsed()
    }

    pub fn first_range(&self) -> Option<&Range> {
        self.ranges.iter().min_by(|a, b| a.start.path.cmp(&b.start.path))
    }

    pub fn last_range(&self) -> Option<&Range> {
        self.ranges.iter().max_by(|a, b| a.end.path.cmp(&b.end.path))
    }

    pub fn first_position(&self) -> Option<Position> {
        self.first_range().map(|range| range.start.clone())
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_range().map(|range| range.end.clone())
    }

    /// Fixed end of the selection.
    pub fn anchor(&self) -> Option<Position> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.end.clone() } else { range.start.clone() })
    }

    /// Moving end of the selection.
    pub fn focus(&self) -> Option<Position> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.start.clone() } else { range.end.clone() })
    }

    pub fn set_to(&mut self, tree: &Tree, selectable: impl Into<Selectable>, backward: bool) -> ModelResult<()> {
        let ranges = match selectable.into() {
            Selectable::None => Vec::new(),
            Selectable::Position(position) => vec![Range::collapsed(position)],
            Selectable::Range(range) => vec![range],
            Selectable::Ranges(ranges) => ranges,
            Selectable::Selection(selection) => {
                self.ranges = selection.ranges;
                self.backward = selection.backward;
                return Ok(());
            }
            Selectable::Node(node, place) => {
                let range = match place {
                    SelectionPlace::In => Range::in_element(tree, node)?,
                    SelectionPlace::On => Range::on(tree, node)?,
                    SelectionPlace::At(offset) => Range::collapsed(Position::create_at(tree, node, offset)?),
                };
                vec![range]
            }
        };
        self.set_ranges(ranges, backward)
    }

    fn set_ranges(&mut self, ranges: Vec<Range>, backward: bool) -> ModelResult<()> {
        for (i, range) in ranges.iter().enumerate() {
            for other in &ranges[..i] {
                if range.is_intersecting(other) {
                    return Err(ModelError::new("model-selection-range-intersects", "Trying to add a range that intersects with another range in the selection"));
                }
            }
        }
        self.ranges = ranges;
        self.backward = backward;
        Ok(())
    }

    /// Move the focus to `position`, keeping the anchor.
    pub fn set_focus(&mut self, position: Position) -> ModelResult<()> {
        let anchor = self
            .anchor()
            .ok_or_else(|| ModelError::new("model-selection-setfocus-no-ranges", "Cannot set selection focus if there are no ranges in selection"))?;
        self.ranges.pop();
        self.backward = position.is_before(&anchor);
        self.ranges.push(Range::new(anchor, position));
        Ok(())
    }

    /// The element selected as a whole, if the selection is exactly one.
    pub fn get_selected_element(&self, tree: &Tree) -> Option<NodeId> {
        if self.ranges.len() != 1 {
            return None;
        }
        self.ranges[0].contained_element(tree)
    }

    /// Does the selection span the whole content of `element`?
    pub fn contains_entire_content(&self, tree: &Tree, element: NodeId) -> ModelResult<bool> {
        let whole = Range::in_element(tree, element)?;
        let (Some(first), Some(last)) = (self.first_position(), self.last_position()) else {
            return Ok(false);
        };
        Ok(!first.is_after(&whole.start) && !last.is_before(&whole.end))
    }

    pub(crate) fn ranges_mut(&mut self) -> &mut Vec<Range> {
        &mut self.ranges
    }
}

/// The live selection of a document.
///
/// Attributes come from the text around the selection unless they were
/// set (or removed) explicitly; explicit values last until the selection
/// is moved directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSelection {
    selection: Selection,
    attributes: Attributes,
    overridden: BTreeMap<String, Option<Value>>,
}

impl DocumentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_selection(&self) -> &Selection {
        &self.selection
    }

    pub fn ranges(&self) -> &[Range] {
        self.selection.ranges()
    }

    pub fn is_collapsed(&self) -> bool {
        self.selection.is_collapsed()
    }

    pub fn is_backward(&self) -> bool {
        self.selection.is_backward()
    }

    pub fn anchor(&self) -> Option<Position> {
        self.selection.anchor()
    }

    pub fn focus(&self) -> Option<Position> {
        self.selection.focus()
    }

    pub fn first_range(&self) -> Option<&Range> {
        self.selection.first_range()
    }

    pub fn first_position(&self) -> Option<Position> {
        self.selection.first_position()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Replace the ranges. Explicit attributes are dropped.
    pub(crate) fn set_to(&mut self, tree: &Tree, selection: Selection) {
        self.selection = selection;
        self.overridden.clear();
        self.refresh_attributes(tree);
    }

    pub(crate) fn set_focus(&mut self, tree: &Tree, position: Position) -> ModelResult<()> {
        self.selection.set_focus(position)?;
        self.overridden.clear();
        self.refresh_attributes(tree);
        Ok(())
    }

    pub(crate) fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.overridden.insert(key.clone(), Some(value.clone()));
        self.attributes.insert(key, value);
    }

    pub(crate) fn remove_attribute(&mut self, key: &str) {
        self.overridden.insert(key.to_string(), None);
        self.attributes.remove(key);
    }

    /// Move the ranges through an applied operation. A range that ended up
    /// in the graveyard collapses where its content was removed.
    pub(crate) fn transform(&mut self, tree: &Tree, operation: &Operation) -> bool {
        let mut changed = false;
        let fallback = removal_position(operation);
        for range in self.selection.ranges_mut() {
            let mut transformed = range.get_transformed_by_operation(operation);
            if transformed.root() == GRAVEYARD && range.root() != GRAVEYARD {
                match &fallback {
                    Some(position) => {
                        warn!(operation = %operation.class_name(), "selection range moved to the graveyard; resetting");
                        transformed = Range::collapsed(position.clone());
                    }
                    None => continue,
                }
            }
            if transformed != *range {
                *range = transformed;
                changed = true;
            }
        }
        if changed {
            self.refresh_attributes(tree);
        }
        changed
    }

    /// Recompute attributes from the surrounding text, keeping explicit ones.
    pub(crate) fn refresh_attributes(&mut self, tree: &Tree) {
        let mut attributes = self.surrounding_attributes(tree);
        for (key, value) in &self.overridden {
            match value {
                Some(value) => {
                    attributes.insert(key.clone(), value.clone());
                }
                None => {
                    attributes.remove(key);
                }
            }
        }
        self.attributes = attributes;
    }

    fn surrounding_attributes(&self, tree: &Tree) -> Attributes {
        let Some(range) = self.selection.first_range() else {
            return Attributes::new();
        };
        if !range.start.is_valid(tree) {
            return Attributes::new();
        }
        if range.is_collapsed() {
            let position = &range.start;
            let text = position
                .text_node(tree)
                .or_else(|| position.node_before(tree).filter(|node| tree.is_text(*node)))
                .or_else(|| position.node_after(tree).filter(|node| tree.is_text(*node)));
            return text.map(|node| tree.attributes(node).clone()).unwrap_or_default();
        }
        range
            .get_items(tree, true)
            .into_iter()
            .find_map(|item| match item {
                TreeWalkerItem::Text(proxy) => Some(proxy.attributes(tree).clone()),
                TreeWalkerItem::Element(_) => None,
            })
            .unwrap_or_default()
    }
}

/// Where removed content used to be, for operations that move content to
/// the graveyard.
fn removal_position(operation: &Operation) -> Option<Position> {
    match operation {
        Operation::Move(op) if op.target_position.root == GRAVEYARD => Some(op.source_position.clone()),
        Operation::Merge(op) => Some(op.deletion_position()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(tree: &mut Tree, text: &str) -> (NodeId, NodeId) {
        let root = tree.create_root("$root", "main");
        let p = tree.create_element("paragraph", Attributes::new());
        tree.append_child(p, text).unwrap();
        tree.append_child(root, p).unwrap();
        (root, p)
    }

    #[test]
    fn test_focus_and_direction() {
        let mut tree = Tree::new();
        let (_, p) = paragraph(&mut tree, "foobar");
        let mut selection = Selection::new(&tree, Position::create_at(&tree, p, 3).unwrap(), false).unwrap();

        selection.set_focus(Position::create_at(&tree, p, 1).unwrap()).unwrap();

        assert!(selection.is_backward());
        assert_eq!(selection.anchor().unwrap().path, vec![0, 3]);
        assert_eq!(selection.focus().unwrap().path, vec![0, 1]);
        assert_eq!(selection.first_position().unwrap().path, vec![0, 1]);
    }

    #[test]
    fn test_rejects_intersecting_ranges() {
        let mut tree = Tree::new();
        let (_, p) = paragraph(&mut tree, "foobar");
        let a = Range::new(Position::create_at(&tree, p, 0).unwrap(), Position::create_at(&tree, p, 3).unwrap());
        let b = Range::new(Position::create_at(&tree, p, 2).unwrap(), Position::create_at(&tree, p, 5).unwrap());

        let err = Selection::new(&tree, vec![a, b], false).unwrap_err();
        assert!(err.is("model-selection-range-intersects"));
    }

    #[test]
    fn test_selected_element() {
        let mut tree = Tree::new();
        let (root, p) = paragraph(&mut tree, "x");
        let selection = Selection::new(&tree, Selectable::Node(p, SelectionPlace::On), false).unwrap();
        assert_eq!(selection.get_selected_element(&tree), Some(p));
        assert!(selection.contains_entire_content(&tree, root).unwrap());
    }

    #[test]
    fn test_document_selection_attributes() {
        let mut tree = Tree::new();
        let (_, p) = paragraph(&mut tree, "ab");
        let bold: Attributes = [("bold".to_string(), Value::Bool(true))].into_iter().collect();
        let text = tree.create_text("cd", bold);
        tree.append_child(p, text).unwrap();

        let mut selection = DocumentSelection::new();
        selection.set_to(&tree, Selection::collapsed_at(Position::create_at(&tree, p, 3).unwrap()));
        assert!(selection.has_attribute("bold"));

        selection.remove_attribute("bold");
        selection.refresh_attributes(&tree);
        assert!(!selection.has_attribute("bold"));

        selection.set_to(&tree, Selection::collapsed_at(Position::create_at(&tree, p, 1).unwrap()));
        assert!(!selection.has_attribute("bold"));
        selection.set_attribute("italic", Value::Bool(true));
        assert!(selection.has_attribute("italic"));
    }
}
