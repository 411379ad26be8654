//! # Positions
//!
//! A position is `(root, path)`: the offsets leading from a root (document
//! root element, fragment or detached element) down to a point between two
//! offsets. Positions do not hold on to nodes; after a structural change
//! they are recomputed with [`Position::get_transformed_by_operation`].

use std::cmp::Ordering;

use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::document::Document;
use crate::node::NodeId;
use crate::operation::{MergeOperation, Operation, SplitOperation};
use crate::range::Range;
use crate::tree::Tree;

/// How a position reacts to content inserted exactly at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stickiness {
    /// Not bound to either side; shifts with content inserted at it.
    #[default]
    ToNone,
    /// Sticks to the content after it.
    ToNext,
    /// Sticks to the content before it.
    ToPrevious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRelation {
    Before,
    After,
    Same,
    /// Positions in different roots are not comparable.
    Different,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionOffset {
    Offset(usize),
    End,
    Before,
    After,
}

impl From<usize> for PositionOffset {
    fn from(offset: usize) -> Self {
        PositionOffset::Offset(offset)
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    pub root: NodeId,
    pub path: Vec<usize>,
    pub stickiness: Stickiness,
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.path == other.path
    }
}

impl Eq for Position {}

/// JSON shape of a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionJson {
    pub root: String,
    pub path: Vec<usize>,
    #[serde(default)]
    pub stickiness: Stickiness,
}

impl Position {
    /// Create a position, checking that `root` has no parent and the path
    /// is not empty.
    pub fn new(tree: &Tree, root: NodeId, path: Vec<usize>) -> ModelResult<Self> {
        if tree.parent(root).is_some() || tree.is_text(root) {
            return Err(ModelError::new("model-position-root-invalid", "Position root must be a root element, fragment or detached element"));
        }
        if path.is_empty() {
            return Err(ModelError::new("model-position-path-incorrect-format", "Position path must not be empty"));
        }
        Ok(Self::from_parts(root, path))
    }

    pub(crate) fn from_parts(root: NodeId, path: Vec<usize>) -> Self {
        Self {
            root,
            path,
            stickiness: Stickiness::ToNone,
        }
    }

    pub fn with_stickiness(mut self, stickiness: Stickiness) -> Self {
        self.stickiness = stickiness;
        self
    }

    /// Position at `offset` inside `parent`, or before/after `parent`.
    pub fn create_at(tree: &Tree, node: NodeId, offset: impl Into<PositionOffset>) -> ModelResult<Self> {
        match offset.into() {
            PositionOffset::Offset(offset) => {
                if !tree.is_container(node) {
                    return Err(ModelError::new("model-createpositionat-offset-required", "Positions inside text nodes must use the text's parent"));
                }
                let root = tree.root_of(node);
                let mut path = tree.path(node);
                path.push(offset);
                Ok(Self::from_parts(root, path))
            }
            PositionOffset::End => Self::create_at(tree, node, tree.max_offset(node)),
            PositionOffset::Before => Self::before(tree, node),
            PositionOffset::After => Self::after(tree, node),
        }
    }

    pub fn before(tree: &Tree, node: NodeId) -> ModelResult<Self> {
        let parent = tree
            .parent(node)
            .ok_or_else(|| ModelError::new("model-position-before-root", "You cannot make a position before root"))?;
        let offset = tree.start_offset(node).unwrap_or_default();
        Self::create_at(tree, parent, offset)
    }

    pub fn after(tree: &Tree, node: NodeId) -> ModelResult<Self> {
        let parent = tree
            .parent(node)
            .ok_or_else(|| ModelError::new("model-position-after-root", "You cannot make a position after root"))?;
        let offset = tree.end_offset(node).unwrap_or_default();
        Self::create_at(tree, parent, offset)
    }

    pub fn offset(&self) -> usize {
        self.path.last().copied().unwrap_or_default()
    }

    pub fn set_offset(&mut self, offset: usize) {
        if let Some(last) = self.path.last_mut() {
            *last = offset;
        }
    }

    pub fn parent_path(&self) -> &[usize] {
        &self.path[..self.path.len().saturating_sub(1)]
    }

    /// Container the position is in. `None` when the path no longer
    /// resolves.
    pub fn parent(&self, tree: &Tree) -> Option<NodeId> {
        let parent = tree.get_node_by_path(self.root, self.parent_path())?;
        tree.is_container(parent).then_some(parent)
    }

    pub fn index(&self, tree: &Tree) -> Option<usize> {
        self.parent(tree).map(|parent| tree.offset_to_index(parent, self.offset()))
    }

    /// Text node the position is strictly inside of.
    pub fn text_node(&self, tree: &Tree) -> Option<NodeId> {
        let parent = self.parent(tree)?;
        let node = tree.child_at_offset(parent, self.offset())?;
        let start = tree.start_offset(node)?;
        (tree.is_text(node) && start < self.offset()).then_some(node)
    }

    pub fn node_after(&self, tree: &Tree) -> Option<NodeId> {
        if self.text_node(tree).is_some() {
            return None;
        }
        let parent = self.parent(tree)?;
        tree.child(parent, tree.offset_to_index(parent, self.offset()))
    }

    pub fn node_before(&self, tree: &Tree) -> Option<NodeId> {
        if self.text_node(tree).is_some() {
            return None;
        }
        let parent = self.parent(tree)?;
        let index = tree.offset_to_index(parent, self.offset());
        index.checked_sub(1).and_then(|i| tree.child(parent, i))
    }

    pub fn is_at_start(&self) -> bool {
        self.offset() == 0
    }

    pub fn is_at_end(&self, tree: &Tree) -> bool {
        self.parent(tree).map(|parent| self.offset() == tree.max_offset(parent)).unwrap_or(false)
    }

    /// Whether the path still resolves to a container and an in-bounds
    /// offset.
    pub fn is_valid(&self, tree: &Tree) -> bool {
        self.parent(tree).map(|parent| self.offset() <= tree.max_offset(parent)).unwrap_or(false)
    }

    pub fn compare_with(&self, other: &Position) -> PositionRelation {
        if self.root != other.root {
            return PositionRelation::Different;
        }
        match self.path.cmp(&other.path) {
            Ordering::Less => PositionRelation::Before,
            Ordering::Greater => PositionRelation::After,
            Ordering::Equal => PositionRelation::Same,
        }
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::Before
    }

    pub fn is_after(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::After
    }

    pub fn has_same_parent_as(&self, other: &Position) -> bool {
        self.root == other.root && self.parent_path() == other.parent_path()
    }

    pub fn get_shifted_by(&self, shift: isize) -> Position {
        let mut shifted = self.clone();
        let offset = self.offset() as isize + shift;
        shifted.set_offset(offset.max(0) as usize);
        shifted
    }

    /// Shifts forward without overflowing; used for "end of container"
    /// ranges.
    pub(crate) fn shifted_forward(&self, by: usize) -> Position {
        let mut shifted = self.clone();
        shifted.set_offset(self.offset().saturating_add(by));
        shifted
    }

    /// Ancestors of the position (root first, parent last).
    pub fn ancestors(&self, tree: &Tree) -> Vec<NodeId> {
        match self.parent(tree) {
            Some(parent) => {
                let mut list = tree.ancestors(parent);
                list.push(parent);
                list
            }
            None => Vec::new(),
        }
    }

    pub fn common_path(&self, other: &Position) -> Vec<usize> {
        self.path
            .iter()
            .zip(other.path.iter())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| *a)
            .collect()
    }

    /// Deepest element containing both positions.
    pub fn common_ancestor(&self, tree: &Tree, other: &Position) -> Option<NodeId> {
        if self.root != other.root {
            return None;
        }
        let (a, b) = (self.parent(tree)?, other.parent(tree)?);
        tree.common_ancestor(a, b)
    }

    // ---- transformations ---------------------------------------------

    pub fn get_transformed_by_operation(&self, operation: &Operation) -> Position {
        match operation {
            Operation::Insert(op) => self.get_transformed_by_insertion(&op.position, op.how_many()),
            Operation::Move(op) => self.get_transformed_by_move(&op.source_position, &op.target_position, op.how_many),
            Operation::Split(op) => self.get_transformed_by_split(op),
            Operation::Merge(op) => self.get_transformed_by_merge(op),
            _ => self.clone(),
        }
    }

    pub fn get_transformed_by_insertion(&self, insert: &Position, how_many: usize) -> Position {
        let mut transformed = self.clone();
        if self.root != insert.root {
            return transformed;
        }
        if insert.parent_path() == self.parent_path() {
            if insert.offset() < self.offset()
                || (insert.offset() == self.offset() && self.stickiness != Stickiness::ToPrevious)
            {
                transformed.set_offset(self.offset() + how_many);
            }
        } else if self.parent_path().starts_with(insert.parent_path()) {
            let i = insert.path.len() - 1;
            if insert.offset() <= self.path[i] {
                transformed.path[i] += how_many;
            }
        }
        transformed
    }

    /// `None` when the position was inside the deleted content.
    pub fn get_transformed_by_deletion(&self, delete: &Position, how_many: usize) -> Option<Position> {
        let mut transformed = self.clone();
        if self.root != delete.root {
            return Some(transformed);
        }
        if delete.parent_path() == self.parent_path() {
            if delete.offset() < self.offset() {
                if delete.offset() + how_many > self.offset() {
                    return None;
                }
                transformed.set_offset(self.offset() - how_many);
            }
        } else if self.parent_path().starts_with(delete.parent_path()) {
            let i = delete.path.len() - 1;
            if delete.offset() <= self.path[i] {
                if delete.offset() + how_many > self.path[i] {
                    return None;
                }
                transformed.path[i] -= how_many;
            }
        }
        Some(transformed)
    }

    pub fn get_transformed_by_move(&self, source: &Position, target: &Position, how_many: usize) -> Position {
        let Some(target) = target.get_transformed_by_deletion(source, how_many) else {
            return self.clone();
        };
        if *source == target {
            return self.clone();
        }

        let transformed = self.get_transformed_by_deletion(source, how_many);
        let is_moved = match &transformed {
            None => true,
            Some(_) => {
                (*source == *self && self.stickiness == Stickiness::ToNext)
                    || (source.get_shifted_by(how_many as isize) == *self && self.stickiness == Stickiness::ToPrevious)
            }
        };

        match transformed {
            Some(transformed) if !is_moved => transformed.get_transformed_by_insertion(&target, how_many),
            _ => self.get_combined(source, &target),
        }
    }

    /// Re-root a position that lived under `source` so it lives under
    /// `target` instead.
    pub fn get_combined(&self, source: &Position, target: &Position) -> Position {
        let i = source.path.len() - 1;
        let mut combined = target.clone();
        combined.stickiness = self.stickiness;
        let offset = combined.offset() + self.path[i] - source.offset();
        combined.set_offset(offset);
        combined.path.extend_from_slice(&self.path[i + 1..]);
        combined
    }

    fn get_transformed_by_split(&self, op: &SplitOperation) -> Position {
        let moved = op.moved_range();
        let contained = moved.contains_position(self) || (moved.start == *self && self.stickiness == Stickiness::ToNext);
        if contained {
            return self.get_combined(&op.split_position, &op.move_target_position());
        }
        match &op.graveyard_position {
            Some(graveyard) => self.get_transformed_by_move(graveyard, &op.insertion_position, 1),
            None => self.get_transformed_by_insertion(&op.insertion_position, 1),
        }
    }

    fn get_transformed_by_merge(&self, op: &MergeOperation) -> Position {
        let moved = op.moved_range();
        let deletion = op.deletion_position();
        let contained = moved.contains_position(self) || moved.start == *self;
        if contained {
            let combined = self.get_combined(&op.source_position, &op.target_position);
            if op.source_position.is_before(&op.target_position) {
                return combined.get_transformed_by_deletion(&deletion, 1).unwrap_or(combined);
            }
            combined
        } else if *self == deletion {
            deletion.with_stickiness(self.stickiness)
        } else {
            self.get_transformed_by_move(&deletion, &op.graveyard_position, 1)
        }
    }

    // ---- serialization -----------------------------------------------

    pub fn to_json(&self, tree: &Tree) -> PositionJson {
        let root = tree
            .root_info(self.root)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| "$detached".to_string());
        PositionJson {
            root,
            path: self.path.clone(),
            stickiness: self.stickiness,
        }
    }

    pub fn from_json(json: &PositionJson, document: &Document) -> ModelResult<Position> {
        if json.root == "$graveyard" {
            return Ok(Position::from_parts(document.graveyard(), json.path.clone()).with_stickiness(json.stickiness));
        }
        let root = document.get_root(&json.root).ok_or_else(|| {
            ModelError::new("model-position-fromjson-no-root", "Cannot create position for document. Root with specified name does not exist.")
                .with_context(json!({ "rootName": json.root }))
        })?;
        Ok(Position::from_parts(root, json.path.clone()).with_stickiness(json.stickiness))
    }
}

impl From<&Position> for Range {
    fn from(position: &Position) -> Self {
        Range::collapsed(position.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;

    fn sample() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.create_fragment();
        let p = tree.create_element("paragraph", Attributes::new());
        tree.append_child(p, "foobar").unwrap();
        let img = tree.create_element("image", Attributes::new());
        tree.append_child(root, vec![p, img]).unwrap();
        (tree, root, p)
    }

    #[test]
    fn test_create_at_and_parent() {
        let (tree, root, p) = sample();
        let pos = Position::create_at(&tree, p, 3).unwrap();

        assert_eq!(pos.path, vec![0, 3]);
        assert_eq!(pos.root, root);
        assert_eq!(pos.parent(&tree), Some(p));
        assert!(pos.text_node(&tree).is_some());
        assert_eq!(pos.node_after(&tree), None);
    }

    #[test]
    fn test_before_after_and_end() {
        let (tree, root, p) = sample();
        assert_eq!(Position::before(&tree, p).unwrap().path, vec![0]);
        assert_eq!(Position::after(&tree, p).unwrap().path, vec![1]);
        assert_eq!(Position::create_at(&tree, root, PositionOffset::End).unwrap().path, vec![2]);
        assert!(Position::before(&tree, root).is_err());
    }

    #[test]
    fn test_new_rejects_non_root() {
        let (tree, _, p) = sample();
        let err = Position::new(&tree, p, vec![0]).unwrap_err();
        assert!(err.is("model-position-root-invalid"));
    }

    #[test]
    fn test_compare() {
        let (tree, _, p) = sample();
        let a = Position::create_at(&tree, p, 1).unwrap();
        let b = Position::after(&tree, p).unwrap();
        assert!(a.is_before(&b));
        assert!(b.is_after(&a));
        assert_eq!(a.compare_with(&a.clone()), PositionRelation::Same);
    }

    #[test]
    fn test_transform_by_insertion_respects_stickiness() {
        let root = NodeId(0);
        let pos = Position::from_parts(root, vec![0, 3]);
        let insert = Position::from_parts(root, vec![0, 3]);

        assert_eq!(pos.get_transformed_by_insertion(&insert, 2).path, vec![0, 5]);
        let sticky = pos.clone().with_stickiness(Stickiness::ToPrevious);
        assert_eq!(sticky.get_transformed_by_insertion(&insert, 2).path, vec![0, 3]);

        let in_ancestor = Position::from_parts(root, vec![0]);
        assert_eq!(pos.get_transformed_by_insertion(&in_ancestor, 1).path, vec![1, 3]);
    }

    #[test]
    fn test_transform_by_deletion() {
        let root = NodeId(0);
        let pos = Position::from_parts(root, vec![1, 2]);

        assert_eq!(pos.get_transformed_by_deletion(&Position::from_parts(root, vec![0]), 1).unwrap().path, vec![0, 2]);
        assert!(pos.get_transformed_by_deletion(&Position::from_parts(root, vec![1]), 1).is_none());
        assert_eq!(pos.get_transformed_by_deletion(&Position::from_parts(root, vec![2]), 1).unwrap().path, vec![1, 2]);
    }

    #[test]
    fn test_transform_by_move_carries_inner_positions() {
        let root = NodeId(0);
        let pos = Position::from_parts(root, vec![1, 2]);
        let source = Position::from_parts(root, vec![1]);
        let target = Position::from_parts(root, vec![4]);

        let moved = pos.get_transformed_by_move(&source, &target, 1);
        assert_eq!(moved.path, vec![3, 2]);
    }
}
