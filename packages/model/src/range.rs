//! # Ranges
//!
//! An ordered pair of positions in one root. Ranges address selections,
//! markers and most operation payloads.

use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::node::NodeId;
use crate::operation::Operation;
use crate::position::{Position, PositionJson, PositionOffset, Stickiness};
use crate::tree::Tree;
use crate::tree_walker::{Direction, TreeWalker, TreeWalkerItem, TreeWalkerOptions, WalkerEventKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeJson {
    pub start: PositionJson,
    pub end: PositionJson,
}

impl Range {
    /// Build a range, swapping the ends when `start` is after `end`.
    pub fn new(start: Position, end: Position) -> Self {
        if start.is_after(&end) {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn collapsed(position: Position) -> Self {
        Self {
            start: position.clone(),
            end: position,
        }
    }

    /// Range covering the whole content of `element`.
    pub fn in_element(tree: &Tree, element: NodeId) -> ModelResult<Self> {
        Ok(Self::new(
            Position::create_at(tree, element, 0)?,
            Position::create_at(tree, element, PositionOffset::End)?,
        ))
    }

    /// Range covering `node` itself.
    pub fn on(tree: &Tree, node: NodeId) -> ModelResult<Self> {
        Ok(Self::new(Position::before(tree, node)?, Position::after(tree, node)?))
    }

    pub fn from_position_and_shift(position: &Position, shift: usize) -> Self {
        Self::new(position.clone(), position.shifted_forward(shift))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn root(&self) -> NodeId {
        self.start.root
    }

    /// Both ends share a parent.
    pub fn is_flat(&self) -> bool {
        self.start.has_same_parent_as(&self.end)
    }

    /// Strict containment: ends are not contained.
    pub fn contains_position(&self, position: &Position) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }

    pub fn contains_range(&self, other: &Range, loose: bool) -> bool {
        if other.is_collapsed() {
            return self.contains_position(&other.start) || (loose && (other.start == self.start || other.start == self.end));
        }
        let starts_inside = self.contains_position(&other.start) || self.start == other.start;
        let ends_inside = self.contains_position(&other.end) || self.end == other.end;
        starts_inside && ends_inside
    }

    pub fn contains_item(&self, tree: &Tree, node: NodeId) -> bool {
        match Position::before(tree, node) {
            Ok(before) => {
                (self.contains_position(&before) || self.start == before)
                    && Position::after(tree, node).map(|after| self.contains_position(&after) || self.end == after).unwrap_or(false)
            }
            Err(_) => false,
        }
    }

    pub fn is_intersecting(&self, other: &Range) -> bool {
        self.start.is_before(&other.end) && self.end.is_after(&other.start)
    }

    pub fn get_intersection(&self, other: &Range) -> Option<Range> {
        if !self.is_intersecting(other) {
            return None;
        }
        let start = if self.start.is_before(&other.start) { other.start.clone() } else { self.start.clone() };
        let end = if self.end.is_after(&other.end) { other.end.clone() } else { self.end.clone() };
        Some(Range::new(start, end))
    }

    /// Deepest container holding both ends.
    pub fn common_ancestor(&self, tree: &Tree) -> Option<NodeId> {
        self.start.common_ancestor(tree, &self.end)
    }

    /// The element exactly covered by this range, if any.
    pub fn contained_element(&self, tree: &Tree) -> Option<NodeId> {
        if self.is_collapsed() {
            return None;
        }
        let node = self.start.node_after(tree)?;
        let after = self.end.node_before(tree)?;
        (node == after && tree.is_element(node)).then_some(node)
    }

    pub fn get_walker<'t>(&self, tree: &'t Tree, options: TreeWalkerOptions) -> ModelResult<TreeWalker<'t>> {
        TreeWalker::new(tree, TreeWalkerOptions {
            boundaries: Some(self.clone()),
            ..options
        })
    }

    /// Items (elements and text proxies) inside the range; shallow unless
    /// `deep` is set.
    pub fn get_items(&self, tree: &Tree, deep: bool) -> Vec<TreeWalkerItem> {
        let options = TreeWalkerOptions {
            shallow: !deep,
            ignore_element_end: true,
            ..TreeWalkerOptions::default()
        };
        match self.get_walker(tree, options) {
            Ok(walker) => walker.map(|value| value.item).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Positions visited walking the range, including both ends.
    pub fn get_positions(&self, tree: &Tree) -> Vec<Position> {
        let mut positions = vec![self.start.clone()];
        let options = TreeWalkerOptions {
            single_characters: true,
            ..TreeWalkerOptions::default()
        };
        if let Ok(walker) = self.get_walker(tree, options) {
            positions.extend(walker.map(|value| value.next_position));
        }
        positions
    }

    /// Split the range into ranges that each have a single parent.
    pub fn get_minimal_flat_ranges(&self, tree: &Tree) -> Vec<Range> {
        let mut ranges = Vec::new();
        let diff_at = self.start.common_path(&self.end).len();

        let mut pos = self.start.clone();
        let mut pos_parent = pos.parent(tree);

        if self.start.path.len() > diff_at + 1 {
            // Climb from the start up to the level below the common ancestor.
            while pos.path.len() > diff_at + 1 {
                let Some(parent) = pos_parent else { break };
                let how_many = tree.max_offset(parent).saturating_sub(pos.offset());
                if how_many != 0 {
                    ranges.push(Range::new(pos.clone(), pos.shifted_forward(how_many)));
                }
                let mut up = pos.path[..pos.path.len() - 1].to_vec();
                if let Some(last) = up.last_mut() {
                    *last += 1;
                }
                pos = Position::from_parts(pos.root, up);
                pos_parent = pos.parent(tree);
            }
        }

        while pos.path.len() <= self.end.path.len() {
            let depth = pos.path.len() - 1;
            let end_offset = self.end.path[depth];
            let how_many = end_offset.saturating_sub(pos.offset());
            if how_many != 0 {
                ranges.push(Range::new(pos.clone(), pos.shifted_forward(how_many)));
            }
            if pos.path.len() == self.end.path.len() {
                break;
            }
            let mut down = pos.path.clone();
            if let Some(last) = down.last_mut() {
                *last += how_many;
            }
            down.push(0);
            pos = Position::from_parts(pos.root, down);
        }
        ranges
    }

    pub fn get_transformed_by_operation(&self, operation: &Operation) -> Range {
        let start = self.start.clone().with_stickiness(if self.is_collapsed() { Stickiness::ToNone } else { Stickiness::ToNext });
        let end = self.end.clone().with_stickiness(if self.is_collapsed() { Stickiness::ToNone } else { Stickiness::ToPrevious });
        let mut start = start.get_transformed_by_operation(operation);
        let mut end = end.get_transformed_by_operation(operation);
        start.stickiness = self.start.stickiness;
        end.stickiness = self.end.stickiness;
        if start.is_after(&end) || start.root != end.root {
            return Range::collapsed(start);
        }
        Range { start, end }
    }

    pub fn to_json(&self, tree: &Tree) -> RangeJson {
        RangeJson {
            start: self.start.to_json(tree),
            end: self.end.to_json(tree),
        }
    }

    pub fn from_json(json: &RangeJson, document: &Document) -> ModelResult<Range> {
        let start = Position::from_json(&json.start, document)?;
        let end = Position::from_json(&json.end, document)?;
        if start.root != end.root {
            return Err(ModelError::new("model-range-different-roots", "Range ends must share a root"));
        }
        Ok(Range::new(start, end))
    }

    /// Text proxies and elements inside the range, in document order.
    pub fn contained_text_and_elements(&self, tree: &Tree) -> Vec<TreeWalkerItem> {
        let options = TreeWalkerOptions {
            direction: Direction::Forward,
            ..TreeWalkerOptions::default()
        };
        match self.get_walker(tree, options) {
            Ok(walker) => walker
                .filter(|value| value.kind != WalkerEventKind::ElementEnd)
                .map(|value| value.item)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
