//! # Tree walker
//!
//! Stateful cursor producing `ElementStart` / `ElementEnd` / `Text` events
//! between two positions, in either direction.
//!
//! ```text
//! forward:   [<p>]  [ba]  [<img/>]  [</p>]
//!            start  text  start     end
//! backward:  the same events, reversed, with ElementStart/ElementEnd swapped
//! ```
//!
//! The walker borrows the tree for its lifetime; positions it hands out are
//! plain values and stay usable after the walk.

use std::str::FromStr;

use quire_common::{ModelError, ModelResult};
use serde_json::json;
use tracing::trace;

use crate::node::NodeId;
use crate::position::{Position, Stickiness};
use crate::range::Range;
use crate::text_proxy::TextProxy;
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl FromStr for Direction {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            other => Err(ModelError::new("model-tree-walker-unknown-direction", "Only `backward` and `forward` direction allowed.")
                .with_context(json!({ "direction": other }))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerEventKind {
    ElementStart,
    ElementEnd,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeWalkerItem {
    Element(NodeId),
    Text(TextProxy),
}

impl TreeWalkerItem {
    pub fn as_element(&self) -> Option<NodeId> {
        match self {
            TreeWalkerItem::Element(id) => Some(*id),
            TreeWalkerItem::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextProxy> {
        match self {
            TreeWalkerItem::Text(proxy) => Some(proxy),
            TreeWalkerItem::Element(_) => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, TreeWalkerItem::Element(_))
    }

    /// Offset size of the item.
    pub fn offset_size(&self) -> usize {
        match self {
            TreeWalkerItem::Element(_) => 1,
            TreeWalkerItem::Text(proxy) => proxy.length,
        }
    }
}

/// One walker step.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeWalkerValue {
    pub kind: WalkerEventKind,
    pub item: TreeWalkerItem,
    /// `None` for element end events.
    pub length: Option<usize>,
    /// Cursor position before this step.
    pub previous_position: Position,
    /// Cursor position after this step.
    pub next_position: Position,
}

#[derive(Debug, Clone, Default)]
pub struct TreeWalkerOptions {
    pub direction: Direction,
    pub boundaries: Option<Range>,
    pub start_position: Option<Position>,
    pub single_characters: bool,
    pub shallow: bool,
    pub ignore_element_end: bool,
}

#[derive(Debug, Clone)]
pub struct TreeWalker<'t> {
    tree: &'t Tree,
    direction: Direction,
    boundaries: Option<Range>,
    single_characters: bool,
    shallow: bool,
    ignore_element_end: bool,
    position: Position,
    boundary_start_parent: Option<NodeId>,
    boundary_end_parent: Option<NodeId>,
    visited_parent: NodeId,
}

impl<'t> TreeWalker<'t> {
    pub fn new(tree: &'t Tree, options: TreeWalkerOptions) -> ModelResult<Self> {
        let mut position = match (&options.start_position, &options.boundaries) {
            (Some(start), _) => start.clone(),
            (None, Some(bounds)) => match options.direction {
                Direction::Forward => bounds.start.clone(),
                Direction::Backward => bounds.end.clone(),
            },
            (None, None) => {
                return Err(ModelError::new("model-tree-walker-no-start-position", "Neither boundaries nor starting position have been defined."));
            }
        };
        position.stickiness = Stickiness::ToNone;

        let visited_parent = position.parent(tree).ok_or_else(|| invalid_position(&position))?;
        let boundary_start_parent = options.boundaries.as_ref().and_then(|b| b.start.parent(tree));
        let boundary_end_parent = options.boundaries.as_ref().and_then(|b| b.end.parent(tree));

        Ok(Self {
            tree,
            direction: options.direction,
            boundaries: options.boundaries,
            single_characters: options.single_characters,
            shallow: options.shallow,
            ignore_element_end: options.ignore_element_end,
            position,
            boundary_start_parent,
            boundary_end_parent,
            visited_parent,
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn boundaries(&self) -> Option<&Range> {
        self.boundaries.as_ref()
    }

    /// Move past consecutive events matching `predicate`. The first
    /// non-matching event is not consumed.
    pub fn skip_while_matching(&mut self, mut predicate: impl FnMut(&TreeWalkerValue) -> bool) {
        loop {
            let previous_position = self.position.clone();
            let previous_parent = self.visited_parent;
            match self.step() {
                None => return,
                Some(value) if predicate(&value) => continue,
                Some(_) => {
                    self.position = previous_position;
                    self.visited_parent = previous_parent;
                    return;
                }
            }
        }
    }

    /// Relocate the cursor, clamped to the boundaries.
    pub fn jump_to(&mut self, position: &Position) -> ModelResult<()> {
        let mut target = position.clone();
        if let Some(bounds) = &self.boundaries {
            if target.is_before(&bounds.start) {
                target = bounds.start.clone();
            } else if target.is_after(&bounds.end) {
                target = bounds.end.clone();
            }
        }
        let parent = target.parent(self.tree).ok_or_else(|| invalid_position(&target))?;
        target.stickiness = Stickiness::ToNone;
        self.position = target;
        self.visited_parent = parent;
        Ok(())
    }

    fn step(&mut self) -> Option<TreeWalkerValue> {
        match self.direction {
            Direction::Forward => self.next_forward(),
            Direction::Backward => self.next_backward(),
        }
    }

    fn next_forward(&mut self) -> Option<TreeWalkerValue> {
        let tree = self.tree;
        loop {
            let previous_position = self.position.clone();
            let mut position = self.position.clone();
            let parent = self.visited_parent;

            if tree.parent(parent).is_none() && position.offset() == tree.max_offset(parent) {
                return None;
            }
            if let Some(bounds) = &self.boundaries {
                if Some(parent) == self.boundary_end_parent && position.offset() == bounds.end.offset() {
                    return None;
                }
            }

            let text = text_node_at(tree, parent, position.offset());
            let node = text.or_else(|| tree.child(parent, tree.offset_to_index(parent, position.offset())));

            match node {
                Some(node) if tree.is_element(node) => {
                    if !self.shallow {
                        position.path.push(0);
                        self.visited_parent = node;
                    } else {
                        if let Some(bounds) = &self.boundaries {
                            if bounds.end.is_before(&position) {
                                return None;
                            }
                        }
                        position.set_offset(position.offset() + 1);
                    }
                    self.position = position.clone();
                    return Some(value(WalkerEventKind::ElementStart, TreeWalkerItem::Element(node), Some(1), previous_position, position));
                }
                Some(node) => {
                    let start = tree.start_offset(node).unwrap_or_default();
                    let count = if self.single_characters {
                        1
                    } else {
                        let mut end = start + tree.offset_size(node);
                        if let Some(bounds) = &self.boundaries {
                            if Some(parent) == self.boundary_end_parent && bounds.end.offset() < end {
                                end = bounds.end.offset();
                            }
                        }
                        end - position.offset()
                    };
                    let proxy = TextProxy::new(node, position.offset() - start, count);
                    position.set_offset(position.offset() + count);
                    self.position = position.clone();
                    return Some(value(WalkerEventKind::Text, TreeWalkerItem::Text(proxy), Some(count), previous_position, position));
                }
                None => {
                    position.path.pop();
                    position.set_offset(position.offset() + 1);
                    self.position = position.clone();
                    self.visited_parent = tree.parent(parent).unwrap_or(parent);
                    if self.ignore_element_end {
                        continue;
                    }
                    return Some(value(WalkerEventKind::ElementEnd, TreeWalkerItem::Element(parent), None, previous_position, position));
                }
            }
        }
    }

    fn next_backward(&mut self) -> Option<TreeWalkerValue> {
        let tree = self.tree;
        loop {
            let previous_position = self.position.clone();
            let mut position = self.position.clone();
            let parent = self.visited_parent;

            if tree.parent(parent).is_none() && position.offset() == 0 {
                return None;
            }
            if let Some(bounds) = &self.boundaries {
                if Some(parent) == self.boundary_start_parent && position.offset() == bounds.start.offset() {
                    return None;
                }
            }

            let text = text_node_at(tree, parent, position.offset());
            let node = text.or_else(|| {
                tree.offset_to_index(parent, position.offset())
                    .checked_sub(1)
                    .and_then(|index| tree.child(parent, index))
            });

            match node {
                Some(node) if tree.is_element(node) => {
                    position.set_offset(position.offset() - 1);
                    if self.shallow {
                        self.position = position.clone();
                        return Some(value(WalkerEventKind::ElementStart, TreeWalkerItem::Element(node), Some(1), previous_position, position));
                    }
                    position.path.push(tree.max_offset(node));
                    self.position = position.clone();
                    self.visited_parent = node;
                    if self.ignore_element_end {
                        continue;
                    }
                    return Some(value(WalkerEventKind::ElementEnd, TreeWalkerItem::Element(node), None, previous_position, position));
                }
                Some(node) => {
                    let start = tree.start_offset(node).unwrap_or_default();
                    let count = if self.single_characters {
                        1
                    } else {
                        let mut from = start;
                        if let Some(bounds) = &self.boundaries {
                            if Some(parent) == self.boundary_start_parent && bounds.start.offset() > from {
                                from = bounds.start.offset();
                            }
                        }
                        position.offset() - from
                    };
                    let offset_in_text = position.offset() - start;
                    let proxy = TextProxy::new(node, offset_in_text - count, count);
                    position.set_offset(position.offset() - count);
                    self.position = position.clone();
                    return Some(value(WalkerEventKind::Text, TreeWalkerItem::Text(proxy), Some(count), previous_position, position));
                }
                None => {
                    position.path.pop();
                    self.position = position.clone();
                    self.visited_parent = tree.parent(parent).unwrap_or(parent);
                    return Some(value(WalkerEventKind::ElementStart, TreeWalkerItem::Element(parent), Some(1), previous_position, position));
                }
            }
        }
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = TreeWalkerValue;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.step();
        if let Some(value) = &value {
            trace!(kind = ?value.kind, path = ?value.next_position.path, "tree walker step");
        }
        value
    }
}

fn value(
    kind: WalkerEventKind,
    item: TreeWalkerItem,
    length: Option<usize>,
    previous_position: Position,
    next_position: Position,
) -> TreeWalkerValue {
    TreeWalkerValue {
        kind,
        item,
        length,
        previous_position,
        next_position,
    }
}

/// Text node strictly containing `offset` inside `parent`.
fn text_node_at(tree: &Tree, parent: NodeId, offset: usize) -> Option<NodeId> {
    let node = tree.child_at_offset(parent, offset)?;
    let start = tree.start_offset(node)?;
    (tree.is_text(node) && start < offset).then_some(node)
}

fn invalid_position(position: &Position) -> ModelError {
    ModelError::new("model-tree-walker-invalid-position", "Walker position does not resolve to a container")
        .with_context(json!({ "path": position.path }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;
    use serde_json::Value;

    /// `<img1/><p>ba<bold>r</bold><img2/>x</p>` inside a fragment.
    fn sample() -> (Tree, NodeId, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.create_fragment();
        let img1 = tree.create_element("img1", Attributes::new());
        let p = tree.create_element("p", Attributes::new());
        let ba = tree.create_text("ba", Attributes::new());
        let mut bold = Attributes::new();
        bold.insert("bold".into(), Value::Bool(true));
        let r = tree.create_text("r", bold);
        let img2 = tree.create_element("img2", Attributes::new());
        let x = tree.create_text("x", Attributes::new());
        tree.append_child(p, vec![ba, r, img2, x]).unwrap();
        tree.append_child(root, vec![img1, p]).unwrap();
        (tree, root, img1, p, img2)
    }

    fn describe(tree: &Tree, value: &TreeWalkerValue) -> String {
        match (value.kind, &value.item) {
            (WalkerEventKind::Text, TreeWalkerItem::Text(proxy)) => format!("text:{}", proxy.data(tree)),
            (kind, TreeWalkerItem::Element(id)) => format!("{:?}:{}", kind, tree.name(*id).unwrap_or("?")),
            _ => "?".to_string(),
        }
    }

    #[test]
    fn test_requires_start() {
        let tree = Tree::new();
        let err = TreeWalker::new(&tree, TreeWalkerOptions::default()).unwrap_err();
        assert!(err.is("model-tree-walker-no-start-position"));
    }

    #[test]
    fn test_unknown_direction() {
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert!(err.is("model-tree-walker-unknown-direction"));
        assert_eq!("backward".parse::<Direction>().unwrap(), Direction::Backward);
    }

    #[test]
    fn test_forward_walk() {
        let (tree, root, ..) = sample();
        let walker = TreeWalker::new(&tree, TreeWalkerOptions {
            start_position: Some(Position::create_at(&tree, root, 0).unwrap()),
            ..TreeWalkerOptions::default()
        })
        .unwrap();

        let events: Vec<String> = walker.map(|v| describe(&tree, &v)).collect();
        assert_eq!(
            events,
            vec![
                "ElementStart:img1",
                "ElementEnd:img1",
                "ElementStart:p",
                "text:ba",
                "text:r",
                "ElementStart:img2",
                "ElementEnd:img2",
                "text:x",
                "ElementEnd:p",
            ]
        );
    }

    #[test]
    fn test_backward_walk_is_reverse_of_forward() {
        let (tree, root, ..) = sample();
        let forward: Vec<TreeWalkerValue> = TreeWalker::new(&tree, TreeWalkerOptions {
            start_position: Some(Position::create_at(&tree, root, 0).unwrap()),
            ..TreeWalkerOptions::default()
        })
        .unwrap()
        .collect();
        let backward: Vec<TreeWalkerValue> = TreeWalker::new(&tree, TreeWalkerOptions {
            start_position: Some(Position::create_at(&tree, root, 2).unwrap()),
            direction: Direction::Backward,
            ..TreeWalkerOptions::default()
        })
        .unwrap()
        .collect();

        assert_eq!(forward.len(), backward.len());
        for (f, b) in forward.iter().zip(backward.iter().rev()) {
            assert_eq!(f.item, b.item);
            assert_eq!(f.previous_position, b.next_position);
            assert_eq!(f.next_position, b.previous_position);
        }
    }

    #[test]
    fn test_single_characters_and_boundaries() {
        let (tree, _, _, p, _) = sample();
        let bounds = Range::new(Position::create_at(&tree, p, 1).unwrap(), Position::create_at(&tree, p, 3).unwrap());
        let walker = TreeWalker::new(&tree, TreeWalkerOptions {
            boundaries: Some(bounds),
            single_characters: true,
            ..TreeWalkerOptions::default()
        })
        .unwrap();

        let events: Vec<String> = walker.map(|v| describe(&tree, &v)).collect();
        assert_eq!(events, vec!["text:a", "text:r"]);
    }

    #[test]
    fn test_shallow_skips_descendants() {
        let (tree, root, ..) = sample();
        let walker = TreeWalker::new(&tree, TreeWalkerOptions {
            boundaries: Some(Range::in_element(&tree, root).unwrap()),
            shallow: true,
            ..TreeWalkerOptions::default()
        })
        .unwrap();

        let events: Vec<String> = walker.map(|v| describe(&tree, &v)).collect();
        assert_eq!(events, vec!["ElementStart:img1", "ElementStart:p"]);
    }

    #[test]
    fn test_ignore_element_end() {
        let (tree, _, _, p, _) = sample();
        let walker = TreeWalker::new(&tree, TreeWalkerOptions {
            boundaries: Some(Range::in_element(&tree, p).unwrap()),
            ignore_element_end: true,
            ..TreeWalkerOptions::default()
        })
        .unwrap();

        assert!(walker.into_iter().all(|v| v.kind != WalkerEventKind::ElementEnd));
    }

    #[test]
    fn test_skip_stops_before_first_mismatch() {
        let (tree, _, _, p, _) = sample();
        let mut walker = TreeWalker::new(&tree, TreeWalkerOptions {
            boundaries: Some(Range::in_element(&tree, p).unwrap()),
            ..TreeWalkerOptions::default()
        })
        .unwrap();

        walker.skip_while_matching(|v| v.kind == WalkerEventKind::Text);
        assert_eq!(walker.position().path, vec![1, 3]);
        let next = walker.next().unwrap();
        assert_eq!(describe(&tree, &next), "ElementStart:img2");

        walker.skip_while_matching(|_| true);
        assert_eq!(walker.position().path, vec![1, 5]);
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_jump_to_clamps_to_boundaries() {
        let (tree, root, _, p, _) = sample();
        let mut walker = TreeWalker::new(&tree, TreeWalkerOptions {
            boundaries: Some(Range::in_element(&tree, p).unwrap()),
            ..TreeWalkerOptions::default()
        })
        .unwrap();

        walker.jump_to(&Position::create_at(&tree, root, 0).unwrap()).unwrap();
        assert_eq!(walker.position().path, vec![1, 0]);

        walker.jump_to(&Position::create_at(&tree, root, 2).unwrap()).unwrap();
        assert_eq!(walker.position().path, vec![1, 5]);
    }
}
