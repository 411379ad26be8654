//! Tree mutation helpers shared by operations.
//!
//! Each helper keeps text nodes normalized: boundaries are split before
//! mutating and equal-attribute neighbours are merged afterwards.

use quire_common::{ModelError, ModelResult};
use serde_json::{json, Value};

use crate::node::NodeId;
use crate::position::Position;
use crate::range::Range;
use crate::tree::Tree;

fn parent_of(tree: &Tree, position: &Position, code: &str) -> ModelResult<NodeId> {
    position
        .parent(tree)
        .filter(|parent| tree.is_container(*parent))
        .ok_or_else(|| ModelError::new(code, "Position does not point into a container").with_context(json!({ "path": position.path })))
}

/// Insert `nodes` at `position`; returns the range they occupy afterwards.
pub(crate) fn insert(tree: &mut Tree, position: &Position, nodes: Vec<NodeId>) -> ModelResult<Range> {
    let parent = parent_of(tree, position, "operation-utils-insert-position-invalid")?;
    let how_many: usize = nodes.iter().map(|node| tree.offset_size(*node)).sum();
    let count = nodes.len();

    let index = tree.split_at_offset(parent, position.offset());
    tree.insert_child(parent, index, nodes)?;

    tree.merge_texts_at(parent, index + count);
    tree.merge_texts_at(parent, index);

    Ok(Range::from_position_and_shift(position, how_many))
}

/// Remove the content of a flat range and return the detached nodes.
pub(crate) fn remove(tree: &mut Tree, range: &Range) -> ModelResult<Vec<NodeId>> {
    if !range.is_flat() {
        return Err(ModelError::new("operation-utils-remove-range-not-flat", "Trying to remove a range which starts and ends in different elements"));
    }
    let parent = parent_of(tree, &range.start, "operation-utils-remove-position-invalid")?;

    let start = tree.split_at_offset(parent, range.start.offset());
    let end = tree.split_at_offset(parent, range.end.offset());
    let removed = tree.remove_children(parent, start, end - start);

    tree.merge_texts_at(parent, start);
    Ok(removed)
}

/// Move the content of a flat range to `target`; `target` is given in
/// pre-removal coordinates.
pub(crate) fn move_range(tree: &mut Tree, source: &Range, target: &Position) -> ModelResult<Range> {
    let how_many = source.end.offset() - source.start.offset();
    let nodes = remove(tree, source)?;
    let target = target
        .get_transformed_by_deletion(&source.start, how_many)
        .ok_or_else(|| ModelError::new("operation-utils-move-target-inside-source", "Cannot move a range into itself"))?;
    insert(tree, &target, nodes)
}

/// Set (or, with `None`, remove) `key` on every node in a flat range.
pub(crate) fn set_attribute(tree: &mut Tree, range: &Range, key: &str, value: Option<&Value>) -> ModelResult<()> {
    if !range.is_flat() {
        return Err(ModelError::new("operation-utils-set-attribute-range-not-flat", "Attribute ranges must be flat"));
    }
    let parent = parent_of(tree, &range.start, "operation-utils-set-attribute-position-invalid")?;

    let start = tree.split_at_offset(parent, range.start.offset());
    let end = tree.split_at_offset(parent, range.end.offset());

    for index in start..end {
        let Some(node) = tree.child(parent, index) else { break };
        match value {
            Some(value) => tree.set_attribute(node, key, value.clone()),
            None => {
                tree.remove_attribute(node, key);
            }
        }
    }

    for index in (start..=end).rev() {
        tree.merge_texts_at(parent, index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;

    fn paragraph(tree: &mut Tree, text: &str) -> (NodeId, NodeId) {
        let root = tree.create_fragment();
        let p = tree.create_element("paragraph", Attributes::new());
        tree.append_child(p, text).unwrap();
        tree.append_child(root, p).unwrap();
        (root, p)
    }

    #[test]
    fn test_insert_merges_text() {
        let mut tree = Tree::new();
        let (root, p) = paragraph(&mut tree, "foar");
        let text = tree.create_text("ob", Attributes::new());

        let range = insert(&mut tree, &Position::from_parts(root, vec![0, 2]), vec![text]).unwrap();

        assert_eq!(tree.child_count(p), 1);
        assert_eq!(tree.data(tree.child(p, 0).unwrap()), Some("foobar"));
        assert_eq!(range.start.path, vec![0, 2]);
        assert_eq!(range.end.path, vec![0, 4]);
    }

    #[test]
    fn test_set_attribute_splits_and_merges() {
        let mut tree = Tree::new();
        let (root, p) = paragraph(&mut tree, "foobar");
        let range = Range::new(Position::from_parts(root, vec![0, 1]), Position::from_parts(root, vec![0, 3]));

        set_attribute(&mut tree, &range, "bold", Some(&Value::Bool(true))).unwrap();
        assert_eq!(tree.child_count(p), 3);
        assert!(tree.has_attribute(tree.child(p, 1).unwrap(), "bold"));

        set_attribute(&mut tree, &range, "bold", None).unwrap();
        assert_eq!(tree.child_count(p), 1);
    }

    #[test]
    fn test_move_within_parent() {
        let mut tree = Tree::new();
        let (root, p) = paragraph(&mut tree, "abcd");
        let bold = tree.create_text("X", [("bold".to_string(), Value::Bool(true))].into_iter().collect());
        tree.append_child(p, bold).unwrap();

        let source = Range::new(Position::from_parts(root, vec![0, 0]), Position::from_parts(root, vec![0, 1]));
        move_range(&mut tree, &source, &Position::from_parts(root, vec![0, 5])).unwrap();

        let texts: Vec<&str> = tree.children(p).iter().filter_map(|c| tree.data(*c)).collect();
        assert_eq!(texts, vec!["bcd", "X", "a"]);
    }

    #[test]
    fn test_remove_rejects_non_flat() {
        let mut tree = Tree::new();
        let (root, _) = paragraph(&mut tree, "ab");
        let range = Range::new(Position::from_parts(root, vec![0, 1]), Position::from_parts(root, vec![1]));
        assert!(remove(&mut tree, &range).unwrap_err().is("operation-utils-remove-range-not-flat"));
    }
}
