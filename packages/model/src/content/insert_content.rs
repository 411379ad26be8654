use std::collections::BTreeMap;

use quire_common::{ModelError, ModelResult};
use tracing::debug;

use super::{delete_selection, operation_count, track, DeleteContentOptions, SelectionTarget};
use crate::node::{Attributes, Item, NodeId, NodeInput};
use crate::position::{Position, PositionOffset, Stickiness};
use crate::range::Range;
use crate::schema::{Schema, TEXT};
use crate::selection::{Selectable, Selection, SelectionPlace};
use crate::tree::Tree;
use crate::writer::Writer;

/// Where the selection goes after [`insert_object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPlacement {
    /// Select the object itself.
    On,
    /// Collapse after the object, in the next text container (one is
    /// created when missing).
    After,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertObjectOptions {
    /// Insert block objects next to the selected block instead of
    /// splitting it.
    pub find_optimal_position: bool,
    pub set_selection: Option<ObjectPlacement>,
}

/// Insert `content` at the selection and return the range it occupies.
///
/// A non-collapsed selection is deleted first. Inline content goes in
/// place. Block content splits the surrounding blocks up to the nearest
/// ancestor that allows it and the outermost inserted blocks are merged
/// with the split halves. Inline runs that the target does not allow are
/// wrapped in the paragraph-like element; anything else that cannot be
/// placed is dropped, as are attributes the schema does not allow. The selection ends up after the inserted content.
pub fn insert_content(writer: &Writer<'_>, content: NodeInput, mut target: SelectionTarget<'_>) -> ModelResult<Range> {
    let mut selection = target.resolve(writer)?;
    if !selection.is_collapsed() {
        delete_selection(writer, &mut selection, DeleteContentOptions::default())?;
    }
    let position = selection
        .first_position()
        .ok_or_else(|| ModelError::new("model-insertcontent-no-selection", "Cannot insert content without a selection"))?;

    let fragment = into_fragment(writer, content)?;
    let affected = insert_fragment_at(writer, fragment, &position)?;
    target.store(writer, Selection::collapsed_at(affected.end.clone()))?;
    Ok(affected)
}

/// Insert an object element, splitting ancestors that do not allow it.
pub fn insert_object(writer: &Writer<'_>, element: NodeId, mut target: SelectionTarget<'_>, options: InsertObjectOptions) -> ModelResult<Range> {
    let model = writer.model();
    let paragraph = model.config().paragraph_like_element.clone();
    let mut selection = target.resolve(writer)?;

    if options.find_optimal_position && model.schema().is_block(model.document().tree(), element) {
        let range = find_optimal_insertion_range(model.document().tree(), &model.schema(), &selection)?;
        selection = Selection::new(model.document().tree(), range, false)?;
    }
    if !selection.is_collapsed() {
        delete_selection(writer, &mut selection, DeleteContentOptions {
            do_not_autoparagraph: true,
            ..DeleteContentOptions::default()
        })?;
    }
    let position = selection
        .first_position()
        .ok_or_else(|| ModelError::new("model-insertobject-no-selection", "Cannot insert an object without a selection"))?;

    let needs_paragraph = {
        let document = model.document();
        let tree = document.tree();
        let schema = model.schema();
        let parent = position.parent(tree).ok_or_else(|| invalid_position(&position))?;
        !schema.check_child_node(tree, parent, element)
            && schema.check_child(tree, parent, &paragraph)
            && schema.check_child_name(&paragraph, &Schema::item_name(tree, element))
    };
    let to_insert = if needs_paragraph {
        let wrapper = writer.create_element(paragraph.as_str(), Attributes::new())?;
        writer.append(element, wrapper)?;
        wrapper
    } else {
        element
    };

    let fragment = into_fragment(writer, NodeInput::from(to_insert))?;
    let affected = insert_fragment_at(writer, fragment, &position)?;
    if affected.is_collapsed() {
        return Ok(affected);
    }

    let selection = match options.set_selection {
        Some(ObjectPlacement::On) => writer.model().create_selection(Selectable::Node(element, SelectionPlace::On), false)?,
        Some(ObjectPlacement::After) => selection_after_object(writer, element, &paragraph)?,
        None => Selection::collapsed_at(affected.end.clone()),
    };
    target.store(writer, selection)?;
    Ok(affected)
}

fn invalid_position(position: &Position) -> ModelError {
    ModelError::new("model-insertcontent-invalid-position", "Insertion position does not resolve").with_context(serde_json::json!({ "path": position.path }))
}

/// Move `content` into a document fragment, unless it already is one.
fn into_fragment(writer: &Writer<'_>, content: NodeInput) -> ModelResult<NodeId> {
    if let [Item::Node(node)] = content.0.as_slice() {
        if writer.model().document().tree().is_fragment(*node) {
            return Ok(*node);
        }
    }
    let fragment = writer.create_document_fragment()?;
    writer.insert(content, &Position::from_parts(fragment, vec![0]))?;
    Ok(fragment)
}

/// Classification of one fragment child during autoparagraphing.
enum Step {
    Keep,
    Wrap(Range),
    Drop(NodeId),
}

fn insert_fragment_at(writer: &Writer<'_>, fragment: NodeId, position: &Position) -> ModelResult<Range> {
    let model = writer.model();
    let mut markers = model.document_mut()?.tree_mut().take_fragment_markers(fragment);
    let since = operation_count(writer);
    let start = position.clone().with_stickiness(Stickiness::ToPrevious);
    let end = position.clone().with_stickiness(Stickiness::ToNext);

    let (parent, split_limit) = {
        let document = model.document();
        let tree = document.tree();
        let schema = model.schema();
        let parent = position.parent(tree).ok_or_else(|| invalid_position(position))?;
        let split_limit = tree
            .children(fragment)
            .iter()
            .find(|child| !schema.check_child_node(tree, parent, **child))
            .and_then(|child| schema.find_allowed_parent(tree, position, &Schema::item_name(tree, *child)))
            .filter(|allowed| *allowed != parent);
        (parent, split_limit)
    };
    let container = split_limit.unwrap_or(parent);

    autoparagraph(writer, fragment, container, &mut markers)?;
    remove_disallowed_attributes(writer, fragment)?;
    let nodes = model.document().tree().children(fragment).to_vec();
    if nodes.is_empty() {
        debug!("nothing left to insert");
        return Ok(Range::collapsed(position.clone()));
    }

    let (start, end) = match split_limit {
        None => {
            writer.insert(fragment, position)?;
            promote(writer, markers, fragment, position)?;
            ((start, since), (end, since))
        }
        Some(container) => {
            let (at, left, right) = break_to(writer, position, container)?;
            // Without a neighbour to merge with, the affected range starts
            // (or ends) at the insertion point in the container.
            let at_since = operation_count(writer);
            let start = match left {
                Some(_) => (start, since),
                None => (at.clone().with_stickiness(Stickiness::ToPrevious), at_since),
            };
            let end = match right {
                Some(_) => (end, since),
                None => (at.clone().with_stickiness(Stickiness::ToNext), at_since),
            };

            writer.insert(fragment, &at)?;
            promote(writer, markers, fragment, &at)?;

            let mut last_left = nodes.last().copied();
            if let (Some(left), Some(first)) = (left, nodes.first().copied()) {
                if can_merge(writer, left, first) {
                    writer.merge(&writer.create_position_after(left)?)?;
                    if nodes.len() == 1 {
                        last_left = Some(left);
                    }
                }
            }
            if let (Some(last), Some(right)) = (last_left, right) {
                if can_merge(writer, last, right) {
                    writer.merge(&writer.create_position_after(last)?)?;
                }
            }
            (start, end)
        }
    };

    let start = track(writer, &start.0, start.1).with_stickiness(Stickiness::ToNone);
    let end = track(writer, &end.0, end.1).with_stickiness(Stickiness::ToNone);
    Ok(Range::new(start, end))
}

fn promote(writer: &Writer<'_>, markers: BTreeMap<String, Range>, fragment: NodeId, at: &Position) -> ModelResult<()> {
    if markers.is_empty() || !writer.model().document().tree().belongs_to_document(at.root) {
        return Ok(());
    }
    writer.promote_markers(markers, &Position::from_parts(fragment, vec![0]), at)
}

/// Make every child of `fragment` acceptable in `container`: runs the
/// container refuses are wrapped in the paragraph-like element when that
/// helps, and dropped otherwise. Fragment markers follow the edits.
fn autoparagraph(writer: &Writer<'_>, fragment: NodeId, container: NodeId, markers: &mut BTreeMap<String, Range>) -> ModelResult<()> {
    let model = writer.model();
    let paragraph = model.config().paragraph_like_element.clone();
    let since = operation_count(writer);
    let mut index = 0;

    loop {
        let step = {
            let document = model.document();
            let tree = document.tree();
            let schema = model.schema();
            let children = tree.children(fragment);
            let Some(&child) = children.get(index) else {
                break;
            };
            let wrappable = |node: NodeId| schema.check_child_name(&paragraph, &Schema::item_name(tree, node));
            if schema.check_child_node(tree, container, child) {
                Step::Keep
            } else if schema.check_child(tree, container, &paragraph) && wrappable(child) {
                let mut end = index + 1;
                while end < children.len() && !schema.check_child_node(tree, container, children[end]) && wrappable(children[end]) {
                    end += 1;
                }
                let from = tree.start_offset(child).unwrap_or(0);
                let to = tree.end_offset(children[end - 1]).unwrap_or(from);
                Step::Wrap(Range::new(Position::from_parts(fragment, vec![from]), Position::from_parts(fragment, vec![to])))
            } else {
                Step::Drop(child)
            }
        };
        match step {
            Step::Keep => index += 1,
            Step::Wrap(range) => {
                writer.wrap_in(&range, &paragraph)?;
                index += 1;
            }
            Step::Drop(child) => {
                debug!(node = ?child, "dropping content the insertion target does not allow");
                writer.remove(child)?;
            }
        }
    }

    if operation_count(writer) > since {
        let batch = writer.batch();
        let batch = batch.borrow();
        for range in markers.values_mut() {
            for operation in batch.operations().get(since..).unwrap_or(&[]) {
                *range = range.get_transformed_by_operation(operation);
            }
        }
    }
    Ok(())
}

/// Strip attributes the schema does not allow from everything in
/// `fragment`.
fn remove_disallowed_attributes(writer: &Writer<'_>, fragment: NodeId) -> ModelResult<()> {
    loop {
        let found = {
            let document = writer.model().document();
            let schema = writer.model().schema();
            find_disallowed_attribute(document.tree(), &schema, fragment)
        };
        let Some((node, key)) = found else {
            return Ok(());
        };
        debug!(node = ?node, key = %key, "removing attribute the schema does not allow");
        writer.remove_attribute(&key, node)?;
    }
}

fn find_disallowed_attribute(tree: &Tree, schema: &Schema, parent: NodeId) -> Option<(NodeId, String)> {
    tree.children(parent).iter().find_map(|&child| {
        let name = Schema::item_name(tree, child);
        tree.attributes(child)
            .keys()
            .find(|key| !schema.check_attribute(&name, key))
            .map(|key| (child, key.clone()))
            .or_else(|| find_disallowed_attribute(tree, schema, child))
    })
}

/// Climb from `position` to a position directly in `container`, splitting
/// when the position is inside an element rather than at one of its
/// edges. Returns the new position plus the elements before and after it
/// that may be merged with the inserted content.
fn break_to(writer: &Writer<'_>, position: &Position, container: NodeId) -> ModelResult<(Position, Option<NodeId>, Option<NodeId>)> {
    let ancestors = position.ancestors(writer.model().document().tree());
    let mut at = position.clone();
    let mut split = false;
    loop {
        let (parent, at_start, at_end) = {
            let document = writer.model().document();
            let tree = document.tree();
            let parent = at.parent(tree).ok_or_else(|| invalid_position(&at))?;
            (parent, at.is_at_start(), at.is_at_end(tree))
        };
        if parent == container {
            break;
        }
        if at_start {
            at = writer.create_position_before(parent)?;
        } else if at_end {
            at = writer.create_position_after(parent)?;
        } else {
            at = writer.split(&at, Some(container))?.position;
            split = true;
            break;
        }
    }

    let document = writer.model().document();
    let tree = document.tree();
    let left = at.node_before(tree).filter(|node| ancestors.contains(node));
    let right = at.node_after(tree).filter(|node| split || ancestors.contains(node));
    Ok((at, left, right))
}

/// Can `right` be merged into `left`?
fn can_merge(writer: &Writer<'_>, left: NodeId, right: NodeId) -> bool {
    let document = writer.model().document();
    let tree = document.tree();
    let schema = writer.model().schema();
    tree.is_element(left)
        && tree.is_element(right)
        && !schema.is_limit(tree, left)
        && !schema.is_limit(tree, right)
        && tree.children(right).iter().all(|child| schema.check_child_node(tree, left, *child))
}

fn find_optimal_insertion_range(tree: &Tree, schema: &Schema, selection: &Selection) -> ModelResult<Range> {
    if let Some(selected) = selection.get_selected_element(tree) {
        if schema.is_object(tree, selected) && !schema.is_inline(tree, selected) {
            return Range::on(tree, selected);
        }
    }
    let focus = selection
        .focus()
        .ok_or_else(|| ModelError::new("model-insertobject-no-selection", "Cannot insert an object without a selection"))?;
    let block = selection.first_position().and_then(|first| first.parent(tree)).filter(|parent| schema.is_block(tree, *parent));
    match block {
        Some(block) if tree.is_empty(block) => Range::on(tree, block),
        Some(block) => {
            let after = Position::after(tree, block)?;
            if focus.is_at_end(tree) && focus.parent(tree) == Some(block) {
                Ok(Range::collapsed(after))
            } else {
                Ok(Range::collapsed(Position::before(tree, block)?))
            }
        }
        None => Ok(Range::collapsed(focus)),
    }
}

fn selection_after_object(writer: &Writer<'_>, object: NodeId, paragraph: &str) -> ModelResult<Selection> {
    let model = writer.model();
    let (inline, next, text_next, parent_accepts_paragraph) = {
        let document = model.document();
        let tree = document.tree();
        let schema = model.schema();
        let next = tree.next_sibling(object);
        (
            schema.is_inline(tree, object),
            next,
            next.is_some_and(|next| schema.check_child(tree, next, TEXT)),
            tree.parent(object).is_some_and(|parent| schema.check_child(tree, parent, paragraph)),
        )
    };
    if inline {
        return model.create_selection(Selectable::Node(object, SelectionPlace::At(PositionOffset::After)), false);
    }
    let target = if text_next {
        next
    } else if parent_accepts_paragraph {
        let created = writer.create_element(paragraph, Attributes::new())?;
        writer.insert(created, &writer.create_position_after(object)?)?;
        Some(created)
    } else {
        None
    };
    match target {
        Some(element) => Ok(Selection::collapsed_at(writer.create_position_at(element, 0)?)),
        None => model.create_selection(Selectable::Node(object, SelectionPlace::On), false),
    }
}
