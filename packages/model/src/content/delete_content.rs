use quire_common::ModelResult;
use tracing::trace;

use super::{operation_count, track, SelectionTarget};
use crate::node::{Attributes, NodeId};
use crate::position::{Position, Stickiness};
use crate::selection::Selection;
use crate::writer::Writer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteContentOptions {
    /// Keep the blocks at both ends of the deleted range apart.
    pub leave_unmerged: bool,
    /// Do not insert a paragraph-like element where text can no longer be
    /// typed after the deletion.
    pub do_not_autoparagraph: bool,
}

/// Delete the content of the target selection and collapse it at the
/// deletion point.
pub fn delete_content(writer: &Writer<'_>, mut target: SelectionTarget<'_>, options: DeleteContentOptions) -> ModelResult<()> {
    let mut selection = target.resolve(writer)?;
    if selection.range_count() == 0 || selection.is_collapsed() {
        return Ok(());
    }
    delete_selection(writer, &mut selection, options)?;
    target.store(writer, selection)
}

/// Delete the first range of `selection` and collapse `selection` where the
/// content used to be.
pub(crate) fn delete_selection(writer: &Writer<'_>, selection: &mut Selection, options: DeleteContentOptions) -> ModelResult<()> {
    let Some(range) = selection.first_range().cloned() else {
        return Ok(());
    };
    if range.is_collapsed() {
        return Ok(());
    }
    let model = writer.model();
    let paragraph = model.config().paragraph_like_element.clone();

    // A selection spanning several blocks and the whole of its limit
    // element is replaced with a single empty paragraph.
    let replace_in = {
        let document = model.document();
        let tree = document.tree();
        let schema = model.schema();
        match range.common_ancestor(tree) {
            Some(common) if !options.do_not_autoparagraph && !range.is_flat() => {
                let limit = schema.get_limit_element(tree, common);
                let entire = selection.contains_entire_content(tree, limit)?;
                (entire && schema.check_child(tree, limit, &paragraph)).then_some(limit)
            }
            _ => None,
        }
    };
    if let Some(limit) = replace_in {
        trace!("replacing entire content with a paragraph");
        writer.remove(writer.create_range_in(limit)?)?;
        let created = writer.create_element(paragraph.as_str(), Attributes::new())?;
        writer.insert(created, &writer.create_position_at(limit, 0)?)?;
        *selection = Selection::collapsed_at(writer.create_position_at(created, 0)?);
        return Ok(());
    }

    let since = operation_count(writer);
    let start = range.start.clone().with_stickiness(Stickiness::ToPrevious);
    let end = range.end.clone().with_stickiness(Stickiness::ToNext);

    writer.remove(range)?;
    if !options.leave_unmerged {
        merge_branches(writer, &track(writer, &start, since), &track(writer, &end, since))?;
    }

    let mut position = track(writer, &start, since).with_stickiness(Stickiness::ToNone);
    if !options.do_not_autoparagraph && should_autoparagraph(writer, &position, &paragraph) {
        let created = writer.create_element(paragraph.as_str(), Attributes::new())?;
        writer.insert(created, &position)?;
        position = writer.create_position_at(created, 0)?;
    }
    *selection = Selection::collapsed_at(position);
    Ok(())
}

/// Merge the element containing `end` into the one containing `start`, and
/// repeat one level up until both sides share a parent. Ancestors emptied
/// on the end side are removed.
fn merge_branches(writer: &Writer<'_>, start: &Position, end: &Position) -> ModelResult<()> {
    let model = writer.model();
    let (left, right, common) = {
        let document = model.document();
        let tree = document.tree();
        (start.parent(tree), end.parent(tree), start.common_ancestor(tree, end))
    };
    let (Some(mut left), Some(mut right), Some(common)) = (left, right, common) else {
        return Ok(());
    };

    loop {
        if left == right || left == common || right == common {
            return Ok(());
        }
        let (mergeable, old_parent) = {
            let document = model.document();
            let tree = document.tree();
            let schema = model.schema();
            let mergeable = !schema.is_limit(tree, left)
                && !schema.is_limit(tree, right)
                && tree.children(right).iter().all(|child| schema.check_child_node(tree, left, *child));
            (mergeable, tree.parent(right))
        };
        if !mergeable {
            return Ok(());
        }

        let after_left = writer.create_position_after(left)?;
        if after_left != writer.create_position_before(right)? {
            writer.insert(right, &after_left)?;
        }
        writer.merge(&writer.create_position_after(left)?)?;

        let mut next_right = old_parent;
        while let Some(parent) = next_right {
            let (empty, grandparent) = {
                let document = model.document();
                let tree = document.tree();
                (tree.is_empty(parent), tree.parent(parent))
            };
            if parent == common || !empty {
                break;
            }
            writer.remove(parent)?;
            next_right = grandparent;
        }

        let next_left = model.document().tree().parent(left);
        match (next_left, next_right) {
            (Some(next_left), Some(next_right)) => {
                left = next_left;
                right = next_right;
            }
            _ => return Ok(()),
        }
    }
}

fn should_autoparagraph(writer: &Writer<'_>, position: &Position, paragraph: &str) -> bool {
    let model = writer.model();
    let document = model.document();
    let tree = document.tree();
    let schema = model.schema();
    let parent: Option<NodeId> = position.parent(tree);
    parent.is_some_and(|parent| !schema.accepts_text_at(tree, position) && schema.check_child(tree, parent, paragraph))
}
