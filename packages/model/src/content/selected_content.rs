use quire_common::ModelResult;

use crate::node::{Attributes, NodeId};
use crate::position::{Position, PositionOffset};
use crate::range::Range;
use crate::selection::Selection;
use crate::tree_walker::{Direction, TreeWalkerItem, TreeWalkerOptions};
use crate::writer::Writer;

/// Copy the content of the selection's first range into a new document
/// fragment. Partially selected ancestors are copied without the parts
/// outside the range.
pub fn get_selected_content(writer: &Writer<'_>, selection: &Selection) -> ModelResult<NodeId> {
    let fragment = writer.create_document_fragment()?;
    let Some(range) = selection.first_range().cloned() else {
        return Ok(fragment);
    };
    if range.is_collapsed() {
        return Ok(fragment);
    }

    // Smallest flat range holding both ends.
    let flat = if range.is_flat() {
        range.clone()
    } else {
        let common = range.start.common_path(&range.end);
        let depth = common.len();
        let mut start = common.clone();
        start.push(range.start.path[depth]);
        let mut end = common;
        let inside = usize::from(range.end.path.len() > depth + 1);
        end.push(range.end.path[depth] + inside);
        Range::new(Position::from_parts(range.root(), start), Position::from_parts(range.root(), end))
    };

    let items = {
        let document = writer.model().document();
        let tree = document.tree();
        flat.get_items(tree, false)
            .into_iter()
            .map(|item| match item {
                TreeWalkerItem::Text(proxy) => Copied::Text(proxy.data(tree), proxy.attributes(tree).clone()),
                TreeWalkerItem::Element(node) => Copied::Element(node),
            })
            .collect::<Vec<_>>()
    };
    for item in items {
        let node = match item {
            Copied::Text(data, attributes) => writer.create_text(data, attributes)?,
            Copied::Element(node) => writer.clone_element(node, true)?,
        };
        writer.append(node, fragment)?;
    }

    if flat != range {
        let fragment_start = Position::from_parts(fragment, vec![0]);
        let start = range.start.get_combined(&flat.start, &fragment_start);
        let end = range.end.get_combined(&flat.start, &fragment_start);
        let fragment_end = writer.create_position_at(fragment, PositionOffset::End)?;
        remove_range_content(writer, &Range::new(end, fragment_end))?;
        remove_range_content(writer, &Range::new(fragment_start, start))?;
    }
    Ok(fragment)
}

enum Copied {
    Text(String, Attributes),
    Element(NodeId),
}

/// Remove every item fully inside `range`, then the ancestors this left
/// empty.
fn remove_range_content(writer: &Writer<'_>, range: &Range) -> ModelResult<()> {
    if range.is_collapsed() {
        return Ok(());
    }
    let targets = {
        let document = writer.model().document();
        let tree = document.tree();
        let walker = range.get_walker(tree, TreeWalkerOptions {
            direction: Direction::Backward,
            ignore_element_end: true,
            ..TreeWalkerOptions::default()
        })?;
        let mut targets = Vec::new();
        for value in walker {
            let item_range = match value.item {
                TreeWalkerItem::Element(node) => Range::on(tree, node)?,
                TreeWalkerItem::Text(_) => Range::new(value.previous_position.clone(), value.next_position.clone()),
            };
            let inside = !item_range.start.is_before(&range.start) && !item_range.end.is_after(&range.end);
            if inside {
                let parent = item_range.start.parent(tree);
                targets.push((item_range, parent));
            }
        }
        targets
    };

    let mut parents = Vec::new();
    for (item_range, parent) in targets {
        writer.remove(item_range)?;
        parents.extend(parent);
    }
    for mut parent in parents {
        loop {
            let (has_parent, empty, grandparent) = {
                let document = writer.model().document();
                let tree = document.tree();
                let grandparent = tree.parent(parent);
                (grandparent.is_some(), tree.is_empty(parent), grandparent)
            };
            if !has_parent || !empty {
                break;
            }
            writer.remove(parent)?;
            match grandparent {
                Some(next) => parent = next,
                None => break,
            }
        }
    }
    Ok(())
}
