use std::str::FromStr;

use quire_common::{ModelError, ModelResult};
use serde_json::json;
use unicode_segmentation::UnicodeSegmentation;

use crate::position::{Position, PositionOffset};
use crate::range::Range;
use crate::schema::Schema;
use crate::text_proxy::TextProxy;
use crate::tree::Tree;
use crate::tree_walker::{Direction, TreeWalker, TreeWalkerOptions, WalkerEventKind};
use crate::writer::Writer;

use super::SelectionTarget;

/// How far one step of [`modify_selection`] moves the focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionUnit {
    /// One user-perceived character (extended grapheme cluster).
    #[default]
    Character,
    /// One Unicode scalar value.
    CodePoint,
    /// To the nearest word edge in the walking direction.
    Word,
}

impl FromStr for SelectionUnit {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "character" => Ok(SelectionUnit::Character),
            "codePoint" => Ok(SelectionUnit::CodePoint),
            "word" => Ok(SelectionUnit::Word),
            other => Err(ModelError::new("model-modifyselection-unknown-unit", "Unknown selection unit.").with_context(json!({ "unit": other }))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifySelectionOptions {
    pub direction: Direction,
    pub unit: SelectionUnit,
}

/// Move the focus of the target selection by one unit, keeping its anchor.
///
/// Objects are stepped over as a whole; limit elements are never left.
/// Nothing changes when there is no valid place to move to.
pub fn modify_selection(writer: &Writer<'_>, mut target: SelectionTarget<'_>, options: ModifySelectionOptions) -> ModelResult<()> {
    let mut selection = target.resolve(writer)?;
    let Some(focus) = selection.focus() else {
        return Ok(());
    };

    let found = {
        let model = writer.model();
        let document = model.document();
        let schema = model.schema();
        find_next_focus(document.tree(), &schema, &focus, options)?
    };
    let Some(position) = found else {
        return Ok(());
    };

    match target {
        SelectionTarget::Document => writer.set_selection_focus(position),
        _ => {
            selection.set_focus(position)?;
            target.store(writer, selection)
        }
    }
}

fn find_next_focus(tree: &Tree, schema: &Schema, focus: &Position, options: ModifySelectionOptions) -> ModelResult<Option<Position>> {
    let forward = options.direction == Direction::Forward;
    let boundaries = if forward {
        Range::new(focus.clone(), Position::create_at(tree, focus.root, PositionOffset::End)?)
    } else {
        Range::new(Position::create_at(tree, focus.root, 0)?, focus.clone())
    };
    let walker = TreeWalker::new(tree, TreeWalkerOptions {
        direction: options.direction,
        boundaries: Some(boundaries),
        single_characters: true,
        ..TreeWalkerOptions::default()
    })?;

    for value in walker {
        if value.kind == WalkerEventKind::Text {
            let Some(proxy) = value.item.as_text() else {
                continue;
            };
            let position = match options.unit {
                SelectionUnit::CodePoint => value.next_position,
                SelectionUnit::Character => shift_within_text(tree, &value.next_position, proxy, forward, grapheme_edge)?,
                SelectionUnit::Word => shift_within_text(tree, &value.next_position, proxy, forward, word_edge)?,
            };
            return Ok(Some(position));
        }

        let Some(element) = value.item.as_element() else {
            continue;
        };
        // Backward walks report entering an element as its end.
        let entering = (value.kind == WalkerEventKind::ElementStart) == forward;
        if entering {
            if schema.is_selectable(tree, element) {
                let position = if forward { Position::after(tree, element)? } else { Position::before(tree, element)? };
                return Ok(Some(position));
            }
        } else if schema.is_limit(tree, element) {
            return Ok(None);
        }
        if schema.accepts_text_at(tree, &value.next_position) {
            return Ok(Some(value.next_position));
        }
    }
    Ok(None)
}

/// Re-anchor `stepped` (one scalar past the focus) at the edge `edge`
/// picks inside the same text node.
fn shift_within_text(
    tree: &Tree,
    stepped: &Position,
    proxy: &TextProxy,
    forward: bool,
    edge: fn(&str, usize, bool) -> usize,
) -> ModelResult<Position> {
    let (Some(data), Some(node_start), Some(parent)) = (tree.data(proxy.text), tree.start_offset(proxy.text), stepped.parent(tree)) else {
        return Ok(stepped.clone());
    };
    // Offset in the text node the step started from.
    let from = if forward { proxy.offset_in_text } else { proxy.offset_in_text + 1 };
    let target = edge(data, from, forward);
    Position::create_at(tree, parent, node_start + target)
}

/// Char offset of the grapheme edge next to `from`.
fn grapheme_edge(text: &str, from: usize, forward: bool) -> usize {
    let bounds = char_bounds(text, text.grapheme_indices(true).map(|(at, g)| (at, at + g.len())));
    if forward {
        bounds.iter().map(|&(_, end)| end).find(|&end| end > from).unwrap_or(from + 1)
    } else {
        bounds.iter().rev().map(|&(start, _)| start).find(|&start| start < from).unwrap_or(from.saturating_sub(1))
    }
}

/// Char offset of the nearest word edge: the end of the next word going
/// forward, the start of the previous one going backward. Falls back to the
/// text node edge.
fn word_edge(text: &str, from: usize, forward: bool) -> usize {
    let words: Vec<(usize, usize)> = text
        .split_word_bound_indices()
        .filter(|(_, segment)| segment.chars().any(char::is_alphanumeric))
        .map(|(at, segment)| (at, at + segment.len()))
        .collect();
    let bounds = char_bounds(text, words.into_iter());
    if forward {
        bounds.iter().map(|&(_, end)| end).find(|&end| end > from).unwrap_or_else(|| text.chars().count())
    } else {
        bounds.iter().rev().map(|&(start, _)| start).find(|&start| start < from).unwrap_or(0)
    }
}

/// Byte spans to char spans.
fn char_bounds(text: &str, spans: impl Iterator<Item = (usize, usize)>) -> Vec<(usize, usize)> {
    let to_chars = |byte: usize| text[..byte].chars().count();
    spans.map(|(start, end)| (to_chars(start), to_chars(end))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grapheme_edge_skips_combining_marks() {
        // "e" + combining acute, then "x".
        let text = "ae\u{301}x";
        assert_eq!(grapheme_edge(text, 1, true), 3);
        assert_eq!(grapheme_edge(text, 3, false), 1);
        assert_eq!(grapheme_edge(text, 0, true), 1);
    }

    #[test]
    fn test_word_edge() {
        let text = "foo bar, baz";
        assert_eq!(word_edge(text, 0, true), 3);
        assert_eq!(word_edge(text, 3, true), 7);
        assert_eq!(word_edge(text, 5, true), 7);
        assert_eq!(word_edge(text, 9, false), 4);
        assert_eq!(word_edge(text, 3, false), 0);
        assert_eq!(word_edge("foo ", 3, true), 4);
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("word".parse::<SelectionUnit>().unwrap(), SelectionUnit::Word);
        assert_eq!("codePoint".parse::<SelectionUnit>().unwrap(), SelectionUnit::CodePoint);
        assert_eq!("line".parse::<SelectionUnit>().unwrap_err().code, "model-modifyselection-unknown-unit");
    }
}
