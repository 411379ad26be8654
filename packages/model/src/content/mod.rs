//! # Content
//!
//! Editing built on top of the writer: content checks, insertion,
//! deletion, copying and caret movement. The functions take a writer and
//! run inside the caller's change block; the [`Model`](crate::model::Model)
//! methods of the same names open one.
//!
//! Positions that have to survive the edits they trigger are tracked by
//! replaying the operations the batch gained since the position was taken.

mod delete_content;
mod has_content;
mod insert_content;
mod modify_selection;
mod selected_content;

pub use delete_content::{delete_content, DeleteContentOptions};
pub use has_content::{has_content, ContentScope, HasContentOptions};
pub use insert_content::{insert_content, insert_object, InsertObjectOptions, ObjectPlacement};
pub use modify_selection::{modify_selection, ModifySelectionOptions, SelectionUnit};
pub use selected_content::get_selected_content;

pub(crate) use delete_content::delete_selection;

use quire_common::ModelResult;

use crate::position::Position;
use crate::selection::{Selectable, Selection};
use crate::writer::Writer;

/// The selection a content function reads and updates.
#[derive(Debug)]
pub enum SelectionTarget<'s> {
    /// The document selection, updated through the writer.
    Document,
    /// A standalone selection, updated in place.
    Selection(&'s mut Selection),
    /// A one-off selection built from a selectable. The updated selection
    /// is dropped.
    Selectable(Selectable),
}

impl SelectionTarget<'_> {
    pub(crate) fn resolve(&self, writer: &Writer<'_>) -> ModelResult<Selection> {
        match self {
            SelectionTarget::Document => Ok(writer.model().document().selection().as_selection().clone()),
            SelectionTarget::Selection(selection) => Ok((**selection).clone()),
            SelectionTarget::Selectable(selectable) => Selection::new(writer.model().document().tree(), selectable.clone(), false),
        }
    }

    pub(crate) fn store(&mut self, writer: &Writer<'_>, selection: Selection) -> ModelResult<()> {
        match self {
            SelectionTarget::Document => writer.set_selection(selection, false),
            SelectionTarget::Selection(target) => {
                **target = selection;
                Ok(())
            }
            SelectionTarget::Selectable(_) => Ok(()),
        }
    }
}

/// Number of operations in the writer's batch so far.
pub(crate) fn operation_count(writer: &Writer<'_>) -> usize {
    writer.batch().borrow().operations().len()
}

/// `position` moved through every operation the batch gained after the
/// first `since` ones.
pub(crate) fn track(writer: &Writer<'_>, position: &Position, since: usize) -> Position {
    let batch = writer.batch();
    let batch = batch.borrow();
    batch
        .operations()
        .get(since..)
        .unwrap_or(&[])
        .iter()
        .fold(position.clone(), |position, operation| position.get_transformed_by_operation(operation))
}
