//! # Batches
//!
//! A batch groups the operations produced by one logical edit. Undo and
//! collaboration layers consume batches; the model only fills them.
//!
//! ## Example
//!
//! ```rust,ignore
//! let batch = model.create_batch(BatchType { is_undoable: false, ..BatchType::default() });
//! model.enqueue_change_in(batch.clone(), |writer| {
//!     writer.insert_text("foo", Attributes::new(), &position)?;
//!     Ok(())
//! })?;
//! assert_eq!(batch.borrow().operations().len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::operation::{Operation, OperationBehavior};

/// Flags a batch is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchType {
    /// Whether the undo stack should record this batch.
    pub is_undoable: bool,
    /// Created by this client rather than received from a collaborator.
    pub is_local: bool,
    /// Produced by an undo or redo.
    pub is_undo: bool,
    /// Produced by typing, so it may be merged with neighbouring batches.
    pub is_typing: bool,
}

impl Default for BatchType {
    fn default() -> Self {
        Self {
            is_undoable: true,
            is_local: true,
            is_undo: false,
            is_typing: false,
        }
    }
}

/// Ordered operations sharing one transactional intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// The operations in this batch (in application order)
    operations: Vec<Operation>,

    pub is_undoable: bool,
    pub is_local: bool,
    pub is_undo: bool,
    pub is_typing: bool,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(BatchType::default())
    }
}

impl Batch {
    pub fn new(batch_type: BatchType) -> Self {
        Self {
            operations: Vec::new(),
            is_undoable: batch_type.is_undoable,
            is_local: batch_type.is_local,
            is_undo: batch_type.is_undo,
            is_typing: batch_type.is_typing,
        }
    }

    pub fn batch_type(&self) -> BatchType {
        BatchType {
            is_undoable: self.is_undoable,
            is_local: self.is_local,
            is_undo: self.is_undo,
            is_typing: self.is_typing,
        }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Base version of the first document operation, if any.
    pub fn base_version(&self) -> Option<u64> {
        self.operations.iter().find_map(|operation| operation.base_version())
    }

    /// True once the batch holds at least one document operation.
    pub fn has_document_operations(&self) -> bool {
        self.operations.iter().any(|operation| operation.is_document_operation())
    }

    pub(crate) fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::NoOperation;

    #[test]
    fn test_default_flags() {
        let batch = Batch::default();
        assert!(batch.is_undoable);
        assert!(batch.is_local);
        assert!(!batch.is_undo);
        assert!(!batch.is_typing);
        assert_eq!(batch.batch_type(), BatchType::default());
    }

    #[test]
    fn test_batch_type_from_partial_json() {
        let batch_type: BatchType = serde_json::from_str(r#"{ "isTyping": true }"#).unwrap();
        assert!(batch_type.is_typing);
        assert!(batch_type.is_undoable);
    }

    #[test]
    fn test_base_version_skips_non_document_operations() {
        let mut batch = Batch::new(BatchType::default());
        assert_eq!(batch.base_version(), None);

        batch.add_operation(Operation::NoOperation(NoOperation::new(None)));
        batch.add_operation(Operation::NoOperation(NoOperation::new(Some(4))));
        batch.add_operation(Operation::NoOperation(NoOperation::new(Some(5))));

        assert_eq!(batch.base_version(), Some(4));
        assert!(batch.has_document_operations());
    }
}
