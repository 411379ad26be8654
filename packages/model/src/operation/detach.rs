use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

use super::{utils, AffectedSelectable, InsertOperation, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::node::NodeId;
use crate::position::{Position, PositionJson};
use crate::range::Range;
use crate::tree::Tree;

/// Removes nodes from content that is not attached to the document.
///
/// Never a document operation: it does not consume a version and has no
/// affected selectable. The removed nodes are kept so the operation can be
/// reversed.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachOperation {
    pub source_position: Position,
    pub how_many: usize,
    removed: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachOperationJson {
    pub base_version: Option<u64>,
    pub source_position: PositionJson,
    pub how_many: usize,
}

impl DetachOperation {
    pub fn new(source_position: Position, how_many: usize) -> Self {
        Self {
            source_position,
            how_many,
            removed: Vec::new(),
        }
    }

    /// Nodes detached by the last execution.
    pub fn removed(&self) -> &[NodeId] {
        &self.removed
    }

    pub fn from_json(json: DetachOperationJson, document: &Document) -> ModelResult<Self> {
        Ok(Self::new(Position::from_json(&json.source_position, document)?, json.how_many))
    }
}

impl OperationBehavior for DetachOperation {
    fn type_name(&self) -> &'static str {
        "detach"
    }

    fn base_version(&self) -> Option<u64> {
        None
    }

    fn set_base_version(&mut self, _version: Option<u64>) {}

    fn is_document_operation(&self) -> bool {
        false
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        None
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        if tree.belongs_to_document(self.source_position.root) {
            return Err(ModelError::new("detach-operation-on-document-node", "Cannot use detach operation on nodes that are attached to the document"));
        }
        let exists = self
            .source_position
            .parent(tree)
            .is_some_and(|parent| self.source_position.offset() + self.how_many <= tree.max_offset(parent));
        if !exists {
            return Err(ModelError::new("detach-operation-nodes-do-not-exist", "Cannot detach because some of the nodes do not exist"));
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let range = Range::from_position_and_shift(&self.source_position, self.how_many);
        self.removed = utils::remove(document.tree_mut(), &range)?;
        Ok(())
    }

    /// Re-inserts the nodes removed by the last execution.
    fn get_reversed(&self) -> Operation {
        Operation::Insert(InsertOperation::with_how_many(self.source_position.clone(), self.removed.clone(), self.how_many, None))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Detach(DetachOperationJson {
            base_version: None,
            source_position: self.source_position.to_json(tree),
            how_many: self.how_many,
        })
    }
}
