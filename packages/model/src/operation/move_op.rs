use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{next_version, utils, AffectedSelectable, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::position::{Position, PositionJson};
use crate::range::Range;
use crate::tree::{Tree, GRAVEYARD};

/// Moves `how_many` offsets starting at `source_position` to
/// `target_position`. `target_position` is expressed before the removal.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOperation {
    pub source_position: Position,
    pub how_many: usize,
    pub target_position: Position,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOperationJson {
    pub base_version: Option<u64>,
    pub source_position: PositionJson,
    pub how_many: usize,
    pub target_position: PositionJson,
}

impl MoveOperation {
    pub fn new(source_position: Position, how_many: usize, target_position: Position, base_version: Option<u64>) -> Self {
        Self {
            source_position,
            how_many,
            target_position,
            base_version,
        }
    }

    /// Where the moved range starts once the move is done.
    pub fn moved_range_start(&self) -> Position {
        self.target_position
            .get_transformed_by_deletion(&self.source_position, self.how_many)
            .unwrap_or_else(|| self.target_position.clone())
    }

    pub fn from_json(json: MoveOperationJson, document: &Document) -> ModelResult<Self> {
        Ok(Self::new(
            Position::from_json(&json.source_position, document)?,
            json.how_many,
            Position::from_json(&json.target_position, document)?,
            json.base_version,
        ))
    }
}

impl OperationBehavior for MoveOperation {
    fn type_name(&self) -> &'static str {
        if self.target_position.root == GRAVEYARD {
            "remove"
        } else if self.source_position.root == GRAVEYARD {
            "reinsert"
        } else {
            "move"
        }
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        Some(AffectedSelectable::Ranges(vec![
            Range::from_position_and_shift(&self.source_position, self.how_many),
            Range::collapsed(self.target_position.clone()),
        ]))
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        let (Some(source_parent), Some(target_parent)) = (self.source_position.parent(tree), self.target_position.parent(tree)) else {
            return Err(ModelError::new("move-operation-source-invalid", "Move positions do not resolve to containers"));
        };
        let source_offset = self.source_position.offset();
        let target_offset = self.target_position.offset();

        if !tree.is_container(source_parent) || source_offset + self.how_many > tree.max_offset(source_parent) {
            return Err(ModelError::new("move-operation-nodes-do-not-exist", "Cannot move because some of the nodes do not exist")
                .with_context(json!({ "howMany": self.how_many })));
        }
        if source_parent == target_parent && source_offset < target_offset && target_offset < source_offset + self.how_many {
            return Err(ModelError::new("move-operation-range-into-itself", "Trying to move a range of nodes into the middle of that range"));
        }
        if self.source_position.root == self.target_position.root {
            let source_parent_path = self.source_position.parent_path();
            let target_path = &self.target_position.path;
            let depth = self.source_position.path.len() - 1;
            if target_path.len() > depth + 1 && target_path.starts_with(source_parent_path) {
                let at = target_path[depth];
                if at >= source_offset && at < source_offset + self.how_many {
                    return Err(ModelError::new("move-operation-range-into-itself", "Trying to move a range of nodes into one of the nodes from that range"));
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let source = Range::from_position_and_shift(&self.source_position, self.how_many);
        utils::move_range(document.tree_mut(), &source, &self.target_position)?;
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        let new_target = self.source_position.get_transformed_by_insertion(&self.target_position, self.how_many);
        Operation::Move(MoveOperation::new(
            self.moved_range_start(),
            self.how_many,
            new_target,
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Move(MoveOperationJson {
            base_version: self.base_version,
            source_position: self.source_position.to_json(tree),
            how_many: self.how_many,
            target_position: self.target_position.to_json(tree),
        })
    }
}
