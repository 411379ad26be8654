use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

use super::{next_version, utils, AffectedSelectable, Operation, OperationBehavior, OperationJson, SplitOperation};
use crate::document::Document;
use crate::position::{Position, PositionJson};
use crate::range::Range;
use crate::tree::Tree;

/// Moves the whole content of one element to the end of another and moves
/// the emptied element to the graveyard.
///
/// `source_position` is the start of the merged element's content and
/// `target_position` the end of the receiving element's content.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOperation {
    pub source_position: Position,
    pub how_many: usize,
    pub target_position: Position,
    pub graveyard_position: Position,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOperationJson {
    pub base_version: Option<u64>,
    pub source_position: PositionJson,
    pub how_many: usize,
    pub target_position: PositionJson,
    pub graveyard_position: PositionJson,
}

impl MergeOperation {
    pub fn new(source_position: Position, how_many: usize, target_position: Position, graveyard_position: Position, base_version: Option<u64>) -> Self {
        Self {
            source_position,
            how_many,
            target_position,
            graveyard_position,
            base_version,
        }
    }

    /// Position before the merged element.
    pub fn deletion_position(&self) -> Position {
        let path = self.source_position.parent_path().to_vec();
        Position::from_parts(self.source_position.root, path)
    }

    /// Everything from `source_position` to the end of the merged element.
    pub fn moved_range(&self) -> Range {
        let end = self.source_position.shifted_forward(usize::MAX);
        Range::new(self.source_position.clone(), end)
    }

    pub fn from_json(json: MergeOperationJson, document: &Document) -> ModelResult<Self> {
        Ok(Self::new(
            Position::from_json(&json.source_position, document)?,
            json.how_many,
            Position::from_json(&json.target_position, document)?,
            Position::from_json(&json.graveyard_position, document)?,
            json.base_version,
        ))
    }
}

impl OperationBehavior for MergeOperation {
    fn type_name(&self) -> &'static str {
        "merge"
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        let deletion = self.deletion_position();
        Some(AffectedSelectable::Ranges(vec![
            Range::from_position_and_shift(&deletion, 1),
            Range::collapsed(self.target_position.clone()),
        ]))
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        let source = self.source_position.parent(tree).filter(|node| tree.is_element(*node) && tree.parent(*node).is_some());
        let Some(source) = source else {
            return Err(ModelError::new("merge-operation-source-position-invalid", "Merge source position is invalid"));
        };
        if !self.target_position.parent(tree).is_some_and(|node| tree.is_element(node) && tree.parent(node).is_some()) {
            return Err(ModelError::new("merge-operation-target-position-invalid", "Merge target position is invalid"));
        }
        if self.how_many != tree.max_offset(source) {
            return Err(ModelError::new("merge-operation-how-many-invalid", "Merge operation specifies wrong number of nodes to move"));
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let tree = document.tree_mut();
        let merged = self
            .source_position
            .parent(tree)
            .ok_or_else(|| ModelError::new("merge-operation-source-position-invalid", "Merge source position is invalid"))?;

        let content = Range::in_element(tree, merged)?;
        utils::move_range(tree, &content, &self.target_position)?;
        let element = Range::on(tree, merged)?;
        utils::move_range(tree, &element, &self.graveyard_position)?;
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        let operation = Operation::Merge(self.clone());
        let target_position = self.target_position.get_transformed_by_operation(&operation);
        let insertion_position = self.deletion_position().get_transformed_by_operation(&operation);
        Operation::Split(SplitOperation::new(
            target_position,
            self.how_many,
            insertion_position,
            Some(self.graveyard_position.clone()),
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Merge(MergeOperationJson {
            base_version: self.base_version,
            source_position: self.source_position.to_json(tree),
            how_many: self.how_many,
            target_position: self.target_position.to_json(tree),
            graveyard_position: self.graveyard_position.to_json(tree),
        })
    }
}
