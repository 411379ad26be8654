use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

use super::{next_version, utils, AffectedSelectable, MergeOperation, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::position::{Position, PositionJson, Stickiness};
use crate::range::Range;
use crate::tree::{Tree, GRAVEYARD};

/// Splits an element at `split_position`: a new element (a shallow copy, or
/// the element found at `graveyard_position`) is inserted after it and
/// receives everything after the split point.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOperation {
    pub split_position: Position,
    pub how_many: usize,
    pub insertion_position: Position,
    pub graveyard_position: Option<Position>,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOperationJson {
    pub base_version: Option<u64>,
    pub split_position: PositionJson,
    pub how_many: usize,
    pub insertion_position: PositionJson,
    pub graveyard_position: Option<PositionJson>,
}

impl SplitOperation {
    pub fn new(
        split_position: Position,
        how_many: usize,
        insertion_position: Position,
        graveyard_position: Option<Position>,
        base_version: Option<u64>,
    ) -> Self {
        Self {
            split_position,
            how_many,
            insertion_position,
            graveyard_position,
            base_version,
        }
    }

    /// Position right after the split element.
    pub fn get_insertion_position(split_position: &Position) -> Position {
        let mut path = split_position.parent_path().to_vec();
        if let Some(last) = path.last_mut() {
            *last += 1;
        }
        Position::from_parts(split_position.root, path).with_stickiness(Stickiness::ToPrevious)
    }

    /// Start of the new element's content.
    pub fn move_target_position(&self) -> Position {
        let mut path = self.insertion_position.path.clone();
        path.push(0);
        Position::from_parts(self.insertion_position.root, path)
    }

    /// Everything after the split point.
    pub fn moved_range(&self) -> Range {
        let end = self.split_position.shifted_forward(usize::MAX);
        Range::new(self.split_position.clone(), end)
    }

    pub fn from_json(json: SplitOperationJson, document: &Document) -> ModelResult<Self> {
        let graveyard_position = match &json.graveyard_position {
            Some(position) => Some(Position::from_json(position, document)?),
            None => None,
        };
        Ok(Self::new(
            Position::from_json(&json.split_position, document)?,
            json.how_many,
            Position::from_json(&json.insertion_position, document)?,
            graveyard_position,
            json.base_version,
        ))
    }
}

impl OperationBehavior for SplitOperation {
    fn type_name(&self) -> &'static str {
        "split"
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        Some(AffectedSelectable::Ranges(vec![
            Range::collapsed(self.split_position.clone()),
            Range::collapsed(self.insertion_position.clone()),
        ]))
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        let element = self.split_position.parent(tree).filter(|node| tree.is_container(*node));
        let Some(element) = element.filter(|node| self.split_position.offset() <= tree.max_offset(*node)) else {
            return Err(ModelError::new("split-operation-position-invalid", "Split position is invalid"));
        };
        if tree.parent(element).is_none() {
            return Err(ModelError::new("split-operation-split-in-root", "Cannot split root element"));
        }
        if self.how_many != tree.max_offset(element) - self.split_position.offset() {
            return Err(ModelError::new("split-operation-how-many-invalid", "Split operation specifies wrong number of nodes to move"));
        }
        if let Some(graveyard) = &self.graveyard_position {
            if graveyard.node_after(tree).is_none() {
                return Err(ModelError::new("split-operation-graveyard-position-invalid", "Graveyard position invalid"));
            }
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let tree = document.tree_mut();
        let split_element = self
            .split_position
            .parent(tree)
            .ok_or_else(|| ModelError::new("split-operation-position-invalid", "Split position is invalid"))?;

        match &self.graveyard_position {
            Some(graveyard) => {
                utils::move_range(tree, &Range::from_position_and_shift(graveyard, 1), &self.insertion_position)?;
            }
            None => {
                let new_element = tree.clone_node(split_element, false);
                utils::insert(tree, &self.insertion_position, vec![new_element])?;
            }
        }

        let source = Range::new(
            Position::create_at(tree, split_element, self.split_position.offset())?,
            Position::create_at(tree, split_element, crate::position::PositionOffset::End)?,
        );
        utils::move_range(tree, &source, &self.move_target_position())?;
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        let graveyard_position = Position::from_parts(GRAVEYARD, vec![0]);
        Operation::Merge(MergeOperation::new(
            self.move_target_position(),
            self.how_many,
            self.split_position.clone(),
            graveyard_position,
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Split(SplitOperationJson {
            base_version: self.base_version,
            split_position: self.split_position.to_json(tree),
            how_many: self.how_many,
            insertion_position: self.insertion_position.to_json(tree),
            graveyard_position: self.graveyard_position.as_ref().map(|position| position.to_json(tree)),
        })
    }
}
