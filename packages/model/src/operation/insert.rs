use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

use super::{next_version, utils, AffectedSelectable, MoveOperation, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::node::{NodeId, NodeJson};
use crate::position::{Position, PositionJson};
use crate::range::Range;
use crate::tree::{Tree, GRAVEYARD};

/// Inserts detached nodes at a position.
///
/// The operation owns its nodes. Executing it inserts them and keeps deep
/// copies, so the operation can be serialized or replayed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOperation {
    pub position: Position,
    pub nodes: Vec<NodeId>,
    how_many: usize,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOperationJson {
    pub base_version: Option<u64>,
    pub position: PositionJson,
    pub nodes: Vec<NodeJson>,
}

impl InsertOperation {
    pub fn new(tree: &Tree, position: Position, nodes: Vec<NodeId>, base_version: Option<u64>) -> Self {
        let how_many = nodes.iter().map(|node| tree.offset_size(*node)).sum();
        Self {
            position,
            nodes,
            how_many,
            base_version,
        }
    }

    pub(crate) fn with_how_many(position: Position, nodes: Vec<NodeId>, how_many: usize, base_version: Option<u64>) -> Self {
        Self {
            position,
            nodes,
            how_many,
            base_version,
        }
    }

    /// Total offset size of the inserted nodes.
    pub fn how_many(&self) -> usize {
        self.how_many
    }

    pub fn from_json(json: InsertOperationJson, document: &mut Document) -> ModelResult<Self> {
        let position = Position::from_json(&json.position, document)?;
        let tree = document.tree_mut();
        let nodes: Vec<NodeId> = json.nodes.iter().map(|node| tree.from_json(node)).collect();
        Ok(Self::new(tree, position, nodes, json.base_version))
    }
}

impl OperationBehavior for InsertOperation {
    fn type_name(&self) -> &'static str {
        "insert"
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        Some(AffectedSelectable::Range(Range::from_position_and_shift(&self.position, self.how_many)))
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        let valid = self
            .position
            .parent(tree)
            .is_some_and(|parent| tree.is_container(parent) && self.position.offset() <= tree.max_offset(parent));
        if !valid {
            return Err(ModelError::new("insert-operation-position-invalid", "Insertion position is invalid"));
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let tree = document.tree_mut();
        let originals = std::mem::take(&mut self.nodes);
        self.nodes = originals.iter().map(|node| tree.clone_node(*node, true)).collect();
        utils::insert(tree, &self.position, originals)?;
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        let graveyard_position = Position::from_parts(GRAVEYARD, vec![0]);
        Operation::Move(MoveOperation::new(
            self.position.clone(),
            self.how_many,
            graveyard_position,
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Insert(InsertOperationJson {
            base_version: self.base_version,
            position: self.position.to_json(tree),
            nodes: self.nodes.iter().map(|node| tree.to_json(*node)).collect(),
        })
    }
}
