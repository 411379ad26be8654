use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{next_version, AffectedSelectable, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::position::{Position, PositionJson};
use crate::tree::Tree;

/// Changes the name of the element right after `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameOperation {
    pub position: Position,
    pub old_name: String,
    pub new_name: String,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOperationJson {
    pub base_version: Option<u64>,
    pub position: PositionJson,
    pub old_name: String,
    pub new_name: String,
}

impl RenameOperation {
    pub fn new(position: Position, old_name: impl Into<String>, new_name: impl Into<String>, base_version: Option<u64>) -> Self {
        Self {
            position,
            old_name: old_name.into(),
            new_name: new_name.into(),
            base_version,
        }
    }

    pub fn from_json(json: RenameOperationJson, document: &Document) -> ModelResult<Self> {
        Ok(Self::new(Position::from_json(&json.position, document)?, json.old_name, json.new_name, json.base_version))
    }
}

impl OperationBehavior for RenameOperation {
    fn type_name(&self) -> &'static str {
        "rename"
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, tree: &Tree) -> Option<AffectedSelectable> {
        self.position.node_after(tree).map(AffectedSelectable::Element)
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        let Some(element) = self.position.node_after(tree).filter(|node| tree.is_element(*node)) else {
            return Err(ModelError::new("rename-operation-wrong-position", "Given position is invalid or node after it is not an instance of Element"));
        };
        if tree.name(element) != Some(self.old_name.as_str()) {
            return Err(ModelError::new("rename-operation-wrong-name", "Element to change has different name than operation's old name")
                .with_context(json!({ "oldName": self.old_name })));
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let tree = document.tree_mut();
        if let Some(element) = self.position.node_after(tree) {
            tree.rename(element, &self.new_name);
        }
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        Operation::Rename(RenameOperation::new(
            self.position.clone(),
            self.new_name.clone(),
            self.old_name.clone(),
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Rename(RenameOperationJson {
            base_version: self.base_version,
            position: self.position.to_json(tree),
            old_name: self.old_name.clone(),
            new_name: self.new_name.clone(),
        })
    }
}
