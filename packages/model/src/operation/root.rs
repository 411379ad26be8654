use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{next_version, AffectedSelectable, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::tree::Tree;

/// Attaches (`is_add`) or detaches a named root. Missing roots are created
/// detached when the operation executes.
#[derive(Debug, Clone, PartialEq)]
pub struct RootOperation {
    pub root_name: String,
    pub element_name: String,
    pub is_add: bool,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootOperationJson {
    pub base_version: Option<u64>,
    pub root_name: String,
    pub element_name: String,
    pub is_add: bool,
}

impl RootOperation {
    pub fn new(root_name: impl Into<String>, element_name: impl Into<String>, is_add: bool, base_version: Option<u64>) -> Self {
        Self {
            root_name: root_name.into(),
            element_name: element_name.into(),
            is_add,
            base_version,
        }
    }

    pub fn from_json(json: RootOperationJson) -> Self {
        Self::new(json.root_name, json.element_name, json.is_add, json.base_version)
    }
}

impl OperationBehavior for RootOperation {
    fn type_name(&self) -> &'static str {
        if self.is_add {
            "addRoot"
        } else {
            "detachRoot"
        }
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        None
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let attached = document.get_root(&self.root_name).is_some_and(|root| document.is_root_attached(root));
        if attached == self.is_add {
            return Err(ModelError::new(
                "root-operation-wrong-state",
                if self.is_add { "The root is already attached" } else { "The root is already detached" },
            )
            .with_context(json!({ "rootName": self.root_name })));
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let root = match document.get_root(&self.root_name) {
            Some(root) => root,
            None => document.create_detached_root(&self.element_name, &self.root_name)?,
        };
        document.tree_mut().set_root_attached(root, self.is_add);
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        Operation::Root(RootOperation::new(
            self.root_name.clone(),
            self.element_name.clone(),
            !self.is_add,
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, _tree: &Tree) -> OperationJson {
        OperationJson::Root(RootOperationJson {
            base_version: self.base_version,
            root_name: self.root_name.clone(),
            element_name: self.element_name.clone(),
            is_add: self.is_add,
        })
    }
}
