use quire_common::ModelResult;
use serde::{Deserialize, Serialize};

use super::{next_version, AffectedSelectable, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::tree::Tree;

/// Does nothing but still consumes a document version.
#[derive(Debug, Clone, PartialEq)]
pub struct NoOperation {
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoOperationJson {
    pub base_version: Option<u64>,
}

impl NoOperation {
    pub fn new(base_version: Option<u64>) -> Self {
        Self { base_version }
    }

    pub fn from_json(json: NoOperationJson) -> Self {
        Self::new(json.base_version)
    }
}

impl OperationBehavior for NoOperation {
    fn type_name(&self) -> &'static str {
        "noop"
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

    fn validate(&self, _document: &Document) -> ModelResult<()> {
        Ok(())
    }

    fn execute(&mut self, _document: &mut Document) -> ModelResult<()> {
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        Operation::NoOperation(NoOperation::new(next_version(self.base_version)))
    }

    fn to_json(&self, _tree: &Tree) -> OperationJson {
        OperationJson::NoOperation(NoOperationJson {
            base_version: self.base_version,
        })
    }
}
