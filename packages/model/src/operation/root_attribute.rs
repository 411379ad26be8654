use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{next_version, AffectedSelectable, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::node::NodeId;
use crate::tree::Tree;

/// Attribute change on a parentless element: a document root or a
/// detached element.
#[derive(Debug, Clone, PartialEq)]
pub struct RootAttributeOperation {
    pub root: NodeId,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootAttributeOperationJson {
    pub base_version: Option<u64>,
    pub root: String,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl RootAttributeOperation {
    pub fn new(root: NodeId, key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>, base_version: Option<u64>) -> Self {
        Self {
            root,
            key: key.into(),
            old_value,
            new_value,
            base_version,
        }
    }

    pub fn from_json(json: RootAttributeOperationJson, document: &Document) -> ModelResult<Self> {
        let root = document.get_root(&json.root).ok_or_else(|| {
            ModelError::new("rootattribute-operation-fromjson-no-root", "Cannot create RootAttributeOperation for document. Root with specified name does not exist.")
                .with_context(json!({ "rootName": json.root }))
        })?;
        Ok(Self::new(root, json.key, json.old_value, json.new_value, json.base_version))
    }
}

impl OperationBehavior for RootAttributeOperation {
    fn type_name(&self) -> &'static str {
        match (&self.old_value, &self.new_value) {
            (None, _) => "addRootAttribute",
            (_, None) => "removeRootAttribute",
            _ => "changeRootAttribute",
        }
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        Some(AffectedSelectable::Element(self.root))
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        if !tree.contains(self.root) || !tree.is_element(self.root) || tree.parent(self.root).is_some() {
            return Err(ModelError::new("rootattribute-operation-not-a-root", "The element to change is not a root element")
                .with_context(json!({ "key": self.key })));
        }
        let current = tree.get_attribute(self.root, &self.key);
        if self.old_value.is_some() && current != self.old_value.as_ref() {
            return Err(ModelError::new("rootattribute-operation-wrong-old-value", "Changed node has different attribute value than operation's old attribute value")
                .with_context(json!({ "key": self.key, "value": self.old_value })));
        }
        if self.old_value.is_none() && self.new_value.is_some() && current.is_some() {
            return Err(ModelError::new("rootattribute-operation-attribute-exists", "The attribute with given key already exists")
                .with_context(json!({ "key": self.key })));
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let tree = document.tree_mut();
        match &self.new_value {
            Some(value) => tree.set_attribute(self.root, self.key.clone(), value.clone()),
            None => {
                tree.remove_attribute(self.root, &self.key);
            }
        }
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        Operation::RootAttribute(RootAttributeOperation::new(
            self.root,
            self.key.clone(),
            self.new_value.clone(),
            self.old_value.clone(),
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        let root = tree.root_info(self.root).map(|info| info.name.clone()).unwrap_or_default();
        OperationJson::RootAttribute(RootAttributeOperationJson {
            base_version: self.base_version,
            root,
            key: self.key.clone(),
            old_value: self.old_value.clone(),
            new_value: self.new_value.clone(),
        })
    }
}
