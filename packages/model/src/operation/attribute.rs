use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{next_version, utils, AffectedSelectable, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::range::{Range, RangeJson};
use crate::tree::Tree;
use crate::tree_walker::TreeWalkerItem;

/// Sets, changes or removes one attribute on every node of a flat range.
///
/// `old_value == None` adds the attribute, `new_value == None` removes it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeOperation {
    pub range: Range,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOperationJson {
    pub base_version: Option<u64>,
    pub range: RangeJson,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl AttributeOperation {
    pub fn new(range: Range, key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>, base_version: Option<u64>) -> Self {
        Self {
            range,
            key: key.into(),
            old_value,
            new_value,
            base_version,
        }
    }

    pub fn from_json(json: AttributeOperationJson, document: &Document) -> ModelResult<Self> {
        Ok(Self::new(
            Range::from_json(&json.range, document)?,
            json.key,
            json.old_value,
            json.new_value,
            json.base_version,
        ))
    }
}

impl OperationBehavior for AttributeOperation {
    fn type_name(&self) -> &'static str {
        match (&self.old_value, &self.new_value) {
            (None, _) => "addAttribute",
            (_, None) => "removeAttribute",
            _ => "changeAttribute",
        }
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        Some(AffectedSelectable::Range(self.range.clone()))
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        let tree = document.tree();
        if !self.range.is_flat() {
            return Err(ModelError::new("attribute-operation-wrong-range", "The range to change is not flat"));
        }

        for item in self.range.get_items(tree, false) {
            let node = match &item {
                TreeWalkerItem::Element(id) => *id,
                TreeWalkerItem::Text(proxy) => proxy.text,
            };
            let current = tree.get_attribute(node, &self.key);
            if self.old_value.is_some() && current != self.old_value.as_ref() {
                return Err(ModelError::new("attribute-operation-wrong-old-value", "Changed node has different attribute value than operation's old attribute value")
                    .with_context(json!({ "key": self.key, "value": self.old_value })));
            }
            if self.old_value.is_none() && self.new_value.is_some() && current.is_some() {
                return Err(ModelError::new("attribute-operation-attribute-exists", "The attribute with given key already exists")
                    .with_context(json!({ "key": self.key })));
            }
        }
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        if self.old_value == self.new_value {
            return Ok(());
        }
        utils::set_attribute(document.tree_mut(), &self.range, &self.key, self.new_value.as_ref())
    }

    fn get_reversed(&self) -> Operation {
        Operation::Attribute(AttributeOperation::new(
            self.range.clone(),
            self.key.clone(),
            self.new_value.clone(),
            self.old_value.clone(),
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Attribute(AttributeOperationJson {
            base_version: self.base_version,
            range: self.range.to_json(tree),
            key: self.key.clone(),
            old_value: self.old_value.clone(),
            new_value: self.new_value.clone(),
        })
    }
}
