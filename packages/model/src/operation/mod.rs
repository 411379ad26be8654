//! # Operations
//!
//! Atomic, versioned and reversible tree mutations. Writers build them,
//! [`Document::apply_operation`](crate::document::Document::apply_operation)
//! validates and executes them, and batches keep them as history.
//!
//! ## Contract
//!
//! - `validate` never mutates and fails with a stable error code
//! - `execute` assumes a successful `validate`
//! - executing `get_reversed()` right after the operation restores the
//!   previous tree
//! - `to_json` / [`Operation::from_json`] are exact inverses, keyed by
//!   `__className`
//!
//! An operation with `base_version == None` targets content outside the
//! document (a fragment or detached element) and does not advance the
//! document version.

mod attribute;
mod detach;
mod insert;
mod marker;
mod merge;
mod move_op;
mod no_op;
mod rename;
mod root;
mod root_attribute;
mod split;
pub(crate) mod utils;

pub use attribute::{AttributeOperation, AttributeOperationJson};
pub use detach::{DetachOperation, DetachOperationJson};
pub use insert::{InsertOperation, InsertOperationJson};
pub use marker::{MarkerOperation, MarkerOperationJson};
pub use merge::{MergeOperation, MergeOperationJson};
pub use move_op::{MoveOperation, MoveOperationJson};
pub use no_op::{NoOperation, NoOperationJson};
pub use rename::{RenameOperation, RenameOperationJson};
pub use root::{RootOperation, RootOperationJson};
pub use root_attribute::{RootAttributeOperation, RootAttributeOperationJson};
pub use split::{SplitOperation, SplitOperationJson};

use quire_common::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::document::Document;
use crate::node::NodeId;
use crate::range::Range;
use crate::tree::Tree;

/// What an operation touched most directly, for selection handling.
#[derive(Debug, Clone, PartialEq)]
pub enum AffectedSelectable {
    Range(Range),
    Ranges(Vec<Range>),
    Element(NodeId),
}

/// Behaviour shared by every operation type.
pub trait OperationBehavior {
    /// Short type tag such as `"insert"` or `"addAttribute"`.
    fn type_name(&self) -> &'static str;

    fn base_version(&self) -> Option<u64>;

    fn set_base_version(&mut self, version: Option<u64>);

    fn is_document_operation(&self) -> bool {
        self.base_version().is_some()
    }

    fn affected_selectable(&self, tree: &Tree) -> Option<AffectedSelectable>;

    fn validate(&self, document: &Document) -> ModelResult<()>;

    fn execute(&mut self, document: &mut Document) -> ModelResult<()>;

    fn get_reversed(&self) -> Operation;

    fn to_json(&self, tree: &Tree) -> OperationJson;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Attribute(AttributeOperation),
    RootAttribute(RootAttributeOperation),
    Insert(InsertOperation),
    Move(MoveOperation),
    Merge(MergeOperation),
    Split(SplitOperation),
    Rename(RenameOperation),
    Marker(MarkerOperation),
    Root(RootOperation),
    Detach(DetachOperation),
    NoOperation(NoOperation),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Operation::Attribute($op) => $body,
            Operation::RootAttribute($op) => $body,
            Operation::Insert($op) => $body,
            Operation::Move($op) => $body,
            Operation::Merge($op) => $body,
            Operation::Split($op) => $body,
            Operation::Rename($op) => $body,
            Operation::Marker($op) => $body,
            Operation::Root($op) => $body,
            Operation::Detach($op) => $body,
            Operation::NoOperation($op) => $body,
        }
    };
}

impl OperationBehavior for Operation {
    fn type_name(&self) -> &'static str {
        dispatch!(self, op => op.type_name())
    }

    fn base_version(&self) -> Option<u64> {
        dispatch!(self, op => op.base_version())
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        dispatch!(self, op => op.set_base_version(version))
    }

    fn is_document_operation(&self) -> bool {
        dispatch!(self, op => op.is_document_operation())
    }

    fn affected_selectable(&self, tree: &Tree) -> Option<AffectedSelectable> {
        dispatch!(self, op => op.affected_selectable(tree))
    }

    fn validate(&self, document: &Document) -> ModelResult<()> {
        dispatch!(self, op => op.validate(document))
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        dispatch!(self, op => op.execute(document))
    }

    fn get_reversed(&self) -> Operation {
        dispatch!(self, op => op.get_reversed())
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        dispatch!(self, op => op.to_json(tree))
    }
}

impl Operation {
    /// Class name used as the `__className` tag.
    pub fn class_name(&self) -> &'static str {
        match self {
            Operation::Attribute(_) => "AttributeOperation",
            Operation::RootAttribute(_) => "RootAttributeOperation",
            Operation::Insert(_) => "InsertOperation",
            Operation::Move(_) => "MoveOperation",
            Operation::Merge(_) => "MergeOperation",
            Operation::Split(_) => "SplitOperation",
            Operation::Rename(_) => "RenameOperation",
            Operation::Marker(_) => "MarkerOperation",
            Operation::Root(_) => "RootOperation",
            Operation::Detach(_) => "DetachOperation",
            Operation::NoOperation(_) => "NoOperation",
        }
    }

    pub fn to_json_value(&self, tree: &Tree) -> ModelResult<Value> {
        Ok(serde_json::to_value(self.to_json(tree))?)
    }

    /// Rebuild an operation from its JSON form, resolving root names against
    /// `document`. Inserted node snapshots are materialized as detached nodes
    /// in the document's tree.
    pub fn from_json(value: &Value, document: &mut Document) -> ModelResult<Operation> {
        let class_name = value.get("__className").and_then(Value::as_str).unwrap_or_default();
        if !OperationJson::CLASS_NAMES.contains(&class_name) {
            return Err(ModelError::new("model-operation-fromjson-unknown-class", "Unknown operation class")
                .with_context(json!({ "className": class_name })));
        }
        let json: OperationJson = serde_json::from_value(value.clone())?;
        Self::from_operation_json(json, document)
    }

    pub fn from_operation_json(json: OperationJson, document: &mut Document) -> ModelResult<Operation> {
        Ok(match json {
            OperationJson::Attribute(json) => Operation::Attribute(AttributeOperation::from_json(json, document)?),
            OperationJson::RootAttribute(json) => Operation::RootAttribute(RootAttributeOperation::from_json(json, document)?),
            OperationJson::Insert(json) => Operation::Insert(InsertOperation::from_json(json, document)?),
            OperationJson::Move(json) => Operation::Move(MoveOperation::from_json(json, document)?),
            OperationJson::Merge(json) => Operation::Merge(MergeOperation::from_json(json, document)?),
            OperationJson::Split(json) => Operation::Split(SplitOperation::from_json(json, document)?),
            OperationJson::Rename(json) => Operation::Rename(RenameOperation::from_json(json, document)?),
            OperationJson::Marker(json) => Operation::Marker(MarkerOperation::from_json(json, document)?),
            OperationJson::Root(json) => Operation::Root(RootOperation::from_json(json)),
            OperationJson::Detach(json) => Operation::Detach(DetachOperation::from_json(json, document)?),
            OperationJson::NoOperation(json) => Operation::NoOperation(NoOperation::from_json(json)),
        })
    }
}

/// Serialized operation, tagged by `__className`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__className")]
pub enum OperationJson {
    #[serde(rename = "AttributeOperation")]
    Attribute(AttributeOperationJson),
    #[serde(rename = "RootAttributeOperation")]
    RootAttribute(RootAttributeOperationJson),
    #[serde(rename = "InsertOperation")]
    Insert(InsertOperationJson),
    #[serde(rename = "MoveOperation")]
    Move(MoveOperationJson),
    #[serde(rename = "MergeOperation")]
    Merge(MergeOperationJson),
    #[serde(rename = "SplitOperation")]
    Split(SplitOperationJson),
    #[serde(rename = "RenameOperation")]
    Rename(RenameOperationJson),
    #[serde(rename = "MarkerOperation")]
    Marker(MarkerOperationJson),
    #[serde(rename = "RootOperation")]
    Root(RootOperationJson),
    #[serde(rename = "DetachOperation")]
    Detach(DetachOperationJson),
    #[serde(rename = "NoOperation")]
    NoOperation(NoOperationJson),
}

impl OperationJson {
    pub const CLASS_NAMES: [&'static str; 11] = [
        "AttributeOperation",
        "RootAttributeOperation",
        "InsertOperation",
        "MoveOperation",
        "MergeOperation",
        "SplitOperation",
        "RenameOperation",
        "MarkerOperation",
        "RootOperation",
        "DetachOperation",
        "NoOperation",
    ];
}

macro_rules! impl_from_operation {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operation {
                fn from(op: $ty) -> Self {
                    Operation::$variant(op)
                }
            }
        )*
    };
}

impl_from_operation! {
    Attribute => AttributeOperation,
    RootAttribute => RootAttributeOperation,
    Insert => InsertOperation,
    Move => MoveOperation,
    Merge => MergeOperation,
    Split => SplitOperation,
    Rename => RenameOperation,
    Marker => MarkerOperation,
    Root => RootOperation,
    Detach => DetachOperation,
    NoOperation => NoOperation,
}

fn next_version(version: Option<u64>) -> Option<u64> {
    version.map(|version| version + 1)
}
