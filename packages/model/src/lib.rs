//! # quire-model
//!
//! Document model core for a rich-text editor.
//!
//! ```text
//! Model ── change / enqueue_change ──> Writer ── operations ──> Document
//!   │                                    │                        │
//!   └─ content helpers (insert, delete,  └─ Batch (history unit)  ├─ Tree (roots + graveyard)
//!      copy, caret movement)                                      ├─ DocumentSelection
//!                                                                 └─ MarkerCollection
//! ```
//!
//! Every mutation of document content is an [`Operation`]: validated, then
//! executed, recorded in a [`Batch`] and in the document history. Positions
//! and ranges are plain values addressing the tree by path; they are moved
//! through operations explicitly with `get_transformed_by_operation`.

pub mod batch;
pub mod config;
pub mod content;
pub mod dev_utils;
pub mod document;
pub mod markers;
pub mod model;
pub mod node;
pub mod operation;
pub mod position;
pub mod range;
pub mod schema;
pub mod selection;
pub mod text_proxy;
pub mod tree;
pub mod tree_walker;
pub mod writer;

pub use batch::{Batch, BatchType};
pub use config::ModelConfig;
pub use content::{
    ContentScope, DeleteContentOptions, HasContentOptions, InsertObjectOptions, ModifySelectionOptions, ObjectPlacement, SelectionTarget,
    SelectionUnit,
};
pub use document::{Document, DocumentEvent};
pub use markers::{Marker, MarkerCollection};
pub use model::{Model, ModelEvent, PostFixer};
pub use node::{Attributes, Item, NodeId, NodeInput, NodeJson};
pub use operation::{Operation, OperationBehavior, OperationJson};
pub use position::{Position, PositionJson, PositionOffset, Stickiness};
pub use range::{Range, RangeJson};
pub use schema::{Schema, SchemaItemDefinition};
pub use selection::{DocumentSelection, Selectable, Selection};
pub use text_proxy::TextProxy;
pub use tree::{Tree, GRAVEYARD, GRAVEYARD_NAME};
pub use tree_walker::{Direction, TreeWalker, TreeWalkerItem, TreeWalkerOptions, TreeWalkerValue, WalkerEventKind};
pub use writer::{AttributeTarget, MarkerOptions, MarkerUpdateOptions, SplitResult, Writer};

pub use quire_common::{ModelError, ModelResult};
