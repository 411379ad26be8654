//! # Document
//!
//! Owns the node tree, the named roots, the version counter, the operation
//! history, the live selection and the markers.
//!
//! ## Lifecycle
//!
//! ```text
//! Writer → Operation → apply_operation → validate → execute → version + 1
//!                                                      ↓
//!                                     selection / markers transformed
//!                                                      ↓
//!                                               events queued
//! ```
//!
//! Events are queued while the document is being mutated and delivered by
//! [`flush_events`](Document::flush_events) (the model does this after each
//! operation), so listeners always observe a settled document.

use std::collections::BTreeMap;
use std::rc::Rc;

use quire_common::{Emitter, ModelError, ModelResult, Observable, SubscriptionId};
use serde_json::json;
use tracing::debug;

use crate::batch::Batch;
use crate::markers::{MarkerCollection, MarkerUpdate};
use crate::node::{Attributes, NodeId};
use crate::operation::{Operation, OperationBehavior};
use crate::position::Position;
use crate::range::Range;
use crate::selection::{DocumentSelection, Selection};
use crate::tree::{Tree, GRAVEYARD, GRAVEYARD_NAME};

/// Events fired by a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// An operation was applied (document or not).
    ApplyOperation { operation: Operation },
    /// A change block finished after applying document operations.
    Change { batch: Batch },
    /// A marker was added, moved or removed.
    MarkerUpdate(MarkerUpdate),
    /// The selection ranges changed; `direct` when set through a writer.
    SelectionChange { ranges: Vec<Range>, direct: bool },
    /// Selection attributes changed.
    SelectionAttributes { attributes: Attributes },
}

/// Applied document operations, indexed by base version.
#[derive(Debug, Clone, Default)]
pub struct History {
    operations: Vec<Operation>,
}

impl History {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn get_operation(&self, base_version: u64) -> Option<&Operation> {
        self.operations.iter().find(|operation| operation.base_version() == Some(base_version))
    }

    /// Operations with `from <= base_version < to`.
    pub fn get_operations(&self, from: u64, to: Option<u64>) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(move |operation| {
            operation
                .base_version()
                .is_some_and(|version| version >= from && to.map_or(true, |to| version < to))
        })
    }

    pub fn last_operation(&self) -> Option<&Operation> {
        self.operations.last()
    }

    pub(crate) fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }
}

pub struct Document {
    tree: Tree,
    roots: BTreeMap<String, NodeId>,
    version: Observable<u64>,
    history: History,
    selection: DocumentSelection,
    markers: MarkerCollection,
    events: Rc<Emitter<DocumentEvent>>,
    pending: Vec<DocumentEvent>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("roots", &self.roots)
            .field("version", &self.version.get())
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            roots: BTreeMap::new(),
            version: Observable::new(0),
            history: History::default(),
            selection: DocumentSelection::new(),
            markers: MarkerCollection::new(),
            events: Rc::new(Emitter::new()),
            pending: Vec::new(),
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Direct tree access. Changes to document-attached nodes made here
    /// bypass the operation log.
    pub(crate) fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Observe version changes. Listeners run while the document is being
    /// mutated and must not access it.
    pub fn on_version_change(&self, listener: impl FnMut(&quire_common::Changed<u64>) + 'static) -> SubscriptionId {
        self.version.on_change(listener)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &DocumentSelection {
        &self.selection
    }

    pub fn markers(&self) -> &MarkerCollection {
        &self.markers
    }

    pub(crate) fn markers_mut(&mut self) -> &mut MarkerCollection {
        &mut self.markers
    }

    pub fn graveyard(&self) -> NodeId {
        GRAVEYARD
    }

    // ---- roots ---------------------------------------------------------

    /// Create an attached root. Fails when the name is taken.
    pub fn create_root(&mut self, element_name: &str, root_name: &str) -> ModelResult<NodeId> {
        if root_name == GRAVEYARD_NAME || self.roots.contains_key(root_name) {
            return Err(ModelError::new("model-document-createroot-name-exists", "Root with specified name already exists")
                .with_context(json!({ "name": root_name })));
        }
        let root = self.tree.create_root(element_name, root_name);
        self.roots.insert(root_name.to_string(), root);
        Ok(root)
    }

    pub(crate) fn create_detached_root(&mut self, element_name: &str, root_name: &str) -> ModelResult<NodeId> {
        let root = self.create_root(element_name, root_name)?;
        self.tree.set_root_attached(root, false);
        Ok(root)
    }

    /// Root by name; `$graveyard` resolves to the graveyard.
    pub fn get_root(&self, name: &str) -> Option<NodeId> {
        if name == GRAVEYARD_NAME {
            return Some(GRAVEYARD);
        }
        self.roots.get(name).copied()
    }

    pub fn is_root_attached(&self, root: NodeId) -> bool {
        self.tree.root_info(root).is_some_and(|info| info.attached)
    }

    /// Root names, graveyard excluded.
    pub fn get_root_names(&self, include_detached: bool) -> Vec<String> {
        self.roots
            .iter()
            .filter(|(_, root)| include_detached || self.is_root_attached(**root))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// First attached root in name order.
    pub fn first_root(&self) -> Option<NodeId> {
        self.roots.values().copied().find(|root| self.is_root_attached(*root))
    }

    // ---- operations ----------------------------------------------------

    /// Validate and execute `operation`.
    ///
    /// Document operations must carry the current version as their base
    /// version; applying one advances the version, records it in the
    /// history and moves the selection and markers. Returns the operation as
    /// executed.
    pub fn apply_operation(&mut self, mut operation: Operation) -> ModelResult<Operation> {
        let is_document_operation = operation.is_document_operation();
        if is_document_operation && operation.base_version() != Some(self.version()) {
            return Err(ModelError::new("model-document-applyoperation-wrong-version", "Only operations with matching versions can be applied")
                .with_context(json!({
                    "operation": operation.class_name(),
                    "baseVersion": operation.base_version(),
                    "version": self.version(),
                })));
        }

        operation.validate(self)?;
        operation.execute(self)?;

        debug!(
            operation = operation.type_name(),
            base_version = ?operation.base_version(),
            "applied operation"
        );

        if is_document_operation {
            self.history.add_operation(operation.clone());
            self.version.set(self.version() + 1);

            let attributes_before = self.selection.attributes().clone();
            if self.selection.transform(&self.tree, &operation) {
                self.pending.push(DocumentEvent::SelectionChange {
                    ranges: self.selection.ranges().to_vec(),
                    direct: false,
                });
            } else {
                self.selection.refresh_attributes(&self.tree);
            }
            self.queue_attribute_change(attributes_before);
            self.markers.transform(&operation);
        }
        self.queue_marker_updates();
        self.pending.push(DocumentEvent::ApplyOperation {
            operation: operation.clone(),
        });
        Ok(operation)
    }

    // ---- markers -------------------------------------------------------

    /// Set a marker that is not managed by operations.
    pub(crate) fn set_marker(&mut self, name: &str, range: Range, affects_data: bool) {
        self.markers.set(name, range, false, affects_data);
        self.queue_marker_updates();
    }

    pub(crate) fn remove_marker(&mut self, name: &str) {
        self.markers.remove(name);
        self.queue_marker_updates();
    }

    fn queue_marker_updates(&mut self) {
        for update in self.markers.take_updates() {
            self.pending.push(DocumentEvent::MarkerUpdate(update));
        }
    }

    // ---- selection -----------------------------------------------------

    pub(crate) fn set_selection(&mut self, selection: Selection) {
        let attributes_before = self.selection.attributes().clone();
        self.selection.set_to(&self.tree, selection);
        self.pending.push(DocumentEvent::SelectionChange {
            ranges: self.selection.ranges().to_vec(),
            direct: true,
        });
        self.queue_attribute_change(attributes_before);
    }

    pub(crate) fn set_selection_focus(&mut self, position: Position) -> ModelResult<()> {
        let attributes_before = self.selection.attributes().clone();
        self.selection.set_focus(&self.tree, position)?;
        self.pending.push(DocumentEvent::SelectionChange {
            ranges: self.selection.ranges().to_vec(),
            direct: true,
        });
        self.queue_attribute_change(attributes_before);
        Ok(())
    }

    pub(crate) fn set_selection_attribute(&mut self, key: &str, value: serde_json::Value) {
        let attributes_before = self.selection.attributes().clone();
        self.selection.set_attribute(key, value);
        self.queue_attribute_change(attributes_before);
    }

    pub(crate) fn remove_selection_attribute(&mut self, key: &str) {
        let attributes_before = self.selection.attributes().clone();
        self.selection.remove_attribute(key);
        self.queue_attribute_change(attributes_before);
    }

    fn queue_attribute_change(&mut self, before: Attributes) {
        if *self.selection.attributes() != before {
            self.pending.push(DocumentEvent::SelectionAttributes {
                attributes: self.selection.attributes().clone(),
            });
        }
    }

    // ---- events --------------------------------------------------------

    pub fn on(&self, listener: impl FnMut(&DocumentEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn event_bus(&self) -> Rc<Emitter<DocumentEvent>> {
        Rc::clone(&self.events)
    }

    pub(crate) fn queue_event(&mut self, event: DocumentEvent) {
        self.pending.push(event);
    }

    pub(crate) fn take_pending_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Deliver queued events to listeners.
    pub fn flush_events(&mut self) {
        let pending = self.take_pending_events();
        let events = self.event_bus();
        for event in &pending {
            events.fire(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::Value;

    use super::*;
    use crate::operation::{AttributeOperation, DetachOperation, InsertOperation, NoOperation, RootAttributeOperation};
    use crate::position::Position;

    fn document_with_paragraph(text: &str) -> (Document, NodeId) {
        let mut document = Document::new();
        let root = document.create_root("$root", "main").unwrap();
        let tree = document.tree_mut();
        let p = tree.create_element("paragraph", Attributes::new());
        tree.append_child(p, text).unwrap();
        tree.append_child(root, p).unwrap();
        (document, root)
    }

    #[test]
    fn test_apply_and_reverse_restores_state() {
        let (mut document, root) = document_with_paragraph("foo");
        let before = document.tree().to_json(root);
        let range = Range::new(Position::new(document.tree(), root, vec![0, 0]).unwrap(), Position::new(document.tree(), root, vec![0, 2]).unwrap());

        let operation = Operation::Attribute(AttributeOperation::new(range, "bold", None, Some(Value::Bool(true)), Some(0)));
        let applied = document.apply_operation(operation).unwrap();
        assert_ne!(document.tree().to_json(root), before);

        document.apply_operation(applied.get_reversed()).unwrap();

        assert_eq!(document.tree().to_json(root), before);
        assert_eq!(document.version(), 2);
        assert_eq!(document.history().operations().len(), 2);
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let (mut document, _) = document_with_paragraph("foo");
        let err = document.apply_operation(Operation::NoOperation(NoOperation::new(Some(3)))).unwrap_err();
        assert!(err.is("model-document-applyoperation-wrong-version"));
        assert_eq!(document.version(), 0);
    }

    #[test]
    fn test_insert_then_reverse_moves_to_graveyard() {
        let (mut document, root) = document_with_paragraph("fr");
        let text = document.tree_mut().create_text("oo", Attributes::new());
        let position = Position::new(document.tree(), root, vec![0, 1]).unwrap();
        let insert = InsertOperation::new(document.tree(), position, vec![text], Some(0));

        let applied = document.apply_operation(Operation::Insert(insert)).unwrap();
        let p = document.tree().child(root, 0).unwrap();
        assert_eq!(document.tree().data(document.tree().child(p, 0).unwrap()), Some("foor"));

        document.apply_operation(applied.get_reversed()).unwrap();
        assert_eq!(document.tree().data(document.tree().child(p, 0).unwrap()), Some("fr"));
        assert_eq!(document.tree().max_offset(GRAVEYARD), 2);
    }

    #[test]
    fn test_root_attribute_json_round_trip() {
        let (mut document, root) = document_with_paragraph("");
        let operation = Operation::RootAttribute(RootAttributeOperation::new(root, "lang", None, Some(Value::from("pl")), Some(0)));

        let json = operation.to_json_value(document.tree()).unwrap();
        assert_eq!(json["__className"], "RootAttributeOperation");
        assert_eq!(json["root"], "main");

        let restored = Operation::from_json(&json, &mut document).unwrap();
        assert_eq!(restored, operation);

        let mut missing = json.clone();
        missing["root"] = Value::from("nope");
        let err = Operation::from_json(&missing, &mut document).unwrap_err();
        assert!(err.is("rootattribute-operation-fromjson-no-root"));
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let mut document = Document::new();
        let err = Operation::from_json(&json!({ "__className": "FooOperation" }), &mut document).unwrap_err();
        assert!(err.is("model-operation-fromjson-unknown-class"));
    }

    #[test]
    fn test_detach_on_fragment() {
        let mut document = Document::new();
        let tree = document.tree_mut();
        let fragment = tree.create_fragment();
        let a = tree.create_element("paragraph", Attributes::new());
        let b = tree.create_element("paragraph", Attributes::new());
        tree.append_child(fragment, vec![a, b]).unwrap();

        let position = Position::create_at(document.tree(), fragment, 0).unwrap();
        let detach = DetachOperation::new(position, 1);
        assert_eq!(detach.affected_selectable(document.tree()), None);
        assert!(!detach.is_document_operation());

        document.apply_operation(Operation::Detach(detach)).unwrap();

        assert_eq!(document.tree().child_count(fragment), 1);
        assert_eq!(document.tree().parent(a), None);
        assert_eq!(document.version(), 0);
    }

    #[test]
    fn test_detach_on_document_node_fails() {
        let (mut document, root) = document_with_paragraph("x");
        let position = Position::create_at(document.tree(), root, 0).unwrap();
        let err = document.apply_operation(Operation::Detach(DetachOperation::new(position, 1))).unwrap_err();
        assert!(err.is("detach-operation-on-document-node"));
    }

    #[test]
    fn test_events_are_queued_until_flushed() {
        let (mut document, _) = document_with_paragraph("x");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        document.on(move |event| {
            if let DocumentEvent::ApplyOperation { operation } = event {
                sink.borrow_mut().push(operation.type_name());
            }
        });

        document.apply_operation(Operation::NoOperation(NoOperation::new(Some(0)))).unwrap();
        assert!(seen.borrow().is_empty());

        document.flush_events();
        assert_eq!(*seen.borrow(), vec!["noop"]);
    }

    #[test]
    fn test_create_root_rejects_duplicates() {
        let mut document = Document::new();
        document.create_root("$root", "main").unwrap();
        assert!(document.create_root("$root", "main").unwrap_err().is("model-document-createroot-name-exists"));
        assert!(document.create_root("$root", GRAVEYARD_NAME).is_err());
        assert_eq!(document.get_root(GRAVEYARD_NAME), Some(GRAVEYARD));
        assert_eq!(document.get_root_names(false), vec!["main".to_string()]);
    }
}
