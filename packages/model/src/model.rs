//! # Model
//!
//! Transaction coordinator. Every mutation runs inside a change block:
//!
//! ```text
//! change(f) ──► BeforeChanges ──► block(f) ──► queued blocks ──► AfterChanges
//!                                   │
//!                                   ├─ writer calls → operations → Document
//!                                   ├─ post-fixers until none reports a fix
//!                                   └─ DocumentEvent::Change (if anything changed)
//! ```
//!
//! A `change` called from inside a block reuses the enclosing writer, so the
//! nested edits land in the same batch. `enqueue_change` called while blocks
//! are running is deferred (FIFO) until the current block finishes; blocks
//! queued while the queue is flushed still run before the outermost call
//! returns.
//!
//! The model owns the document behind a `RefCell`. Writer calls hold a
//! borrow only for the duration of one operation, and document events are
//! delivered after that borrow is released, so listeners can read the
//! document (or start a nested change) freely.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;

use quire_common::{Emitter, ModelError, ModelResult, SubscriptionId};
use serde_json::json;
use tracing::{trace, warn};

use crate::batch::{Batch, BatchType};
use crate::config::ModelConfig;
use crate::content::{
    self, ContentScope, DeleteContentOptions, HasContentOptions, InsertObjectOptions, ModifySelectionOptions, SelectionTarget,
};
use crate::document::{Document, DocumentEvent};
use crate::node::{NodeId, NodeInput};
use crate::operation::Operation;
use crate::position::{Position, PositionOffset};
use crate::range::Range;
use crate::schema::{Schema, SchemaItemDefinition, BLOCK, ROOT};
use crate::selection::{Selectable, Selection};
use crate::tree::GRAVEYARD_NAME;
use crate::writer::Writer;

/// Events fired around change blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    /// Before the first block of an outermost `change` / `enqueue_change`.
    BeforeChanges,
    /// After the last block, also when a block failed.
    AfterChanges,
}

type ChangeCallback = Box<dyn FnOnce(&Writer<'_>) -> ModelResult<()>>;

/// A post-fixer returns `true` when it changed the document.
pub type PostFixer = Rc<dyn Fn(&Writer<'_>) -> ModelResult<bool>>;

struct PendingChange {
    batch: Rc<RefCell<Batch>>,
    callback: ChangeCallback,
}

pub struct Model {
    document: RefCell<Document>,
    schema: RefCell<Schema>,
    config: ModelConfig,
    running: Cell<bool>,
    current: RefCell<Option<Rc<RefCell<Batch>>>>,
    queue: RefCell<VecDeque<PendingChange>>,
    events: Emitter<ModelEvent>,
    post_fixers: RefCell<Vec<PostFixer>>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("config", &self.config)
            .field("running", &self.running.get())
            .field("queued", &self.queue.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the coordinator as running for the lifetime of an outermost
/// change. Dropping it (also while unwinding) clears the queue and fires
/// `AfterChanges`.
struct ChangeGuard<'m> {
    model: &'m Model,
}

impl<'m> ChangeGuard<'m> {
    fn start(model: &'m Model) -> Self {
        let guard = Self { model };
        model.running.set(true);
        trace!("change blocks started");
        model.events.fire(&ModelEvent::BeforeChanges);
        guard
    }
}

impl Drop for ChangeGuard<'_> {
    fn drop(&mut self) {
        let model = self.model;
        if let Ok(mut queue) = model.queue.try_borrow_mut() {
            queue.clear();
        }
        if let Ok(mut current) = model.current.try_borrow_mut() {
            *current = None;
        }
        model.running.set(false);
        trace!("change blocks finished");
        model.events.fire(&ModelEvent::AfterChanges);
    }
}

impl Model {
    pub fn new() -> Self {
        Self::build(ModelConfig::default())
    }

    /// Create a model from `config`.
    pub fn with_config(config: ModelConfig) -> ModelResult<Self> {
        if config.default_root_name == GRAVEYARD_NAME {
            return Err(ModelError::new("model-document-createroot-name-exists", "Root with specified name already exists")
                .with_context(json!({ "name": config.default_root_name })));
        }
        Ok(Self::build(config))
    }

    fn build(config: ModelConfig) -> Self {
        let mut document = Document::new();
        if let Err(error) = document.create_root(ROOT, &config.default_root_name) {
            warn!(code = error.code(), "default root was not created");
        }
        let mut schema = Schema::new();
        if !schema.is_registered(&config.paragraph_like_element) {
            schema.register(config.paragraph_like_element.clone(), SchemaItemDefinition::inheriting(BLOCK));
        }
        Self {
            document: RefCell::new(document),
            schema: RefCell::new(schema),
            config,
            running: Cell::new(false),
            current: RefCell::new(None),
            queue: RefCell::new(VecDeque::new()),
            events: Emitter::new(),
            post_fixers: RefCell::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Read access to the document. Must not be held across writer calls.
    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub(crate) fn document_mut(&self) -> ModelResult<RefMut<'_, Document>> {
        self.document
            .try_borrow_mut()
            .map_err(|_| ModelError::new("model-document-locked", "The document is borrowed and cannot be changed right now"))
    }

    pub fn schema(&self) -> Ref<'_, Schema> {
        self.schema.borrow()
    }

    pub fn schema_mut(&self) -> RefMut<'_, Schema> {
        self.schema.borrow_mut()
    }

    pub fn on(&self, listener: impl FnMut(&ModelEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Register a callback run after every change block that modified the
    /// document.
    pub fn register_post_fixer(&self, fixer: impl Fn(&Writer<'_>) -> ModelResult<bool> + 'static) {
        self.post_fixers.borrow_mut().push(Rc::new(fixer));
    }

    // ---- change blocks -------------------------------------------------

    /// Run `callback` with a writer and return its value.
    ///
    /// Inside another block the enclosing batch is reused. Errors propagate
    /// unchanged; pending enqueued changes are dropped when a block fails.
    pub fn change<R>(&self, callback: impl FnOnce(&Writer<'_>) -> ModelResult<R>) -> ModelResult<R> {
        if let Some(batch) = self.current_batch() {
            return callback(&Writer::new(self, batch));
        }
        if self.running.get() {
            return self.run_block(self.create_batch(BatchType::default()), callback);
        }

        let _guard = ChangeGuard::start(self);
        let value = self.run_block(self.create_batch(BatchType::default()), callback)?;
        self.flush_queue()?;
        Ok(value)
    }

    /// Run `callback` in a new batch of `batch_type`, after the current
    /// block if one is running.
    pub fn enqueue_change(&self, batch_type: BatchType, callback: impl FnOnce(&Writer<'_>) -> ModelResult<()> + 'static) -> ModelResult<()> {
        self.enqueue_change_in(self.create_batch(batch_type), callback)
    }

    /// Like [`enqueue_change`](Self::enqueue_change) with an existing batch.
    pub fn enqueue_change_in(&self, batch: Rc<RefCell<Batch>>, callback: impl FnOnce(&Writer<'_>) -> ModelResult<()> + 'static) -> ModelResult<()> {
        if self.running.get() {
            trace!(queued = self.queue.borrow().len() + 1, "change enqueued");
            self.queue.borrow_mut().push_back(PendingChange {
                batch,
                callback: Box::new(callback),
            });
            return Ok(());
        }

        let _guard = ChangeGuard::start(self);
        self.run_block(batch, callback)?;
        self.flush_queue()
    }

    pub fn is_changing(&self) -> bool {
        self.running.get()
    }

    fn current_batch(&self) -> Option<Rc<RefCell<Batch>>> {
        self.current.borrow().clone()
    }

    fn flush_queue(&self) -> ModelResult<()> {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(PendingChange { batch, callback }) = next else {
                return Ok(());
            };
            self.run_block(batch, callback)?;
        }
    }

    fn run_block<R>(&self, batch: Rc<RefCell<Batch>>, callback: impl FnOnce(&Writer<'_>) -> ModelResult<R>) -> ModelResult<R> {
        let previous = self.current.replace(Some(Rc::clone(&batch)));
        let writer = Writer::new(self, batch);
        let result = callback(&writer).and_then(|value| {
            self.finish_block(&writer)?;
            Ok(value)
        });
        self.current.replace(previous);
        result
    }

    /// Run post-fixers and announce the block when the document changed.
    fn finish_block(&self, writer: &Writer<'_>) -> ModelResult<()> {
        if !writer.batch().borrow().has_document_operations() {
            return Ok(());
        }

        loop {
            let fixers: Vec<PostFixer> = self.post_fixers.borrow().clone();
            let mut fixed = false;
            for fixer in fixers {
                if fixer(writer)? {
                    trace!("post-fixer changed the document");
                    fixed = true;
                    break;
                }
            }
            if !fixed {
                break;
            }
        }

        let batch = writer.batch().borrow().clone();
        self.document_mut()?.queue_event(DocumentEvent::Change { batch });
        self.flush_document_events();
        Ok(())
    }

    // ---- document plumbing used by the writer --------------------------

    pub(crate) fn apply_in_batch(&self, operation: Operation, batch: &Rc<RefCell<Batch>>) -> ModelResult<Operation> {
        let applied = self.document_mut()?.apply_operation(operation)?;
        batch.borrow_mut().add_operation(applied.clone());
        self.flush_document_events();
        Ok(applied)
    }

    /// Deliver queued document events once the document is not borrowed.
    pub(crate) fn flush_document_events(&self) {
        let (events, bus) = match self.document.try_borrow_mut() {
            Ok(mut document) => (document.take_pending_events(), document.event_bus()),
            Err(_) => return,
        };
        for event in &events {
            bus.fire(event);
        }
    }

    pub(crate) fn set_marker_directly(&self, name: &str, range: Range, affects_data: bool) -> ModelResult<()> {
        self.document_mut()?.set_marker(name, range, affects_data);
        self.flush_document_events();
        Ok(())
    }

    pub(crate) fn remove_marker_directly(&self, name: &str) -> ModelResult<()> {
        self.document_mut()?.remove_marker(name);
        self.flush_document_events();
        Ok(())
    }

    /// Apply an operation outside any batch.
    pub fn apply_operation(&self, operation: Operation) -> ModelResult<Operation> {
        let applied = self.document_mut()?.apply_operation(operation)?;
        self.flush_document_events();
        Ok(applied)
    }

    /// Rebuild an operation from its JSON form against this model's document,
    /// so a persisted operation log can be replayed with `apply_operation`.
    pub fn operation_from_json(&self, value: &serde_json::Value) -> ModelResult<Operation> {
        let mut document = self.document_mut()?;
        Operation::from_json(value, &mut document)
    }

    // ---- factories -----------------------------------------------------

    pub fn create_batch(&self, batch_type: BatchType) -> Rc<RefCell<Batch>> {
        Rc::new(RefCell::new(Batch::new(batch_type)))
    }

    pub fn create_position_at(&self, node: NodeId, offset: impl Into<PositionOffset>) -> ModelResult<Position> {
        Position::create_at(self.document().tree(), node, offset)
    }

    pub fn create_position_before(&self, node: NodeId) -> ModelResult<Position> {
        Position::before(self.document().tree(), node)
    }

    pub fn create_position_after(&self, node: NodeId) -> ModelResult<Position> {
        Position::after(self.document().tree(), node)
    }

    pub fn create_range(&self, start: Position, end: Option<Position>) -> Range {
        match end {
            Some(end) => Range::new(start, end),
            None => Range::collapsed(start),
        }
    }

    pub fn create_range_in(&self, element: NodeId) -> ModelResult<Range> {
        Range::in_element(self.document().tree(), element)
    }

    pub fn create_range_on(&self, node: NodeId) -> ModelResult<Range> {
        Range::on(self.document().tree(), node)
    }

    pub fn create_selection(&self, selectable: impl Into<Selectable>, backward: bool) -> ModelResult<Selection> {
        Selection::new(self.document().tree(), selectable, backward)
    }

    // ---- content -------------------------------------------------------

    /// Whether the element or range holds meaningful content.
    pub fn has_content(&self, scope: impl Into<ContentScope>, options: HasContentOptions) -> bool {
        let ignore_whitespaces = options.ignore_whitespaces.unwrap_or(self.config.trim_whitespace_in_has_content);
        let document = self.document();
        content::has_content(&document, &self.schema(), &scope.into(), ignore_whitespaces, options.ignore_markers)
    }

    /// Insert `content` at the target selection and return the affected range.
    pub fn insert_content(&self, content: impl Into<NodeInput>, target: SelectionTarget<'_>) -> ModelResult<Range> {
        let content = content.into();
        self.change(|writer| content::insert_content(writer, content, target))
    }

    /// Insert an object element, splitting ancestors that do not allow it.
    pub fn insert_object(&self, element: NodeId, target: SelectionTarget<'_>, options: InsertObjectOptions) -> ModelResult<Range> {
        self.change(|writer| content::insert_object(writer, element, target, options))
    }

    pub fn delete_content(&self, target: SelectionTarget<'_>, options: DeleteContentOptions) -> ModelResult<()> {
        self.change(|writer| content::delete_content(writer, target, options))
    }

    /// Copy of the selected content as a new document fragment.
    pub fn get_selected_content(&self, selection: &Selection) -> ModelResult<NodeId> {
        self.change(|writer| content::get_selected_content(writer, selection))
    }

    pub fn modify_selection(&self, target: SelectionTarget<'_>, options: ModifySelectionOptions) -> ModelResult<()> {
        self.change(|writer| content::modify_selection(writer, target, options))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::node::Attributes;

    fn main_root(model: &Model) -> NodeId {
        model.document().get_root("main").unwrap()
    }

    #[test]
    fn test_nested_change_shares_batch() {
        let model = Model::new();
        let root = main_root(&model);
        let batches = model
            .change(|outer| {
                let position = outer.create_position_at(root, 0)?;
                outer.insert_element("paragraph", Attributes::new(), &position)?;
                let inner = model.change(|inner| Ok(inner.batch()))?;
                Ok((outer.batch(), inner))
            })
            .unwrap();
        assert!(Rc::ptr_eq(&batches.0, &batches.1));
        assert_eq!(batches.0.borrow().operations().len(), 1);
    }

    #[test]
    fn test_enqueued_change_runs_after_block() {
        let model = Model::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer_log = Rc::clone(&log);
        model
            .change(|_| {
                outer_log.borrow_mut().push("a");
                let queued_log = Rc::clone(&outer_log);
                model.enqueue_change(BatchType::default(), move |_| {
                    queued_log.borrow_mut().push("c");
                    Ok(())
                })?;
                outer_log.borrow_mut().push("b");
                Ok(())
            })
            .unwrap();

        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_changes_enqueued_while_flushing_run_before_return() {
        let model = Model::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer_log = Rc::clone(&log);
        model
            .change(|writer| {
                outer_log.borrow_mut().push("a");
                let queued_log = Rc::clone(&outer_log);
                writer.model().enqueue_change(BatchType::default(), move |writer| {
                    queued_log.borrow_mut().push("c");
                    let nested_log = Rc::clone(&queued_log);
                    writer.model().enqueue_change(BatchType::default(), move |_| {
                        nested_log.borrow_mut().push("e");
                        Ok(())
                    })?;
                    queued_log.borrow_mut().push("d");
                    Ok(())
                })?;
                outer_log.borrow_mut().push("b");
                Ok(())
            })
            .unwrap();
        log.borrow_mut().push("done");

        assert_eq!(*log.borrow(), vec!["a", "b", "c", "d", "e", "done"]);
        assert!(!model.is_changing());
    }

    #[test]
    fn test_after_changes_fires_when_block_fails() {
        let model = Model::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        model.on(move |event| sink.borrow_mut().push(*event));

        let error = model
            .change(|_| -> ModelResult<()> { Err(ModelError::new("custom-failure", "boom")) })
            .unwrap_err();

        assert!(error.is("custom-failure"));
        assert_eq!(*events.borrow(), vec![ModelEvent::BeforeChanges, ModelEvent::AfterChanges]);
    }

    #[test]
    fn test_after_changes_fires_once() {
        let model = Model::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        model.on(move |event| sink.borrow_mut().push(*event));

        model
            .change(|_| {
                model.change(|_| Ok(()))?;
                model.enqueue_change(BatchType::default(), |_| Ok(()))
            })
            .unwrap();

        assert_eq!(*events.borrow(), vec![ModelEvent::BeforeChanges, ModelEvent::AfterChanges]);
    }

    #[test]
    fn test_failure_is_not_sticky() {
        let model = Model::new();
        let error = model
            .change(|_| -> ModelResult<()> {
                model.enqueue_change(BatchType::default(), |_| panic!("dropped with the failed block"))?;
                Err(ModelError::new("custom-failure", "boom"))
            })
            .unwrap_err();
        assert!(error.is("custom-failure"));
        assert!(!model.is_changing());

        let root = main_root(&model);
        model
            .change(|writer| {
                let position = writer.create_position_at(root, 0)?;
                writer.insert_element("paragraph", Attributes::new(), &position)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(model.document().version(), 1);
    }

    #[test]
    fn test_post_fixer_runs_until_stable() {
        let model = Model::new();
        let root = main_root(&model);
        model.register_post_fixer(move |writer| {
            let empty = writer.model().document().tree().is_empty(root);
            if empty {
                let position = writer.create_position_at(root, 0)?;
                writer.insert_element("paragraph", Attributes::new(), &position)?;
                return Ok(true);
            }
            Ok(false)
        });

        model
            .change(|writer| {
                writer.set_attribute("lang", json!("en"), root)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(model.document().tree().child_count(root), 1);
    }

    #[test]
    fn test_change_event_carries_batch() {
        let model = Model::new();
        let root = main_root(&model);
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        model.document().on(move |event| {
            if let DocumentEvent::Change { batch } = event {
                *sink.borrow_mut() += batch.operations().len();
            }
        });

        model.change(|_| Ok(())).unwrap();
        assert_eq!(*seen.borrow(), 0);

        model
            .change(|writer| {
                let position = writer.create_position_at(root, 0)?;
                writer.insert_text("foo", Attributes::new(), &position)
            })
            .unwrap();
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_with_config_rejects_graveyard_name() {
        let config = ModelConfig {
            default_root_name: "$graveyard".to_string(),
            ..ModelConfig::default()
        };
        assert!(Model::with_config(config).unwrap_err().is("model-document-createroot-name-exists"));
    }
}
