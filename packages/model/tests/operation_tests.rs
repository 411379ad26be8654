//! Operation round trips through documents and models.

use quire_model::dev_utils::{get_data, set_data};
use quire_model::operation::RootAttributeOperation;
use quire_model::{
    Attributes, Direction, Document, MarkerOptions, Model, ModelResult, Operation, OperationBehavior, Range, TreeWalker, TreeWalkerOptions,
    Writer,
};
use serde_json::json;

#[test]
fn test_reversed_operation_restores_content() {
    let model = Model::new();
    set_data(&model, None, "<paragraph>foo</paragraph>").unwrap();
    let version = model.document().version();
    let root = model.document().get_root("main").unwrap();
    let paragraph = model.document().tree().child(root, 0).unwrap();

    let batch = model
        .change(|writer| {
            writer.insert_text("bar", Attributes::new(), &writer.create_position_at(paragraph, 3)?)?;
            Ok(writer.batch())
        })
        .unwrap();
    assert_eq!(get_data(&model, None, false).unwrap(), "<paragraph>foobar</paragraph>");

    let operation = batch.borrow().operations()[0].clone();
    assert_eq!(operation.base_version(), Some(version));
    model.apply_operation(operation.get_reversed()).unwrap();

    assert_eq!(get_data(&model, None, false).unwrap(), "<paragraph>foo</paragraph>");
    assert_eq!(model.document().version(), version + 2);
    assert_eq!(model.document().history().operations().len() as u64, version + 2);
}

/// Applies `edit` as a single operation, then its reverse, and checks that
/// `observe` sees the original state again two versions later.
fn assert_reverses(data: &str, edit: impl FnOnce(&Writer<'_>) -> ModelResult<()>, observe: impl Fn(&Model) -> String) {
    let model = Model::new();
    set_data(&model, None, data).unwrap();
    let version = model.document().version();
    let before = observe(&model);

    let batch = model
        .change(|writer| {
            edit(writer)?;
            Ok(writer.batch())
        })
        .unwrap();
    let operations = batch.borrow().operations().to_vec();
    assert_eq!(operations.len(), 1, "{operations:?}");
    assert_ne!(observe(&model), before);

    model.apply_operation(operations[0].get_reversed()).unwrap();

    assert_eq!(observe(&model), before);
    assert_eq!(model.document().version(), version + 2);
}

fn content(model: &Model) -> String {
    get_data(model, None, false).unwrap()
}

#[test]
fn test_merge_is_reversible() {
    assert_reverses(
        "<paragraph>foo</paragraph><paragraph>bar</paragraph>",
        |writer| {
            let root = writer.model().document().get_root("main").unwrap();
            writer.merge(&writer.create_position_at(root, 1)?)
        },
        content,
    );
}

#[test]
fn test_split_is_reversible() {
    assert_reverses(
        "<paragraph>foobar</paragraph>",
        |writer| {
            let root = writer.model().document().get_root("main").unwrap();
            let paragraph = writer.model().document().tree().child(root, 0).unwrap();
            writer.split(&writer.create_position_at(paragraph, 3)?, None).map(|_| ())
        },
        content,
    );
}

#[test]
fn test_move_is_reversible() {
    assert_reverses(
        "<paragraph>ab</paragraph><paragraph>cd</paragraph>",
        |writer| {
            let root = writer.model().document().get_root("main").unwrap();
            let second = writer.model().document().tree().child(root, 1).unwrap();
            writer.move_range(&writer.create_range_on(second)?, &writer.create_position_at(root, 0)?)
        },
        content,
    );
}

#[test]
fn test_rename_is_reversible() {
    assert_reverses(
        "<paragraph>foo</paragraph>",
        |writer| {
            let root = writer.model().document().get_root("main").unwrap();
            let paragraph = writer.model().document().tree().child(root, 0).unwrap();
            writer.rename(paragraph, "heading")
        },
        content,
    );
}

#[test]
fn test_marker_is_reversible() {
    assert_reverses(
        "<paragraph>foo</paragraph>",
        |writer| {
            let root = writer.model().document().get_root("main").unwrap();
            writer.add_marker("comment", MarkerOptions {
                range: writer.create_range_in(root)?,
                using_operation: true,
                affects_data: false,
            })
        },
        |model| model.document().markers().has("comment").to_string(),
    );
}

#[test]
fn test_root_is_reversible() {
    assert_reverses(
        "<paragraph>foo</paragraph>",
        |writer| writer.add_root("sidebar", "$root").map(|_| ()),
        |model| {
            let document = model.document();
            document.get_root("sidebar").is_some_and(|root| document.is_root_attached(root)).to_string()
        },
    );
}

#[test]
fn test_operation_log_replays_into_another_model() {
    let source = Model::new();
    let replica = Model::new();
    set_data(&source, None, "<paragraph>foo</paragraph>").unwrap();
    set_data(&replica, None, "<paragraph>foo</paragraph>").unwrap();

    let last_operation_json = |writer: &Writer<'_>| {
        let document = writer.model().document();
        let operation = document.history().operations().last().unwrap();
        operation.to_json_value(document.tree()).unwrap()
    };
    let log = source
        .change(|writer| {
            let root = writer.model().document().get_root("main").unwrap();
            let paragraph = writer.model().document().tree().child(root, 0).unwrap();
            writer.insert_text("bar", Attributes::new(), &writer.create_position_at(paragraph, 3)?)?;
            let inserted = last_operation_json(writer);
            writer.set_attribute("lang", json!("en"), paragraph)?;
            Ok(vec![inserted, last_operation_json(writer)])
        })
        .unwrap();

    for value in &log {
        let operation = replica.operation_from_json(value).unwrap();
        assert_eq!(&operation.to_json_value(replica.document().tree()).unwrap(), value);
        replica.apply_operation(operation).unwrap();
    }

    assert_eq!(content(&replica), content(&source));
    assert_eq!(replica.document().version(), source.document().version());
}

#[test]
fn test_operation_with_stale_version_is_rejected() {
    let model = Model::new();
    set_data(&model, None, "<paragraph>foo</paragraph>").unwrap();
    let root = model.document().get_root("main").unwrap();

    let stale = RootAttributeOperation::new(root, "lang", None, Some(json!("en")), Some(model.document().version() + 5));
    let err = model.apply_operation(Operation::RootAttribute(stale)).unwrap_err();

    assert_eq!(err.code, "model-document-applyoperation-wrong-version");
}

#[test]
fn test_root_attribute_json_round_trip() {
    let mut document = Document::new();
    let root = document.create_root("$root", "main").unwrap();

    let operation = RootAttributeOperation::new(root, "lang", None, Some(json!("en")), Some(0));
    let applied = document.apply_operation(Operation::RootAttribute(operation)).unwrap();
    assert_eq!(document.tree().get_attribute(root, "lang"), Some(&json!("en")));
    assert_eq!(applied.type_name(), "addRootAttribute");

    let value = applied.to_json_value(document.tree()).unwrap();
    assert_eq!(value["__className"], json!("RootAttributeOperation"));
    assert_eq!(value["root"], json!("main"));

    let restored = Operation::from_json(&value, &mut document).unwrap();
    assert_eq!(restored, applied);

    let mut unknown = value.clone();
    unknown["root"] = json!("sidebar");
    let err = Operation::from_json(&unknown, &mut document).unwrap_err();
    assert_eq!(err.code, "rootattribute-operation-fromjson-no-root");
}

#[test]
fn test_unknown_operation_class_is_rejected() {
    let mut document = Document::new();
    let err = Operation::from_json(&json!({ "__className": "TeleportOperation" }), &mut document).unwrap_err();
    assert_eq!(err.code, "model-operation-fromjson-unknown-class");
}

#[test]
fn test_remove_on_fragment_detaches_without_version() {
    let model = Model::new();
    let version = model.document().version();

    let (fragment, batch) = model
        .change(|writer| {
            let fragment = writer.create_document_fragment()?;
            writer.insert_text("abc", Attributes::new(), &writer.create_position_at(fragment, 0)?)?;
            let start = writer.create_position_at(fragment, 0)?;
            writer.remove(Range::from_position_and_shift(&start, 1))?;
            Ok((fragment, writer.batch()))
        })
        .unwrap();

    let batch = batch.borrow();
    assert!(matches!(batch.operations().last(), Some(Operation::Detach(_))));
    assert!(!batch.has_document_operations());
    assert_eq!(model.document().version(), version);

    let document = model.document();
    let tree = document.tree();
    let text = tree.child(fragment, 0).unwrap();
    assert_eq!(tree.data(text), Some("bc"));
}

#[test]
fn test_backward_walk_mirrors_forward_walk() {
    let model = Model::new();
    set_data(&model, None, r#"<paragraph>ab<$text bold="true">c</$text></paragraph><paragraph></paragraph>"#).unwrap();
    let document = model.document();
    let tree = document.tree();
    let root = document.get_root("main").unwrap();
    let range = Range::in_element(tree, root).unwrap();

    let walk = |direction| {
        TreeWalker::new(tree, TreeWalkerOptions {
            direction,
            boundaries: Some(range.clone()),
            ..TreeWalkerOptions::default()
        })
        .unwrap()
        .map(|value| (value.kind, value.item))
        .collect::<Vec<_>>()
    };

    let forward = walk(Direction::Forward);
    let backward = walk(Direction::Backward).into_iter().rev().collect::<Vec<_>>();

    assert_eq!(forward.len(), 6);
    assert_eq!(forward, backward);
}
