//! Editing helpers driven through the model, checked in dev notation.

use quire_model::dev_utils::{get_data, set_data, stringify};
use quire_model::schema::{BLOCK, TEXT};
use quire_model::{
    Attributes, DeleteContentOptions, Direction, HasContentOptions, MarkerOptions, Model, ModelConfig, ModifySelectionOptions, NodeId, Range, SchemaItemDefinition,
    Selection, SelectionTarget, SelectionUnit,
};
use serde_json::json;

fn model_with(data: &str) -> Model {
    let model = Model::new();
    model.schema_mut().register("image", SchemaItemDefinition {
        allow_where: Some(BLOCK.into()),
        is_object: true,
        ..Default::default()
    });
    set_data(&model, None, data).unwrap();
    model
}

fn data(model: &Model) -> String {
    get_data(model, None, true).unwrap()
}

fn main_root(model: &Model) -> NodeId {
    model.document().get_root("main").unwrap()
}

#[test]
fn test_insert_text_at_collapsed_selection() {
    let model = model_with("<paragraph>fo[]ar</paragraph>");

    let affected = model.insert_content("ob", SelectionTarget::Document).unwrap();

    assert_eq!(data(&model), "<paragraph>foob[]ar</paragraph>");
    let root = main_root(&model);
    let shown = Selection::new(model.document().tree(), affected, false).unwrap();
    assert_eq!(stringify(model.document().tree(), root, Some(&shown)), "<paragraph>fo[ob]ar</paragraph>");
}

#[test]
fn test_insert_text_replaces_selected_content() {
    let model = model_with("<paragraph>f[oo</paragraph><paragraph>ba]r</paragraph>");

    model.insert_content("xyz", SelectionTarget::Document).unwrap();

    assert_eq!(data(&model), "<paragraph>fxyz[]r</paragraph>");
}

#[test]
fn test_insert_content_drops_disallowed_attributes() {
    let model = model_with("<paragraph>fo[]ar</paragraph>");
    model.schema_mut().extend(TEXT, |definition| definition.allow_attributes.push("bold".into()));
    let text = model
        .change(|writer| {
            let mut attributes = Attributes::new();
            attributes.insert("bold".into(), json!(true));
            attributes.insert("italic".into(), json!(true));
            writer.create_text("ob", attributes)
        })
        .unwrap();

    model.insert_content(text, SelectionTarget::Document).unwrap();

    assert_eq!(get_data(&model, None, false).unwrap(), r#"<paragraph>fo<$text bold="true">ob</$text>ar</paragraph>"#);
}

#[test]
fn test_insert_content_into_standalone_selection() {
    let model = model_with("<paragraph>[]foo</paragraph>");
    let root = main_root(&model);
    let paragraph = model.document().tree().child(root, 0).unwrap();
    let mut selection = Selection::collapsed_at(model.create_position_at(paragraph, 3).unwrap());

    model.insert_content("!", SelectionTarget::Selection(&mut selection)).unwrap();

    // The document selection moves with the content but is not replaced.
    assert_eq!(data(&model), "<paragraph>[]foo!</paragraph>");
    assert_eq!(selection.first_position().unwrap().path, vec![0, 4]);
}

#[test]
fn test_delete_content_merges_blocks() {
    let model = model_with("<paragraph>fo[o</paragraph><paragraph>ba]r</paragraph>");

    model.delete_content(SelectionTarget::Document, DeleteContentOptions::default()).unwrap();

    assert_eq!(data(&model), "<paragraph>fo[]r</paragraph>");
}

#[test]
fn test_delete_content_leave_unmerged() {
    let model = model_with("<paragraph>fo[o</paragraph><paragraph>ba]r</paragraph>");

    model
        .delete_content(SelectionTarget::Document, DeleteContentOptions {
            leave_unmerged: true,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(data(&model), "<paragraph>fo[]</paragraph><paragraph>r</paragraph>");
}

#[test]
fn test_delete_entire_content_leaves_paragraph() {
    let model = model_with("<paragraph>[foo</paragraph><paragraph>bar]</paragraph>");

    model.delete_content(SelectionTarget::Document, DeleteContentOptions::default()).unwrap();

    assert_eq!(data(&model), "<paragraph>[]</paragraph>");
}

#[test]
fn test_delete_collapsed_selection_is_noop() {
    let model = model_with("<paragraph>fo[]o</paragraph>");
    let version = model.document().version();

    model.delete_content(SelectionTarget::Document, DeleteContentOptions::default()).unwrap();

    assert_eq!(model.document().version(), version);
    assert_eq!(data(&model), "<paragraph>fo[]o</paragraph>");
}

#[test]
fn test_get_selected_content_flat() {
    let model = model_with("<paragraph>f[oo]</paragraph>");
    let selection = model.document().selection().as_selection().clone();

    let fragment = model.get_selected_content(&selection).unwrap();

    assert_eq!(stringify(model.document().tree(), fragment, None), "oo");
    assert_eq!(data(&model), "<paragraph>f[oo]</paragraph>");
}

#[test]
fn test_get_selected_content_across_blocks() {
    let model = model_with("<paragraph>f[oo</paragraph><paragraph>ba]r</paragraph>");
    let selection = model.document().selection().as_selection().clone();

    let fragment = model.get_selected_content(&selection).unwrap();

    assert_eq!(stringify(model.document().tree(), fragment, None), "<paragraph>oo</paragraph><paragraph>ba</paragraph>");
}

#[test]
fn test_modify_selection_by_character() {
    let model = model_with("<paragraph>fo[]o</paragraph>");

    model.modify_selection(SelectionTarget::Document, ModifySelectionOptions::default()).unwrap();

    assert_eq!(data(&model), "<paragraph>fo[o]</paragraph>");
}

#[test]
fn test_modify_selection_crosses_block_boundary() {
    let model = model_with("<paragraph>foo[]</paragraph><paragraph>bar</paragraph>");

    model.modify_selection(SelectionTarget::Document, ModifySelectionOptions::default()).unwrap();

    assert_eq!(data(&model), "<paragraph>foo[</paragraph><paragraph>]bar</paragraph>");
}

#[test]
fn test_modify_selection_by_word() {
    let model = model_with("<paragraph>[]foo bar</paragraph>");

    model
        .modify_selection(SelectionTarget::Document, ModifySelectionOptions {
            unit: SelectionUnit::Word,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(data(&model), "<paragraph>[foo] bar</paragraph>");
}

#[test]
fn test_modify_selection_stops_at_document_start() {
    let model = model_with("<paragraph>[]foo</paragraph>");

    model
        .modify_selection(SelectionTarget::Document, ModifySelectionOptions {
            direction: Direction::Backward,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(data(&model), "<paragraph>[]foo</paragraph>");
}

#[test]
fn test_modify_selection_steps_over_object() {
    let model = model_with("<paragraph>foo</paragraph>[]<image></image><paragraph>bar</paragraph>");

    model.modify_selection(SelectionTarget::Document, ModifySelectionOptions::default()).unwrap();

    assert_eq!(data(&model), "<paragraph>foo</paragraph>[<image></image>]<paragraph>bar</paragraph>");
}

#[test]
fn test_has_content() {
    let model = model_with("<paragraph>  </paragraph><paragraph></paragraph><paragraph>x</paragraph>");
    let root = main_root(&model);
    let (blank, empty, filled) = {
        let document = model.document();
        let tree = document.tree();
        (tree.child(root, 0).unwrap(), tree.child(root, 1).unwrap(), tree.child(root, 2).unwrap())
    };

    assert!(model.has_content(blank, HasContentOptions::default()));
    assert!(!model.has_content(blank, HasContentOptions {
        ignore_whitespaces: Some(true),
        ..Default::default()
    }));
    assert!(!model.has_content(empty, HasContentOptions::default()));
    assert!(model.has_content(filled, HasContentOptions::default()));
    assert!(model.has_content(root, HasContentOptions::default()));

    let collapsed = Range::collapsed(model.create_position_at(filled, 0).unwrap());
    assert!(!model.has_content(collapsed, HasContentOptions::default()));
}

#[test]
fn test_has_content_whitespace_default_follows_config() {
    let config = ModelConfig::from_json_str(r#"{ "trimWhitespaceInHasContent": true }"#).unwrap();
    let model = Model::with_config(config).unwrap();
    set_data(&model, None, "<paragraph> </paragraph>").unwrap();
    let blank = model.document().tree().child(main_root(&model), 0).unwrap();

    assert!(!model.has_content(blank, HasContentOptions::default()));
    assert!(model.has_content(blank, HasContentOptions {
        ignore_whitespaces: Some(false),
        ..Default::default()
    }));
}

#[test]
fn test_has_content_counts_data_markers() {
    let model = model_with("<paragraph></paragraph><paragraph></paragraph>");
    let root = main_root(&model);
    let first = model.document().tree().child(root, 0).unwrap();

    assert!(!model.has_content(root, HasContentOptions::default()));

    model
        .change(|writer| {
            writer.add_marker("comment", MarkerOptions {
                range: writer.create_range_on(first)?,
                using_operation: false,
                affects_data: true,
            })
        })
        .unwrap();

    assert!(model.has_content(root, HasContentOptions::default()));
    assert!(!model.has_content(root, HasContentOptions {
        ignore_markers: true,
        ..Default::default()
    }));
}
