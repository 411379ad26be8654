use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quire_model::dev_utils::set_data;
use quire_model::{Model, ModifySelectionOptions, Range, SelectionTarget, SelectionUnit, TreeWalker, TreeWalkerOptions};

fn sample_data(paragraphs: usize) -> String {
    let mut data = String::from("<paragraph>[]</paragraph>");
    for i in 0..paragraphs {
        data.push_str(&format!(
            r#"<paragraph>Paragraph {i} with <$text bold="true">bold</$text> and plain words.</paragraph>"#
        ));
    }
    data
}

fn walk_document(c: &mut Criterion) {
    let model = Model::new();
    set_data(&model, None, &sample_data(200)).unwrap();

    c.bench_function("walk_document", |b| {
        b.iter(|| {
            let document = model.document();
            let tree = document.tree();
            let root = document.get_root("main").unwrap();
            let range = Range::in_element(tree, root).unwrap();
            let walker = TreeWalker::new(tree, TreeWalkerOptions {
                boundaries: Some(range),
                ..TreeWalkerOptions::default()
            })
            .unwrap();
            black_box(walker.count())
        })
    });

    c.bench_function("walk_document_single_characters", |b| {
        b.iter(|| {
            let document = model.document();
            let tree = document.tree();
            let root = document.get_root("main").unwrap();
            let range = Range::in_element(tree, root).unwrap();
            let walker = TreeWalker::new(tree, TreeWalkerOptions {
                boundaries: Some(range),
                single_characters: true,
                ..TreeWalkerOptions::default()
            })
            .unwrap();
            black_box(walker.count())
        })
    });
}

fn typing(c: &mut Criterion) {
    c.bench_function("insert_content_typing", |b| {
        b.iter_with_setup(
            || {
                let model = Model::new();
                set_data(&model, None, &sample_data(20)).unwrap();
                model
            },
            |model| {
                for _ in 0..50 {
                    model.insert_content(black_box("x"), SelectionTarget::Document).unwrap();
                }
            },
        )
    });
}

fn word_navigation(c: &mut Criterion) {
    let options = ModifySelectionOptions {
        unit: SelectionUnit::Word,
        ..ModifySelectionOptions::default()
    };

    c.bench_function("modify_selection_by_word", |b| {
        b.iter_with_setup(
            || {
                let model = Model::new();
                set_data(&model, None, &sample_data(20)).unwrap();
                model
            },
            |model| {
                for _ in 0..100 {
                    model.modify_selection(SelectionTarget::Document, black_box(options)).unwrap();
                }
            },
        )
    });
}

criterion_group!(benches, walk_document, typing, word_navigation);
criterion_main!(benches);
