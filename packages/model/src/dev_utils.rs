//! # Development notation
//!
//! A compact text form of model content used by tests and debugging:
//!
//! ```text
//! <paragraph>fo[]ar</paragraph><paragraph alignment="right">b[az</paragraph>
//! <blockQuote><paragraph>x<$text bold="true">y</$text>]</paragraph></blockQuote>
//! ```
//!
//! Elements are tags, attributed text is wrapped in `<$text>`, and `[` / `]`
//! mark the ends of the selection (`[]` when collapsed). Attribute values
//! are read as JSON when they parse as JSON (`"true"`, `"3"`) and as plain
//! strings otherwise.

use logos::Logos;
use quire_common::{ModelError, ModelResult};
use serde_json::{json, Value};
use tracing::debug;

use crate::batch::BatchType;
use crate::model::Model;
use crate::node::{Attributes, NodeId};
use crate::position::{Position, PositionOffset};
use crate::range::Range;
use crate::selection::Selection;
use crate::tree::Tree;
use crate::writer::Writer;

const TEXT_TAG: &str = "$text";

/// Tokens of the content level. Tags are lexed whole and their insides
/// handed to [`TagToken`].
#[derive(Logos, Debug, Clone, PartialEq)]
enum Token<'src> {
    #[regex(r"</[a-zA-Z$][a-zA-Z0-9_$:-]*>", |lex| { let s = lex.slice(); &s[2..s.len() - 1] })]
    Close(&'src str),

    #[regex(r"<[a-zA-Z$][^>]*>", |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    Open(&'src str),

    #[token("[")]
    SelectionStart,

    #[token("]")]
    SelectionEnd,

    #[regex(r"[^<\[\]]+", |lex| lex.slice())]
    Text(&'src str),
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum TagToken<'src> {
    #[regex(r"[a-zA-Z$][a-zA-Z0-9_$:-]*", |lex| lex.slice())]
    Name(&'src str),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    Value(&'src str),

    #[token("=")]
    Equals,

    #[token("/")]
    Slash,
}

/// Parsed content, independent of any tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedNode {
    Element {
        name: String,
        attributes: Attributes,
        children: Vec<ParsedNode>,
    },
    Text {
        data: String,
        attributes: Attributes,
    },
}

/// Result of [`parse_notation`]: top-level nodes and selection paths
/// relative to their container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedData {
    pub nodes: Vec<ParsedNode>,
    pub selection: Option<(Vec<usize>, Vec<usize>)>,
}

struct Frame {
    name: String,
    attributes: Attributes,
    children: Vec<ParsedNode>,
    offset: usize,
}

impl Frame {
    fn new(name: &str, attributes: Attributes) -> Self {
        Self {
            name: name.to_string(),
            attributes,
            children: Vec::new(),
            offset: 0,
        }
    }

    fn push_text(&mut self, data: &str, attributes: &Attributes) {
        self.offset += data.chars().count();
        if let Some(ParsedNode::Text { data: last, attributes: last_attributes }) = self.children.last_mut() {
            if last_attributes == attributes {
                last.push_str(data);
                return;
            }
        }
        self.children.push(ParsedNode::Text {
            data: data.to_string(),
            attributes: attributes.clone(),
        });
    }
}

/// Parse the notation into a tree-independent form.
pub fn parse_notation(data: &str) -> ModelResult<ParsedData> {
    let mut frames = vec![Frame::new("", Attributes::new())];
    let mut text_attributes: Option<Attributes> = None;
    let mut start: Option<Vec<usize>> = None;
    let mut end: Option<Vec<usize>> = None;

    let mut lexer = Token::lexer(data);
    while let Some(token) = lexer.next() {
        let token = token.map_err(|_| syntax_error("unexpected character", lexer.span().start))?;
        match token {
            Token::Text(text) => {
                let attributes = text_attributes.clone().unwrap_or_default();
                current(&mut frames)?.push_text(text, &attributes);
            }
            Token::SelectionStart => {
                if start.is_some() {
                    return Err(syntax_error("selection start marked twice", lexer.span().start));
                }
                start = Some(frames.iter().map(|frame| frame.offset).collect());
            }
            Token::SelectionEnd => {
                if start.is_none() || end.is_some() {
                    return Err(syntax_error("selection end without a start", lexer.span().start));
                }
                end = Some(frames.iter().map(|frame| frame.offset).collect());
            }
            Token::Open(inner) => {
                let (name, attributes, self_closing) = parse_tag(inner, lexer.span().start)?;
                if name == TEXT_TAG {
                    if text_attributes.is_some() || self_closing {
                        return Err(syntax_error("misplaced <$text>", lexer.span().start));
                    }
                    text_attributes = Some(attributes);
                } else if self_closing {
                    let frame = current(&mut frames)?;
                    frame.children.push(ParsedNode::Element {
                        name,
                        attributes,
                        children: Vec::new(),
                    });
                    frame.offset += 1;
                } else {
                    if text_attributes.is_some() {
                        return Err(syntax_error("element inside <$text>", lexer.span().start));
                    }
                    frames.push(Frame::new(&name, attributes));
                }
            }
            Token::Close(name) => {
                if name == TEXT_TAG {
                    if text_attributes.take().is_none() {
                        return Err(syntax_error("unopened </$text>", lexer.span().start));
                    }
                    continue;
                }
                if frames.len() < 2 || frames.last().map(|frame| frame.name.as_str()) != Some(name) {
                    return Err(syntax_error(&format!("unexpected </{name}>"), lexer.span().start));
                }
                let Some(frame) = frames.pop() else { continue };
                let parent = current(&mut frames)?;
                parent.children.push(ParsedNode::Element {
                    name: frame.name,
                    attributes: frame.attributes,
                    children: frame.children,
                });
                parent.offset += 1;
            }
        }
    }

    if frames.len() != 1 || text_attributes.is_some() {
        return Err(syntax_error("unclosed tag", data.len()));
    }
    let selection = match (start, end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => return Err(syntax_error("selection start without an end", data.len())),
    };
    let nodes = frames.pop().map(|frame| frame.children).unwrap_or_default();
    Ok(ParsedData { nodes, selection })
}

fn current(frames: &mut [Frame]) -> ModelResult<&mut Frame> {
    frames.last_mut().ok_or_else(|| syntax_error("no open container", 0))
}

fn parse_tag(inner: &str, at: usize) -> ModelResult<(String, Attributes, bool)> {
    let mut tokens = TagToken::lexer(inner);
    let name = match tokens.next() {
        Some(Ok(TagToken::Name(name))) => name.to_string(),
        _ => return Err(syntax_error("tag without a name", at)),
    };
    let mut attributes = Attributes::new();
    let mut self_closing = false;
    while let Some(token) = tokens.next() {
        match token {
            Ok(TagToken::Name(key)) => {
                let (Some(Ok(TagToken::Equals)), Some(Ok(TagToken::Value(raw)))) = (tokens.next(), tokens.next()) else {
                    return Err(syntax_error(&format!("attribute `{key}` without a value"), at));
                };
                attributes.insert(key.to_string(), parse_value(raw));
            }
            Ok(TagToken::Slash) => self_closing = true,
            _ => return Err(syntax_error("malformed tag", at)),
        }
    }
    Ok((name, attributes, self_closing))
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn syntax_error(message: &str, offset: usize) -> ModelError {
    ModelError::new("model-devutils-syntax", message.to_string()).with_context(json!({ "offset": offset }))
}

/// Parse `data` into a new document fragment of `tree`. Returns the
/// fragment and the marked selection, if any.
pub fn parse(tree: &mut Tree, data: &str) -> ModelResult<(NodeId, Option<Range>)> {
    let parsed = parse_notation(data)?;
    let fragment = tree.create_fragment();
    for node in &parsed.nodes {
        let child = build_detached(tree, node)?;
        tree.append_child(fragment, child)?;
    }
    let selection = parsed
        .selection
        .map(|(start, end)| Range::new(Position::from_parts(fragment, start), Position::from_parts(fragment, end)));
    Ok((fragment, selection))
}

fn build_detached(tree: &mut Tree, node: &ParsedNode) -> ModelResult<NodeId> {
    match node {
        ParsedNode::Text { data, attributes } => Ok(tree.create_text(data.clone(), attributes.clone())),
        ParsedNode::Element { name, attributes, children } => {
            let element = tree.create_element(name.clone(), attributes.clone());
            for child in children {
                let child = build_detached(tree, child)?;
                tree.append_child(element, child)?;
            }
            Ok(element)
        }
    }
}

/// Replace the content of `root_name` (the first root when `None`) with
/// `data` and set the selection it marks. Runs in a non-undoable batch.
pub fn set_data(model: &Model, root_name: Option<&str>, data: &str) -> ModelResult<()> {
    let parsed = parse_notation(data)?;
    let root_name = root_name.map(str::to_string);
    let batch = model.create_batch(BatchType {
        is_undoable: false,
        ..BatchType::default()
    });
    model.enqueue_change_in(batch, move |writer| {
        let root = resolve_root(writer.model(), root_name.as_deref())?;
        writer.remove(writer.create_range_in(root)?)?;
        for node in &parsed.nodes {
            let child = build_in_writer(writer, node)?;
            writer.insert(child, &writer.create_position_at(root, PositionOffset::End)?)?;
        }
        if let Some((start, end)) = parsed.selection {
            let range = Range::new(Position::from_parts(root, start), Position::from_parts(root, end));
            writer.set_selection(range, false)?;
        }
        debug!(root = ?root, "data set");
        Ok(())
    })
}

fn build_in_writer(writer: &Writer<'_>, node: &ParsedNode) -> ModelResult<NodeId> {
    match node {
        ParsedNode::Text { data, attributes } => writer.create_text(data.clone(), attributes.clone()),
        ParsedNode::Element { name, attributes, children } => {
            let element = writer.create_element(name.clone(), attributes.clone())?;
            for child in children {
                let child = build_in_writer(writer, child)?;
                writer.append(child, element)?;
            }
            Ok(element)
        }
    }
}

fn resolve_root(model: &Model, root_name: Option<&str>) -> ModelResult<NodeId> {
    let document = model.document();
    let root = match root_name {
        Some(name) => document.get_root(name),
        None => document.first_root(),
    };
    root.ok_or_else(|| ModelError::new("model-devutils-no-root", "Root does not exist.").with_context(json!({ "rootName": root_name })))
}

/// Content of `root_name` (the first root when `None`) in notation,
/// including the document selection when `with_selection` is set.
pub fn get_data(model: &Model, root_name: Option<&str>, with_selection: bool) -> ModelResult<String> {
    let root = resolve_root(model, root_name)?;
    let document = model.document();
    let selection = with_selection.then(|| document.selection().as_selection());
    Ok(stringify(document.tree(), root, selection))
}

/// Children of `container` in notation, with the ranges of `selection`
/// marked where they fall inside it.
pub fn stringify(tree: &Tree, container: NodeId, selection: Option<&Selection>) -> String {
    let ranges = selection.map(Selection::ranges).unwrap_or(&[]);
    let mut out = String::new();
    write_children(tree, container, ranges, &mut out);
    out
}

fn write_children(tree: &Tree, parent: NodeId, ranges: &[Range], out: &mut String) {
    let mut offset = 0;
    for &child in tree.children(parent) {
        if let Some(data) = tree.data(child) {
            let attributes = tree.attributes(child);
            if !attributes.is_empty() {
                out.push('<');
                out.push_str(TEXT_TAG);
                write_attributes(attributes, out);
                out.push('>');
            }
            for character in data.chars() {
                write_markers(tree, parent, offset, ranges, out);
                out.push(character);
                offset += 1;
            }
            if !attributes.is_empty() {
                out.push_str("</");
                out.push_str(TEXT_TAG);
                out.push('>');
            }
            continue;
        }
        write_markers(tree, parent, offset, ranges, out);
        let name = tree.name(child).unwrap_or_default();
        out.push('<');
        out.push_str(name);
        write_attributes(tree.attributes(child), out);
        out.push('>');
        write_children(tree, child, ranges, out);
        out.push_str("</");
        out.push_str(name);
        out.push('>');
        offset += 1;
    }
    write_markers(tree, parent, offset, ranges, out);
}

fn write_markers(tree: &Tree, parent: NodeId, offset: usize, ranges: &[Range], out: &mut String) {
    let here = |position: &Position| position.parent(tree) == Some(parent) && position.offset() == offset;
    for range in ranges {
        if range.is_collapsed() {
            if here(&range.start) {
                out.push_str("[]");
            }
            continue;
        }
        if here(&range.end) {
            out.push(']');
        }
        if here(&range.start) {
            out.push('[');
        }
    }
}

fn write_attributes(attributes: &Attributes, out: &mut String) {
    for (key, value) in attributes {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!(" {key}=\"{value}\""));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notation() {
        let parsed = parse_notation(r#"<paragraph>fo[]<$text bold="true">ar</$text></paragraph><image src="a.png"/>"#).unwrap();

        assert_eq!(parsed.selection, Some((vec![0, 2], vec![0, 2])));
        assert_eq!(parsed.nodes.len(), 2);
        let ParsedNode::Element { children, .. } = &parsed.nodes[0] else { panic!("expected element") };
        assert_eq!(
            children[1],
            ParsedNode::Text {
                data: "ar".into(),
                attributes: Attributes::from([("bold".to_string(), json!(true))]),
            }
        );
        let ParsedNode::Element { name, attributes, .. } = &parsed.nodes[1] else { panic!("expected element") };
        assert_eq!(name, "image");
        assert_eq!(attributes.get("src"), Some(&json!("a.png")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_notation("<paragraph>foo").unwrap_err().code, "model-devutils-syntax");
        assert_eq!(parse_notation("<a>x</b>").unwrap_err().code, "model-devutils-syntax");
        assert_eq!(parse_notation("fo]o").unwrap_err().code, "model-devutils-syntax");
        assert_eq!(parse_notation("f[oo").unwrap_err().code, "model-devutils-syntax");
    }

    #[test]
    fn test_parse_and_stringify_in_tree() {
        let mut tree = Tree::new();
        let data = r#"<paragraph>f[o<$text bold="true">o</$text></paragraph><paragraph>b]ar</paragraph>"#;

        let (fragment, range) = parse(&mut tree, data).unwrap();
        let selection = Selection::new(&tree, range.unwrap(), false).unwrap();

        assert_eq!(stringify(&tree, fragment, Some(&selection)), data);
        assert_eq!(stringify(&tree, fragment, None), r#"<paragraph>fo<$text bold="true">o</$text></paragraph><paragraph>bar</paragraph>"#);
    }

    #[test]
    fn test_selection_between_elements() {
        let mut tree = Tree::new();
        let data = "[<image></image>]<paragraph></paragraph>";

        let (fragment, range) = parse(&mut tree, data).unwrap();
        let range = range.unwrap();

        assert_eq!(range.start.path, vec![0]);
        assert_eq!(range.end.path, vec![1]);
        let selection = Selection::new(&tree, range, false).unwrap();
        assert_eq!(stringify(&tree, fragment, Some(&selection)), data);
    }

    #[test]
    fn test_set_data_and_get_data() {
        let model = Model::new();

        set_data(&model, None, "<paragraph>fo[]ar</paragraph>").unwrap();

        assert_eq!(get_data(&model, None, true).unwrap(), "<paragraph>fo[]ar</paragraph>");
        assert_eq!(get_data(&model, Some("main"), false).unwrap(), "<paragraph>foar</paragraph>");
        assert_eq!(get_data(&model, Some("other"), false).unwrap_err().code, "model-devutils-no-root");
    }
}
