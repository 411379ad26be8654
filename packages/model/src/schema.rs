//! # Schema
//!
//! A small registry of item definitions answering the structural queries
//! the model needs. Definitions may inherit from generic items (`$root`,
//! `$block`, `$text`, ...) the way concrete elements are declared:
//!
//! ```rust,ignore
//! schema.register("paragraph", SchemaItemDefinition::inheriting("$block"));
//! schema.register("image", SchemaItemDefinition {
//!     allow_where: Some("$block".into()),
//!     is_object: true,
//!     ..Default::default()
//! });
//! schema.extend("$text", |def| def.allow_attributes.push("bold".into()));
//! ```

use std::collections::BTreeMap;

use crate::node::NodeId;
use crate::position::Position;
use crate::tree::Tree;

pub const TEXT: &str = "$text";
pub const ROOT: &str = "$root";
pub const BLOCK: &str = "$block";
pub const DOCUMENT_FRAGMENT: &str = "$documentFragment";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaItemDefinition {
    /// Parents (item names, generic names included) this item may live in.
    pub allow_in: Vec<String>,
    /// Item may live wherever the named item may live.
    pub allow_where: Option<String>,
    /// Item may contain whatever the named item may contain.
    pub allow_content_of: Option<String>,
    pub allow_attributes: Vec<String>,
    /// Copy every rule and flag from the named item.
    pub inherit_all_from: Option<String>,
    pub is_block: bool,
    pub is_inline: bool,
    pub is_limit: bool,
    pub is_object: bool,
    pub is_content: bool,
    pub is_selectable: bool,
}

impl SchemaItemDefinition {
    pub fn inheriting(name: impl Into<String>) -> Self {
        Self {
            inherit_all_from: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Definition after inheritance has been applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledDefinition {
    pub name: String,
    pub allow_in: Vec<String>,
    pub allow_attributes: Vec<String>,
    pub is_block: bool,
    pub is_inline: bool,
    pub is_limit: bool,
    pub is_object: bool,
    pub is_content: bool,
    pub is_selectable: bool,
}

#[derive(Debug, Clone)]
pub struct Schema {
    definitions: BTreeMap<String, SchemaItemDefinition>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Schema with the generic items registered.
    pub fn new() -> Self {
        let mut schema = Self {
            definitions: BTreeMap::new(),
        };
        schema.register(ROOT, SchemaItemDefinition {
            is_limit: true,
            ..Default::default()
        });
        schema.register(DOCUMENT_FRAGMENT, SchemaItemDefinition {
            is_limit: true,
            ..Default::default()
        });
        schema.register(BLOCK, SchemaItemDefinition {
            allow_in: vec![ROOT.into(), DOCUMENT_FRAGMENT.into()],
            is_block: true,
            ..Default::default()
        });
        schema.register(TEXT, SchemaItemDefinition {
            allow_in: vec![BLOCK.into()],
            is_inline: true,
            is_content: true,
            ..Default::default()
        });
        schema
    }

    /// Register (or replace) an item.
    pub fn register(&mut self, name: impl Into<String>, definition: SchemaItemDefinition) {
        self.definitions.insert(name.into(), definition);
    }

    /// Modify an already registered item. Unknown names are registered.
    pub fn extend(&mut self, name: &str, update: impl FnOnce(&mut SchemaItemDefinition)) {
        update(self.definitions.entry(name.to_string()).or_default());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn get_definition(&self, name: &str) -> Option<CompiledDefinition> {
        self.compile(name, 0)
    }

    fn compile(&self, name: &str, depth: usize) -> Option<CompiledDefinition> {
        let definition = self.definitions.get(name)?;
        // Inheritance chains are short; bail out on cycles.
        if depth > 16 {
            return None;
        }
        let mut compiled = match &definition.inherit_all_from {
            Some(parent) => self.compile(parent, depth + 1).unwrap_or_default(),
            None => CompiledDefinition::default(),
        };
        compiled.name = name.to_string();

        if let Some(other) = &definition.allow_where {
            if let Some(other) = self.compile(other, depth + 1) {
                compiled.allow_in.extend(other.allow_in);
            }
        }
        compiled.allow_in.extend(definition.allow_in.iter().cloned());
        compiled.allow_attributes.extend(definition.allow_attributes.iter().cloned());
        compiled.is_block |= definition.is_block;
        compiled.is_inline |= definition.is_inline;
        compiled.is_limit |= definition.is_limit;
        compiled.is_object |= definition.is_object;
        compiled.is_content |= definition.is_content;
        compiled.is_selectable |= definition.is_selectable || definition.is_object;
        // Objects are limits and content by definition.
        if compiled.is_object {
            compiled.is_limit = true;
            compiled.is_content = true;
        }
        Some(compiled)
    }

    /// Names `name` answers to: itself and every item it inherits from or
    /// borrows content rules from.
    fn identities(&self, name: &str) -> Vec<String> {
        let mut names = vec![name.to_string()];
        let mut current = name.to_string();
        while let Some(definition) = self.definitions.get(&current) {
            let next = definition.inherit_all_from.clone().or_else(|| definition.allow_content_of.clone());
            match next {
                Some(next) if !names.contains(&next) => {
                    names.push(next.clone());
                    current = next;
                }
                _ => break,
            }
        }
        names
    }

    /// Schema name of a node: the element name, `$text`, or
    /// `$documentFragment`. Root elements are also known as `$root`.
    pub fn item_name(tree: &Tree, node: NodeId) -> String {
        if tree.is_text(node) {
            TEXT.to_string()
        } else if tree.is_fragment(node) {
            DOCUMENT_FRAGMENT.to_string()
        } else {
            tree.name(node).unwrap_or_default().to_string()
        }
    }

    fn container_identities(&self, tree: &Tree, parent: NodeId) -> Vec<String> {
        let mut names = self.identities(&Self::item_name(tree, parent));
        if tree.is_root_element(parent) && !names.iter().any(|name| name == ROOT) {
            names.extend(self.identities(ROOT));
        }
        names
    }

    /// May an item named `child` be a child of `parent`?
    pub fn check_child(&self, tree: &Tree, parent: NodeId, child: &str) -> bool {
        if tree.is_text(parent) {
            return false;
        }
        let Some(definition) = self.get_definition(child) else {
            return false;
        };
        let parents = self.container_identities(tree, parent);
        definition.allow_in.iter().any(|allowed| parents.contains(allowed))
    }

    /// Like [`check_child`](Self::check_child) for a node of the tree.
    pub fn check_child_node(&self, tree: &Tree, parent: NodeId, child: NodeId) -> bool {
        self.check_child(tree, parent, &Self::item_name(tree, child))
    }

    /// Name-only variant of [`check_child`](Self::check_child), for
    /// containers that are not in a tree yet.
    pub fn check_child_name(&self, parent: &str, child: &str) -> bool {
        let Some(definition) = self.get_definition(child) else {
            return false;
        };
        let parents = self.identities(parent);
        definition.allow_in.iter().any(|allowed| parents.contains(allowed))
    }

    pub fn check_attribute(&self, item: &str, attribute: &str) -> bool {
        self.get_definition(item)
            .is_some_and(|definition| definition.allow_attributes.iter().any(|allowed| allowed == attribute || allowed == "*"))
    }

    fn flag(&self, tree: &Tree, node: NodeId, pick: impl Fn(&CompiledDefinition) -> bool) -> bool {
        if tree.is_root_element(node) {
            if let Some(definition) = self.get_definition(ROOT) {
                if pick(&definition) {
                    return true;
                }
            }
        }
        self.get_definition(&Self::item_name(tree, node)).is_some_and(|definition| pick(&definition))
    }

    pub fn is_block(&self, tree: &Tree, node: NodeId) -> bool {
        self.flag(tree, node, |definition| definition.is_block)
    }

    pub fn is_inline(&self, tree: &Tree, node: NodeId) -> bool {
        self.flag(tree, node, |definition| definition.is_inline)
    }

    pub fn is_limit(&self, tree: &Tree, node: NodeId) -> bool {
        self.flag(tree, node, |definition| definition.is_limit)
    }

    pub fn is_object(&self, tree: &Tree, node: NodeId) -> bool {
        self.flag(tree, node, |definition| definition.is_object)
    }

    pub fn is_content(&self, tree: &Tree, node: NodeId) -> bool {
        self.flag(tree, node, |definition| definition.is_content)
    }

    pub fn is_selectable(&self, tree: &Tree, node: NodeId) -> bool {
        self.flag(tree, node, |definition| definition.is_selectable)
    }

    /// Can text be typed at `position`?
    pub fn accepts_text_at(&self, tree: &Tree, position: &Position) -> bool {
        position.parent(tree).is_some_and(|parent| self.check_child(tree, parent, TEXT))
    }

    /// Nearest ancestor (or the node itself) that is a limit element.
    pub fn get_limit_element(&self, tree: &Tree, node: NodeId) -> NodeId {
        let mut current = node;
        loop {
            if self.is_limit(tree, current) {
                return current;
            }
            match tree.parent(current) {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Nearest ancestor of `position` that accepts an item named `child`,
    /// not crossing limit elements.
    pub fn find_allowed_parent(&self, tree: &Tree, position: &Position, child: &str) -> Option<NodeId> {
        let mut current = position.parent(tree)?;
        loop {
            if self.check_child(tree, current, child) {
                return Some(current);
            }
            if self.is_limit(tree, current) {
                return None;
            }
            current = tree.parent(current)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.register("paragraph", SchemaItemDefinition::inheriting(BLOCK));
        schema.register("blockQuote", SchemaItemDefinition {
            allow_where: Some(BLOCK.into()),
            allow_content_of: Some(ROOT.into()),
            ..Default::default()
        });
        schema.register("image", SchemaItemDefinition {
            allow_where: Some(BLOCK.into()),
            is_object: true,
            ..Default::default()
        });
        schema.extend(TEXT, |definition| definition.allow_attributes.push("bold".into()));
        schema
    }

    #[test]
    fn test_check_child_follows_inheritance() {
        let schema = schema();
        let mut tree = Tree::new();
        let root = tree.create_root("$root", "main");
        let paragraph = tree.create_element("paragraph", Attributes::new());
        let quote = tree.create_element("blockQuote", Attributes::new());

        assert!(schema.check_child(&tree, root, "paragraph"));
        assert!(schema.check_child(&tree, paragraph, TEXT));
        assert!(!schema.check_child(&tree, root, TEXT));
        assert!(!schema.check_child(&tree, paragraph, "paragraph"));
        assert!(schema.check_child(&tree, quote, "paragraph"));
        assert!(!schema.check_child(&tree, root, "unknown"));
    }

    #[test]
    fn test_flags() {
        let schema = schema();
        let mut tree = Tree::new();
        let root = tree.create_root("$root", "main");
        let image = tree.create_element("image", Attributes::new());
        let paragraph = tree.create_element("paragraph", Attributes::new());

        assert!(schema.is_object(&tree, image));
        assert!(schema.is_limit(&tree, image));
        assert!(schema.is_content(&tree, image));
        assert!(schema.is_block(&tree, paragraph));
        assert!(schema.is_limit(&tree, root));
        assert!(!schema.is_object(&tree, paragraph));
    }

    #[test]
    fn test_check_attribute() {
        let schema = schema();
        assert!(schema.check_attribute(TEXT, "bold"));
        assert!(!schema.check_attribute(TEXT, "italic"));
        assert!(!schema.check_attribute("paragraph", "bold"));
    }
}
