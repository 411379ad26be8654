use crate::document::Document;
use crate::node::NodeId;
use crate::range::Range;
use crate::schema::Schema;
use crate::tree_walker::TreeWalkerItem;

/// What a content check looks at.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentScope {
    /// The whole content of an element.
    Element(NodeId),
    Range(Range),
}

impl From<NodeId> for ContentScope {
    fn from(element: NodeId) -> Self {
        ContentScope::Element(element)
    }
}

impl From<Range> for ContentScope {
    fn from(range: Range) -> Self {
        ContentScope::Range(range)
    }
}

impl From<&Range> for ContentScope {
    fn from(range: &Range) -> Self {
        ContentScope::Range(range.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HasContentOptions {
    /// Whitespace-only text is not content. `None` takes the model default.
    pub ignore_whitespaces: Option<bool>,
    /// Markers never count as content.
    pub ignore_markers: bool,
}

/// Whether `scope` holds anything a user would consider content.
///
/// Collapsed scopes never do. Text counts (non-whitespace text only when
/// `ignore_whitespaces` is set), elements count when the schema marks them
/// as content, and so does any intersecting marker that affects data
/// unless `ignore_markers` is set.
pub fn has_content(document: &Document, schema: &Schema, scope: &ContentScope, ignore_whitespaces: bool, ignore_markers: bool) -> bool {
    let tree = document.tree();
    let range = match scope {
        ContentScope::Element(element) => match Range::in_element(tree, *element) {
            Ok(range) => range,
            Err(_) => return false,
        },
        ContentScope::Range(range) => range.clone(),
    };
    if range.is_collapsed() {
        return false;
    }

    if !ignore_markers && document.markers().get_markers_intersecting_range(&range).any(|marker| marker.affects_data) {
        return true;
    }

    range.get_items(tree, true).into_iter().any(|item| match item {
        TreeWalkerItem::Text(proxy) => !ignore_whitespaces || proxy.data(tree).chars().any(|c| !c.is_whitespace()),
        TreeWalkerItem::Element(node) => schema.is_content(tree, node),
    })
}
