//! Core type definitions for the markup tree
//!
//! Key design principles:
//! 1. Use u32 for indices (4 bytes vs 8 bytes pointer)
//! 2. Keep text and attribute values in source form (no entity decoding)
//! 3. Use SmallVec for small arrays (avoid heap allocation)
//! 4. Attribute keys compare ASCII case-insensitively, first occurrence wins

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Node identifier (index into arena)
/// u32 allows 4 billion nodes, enough for any webpage
pub type NodeId = u32;

/// Node type, numbered like the DOM specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    CdataSection = 4,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Element => "element",
            NodeType::Text => "text",
            NodeType::CdataSection => "cdata",
            NodeType::ProcessingInstruction => "processing-instruction",
            NodeType::Comment => "comment",
            NodeType::Document => "document",
            NodeType::DocumentType => "doctype",
        }
    }
}

/// A single attribute. `value: None` is a bare attribute (`<input disabled>`),
/// which is distinct from an explicitly empty one (`<input value="">`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Value as seen by the browser: a bare attribute has the empty value
    pub fn value_or_empty(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered attribute list with unique (case-insensitive) keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    items: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute unless the key already exists.
    ///
    /// Returns `false` when the key was already present; the earlier value is
    /// kept, which is what browsers do with duplicate attributes.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.items.push(Attribute::new(name, value));
        true
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.items.iter().find(|a| a.is(name))
    }

    /// Attribute value, with bare attributes reported as `""`
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(Attribute::value_or_empty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|a| a.is(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        let idx = self.items.iter().position(|a| a.is(name))?;
        Some(self.items.remove(idx))
    }

    /// Keep only the attributes matching the predicate
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&Attribute) -> bool,
    {
        self.items.retain(f);
    }

    /// Stable sort by lowercase attribute name
    pub fn sort_by_name(&mut self) {
        self.items
            .sort_by_cached_key(|a| a.name.to_ascii_lowercase());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Attribute> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Name of the first key that occurs twice, if any
    pub fn find_duplicate(&self) -> Option<&str> {
        self.items.iter().enumerate().find_map(|(i, a)| {
            self.items[..i]
                .iter()
                .any(|b| b.is(&a.name))
                .then_some(a.name.as_str())
        })
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// The main tree node structure
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Use indices instead of pointers
/// - `node_name` is the tag name for elements (as written), empty otherwise
/// - `node_value` holds text, comment, doctype and PI content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    pub node_id: NodeId,
    pub node_type: NodeType,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>, // Most nodes have <4 children

    pub node_name: String,
    pub node_value: String,
    pub attributes: Attributes,

    /// `<path/>` inside foreign content; ignored on HTML elements
    pub self_closing: bool,
}

impl DomNode {
    /// Create a new node with required fields
    pub fn new(node_id: NodeId, node_type: NodeType, node_name: String) -> Self {
        Self {
            node_id,
            node_type,
            parent_id: None,
            children_ids: SmallVec::new(),
            node_name,
            node_value: String::new(),
            attributes: Attributes::new(),
            self_closing: false,
        }
    }

    pub fn element(node_id: NodeId, tag: impl Into<String>) -> Self {
        Self::new(node_id, NodeType::Element, tag.into())
    }

    pub fn text(node_id: NodeId, content: impl Into<String>) -> Self {
        let mut node = Self::new(node_id, NodeType::Text, String::new());
        node.node_value = content.into();
        node
    }

    pub fn with_value(node_id: NodeId, node_type: NodeType, value: impl Into<String>) -> Self {
        let mut node = Self::new(node_id, node_type, String::new());
        node.node_value = value.into();
        node
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        if self.node_type == NodeType::Element {
            Some(&self.node_name)
        } else {
            None
        }
    }

    /// Case-insensitive tag check; false for non-elements
    pub fn is_tag(&self, tag: &str) -> bool {
        self.node_type == NodeType::Element && self.node_name.eq_ignore_ascii_case(tag)
    }

    /// Check if node is an element
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// Check if node is text
    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Text node made only of ASCII whitespace (the empty string counts)
    pub fn is_whitespace_text(&self) -> bool {
        self.is_text() && self.node_value.bytes().all(|b| b.is_ascii_whitespace())
    }

    /// Get attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.value(name)
    }
}

/// Void elements: no content, no end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Elements whose content is raw text up to the matching end tag
pub const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "textarea", "title",
];

/// Elements where whitespace is rendered as written
pub const PRESERVE_WHITESPACE_ELEMENTS: &[&str] = &[
    "pre", "textarea", "script", "style", "xmp", "plaintext", "listing",
];

/// Elements that start a block formatting boundary. Whitespace touching these
/// is never rendered.
pub const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "colgroup", "dd",
    "details", "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html",
    "legend", "li", "main", "menu", "nav", "ol", "optgroup", "option", "p", "pre",
    "search", "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr",
    "ul",
];

/// Start tags that close an open `p`
pub const P_CLOSERS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre", "search",
    "section", "table", "ul",
];

/// Attributes whose value is a URL
pub const URL_ATTRIBUTES: &[&str] = &[
    "action", "background", "cite", "codebase", "data", "formaction", "href", "icon",
    "longdesc", "manifest", "poster", "src",
];

fn contains_ignore_case(list: &[&str], name: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(name))
}

pub fn is_void_element(name: &str) -> bool {
    contains_ignore_case(VOID_ELEMENTS, name)
}

pub fn is_raw_text_element(name: &str) -> bool {
    contains_ignore_case(RAW_TEXT_ELEMENTS, name)
}

pub fn is_whitespace_preserving(name: &str) -> bool {
    contains_ignore_case(PRESERVE_WHITESPACE_ELEMENTS, name)
}

pub fn is_block_element(name: &str) -> bool {
    contains_ignore_case(BLOCK_ELEMENTS, name)
}

pub fn is_url_attribute(name: &str) -> bool {
    contains_ignore_case(URL_ATTRIBUTES, name)
}

/// Roots of foreign content, where `/>` is honoured
pub fn is_foreign_root(name: &str) -> bool {
    name.eq_ignore_ascii_case("svg") || name.eq_ignore_ascii_case("math")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_first_wins() {
        let mut attrs = Attributes::new();
        assert!(attrs.insert("class", Some("a".to_string())));
        assert!(!attrs.insert("CLASS", Some("b".to_string())));

        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.value("Class"), Some("a"));
        assert!(attrs.find_duplicate().is_none());
    }

    #[test]
    fn test_bare_attribute_reads_as_empty() {
        let mut attrs = Attributes::new();
        attrs.insert("disabled", None);

        assert_eq!(attrs.value("disabled"), Some(""));
        assert_eq!(attrs.get("disabled").unwrap().value, None);
    }

    #[test]
    fn test_sort_by_name_is_case_insensitive() {
        let mut attrs = Attributes::new();
        attrs.insert("src", Some("x".to_string()));
        attrs.insert("Alt", Some("y".to_string()));
        attrs.insert("class", None);
        attrs.sort_by_name();

        let names: Vec<_> = attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alt", "class", "src"]);
    }

    #[test]
    fn test_tag_tables() {
        assert!(is_void_element("IMG"));
        assert!(!is_void_element("div"));
        assert!(is_raw_text_element("script"));
        assert!(is_block_element("Div"));
        assert!(!is_block_element("span"));
        assert!(is_url_attribute("HREF"));
    }
}
