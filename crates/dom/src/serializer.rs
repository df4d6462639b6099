//! DOM Serializer - Convert the document tree back to markup
//!
//! This is the single place that knows per-tag output rules:
//! - Void elements never get an end tag
//! - Raw text (`script`, `style`, ...) is written verbatim
//! - Attribute values are quoted only as much as needed
//! - Optional end tags may be left out where the parser puts them back

use crate::arena::DomArena;
use crate::error::Result;
use crate::parser::{
    close_for_end, close_for_start, document_quirks, FORMATTING_ELEMENTS,
};
use crate::types::*;

/// Serializer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Write `class=foo` instead of `class="foo"` when the value allows it
    pub omit_attribute_quotes: bool,
    /// Leave out end tags the HTML content model makes optional
    pub omit_optional_end_tags: bool,
}

/// Parents in which a trailing `</p>` must stay
const P_END_REQUIRED_IN: &[&str] = &["a", "audio", "del", "ins", "map", "noscript", "video"];

/// What closes an element on the next parse when its end tag is left out
#[derive(Debug, Clone, Copy)]
enum Closer<'a> {
    /// End of input closes everything
    Eof,
    /// The parent's end tag, which must cut the open elements back to `len`
    EndTag(&'a str, usize),
    /// The start tag of the following sibling, same contract
    StartTag(&'a str, usize),
}

/// DOM Tree Serializer
pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Serialize the reachable tree to markup
    pub fn serialize(&self, arena: &DomArena) -> Result<String> {
        let Some(root_id) = arena.root_id() else {
            return Ok(String::new());
        };

        let mut writer = Writer {
            config: &self.config,
            arena,
            quirks: document_quirks(arena)?,
            open: vec!["#document".to_string()],
            output: String::with_capacity(4096),
        };
        writer.node(arena.get(root_id)?, None, false, Closer::Eof)?;
        Ok(writer.output)
    }
}

/// State of one serialization
struct Writer<'a> {
    config: &'a SerializerConfig,
    arena: &'a DomArena,
    /// Decides whether `<table>` closes an open paragraph on the next parse
    quirks: bool,
    /// Tag names of the elements a parser would have open, document first
    open: Vec<String>,
    output: String,
}

impl<'a> Writer<'a> {
    /// Write `node` and its subtree. `next` is its following sibling.
    /// Depth is bounded by the parser.
    fn node(
        &mut self,
        node: &'a DomNode,
        next: Option<&'a DomNode>,
        foreign: bool,
        closer: Closer<'a>,
    ) -> Result<()> {
        match node.node_type {
            NodeType::Document => self.children(node, foreign, closer)?,
            NodeType::DocumentType => {
                self.output.push_str("<!");
                self.output.push_str(&node.node_value);
                self.output.push('>');
            }
            NodeType::Comment => {
                self.output.push_str("<!--");
                self.output.push_str(&node.node_value);
                self.output.push_str("-->");
            }
            NodeType::CdataSection => {
                self.output.push_str("<![CDATA[");
                self.output.push_str(&node.node_value);
                self.output.push_str("]]>");
            }
            NodeType::ProcessingInstruction => {
                self.output.push_str("<?");
                self.output.push_str(&node.node_value);
                self.output.push('>');
            }
            NodeType::Text => {
                let raw = !foreign
                    && self
                        .arena
                        .parent(node.node_id)?
                        .and_then(|p| p.tag_name())
                        .map_or(false, is_raw_text_element);
                if raw {
                    self.output.push_str(&node.node_value);
                } else {
                    escape_text(&node.node_value, &mut self.output);
                }
            }
            NodeType::Element => self.element(node, next, foreign, closer)?,
        }

        Ok(())
    }

    fn children(&mut self, node: &'a DomNode, foreign: bool, closer: Closer<'a>) -> Result<()> {
        for (i, &child_id) in node.children_ids.iter().enumerate() {
            let child = self.arena.get(child_id)?;
            let next = match node.children_ids.get(i + 1) {
                Some(&next_id) => Some(self.arena.get(next_id)?),
                None => None,
            };
            self.node(child, next, foreign, closer)?;
        }
        Ok(())
    }

    fn element(
        &mut self,
        node: &'a DomNode,
        next: Option<&'a DomNode>,
        foreign: bool,
        closer: Closer<'a>,
    ) -> Result<()> {
        let foreign = foreign || is_foreign_root(&node.node_name);

        self.output.push('<');
        self.output.push_str(&node.node_name);
        let mut last_unquoted = false;
        for attr in &node.attributes {
            last_unquoted = write_attribute(self.config, attr, &mut self.output);
        }

        if node.self_closing && node.children_ids.is_empty() {
            // `d=M0/>` would read the slash as part of the value
            self.output.push_str(if last_unquoted { " />" } else { "/>" });
            return Ok(());
        }
        self.output.push('>');

        if is_void_element(&node.node_name) {
            return Ok(());
        }

        let depth = self.open.len();
        self.open.push(node.node_name.clone());

        let omitted = if self.config.omit_optional_end_tags && !foreign {
            self.end_tag_closer(node, next, closer)?
        } else {
            None
        };
        // Children left open at the end inherit whatever closes this element
        let child_closer = omitted.unwrap_or(Closer::EndTag(&node.node_name, depth));

        self.children(node, foreign, child_closer)?;
        self.open.pop();

        if omitted.is_none() {
            self.output.push_str("</");
            self.output.push_str(&node.node_name);
            self.output.push('>');
        }
        Ok(())
    }

    /// The closer that stands in for the end tag of `node`, if it can be
    /// left out. The open elements end with `node` itself.
    ///
    /// The content model decides whether omission is allowed at all; the
    /// parser's own implied-end rules then have to pop exactly the elements
    /// still open above the parent, otherwise the next parse builds a
    /// different tree.
    fn end_tag_closer(
        &self,
        node: &DomNode,
        next: Option<&'a DomNode>,
        closer: Closer<'a>,
    ) -> Result<Option<Closer<'a>>> {
        if !content_model_allows_omission(self.arena, node, next)? {
            return Ok(None);
        }

        let open = &self.open;
        let trigger = match next {
            Some(next) if next.is_element() => Closer::StartTag(&next.node_name, open.len() - 1),
            Some(_) => return Ok(None),
            None => closer,
        };
        let reconstructed = match trigger {
            Closer::Eof => true,
            // Browsers close formatting elements with the adoption agency
            // algorithm, which rebuilds them instead
            Closer::EndTag(tag, _) if is_formatting_element(tag) => false,
            Closer::EndTag(tag, len) => close_for_end(tag, open) == len,
            Closer::StartTag(tag, len) => close_for_start(tag, open, self.quirks) == len,
        };
        Ok(reconstructed.then_some(trigger))
    }
}

/// Write ` name="value"`. Returns true when the value went out unquoted.
fn write_attribute(config: &SerializerConfig, attr: &Attribute, output: &mut String) -> bool {
    output.push(' ');
    output.push_str(&attr.name);

    let Some(value) = &attr.value else {
        return false;
    };

    if config.omit_attribute_quotes {
        // `class=""` and `class` mean the same thing
        if value.is_empty() {
            return false;
        }
        if can_unquote(value) {
            output.push('=');
            output.push_str(value);
            return true;
        }
    }

    output.push('=');
    if value.contains('"') && !value.contains('\'') {
        output.push('\'');
        output.push_str(value);
        output.push('\'');
    } else {
        output.push('"');
        output.push_str(&value.replace('"', "&quot;"));
        output.push('"');
    }
    false
}

fn is_formatting_element(tag: &str) -> bool {
    FORMATTING_ELEMENTS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize with the default configuration
pub fn serialize(arena: &DomArena) -> Result<String> {
    DomSerializer::new().serialize(arena)
}

/// Value can be written without quotes
pub fn can_unquote(value: &str) -> bool {
    !value.is_empty()
        && !value.bytes().any(|b| {
            b.is_ascii_whitespace() || matches!(b, b'"' | b'\'' | b'=' | b'<' | b'>' | b'`')
        })
}

/// Text is kept in source form. Only a `<` that would now start a tag (left
/// over from a broken tag during parsing) needs escaping.
fn escape_text(text: &str, output: &mut String) {
    let bytes = text.as_bytes();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'<' {
            continue;
        }
        let starts_markup = bytes
            .get(i + 1)
            .map_or(false, |&n| n.is_ascii_alphabetic() || matches!(n, b'/' | b'!' | b'?'));
        if starts_markup {
            output.push_str(&text[start..i]);
            output.push_str("&lt;");
            start = i + 1;
        }
    }
    output.push_str(&text[start..]);
}

/// HTML optional end tag rules, by what follows the element
fn content_model_allows_omission(
    arena: &DomArena,
    node: &DomNode,
    next: Option<&DomNode>,
) -> Result<bool> {
    let is_last = next.is_none();
    let followed_by = |tags: &[&str]| next.map_or(false, |n| tags.iter().any(|t| n.is_tag(t)));

    let allowed = match node.node_name.to_ascii_lowercase().as_str() {
        "p" => {
            followed_by(P_CLOSERS)
                || (is_last
                    && !arena
                        .parent(node.node_id)?
                        .and_then(|p| p.tag_name())
                        .map_or(false, |tag| {
                            P_END_REQUIRED_IN.iter().any(|t| t.eq_ignore_ascii_case(tag))
                        }))
        }
        "li" => followed_by(&["li"]) || is_last,
        "dt" => followed_by(&["dt", "dd"]),
        "dd" => followed_by(&["dt", "dd"]) || is_last,
        "rt" | "rp" => followed_by(&["rt", "rp"]) || is_last,
        "option" => followed_by(&["option", "optgroup"]) || is_last,
        "optgroup" => followed_by(&["optgroup"]) || is_last,
        "tr" => followed_by(&["tr"]) || is_last,
        "td" | "th" => followed_by(&["td", "th"]) || is_last,
        "thead" => followed_by(&["tbody", "tfoot"]),
        "tbody" => followed_by(&["tbody", "tfoot"]) || is_last,
        "tfoot" => is_last,
        "head" => followed_by(&["body"]),
        "body" | "html" => is_last,
        _ => false,
    };
    Ok(allowed)
}
