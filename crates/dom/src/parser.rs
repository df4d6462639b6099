//! Markup Parser - tolerant tokenizer and tree builder
//!
//! This handles:
//! - Tokenizing markup (tags, attributes, text, comments, doctype, CDATA, PIs)
//! - Raw text elements (`script`, `style`, `textarea`, ...) up to their end tag
//! - Implied end tags (`<p>a<div>` closes the paragraph, `<li>a<li>` the item)
//! - Error recovery: stray `<`, stray end tags, unclosed elements and
//!   unterminated tags never fail the parse
//!
//! Malformed input degrades into best-effort structure. The only error is
//! the nesting depth guard, which callers treat as "leave the page alone".
//!
//! ```text
//! &str → Tokenizer → Token<'a> (borrowed) → TreeBuilder → DomArena (owned)
//! ```

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::*;

/// Parser configuration
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Maximum element nesting depth before the parse is abandoned
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_depth: 512 }
    }
}

/// Parse markup with the default configuration
pub fn parse(markup: &str) -> Result<DomArena> {
    DomParser::new().parse(markup)
}

/// Markup parser
pub struct DomParser {
    config: ParserConfig,
}

impl DomParser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Build a document tree from markup
    pub fn parse(&self, markup: &str) -> Result<DomArena> {
        let mut tokenizer = Tokenizer::new(markup);
        let mut builder = TreeBuilder::new(self.config.max_depth);

        while let Some(token) = tokenizer.next_token() {
            if let Some(raw_tag) = builder.process(token)? {
                tokenizer.enter_raw_text(raw_tag);
            }
        }

        tracing::trace!(nodes = builder.arena.len(), "parsed document");
        Ok(builder.arena)
    }
}

impl Default for DomParser {
    fn default() -> Self {
        Self::new()
    }
}

/* ============================== Tokenizer ============================== */

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Doctype(&'a str),
    StartTag {
        name: &'a str,
        attributes: Attributes,
        self_closing: bool,
    },
    EndTag(&'a str),
    Text(&'a str),
    Comment(&'a str),
    Cdata(&'a str),
    ProcessingInstruction(&'a str),
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    /// Set after a raw text start tag: the next token is everything up to
    /// the matching end tag
    raw_text: Option<&'a str>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text: None,
        }
    }

    fn enter_raw_text(&mut self, tag: &'a str) {
        self.raw_text = Some(tag);
    }

    /// Emit `len` bytes of the remaining input as one token
    fn advance(&mut self, len: usize) -> &'a str {
        let input = self.input;
        let slice = &input[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        let input = self.input;
        if let Some(tag) = self.raw_text.take() {
            let rest = &input[self.pos..];
            let end = find_raw_text_end(rest, tag).unwrap_or(rest.len());
            if end > 0 {
                return Some(Token::Text(self.advance(end)));
            }
        }

        // `</>` is dropped entirely
        while input[self.pos..].starts_with("</>") {
            self.pos += 3;
        }

        let rest = &input[self.pos..];
        let bytes = rest.as_bytes();
        if bytes.is_empty() {
            return None;
        }

        if bytes[0] != b'<' {
            let len = rest.find('<').unwrap_or(rest.len());
            return Some(Token::Text(self.advance(len)));
        }

        if rest.starts_with("<!--") {
            return Some(self.comment(rest));
        }
        if starts_with_ignore_ascii_case(bytes, b"<!doctype") {
            if let Some(end) = rest.find('>') {
                let token = Token::Doctype(&rest[2..end]);
                self.pos += end + 1;
                return Some(token);
            }
            return Some(self.text_to_end());
        }
        if rest.starts_with("<![CDATA[") {
            let body = &rest[9..];
            let (content, consumed) = match body.find("]]>") {
                Some(end) => (&body[..end], 9 + end + 3),
                None => (body, rest.len()),
            };
            self.pos += consumed;
            return Some(Token::Cdata(content));
        }
        if rest.starts_with("<!") {
            return Some(self.bogus_comment(rest, 2));
        }
        if rest.starts_with("<?") {
            if let Some(end) = rest.find('>') {
                let token = Token::ProcessingInstruction(&rest[2..end]);
                self.pos += end + 1;
                return Some(token);
            }
            return Some(self.text_to_end());
        }

        match bytes.get(1) {
            Some(b'/') => match bytes.get(2) {
                Some(b) if b.is_ascii_alphabetic() => Some(self.end_tag(rest)),
                Some(_) => Some(self.bogus_comment(rest, 2)),
                None => Some(self.text_to_end()),
            },
            Some(b) if b.is_ascii_alphabetic() => match parse_start_tag(rest) {
                Some((token, consumed)) => {
                    self.pos += consumed;
                    Some(token)
                }
                None => Some(self.text_to_end()),
            },
            _ => {
                // A lone `<` is text, up to the next candidate tag
                let len = rest[1..].find('<').map_or(rest.len(), |i| i + 1);
                Some(Token::Text(self.advance(len)))
            }
        }
    }

    /// Unterminated markup: the remainder becomes text
    fn text_to_end(&mut self) -> Token<'a> {
        let len = self.input.len() - self.pos;
        Token::Text(self.advance(len))
    }

    fn comment(&mut self, rest: &'a str) -> Token<'a> {
        let body = &rest[4..];
        // `<!-->` and `<!--->` are complete, empty comments
        if body.starts_with('>') {
            self.pos += 5;
            return Token::Comment("");
        }
        if body.starts_with("->") {
            self.pos += 6;
            return Token::Comment("");
        }
        match body.find("-->") {
            Some(end) => {
                self.pos += 4 + end + 3;
                Token::Comment(&body[..end])
            }
            None => {
                self.pos = self.input.len();
                Token::Comment(body)
            }
        }
    }

    fn bogus_comment(&mut self, rest: &'a str, skip: usize) -> Token<'a> {
        let body = &rest[skip..];
        match body.find('>') {
            Some(end) => {
                self.pos += skip + end + 1;
                Token::Comment(&body[..end])
            }
            None => {
                self.pos = self.input.len();
                Token::Comment(body)
            }
        }
    }

    fn end_tag(&mut self, rest: &'a str) -> Token<'a> {
        let bytes = rest.as_bytes();
        let mut i = 2;
        while i < bytes.len() && !is_tag_name_end(bytes[i]) {
            i += 1;
        }
        let name = &rest[2..i];
        match rest[i..].find('>') {
            Some(end) => {
                self.pos += i + end + 1;
                Token::EndTag(name)
            }
            None => self.text_to_end(),
        }
    }
}

#[inline]
fn is_tag_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'/' || b == b'>'
}

fn starts_with_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// Offset of `</tag` (followed by whitespace, `/`, `>` or EOF) in `haystack`
fn find_raw_text_end(haystack: &str, tag: &str) -> Option<usize> {
    if tag.eq_ignore_ascii_case("plaintext") {
        return None;
    }
    let bytes = haystack.as_bytes();
    let n = tag.len();
    let mut from = 0;
    while let Some(rel) = haystack[from..].find("</") {
        let at = from + rel;
        let name_start = at + 2;
        if bytes.len() >= name_start + n
            && bytes[name_start..name_start + n].eq_ignore_ascii_case(tag.as_bytes())
            && bytes.get(name_start + n).map_or(true, |&b| is_tag_name_end(b))
        {
            return Some(at);
        }
        from = at + 2;
    }
    None
}

/// Parse `<name attr=value ...>` at the start of `rest`.
///
/// Returns `None` when the tag never closes.
fn parse_start_tag(rest: &str) -> Option<(Token<'_>, usize)> {
    let bytes = rest.as_bytes();
    let len = bytes.len();

    let mut i = 1;
    while i < len && !is_tag_name_end(bytes[i]) {
        i += 1;
    }
    let name = &rest[1..i];
    let mut attributes = Attributes::new();
    let mut self_closing = false;

    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            return None;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    self_closing = true;
                    i += 2;
                    break;
                }
                i += 1;
                continue;
            }
            _ => {}
        }

        // The first character is always part of the name, even `=`
        let name_start = i;
        i += 1;
        while i < len && !is_tag_name_end(bytes[i]) && bytes[i] != b'=' {
            i += 1;
        }
        let attr_name = &rest[name_start..i];

        let mut j = i;
        while j < len && bytes[j].is_ascii_whitespace() {
            j += 1;
        }

        let value = if j < len && bytes[j] == b'=' {
            j += 1;
            while j < len && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= len {
                return None;
            }
            match bytes[j] {
                quote @ (b'"' | b'\'') => {
                    let close = rest[j + 1..].find(quote as char)? + j + 1;
                    let value = &rest[j + 1..close];
                    i = close + 1;
                    Some(value.to_string())
                }
                b'>' => {
                    i = j;
                    Some(String::new())
                }
                _ => {
                    let start = j;
                    while j < len && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    i = j;
                    Some(rest[start..j].to_string())
                }
            }
        } else {
            None
        };

        // Duplicates: first occurrence wins
        attributes.insert(attr_name, value);
    }

    Some((
        Token::StartTag {
            name,
            attributes,
            self_closing,
        },
        i,
    ))
}

/* ============================= Tree builder ============================= */

/// Boundaries of the default "in scope" search
const DEFAULT_SCOPE: &[&str] = &[
    "applet", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

/// Elements a `p` search never crosses
const BUTTON_SCOPE: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template",
    "th",
];

const LIST_ITEM_SCOPE: &[&str] = &[
    "applet", "caption", "html", "marquee", "object", "ol", "table", "td", "template", "th",
    "ul",
];

const TABLE_SCOPE: &[&str] = &["html", "table", "template"];

/// Elements with special parsing behaviour; searches for list items stop at
/// them (except `address`, `div` and `p`)
const SPECIAL: &[&str] = &[
    "address", "applet", "area", "article", "aside", "base", "blockquote", "body", "br",
    "button", "caption", "center", "col", "colgroup", "dd", "details", "dir", "div", "dl",
    "dt", "embed", "fieldset", "figcaption", "figure", "footer", "form", "frame", "frameset",
    "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html", "iframe",
    "img", "input", "li", "link", "listing", "main", "marquee", "menu", "meta", "nav",
    "noembed", "noframes", "noscript", "object", "ol", "p", "param", "plaintext", "pre",
    "script", "search", "section", "select", "source", "style", "summary", "table", "tbody",
    "td", "template", "textarea", "tfoot", "th", "thead", "title", "tr", "track", "ul", "wbr",
    "xmp",
];

/// End tags that pop every element above their match, optional end tags
/// included, as long as the match is in scope
const SCOPED_END_TAGS: &[&str] = &[
    "address", "applet", "article", "aside", "blockquote", "body", "button", "center", "dd",
    "details", "dialog", "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure",
    "footer", "form", "head", "header", "hgroup", "html", "listing", "main", "marquee",
    "menu", "nav", "object", "ol", "pre", "search", "section", "summary", "ul",
];

const TABLE_END_TAGS: &[&str] = &["caption", "table", "tbody", "td", "tfoot", "th", "thead", "tr"];

/// Closed by the adoption agency algorithm in browsers
pub(crate) const FORMATTING_ELEMENTS: &[&str] = &[
    "a", "b", "big", "code", "em", "font", "i", "nobr", "s", "small", "strike", "strong", "tt",
    "u",
];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const TABLE_SECTIONS: &[&str] = &["tbody", "tfoot", "thead"];
const CELLS: &[&str] = &["td", "th"];
const DEFINITIONS: &[&str] = &["dd", "dt"];
const RUBY_TEXT: &[&str] = &["rp", "rt"];

/// Public identifiers that put a document into quirks mode, by prefix
const QUIRKS_PUBLIC_PREFIXES: &[&str] = &[
    "+//silmaril//dtd html pro v0r11 19970101//",
    "-//as//dtd html 3.0 aswedit + extensions//",
    "-//advasoft ltd//dtd html 3.0 aswedit + extensions//",
    "-//ietf//dtd html",
    "-//metrius//dtd metrius presentational//",
    "-//microsoft//dtd internet explorer",
    "-//netscape comm. corp.//dtd",
    "-//o'reilly and associates//dtd html",
    "-//softquad software//dtd hotmetal pro",
    "-//softquad//dtd hotmetal pro",
    "-//spyglass//dtd html 2.0 extended//",
    "-//sq//dtd html 2.0 hotmetal + extensions//",
    "-//sun microsystems corp.//dtd hotjava",
    "-//w3c//dtd html 3",
    "-//w3c//dtd html 4.0 frameset//",
    "-//w3c//dtd html 4.0 transitional//",
    "-//w3c//dtd html experimental",
    "-//w3c//dtd w3 html//",
    "-//w3o//dtd w3 html 3.0//",
    "-//webtechs//dtd mozilla html",
];

/// Quirks only under a public identifier with no system identifier
const QUIRKS_WITHOUT_SYSTEM_ID: &[&str] = &[
    "-//w3c//dtd html 4.01 frameset//",
    "-//w3c//dtd html 4.01 transitional//",
];

/// Whether a document with this doctype (`DOCTYPE html PUBLIC "..."`, as
/// stored in the tree) renders in quirks mode. `None` is a missing doctype.
///
/// Limited-quirks documents count as no-quirks: they parse the same.
pub(crate) fn quirks_mode(doctype: Option<&str>) -> bool {
    let Some(doctype) = doctype else {
        return true;
    };
    let body = doctype.get(7..).unwrap_or("").trim_start();
    let name_end = body
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(body.len());
    if !body[..name_end].eq_ignore_ascii_case("html") {
        return true;
    }

    let ids = body[name_end..].trim_start();
    let Some(public) = ids
        .get(..6)
        .filter(|keyword| keyword.eq_ignore_ascii_case("public"))
        .and_then(|_| quoted(&ids[6..]))
    else {
        return false;
    };
    let public_id = public.0.to_ascii_lowercase();
    let has_system_id = quoted(public.1).is_some();

    public_id == "html"
        || public_id == "-//w3o//dtd w3 html strict 3.0//en//"
        || public_id == "-/w3c/dtd html 4.0 transitional/en"
        || QUIRKS_PUBLIC_PREFIXES.iter().any(|p| public_id.starts_with(p))
        || (!has_system_id && QUIRKS_WITHOUT_SYSTEM_ID.iter().any(|p| public_id.starts_with(p)))
}

/// Leading quoted string of `text` and what follows it
fn quoted(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let quote = text.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let body = &text[1..];
    let end = body.find(quote)?;
    Some((&body[..end], &body[end + 1..]))
}

/// Quirks mode of a parsed document: decided by a doctype that comes before
/// any content
pub(crate) fn document_quirks(arena: &DomArena) -> Result<bool> {
    let Some(root_id) = arena.root_id() else {
        return Ok(true);
    };
    for &child_id in &arena.get(root_id)?.children_ids {
        let child = arena.get(child_id)?;
        match child.node_type {
            NodeType::DocumentType => return Ok(quirks_mode(Some(child.node_value.as_str()))),
            NodeType::Comment | NodeType::ProcessingInstruction | NodeType::CdataSection => {}
            NodeType::Text if child.is_whitespace_text() => {}
            _ => break,
        }
    }
    Ok(true)
}

/// How far down the stack an implied-close search may look
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    /// Only the current node
    Current,
    /// Stop at any of these
    Until(&'a [&'a str]),
    /// Stop at special elements other than `address`, `div` and `p`
    Special,
}

type ImpliedClose = (&'static [&'static str], Scope<'static>);

const CLOSE_LI: ImpliedClose = (&["li"], Scope::Special);
const CLOSE_DEFINITION: ImpliedClose = (DEFINITIONS, Scope::Special);
const CLOSE_OPTION: ImpliedClose = (&["option"], Scope::Current);
const CLOSE_OPTGROUP: ImpliedClose = (&["optgroup"], Scope::Current);
const CLOSE_CELL: ImpliedClose = (CELLS, Scope::Until(&["html", "table", "template", "tr"]));
const CLOSE_ROW: ImpliedClose = (
    &["tr"],
    Scope::Until(&["html", "table", "tbody", "template", "tfoot", "thead"]),
);
const CLOSE_SECTION: ImpliedClose = (TABLE_SECTIONS, Scope::Until(&["html", "table", "template"]));
const CLOSE_RUBY_TEXT: ImpliedClose = (RUBY_TEXT, Scope::Until(&["html", "ruby"]));
const CLOSE_HEAD: ImpliedClose = (&["head"], Scope::Until(&["html"]));
const CLOSE_P: ImpliedClose = (&["p"], Scope::Until(BUTTON_SCOPE));

/// Implied-close rules applied, in order, before inserting `tag`
fn implied_close_rules(tag: &str, quirks: bool) -> Vec<ImpliedClose> {
    let tag = tag.to_ascii_lowercase();
    let mut rules = match tag.as_str() {
        "li" => vec![CLOSE_LI],
        "dt" | "dd" => vec![CLOSE_DEFINITION],
        "option" => vec![CLOSE_OPTION],
        "optgroup" => vec![CLOSE_OPTION, CLOSE_OPTGROUP],
        "td" | "th" => vec![CLOSE_CELL],
        "tr" => vec![CLOSE_ROW],
        "tbody" | "tfoot" | "thead" => vec![CLOSE_SECTION],
        "rt" | "rp" => vec![CLOSE_RUBY_TEXT],
        "body" => vec![CLOSE_HEAD],
        _ => Vec::new(),
    };

    // In quirks mode a table nests inside the paragraph
    if P_CLOSERS.contains(&tag.as_str()) && !(quirks && tag == "table") {
        rules.push(CLOSE_P);
    }

    rules
}

fn in_list(list: &[&str], name: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(name))
}

fn in_foreign_content<S: AsRef<str>>(open: &[S]) -> bool {
    open.iter().skip(1).any(|n| is_foreign_root(n.as_ref()))
}

/// Stack length after the implied end tags a `tag` start tag triggers.
///
/// `open` holds the tag names of the open elements, `open[0]` being the
/// document. The serializer runs the same rules to check that an omitted end
/// tag comes back on the next parse.
pub(crate) fn close_for_start<S: AsRef<str>>(tag: &str, open: &[S], quirks: bool) -> usize {
    let mut len = open.len();
    if is_foreign_root(tag) || in_foreign_content(open) {
        return len;
    }
    for (targets, scope) in implied_close_rules(tag, quirks) {
        len = close_implied(targets, scope, &open[..len]);
    }
    len
}

/// Search the open elements for one of `targets`; the stack is cut just
/// below the match
fn close_implied<S: AsRef<str>>(targets: &[&str], scope: Scope<'_>, open: &[S]) -> usize {
    for depth in (1..open.len()).rev() {
        let tag = open[depth].as_ref();
        if in_list(targets, tag) {
            return depth;
        }
        let stop = match scope {
            Scope::Current => true,
            Scope::Until(boundary) => in_list(boundary, tag),
            Scope::Special => in_list(SPECIAL, tag) && !in_list(&["address", "div", "p"], tag),
        };
        if stop {
            break;
        }
    }
    open.len()
}

/// Cut to the nearest of `targets` unless a `boundary` element comes first
fn close_in_scope<S: AsRef<str>>(targets: &[&str], boundary: &[&str], open: &[S]) -> usize {
    close_implied(targets, Scope::Until(boundary), open)
}

/// Stack length after a `name` end tag; unchanged when the tag is ignored.
///
/// Block-level and table end tags pop everything above their element when
/// it is in scope. Any other end tag only closes its element when no
/// special element (`p`, `li`, `div`, ...) sits above it; formatting end
/// tags are approximated the same way as block ones.
pub(crate) fn close_for_end<S: AsRef<str>>(name: &str, open: &[S]) -> usize {
    let len = open.len();
    if is_void_element(name) {
        return len;
    }
    let name = name.to_ascii_lowercase();
    let name = name.as_str();

    if in_foreign_content(open) {
        for depth in (1..len).rev() {
            let tag = open[depth].as_ref();
            if tag.eq_ignore_ascii_case(name) {
                return depth;
            }
            if is_foreign_root(tag) {
                break;
            }
        }
    }

    match name {
        "p" => close_in_scope(&["p"], BUTTON_SCOPE, open),
        "li" => close_in_scope(&["li"], LIST_ITEM_SCOPE, open),
        "option" => match open.last() {
            Some(tag) if tag.as_ref().eq_ignore_ascii_case("option") => len - 1,
            _ => len,
        },
        "optgroup" => {
            let top = |i: usize| len.checked_sub(i).and_then(|at| open.get(at)).map(|t| t.as_ref());
            match (top(1), top(2)) {
                (Some(a), Some(b))
                    if a.eq_ignore_ascii_case("option") && b.eq_ignore_ascii_case("optgroup") =>
                {
                    len - 2
                }
                (Some(a), _) if a.eq_ignore_ascii_case("optgroup") => len - 1,
                _ => len,
            }
        }
        "select" => {
            for depth in (1..len).rev() {
                let tag = open[depth].as_ref();
                if tag.eq_ignore_ascii_case("select") {
                    return depth;
                }
                if !in_list(&["optgroup", "option"], tag) {
                    break;
                }
            }
            len
        }
        _ if in_list(HEADINGS, name) => close_in_scope(HEADINGS, DEFAULT_SCOPE, open),
        _ if in_list(SCOPED_END_TAGS, name) || in_list(FORMATTING_ELEMENTS, name) => {
            close_in_scope(&[name], DEFAULT_SCOPE, open)
        }
        _ if in_list(TABLE_END_TAGS, name) => close_in_scope(&[name], TABLE_SCOPE, open),
        _ => {
            for depth in (1..len).rev() {
                let tag = open[depth].as_ref();
                if tag.eq_ignore_ascii_case(name) {
                    return depth;
                }
                if in_list(SPECIAL, tag) {
                    break;
                }
            }
            len
        }
    }
}

struct TreeBuilder {
    arena: DomArena,
    /// Open elements; `stack[0]` is the document node
    stack: Vec<NodeId>,
    /// Tag names, parallel to `stack`
    names: Vec<String>,
    max_depth: usize,
    quirks: bool,
    /// A doctype is only honoured before any content
    mode_decided: bool,
}

impl TreeBuilder {
    fn new(max_depth: usize) -> Self {
        let arena = DomArena::new_document();
        let root = arena.root_id().unwrap_or(0);
        Self {
            arena,
            stack: vec![root],
            names: vec!["#document".to_string()],
            max_depth,
            quirks: true,
            mode_decided: false,
        }
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(0)
    }

    fn truncate(&mut self, len: usize) {
        self.stack.truncate(len);
        self.names.truncate(len);
    }

    /// Handle one token. Returns the tag name when the tokenizer must switch
    /// to raw text.
    fn process<'a>(&mut self, token: Token<'a>) -> Result<Option<&'a str>> {
        match &token {
            Token::Comment(_) | Token::Cdata(_) | Token::ProcessingInstruction(_) => {}
            Token::Text(text) if text.chars().all(crate::utils::is_html_whitespace) => {}
            Token::Doctype(text) => {
                if !self.mode_decided {
                    self.quirks = quirks_mode(Some(*text));
                }
                self.mode_decided = true;
            }
            _ => self.mode_decided = true,
        }

        match token {
            Token::Text(text) => self.insert_text(text)?,
            Token::Comment(text) => self.insert_leaf(NodeType::Comment, text)?,
            Token::Doctype(text) => self.insert_leaf(NodeType::DocumentType, text)?,
            Token::Cdata(text) => self.insert_leaf(NodeType::CdataSection, text)?,
            Token::ProcessingInstruction(text) => {
                self.insert_leaf(NodeType::ProcessingInstruction, text)?
            }
            Token::EndTag(name) => self.close_element(name)?,
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => return self.open_element(name, attributes, self_closing),
        }
        Ok(None)
    }

    fn close_element(&mut self, name: &str) -> Result<()> {
        let foreign = in_foreign_content(&self.names);

        // Browsers read `</br>` as `<br>`
        if name.eq_ignore_ascii_case("br") && !foreign {
            self.open_element("br", Attributes::new(), false)?;
            return Ok(());
        }

        let len = close_for_end(name, &self.names);
        if len < self.names.len() {
            self.truncate(len);
        } else if name.eq_ignore_ascii_case("p") && !foreign {
            // An unmatched `</p>` leaves an empty paragraph behind
            let id = self.arena.add_node(DomNode::element(0, "p"));
            self.arena.append_child(self.current(), id)?;
        } else {
            tracing::trace!(tag = name, "dropping stray end tag");
        }
        Ok(())
    }

    fn insert_text(&mut self, text: &str) -> Result<()> {
        let parent_id = self.current();
        let last_child = self.arena.get(parent_id)?.children_ids.last().copied();
        if let Some(last_id) = last_child {
            let last = self.arena.get_mut(last_id)?;
            if last.is_text() {
                last.node_value.push_str(text);
                return Ok(());
            }
        }
        let id = self.arena.add_node(DomNode::text(0, text));
        self.arena.append_child(parent_id, id)
    }

    fn insert_leaf(&mut self, node_type: NodeType, value: &str) -> Result<()> {
        let id = self.arena.add_node(DomNode::with_value(0, node_type, value));
        self.arena.append_child(self.current(), id)
    }

    fn open_element<'a>(
        &mut self,
        name: &'a str,
        attributes: Attributes,
        self_closing: bool,
    ) -> Result<Option<&'a str>> {
        let foreign = is_foreign_root(name) || in_foreign_content(&self.names);
        let len = close_for_start(name, &self.names, self.quirks);
        self.truncate(len);

        let mut node = DomNode::element(0, name);
        node.attributes = attributes;
        node.self_closing = foreign && self_closing;
        let is_leaf = node.self_closing || is_void_element(name);

        let id = self.arena.add_node(node);
        self.arena.append_child(self.current(), id)?;

        if is_leaf {
            return Ok(None);
        }

        self.stack.push(id);
        self.names.push(name.to_string());
        let depth = self.stack.len() - 1;
        if depth > self.max_depth {
            return Err(DomError::MaxDepthExceeded {
                current: depth,
                max: self.max_depth,
            });
        }

        if !foreign && is_raw_text_element(name) {
            return Ok(Some(name));
        }
        Ok(None)
    }
}
