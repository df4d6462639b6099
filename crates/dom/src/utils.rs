//! Utility functions for text and whitespace handling

use crate::types::{is_raw_text_element, is_whitespace_preserving, DomNode};

/// HTML whitespace: space, tab, LF, FF, CR
#[inline]
pub fn is_html_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0C' | '\r')
}

/// True for text made only of HTML whitespace (empty included)
pub fn is_blank(text: &str) -> bool {
    text.chars().all(is_html_whitespace)
}

/// Collapse every whitespace run to a single space
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if is_html_whitespace(c) {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

pub fn trim_start_whitespace(text: &str) -> &str {
    text.trim_start_matches(is_html_whitespace)
}

pub fn trim_end_whitespace(text: &str) -> &str {
    text.trim_end_matches(is_html_whitespace)
}

/// Text inside this element is significant as written: in `pre`,
/// `textarea`, `script` and friends whitespace must not be touched.
pub fn preserves_text(node: &DomNode) -> bool {
    node.is_element()
        && (is_whitespace_preserving(&node.node_name) || is_raw_text_element(&node.node_name))
}
