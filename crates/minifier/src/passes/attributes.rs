//! Attribute passes
//!
//! Each pass is a plain rule over one element. Values are compared
//! case-insensitively with surrounding whitespace ignored, the way browsers
//! read enumerated attributes.

use dom::utils::{is_blank, is_html_whitespace};
use dom::{DomArena, DomNode};

use crate::error::Result;
use crate::pass::{Pass, PassContext, PassName};
use crate::passes::for_each_element;

type Rule = fn(&mut DomNode, &PassContext) -> usize;

/// An element-local attribute rule, applied to every element
pub struct AttributeCleanup {
    name: PassName,
    rule: Rule,
}

impl AttributeCleanup {
    /// The rule behind `name`, or `None` for passes that are not
    /// element-local attribute rules
    pub fn for_pass(name: PassName) -> Option<Self> {
        let rule: Rule = match name {
            PassName::RemoveDefaultAttributes => remove_default_attributes,
            PassName::RemoveDeprecatedAnchorName => remove_anchor_name,
            PassName::RemoveDeprecatedScriptCharset => remove_script_charset,
            PassName::RemoveDeprecatedScriptType => remove_script_type,
            PassName::RemoveDeprecatedStylesheetLinkType => remove_stylesheet_link_type,
            PassName::RemoveEmptyAttributes => remove_empty_attributes,
            PassName::RemoveValueFromEmptyInput => remove_empty_input_value,
            PassName::SortCssClassNames => sort_class_names,
            PassName::SortHtmlAttributes => sort_attributes,
            PassName::RemoveStyleAndLinkType => remove_style_and_link_type,
            PassName::RemoveDefaultMediaType => remove_default_media,
            PassName::RemoveDefaultButtonType => remove_button_type,
            _ => return None,
        };
        Some(Self { name, rule })
    }
}

impl Pass for AttributeCleanup {
    fn name(&self) -> PassName {
        self.name
    }

    fn apply(&self, arena: &mut DomArena, ctx: &PassContext) -> Result<usize> {
        for_each_element(arena, |node| (self.rule)(node, ctx))
    }
}

/// Attribute value equals `expected`, ignoring case and outer whitespace.
/// A bare attribute reads as empty.
fn value_is(node: &DomNode, attr: &str, expected: &str) -> bool {
    node.attributes
        .get(attr)
        .map_or(false, |a| {
            a.value_or_empty()
                .trim_matches(is_html_whitespace)
                .eq_ignore_ascii_case(expected)
        })
}

fn remove(node: &mut DomNode, attr: &str) -> usize {
    usize::from(node.attributes.remove(attr).is_some())
}

fn remove_if(node: &mut DomNode, attr: &str, expected: &str) -> usize {
    if value_is(node, attr, expected) {
        remove(node, attr)
    } else {
        0
    }
}

fn is_stylesheet_link(node: &DomNode) -> bool {
    node.is_tag("link")
        && node.attr("rel").map_or(false, |rel| {
            rel.split(is_html_whitespace)
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
        })
}

/// `(tag, attribute, default value)`
const DEFAULT_ATTRIBUTES: &[(&str, &str, &str)] = &[
    ("a", "target", "_self"),
    ("area", "shape", "rect"),
    ("canvas", "height", "150"),
    ("canvas", "width", "300"),
    ("col", "span", "1"),
    ("colgroup", "span", "1"),
    ("form", "autocomplete", "on"),
    ("form", "enctype", "application/x-www-form-urlencoded"),
    ("form", "method", "get"),
    ("img", "decoding", "auto"),
    ("input", "type", "text"),
    ("meter", "max", "1"),
    ("meter", "min", "0"),
    ("ol", "type", "1"),
    ("progress", "max", "1"),
    ("td", "colspan", "1"),
    ("td", "rowspan", "1"),
    ("textarea", "wrap", "soft"),
    ("th", "colspan", "1"),
    ("th", "rowspan", "1"),
    ("track", "kind", "subtitles"),
];

fn remove_default_attributes(node: &mut DomNode, ctx: &PassContext) -> usize {
    let mut removed = 0;
    for &(tag, attr, default) in DEFAULT_ATTRIBUTES {
        if !node.is_tag(tag) {
            continue;
        }
        if let Some(filter) = &ctx.default_attribute_filter {
            if !filter.contains(attr) {
                continue;
            }
        }
        removed += remove_if(node, attr, default);
    }
    removed
}

/// `<a name="x" id="x">`: the id already makes it a fragment target
fn remove_anchor_name(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if node.is_tag("a") && node.attr("id").is_some() && node.attr("name") == node.attr("id") {
        return remove(node, "name");
    }
    0
}

fn remove_script_charset(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if node.is_tag("script") {
        return remove(node, "charset");
    }
    0
}

const JAVASCRIPT_TYPES: &[&str] = &[
    "",
    "application/ecmascript",
    "application/javascript",
    "application/x-ecmascript",
    "application/x-javascript",
    "text/ecmascript",
    "text/javascript",
    "text/javascript1.0",
    "text/javascript1.5",
    "text/jscript",
    "text/x-ecmascript",
    "text/x-javascript",
];

/// `type` and `language` that only restate "this is JavaScript"
fn remove_script_type(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if !node.is_tag("script") {
        return 0;
    }
    let mut removed = 0;
    if JAVASCRIPT_TYPES.iter().any(|t| value_is(node, "type", t)) {
        removed += remove(node, "type");
    }
    removed + remove_if(node, "language", "javascript")
}

fn remove_stylesheet_link_type(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if is_stylesheet_link(node) {
        return remove_if(node, "type", "text/css");
    }
    0
}

fn remove_style_and_link_type(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if node.is_tag("style") || is_stylesheet_link(node) {
        return remove_if(node, "type", "text/css");
    }
    0
}

fn remove_default_media(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if node.is_tag("style") || node.is_tag("link") {
        return remove_if(node, "media", "all");
    }
    0
}

fn remove_button_type(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if node.is_tag("button") {
        return remove_if(node, "type", "submit");
    }
    0
}

/// Attributes where empty and absent mean the same thing
const DROP_WHEN_EMPTY: &[&str] = &["class", "dir", "id", "style"];

fn remove_empty_attributes(node: &mut DomNode, _ctx: &PassContext) -> usize {
    let before = node.attributes.len();
    node.attributes.retain(|attr| {
        let droppable = DROP_WHEN_EMPTY.iter().any(|name| attr.is(name))
            || (attr.name.len() > 2
                && attr.name.get(..2).map_or(false, |p| p.eq_ignore_ascii_case("on")));
        !(droppable && is_blank(attr.value_or_empty()))
    });
    before - node.attributes.len()
}

/// Input types where an empty `value` shows differently than none
const VALUE_SIGNIFICANT_INPUTS: &[&str] =
    &["button", "checkbox", "image", "radio", "reset", "submit"];

fn remove_empty_input_value(node: &mut DomNode, _ctx: &PassContext) -> usize {
    if !node.is_tag("input") || !node.attributes.value("value").map_or(false, str::is_empty) {
        return 0;
    }
    let significant = VALUE_SIGNIFICANT_INPUTS
        .iter()
        .any(|t| value_is(node, "type", t));
    if significant {
        return 0;
    }
    remove(node, "value")
}

fn sort_class_names(node: &mut DomNode, _ctx: &PassContext) -> usize {
    let Some(attr) = node.attributes.iter_mut().find(|a| a.is("class")) else {
        return 0;
    };
    let Some(value) = &attr.value else {
        return 0;
    };

    let mut classes: Vec<&str> = value
        .split(is_html_whitespace)
        .filter(|c| !c.is_empty())
        .collect();
    classes.sort_unstable();
    let sorted = classes.join(" ");

    if is_blank(value) || sorted == *value {
        return 0;
    }
    attr.value = Some(sorted);
    1
}

fn sort_attributes(node: &mut DomNode, _ctx: &PassContext) -> usize {
    let before: Vec<String> = node.attributes.iter().map(|a| a.name.clone()).collect();
    node.attributes.sort_by_name();
    node.attributes
        .iter()
        .zip(&before)
        .filter(|(attr, name)| attr.name != **name)
        .count()
}
