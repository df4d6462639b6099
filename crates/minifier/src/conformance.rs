//! Minified output against a browser-grade parser
//!
//! html5ever builds the tree a browser would. Whatever a pass leaves out,
//! that tree must not change.

use html5ever::tendril::TendrilSink;
use html5ever::{namespace_url, ns, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::fmt::Write;

use crate::{minify, PassConfig, PassName};

/// Indented dump of the tree html5ever builds from `html`
fn browser_tree(html: &str) -> String {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let mut out = String::new();
    write_node(&dom.document, 0, &mut out);
    out
}

fn write_node(handle: &Handle, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match &handle.data {
        NodeData::Document => {}
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => {
            writeln!(out, "{indent}<!DOCTYPE {name} {public_id:?} {system_id:?}>").unwrap();
        }
        NodeData::Text { contents } => {
            writeln!(out, "{indent}{:?}", &**contents.borrow()).unwrap();
        }
        NodeData::Comment { contents } => {
            writeln!(out, "{indent}<!--{contents}-->").unwrap();
        }
        NodeData::ProcessingInstruction { target, contents } => {
            writeln!(out, "{indent}<?{target} {contents}>").unwrap();
        }
        NodeData::Element { name, attrs, .. } => {
            let foreign = if name.ns == ns!(html) { "" } else { "foreign " };
            let mut attrs: Vec<_> = attrs
                .borrow()
                .iter()
                .map(|a| format!("{}={:?}", a.name.local, &*a.value))
                .collect();
            attrs.sort();
            writeln!(out, "{indent}<{foreign}{} {}>", name.local, attrs.join(" ")).unwrap();
        }
    }
    for child in handle.children.borrow().iter() {
        write_node(child, depth + 1, out);
    }
}

/// All text of the browser tree, entities decoded
fn browser_text(html: &str) -> String {
    fn collect(handle: &Handle, out: &mut String) {
        if let NodeData::Text { contents } = &handle.data {
            out.push_str(&contents.borrow());
        }
        for child in handle.children.borrow().iter() {
            collect(child, out);
        }
    }
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let mut out = String::new();
    collect(&dom.document, &mut out);
    out
}

const DOCUMENTS: &[&str] = &[
    // End tags that browsers ignore or rebuild
    "<span><p>a</p></span>b",
    "<b><p>x</p></b>y",
    "<em><li>x</li></em>y",
    "<a href=\"#\"><p>x</p></a>",
    "<font><dd>x</dd></font>z",
    // Stray end tags
    "<p>a</br>b</p>",
    "a</p>b",
    "<div>a</p>b</div>",
    // Optional end tags
    "<div><p>a</p><p>b</p></div>",
    "<ul><li>a</li><li><p>b</p></li></ul>",
    "<ol><li>a</li><li>b<ul><li>c</li></ul></li></ol>",
    "<table><thead><tr><th>h</th></tr></thead><tbody><tr><td>a</td><td>b</td></tr></tbody></table>",
    "<table><tr><td><p>x</p></td></tr></table>",
    "<dl><dt>a</dt><dd>b</dd><dt>c</dt><dd><p>d</p></dd></dl>",
    "<select><option>a</option><optgroup><option>b</option></optgroup></select>",
    "<ul><li><dd>x</dd></li><li>y</li></ul>",
    "<section><li>x</li></section><div><p>y</p></div>",
    "<ruby>a<rt>b</rt><rp>c</rp></ruby>",
    // Paragraph before a table, standards and quirks mode
    "<!DOCTYPE html><p>a</p><table><tr><td>x</td></tr></table>",
    "<p>a</p><table><tr><td>x</td></tr></table>",
    "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\"><p>a</p><table></table>",
    // Whole documents
    "<!DOCTYPE html><html><head><title>t</title></head><body><p class=\"a b\" id=x>one</p></body></html>",
    "<html><head></head> <body><ul><li>a</li></ul></body></html>",
];

fn output_configs() -> Vec<PassConfig> {
    vec![
        PassConfig::new(),
        PassConfig::new().with(PassName::RemoveOmittedHtmlTags, true),
        PassConfig::new()
            .with(PassName::RemoveOmittedHtmlTags, true)
            .with(PassName::RemoveOmittedQuotes, true),
    ]
}

#[test]
fn test_output_builds_same_browser_tree() {
    for config in output_configs() {
        for &html in DOCUMENTS {
            let out = minify(html, &config);
            assert_eq!(
                browser_tree(&out),
                browser_tree(html),
                "\ninput:  {}\noutput: {}",
                html,
                out
            );
        }
    }
}

#[test]
fn test_end_tags_are_omitted_where_safe() {
    let config = PassConfig::new().with(PassName::RemoveOmittedHtmlTags, true);
    assert_eq!(
        minify("<div><p>a</p><p>b</p></div>", &config),
        "<div><p>a<p>b</div>"
    );
    assert_eq!(
        minify("<b><p>x</p></b>y", &config),
        "<b><p>x</p></b>y"
    );
}

#[test]
fn test_comment_removal_keeps_text() {
    let config = PassConfig::new()
        .with(PassName::OptimizeViaDomParser, true)
        .with(PassName::RemoveComments, true);
    for html in [
        "<p>&am<!-- x -->p;</p>",
        "<p>&<!-- x -->#38;</p>",
        "<p>a &amp;<!-- x --> b</p>",
        "&lt<!-- a --><!-- b -->;",
    ] {
        let out = minify(html, &config);
        assert_eq!(browser_text(&out), browser_text(html), "{} -> {}", html, out);
    }
}
