//! HTML Minification Pipeline
//!
//! Turns a rendered page into a smaller page that behaves the same:
//! parse into an arena tree, run the enabled passes, serialize.
//!
//! # Architecture
//!
//! 1. **Static prerequisite table**: which passes run is decided once per
//!    call, before the tree is touched ([`pass::REGISTRY`])
//! 2. **No shared mutable state**: every call owns its document; the
//!    registry is read-only
//! 3. **Never break the page**: [`minify`] returns the input unchanged on
//!    any failure, panics included
//!
//! ```text
//! raw ─→ DomParser ─→ DomArena ─→ Pipeline (passes) ─→ DomSerializer ─→ minified
//!  └──────────────────── on any error ───────────────────────────────→ raw
//! ```

pub mod config;
pub mod error;
pub mod pass;
pub mod passes;

#[cfg(test)]
mod conformance;

pub use config::{PassConfig, Setting};
pub use error::{MinifyError, Result};
pub use pass::{Pass, PassContext, PassName, Pipeline, REGISTRY};

use dom::{DomParser, DomSerializer, ParserConfig};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// What one [`minify_with_report`] call did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinifyReport {
    pub input_len: usize,
    pub output_len: usize,
    pub passes_run: Vec<String>,
    pub passes_skipped: Vec<String>,
    /// The input was returned unchanged because minification failed
    pub fell_back: bool,
}

impl MinifyReport {
    /// Bytes saved, zero when the output is not smaller
    pub fn saved(&self) -> usize {
        self.input_len.saturating_sub(self.output_len)
    }
}

/// Minify `raw` with `config`. Never fails: on any internal error the
/// input is returned as is.
pub fn minify(raw: &str, config: &PassConfig) -> String {
    minify_with_report(raw, config).0
}

/// Like [`minify`], surfacing the failure instead of falling back
pub fn try_minify(raw: &str, config: &PassConfig) -> Result<String> {
    let pipeline = Pipeline::from_config(config);
    guarded(|| run(raw, config, &pipeline))
}

/// Like [`minify`], also describing which passes ran
pub fn minify_with_report(raw: &str, config: &PassConfig) -> (String, MinifyReport) {
    let pipeline = Pipeline::from_config(config);

    let (output, fell_back) = match guarded(|| run(raw, config, &pipeline)) {
        Ok(output) => (output, false),
        Err(e) => {
            tracing::warn!(error = %e, "Minification failed, returning input unchanged");
            (raw.to_string(), true)
        }
    };

    let report = MinifyReport {
        input_len: raw.len(),
        output_len: output.len(),
        passes_run: names(pipeline.active()),
        passes_skipped: names(pipeline.skipped().iter().copied()),
        fell_back,
    };
    (output, report)
}

fn run(raw: &str, config: &PassConfig, pipeline: &Pipeline) -> Result<String> {
    let parser_config = match config.max_depth {
        Some(max_depth) => ParserConfig { max_depth },
        None => ParserConfig::default(),
    };
    let mut arena = DomParser::with_config(parser_config).parse(raw)?;

    let output = pipeline.run(&mut arena)?;

    Ok(DomSerializer::with_config(output).serialize(&arena)?)
}

/// Turn a panic anywhere below into `MinifyError::Panic`
fn guarded<F>(f: F) -> Result<String>
where
    F: FnOnce() -> Result<String>,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(MinifyError::Panic(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn names<I>(passes: I) -> Vec<String>
where
    I: IntoIterator<Item = PassName>,
{
    passes.into_iter().map(|name| name.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
        <meta charset=\"utf-8\">\n<title>Example  page</title>\n\
        <link rel=\"stylesheet\" type=\"text/css\" href=\"https://example.com/s.css\" media=\"all\">\n\
        <!--[if lt IE 9]><script src=\"html5shiv.js\"></script><![endif]-->\n\
        <script type=\"text/javascript\" charset=\"utf-8\">var a  =  1;</script>\n\
        </head>\n<body class=\"\">\n<!-- header -->\n\
        <div id=\"main\" class=\"wide  box\">\n  <a name=\"top\" id=\"top\"></a>\n\
        <p>Some   <b>bold</b> text\n  <p>Next &amp; more\n\
        <ul>\n  <li><a href=\"https://example.com/a?x=1\">A</a>\n  <li><a href=\"http://other.com/b\">B</a>\n</ul>\n\
        <table><tr><td>1<td>2<tr><td>3</table>\n\
        <form method=\"get\"><input type=\"text\" value=\"\"><button type=\"submit\">Go</button></form>\n\
        <pre>  keep   this  </pre>\n<img src=\"x.png\" alt=\"\">\n</div>\n</body>\n</html>\n";

    fn structural() -> PassConfig {
        PassConfig::new().with(PassName::OptimizeViaDomParser, true)
    }

    fn example_domains() -> PassConfig {
        PassConfig::from_json(r#"{"make_same_domains_links_relative": ["example.com"]}"#).unwrap()
    }

    fn configs() -> Vec<PassConfig> {
        let mut all_with_domains = PassConfig::all();
        all_with_domains.make_same_domains_links_relative = vec!["example.com".to_string()].into();

        vec![
            PassConfig::new(),
            structural().with(PassName::RemoveComments, true),
            structural()
                .with(PassName::SumUpWhitespace, true)
                .with(PassName::RemoveWhitespaceAroundTags, true),
            PassConfig::new().with(PassName::RemoveOmittedHtmlTags, true),
            PassConfig::new()
                .with(PassName::RemoveOmittedQuotes, true)
                .with(PassName::RemoveSpacesBetweenTags, true),
            example_domains(),
            PassConfig::all(),
            all_with_domains,
        ]
    }

    #[test]
    fn test_zero_passes_roundtrips() {
        let html = "<div class=a>x<br/>y &amp; z<p>one<p>two</div>";
        let expected = dom::serialize(&dom::parse(html).unwrap()).unwrap();

        assert_eq!(minify(html, &PassConfig::new()), expected);
        assert_eq!(
            minify(&expected, &PassConfig::new()),
            expected,
            "zero-pass output must reparse to itself"
        );
    }

    #[test]
    fn test_fixed_point() {
        for config in configs() {
            let once = minify(PAGE, &config);
            let twice = minify(&once, &config);
            assert_eq!(once, twice, "not a fixed point for {:?}", config);
        }
    }

    #[test]
    fn test_full_pipeline_shrinks_page() {
        let (out, report) = minify_with_report(PAGE, &PassConfig::all());

        assert!(!report.fell_back);
        assert!(report.output_len < report.input_len);
        assert_eq!(report.saved(), PAGE.len() - out.len());
        assert_eq!(report.passes_run.len(), REGISTRY.len());
        assert!(report.passes_skipped.is_empty());

        assert!(out.contains("<pre>  keep   this  </pre>"));
        assert!(out.contains("<!--[if lt IE 9]>"));
        assert!(!out.contains("header"));
        assert!(!out.contains("text/javascript"));
    }

    #[test]
    fn test_prerequisite_gating() {
        let gated = structural().with(PassName::SortHtmlAttributes, true);
        let off = structural().with(PassName::SortHtmlAttributes, false);
        let html = "<a title=\"t\" href=\"/x\" class=\"b a\">x</a>";
        assert_eq!(minify(html, &gated), minify(html, &off));
        assert_eq!(minify(html, &gated), html);

        // Every dependent pass, one at a time, with its prerequisite switched off
        for spec in REGISTRY {
            let Some(required) = spec.requires else {
                continue;
            };
            let enabled = PassConfig::all().with(required, false);
            let disabled = enabled.clone().with(spec.name, false);
            assert_eq!(
                minify(PAGE, &enabled),
                minify(PAGE, &disabled),
                "{} ran without {}",
                spec.name,
                required
            );
        }
    }

    #[test]
    fn test_void_elements_never_closed() {
        let mut configs = configs();
        configs.push(PassConfig::new().with(PassName::RemoveOmittedHtmlTags, true));
        for config in configs {
            for html in ["<img src=\"x\">", "<p><img src=\"x\"></img></p>", "<img src=\"x\"/>"] {
                let out = minify(html, &config);
                assert!(!out.contains("</img>"), "{} -> {}", html, out);
                assert!(out.contains("<img src="), "{} -> {}", html, out);
            }
        }
    }

    #[test]
    fn test_same_domain_links() {
        let out = minify(
            "<a href=\"https://example.com/page\">a</a><a href=\"https://other.com/page\">b</a>",
            &example_domains(),
        );
        assert!(out.contains("<a href=\"/page\">"));
        assert!(out.contains("<a href=\"https://other.com/page\">"));
    }

    #[test]
    fn test_comment_removal_needs_structural_gate() {
        let html = "<!-- note --><p>x</p>";

        let enabled = structural().with(PassName::RemoveComments, true);
        assert_eq!(minify(html, &enabled), "<p>x</p>");

        let gated = PassConfig::new().with(PassName::RemoveComments, true);
        assert_eq!(minify(html, &gated), html);
    }

    #[test]
    fn test_deep_nesting_falls_back() {
        let html = format!("{}x", "<div>".repeat(10_000));

        let (out, report) = minify_with_report(&html, &PassConfig::all());
        assert_eq!(out, html);
        assert!(report.fell_back);

        assert!(matches!(
            try_minify(&html, &PassConfig::all()),
            Err(MinifyError::Dom(dom::DomError::MaxDepthExceeded { .. }))
        ));
    }

    #[test]
    fn test_max_depth_setting() {
        let html = "<div><div><div><div>x</div></div></div></div>";
        let mut config = structural().with(PassName::RemoveComments, true);

        assert_eq!(minify(html, &config), html);
        config.max_depth = Some(3);
        assert!(try_minify(html, &config).is_err());
        assert_eq!(minify(html, &config), html);
    }

    #[test]
    fn test_malformed_markup_never_escapes() {
        for html in [
            "",
            "<",
            "</",
            "<div",
            "<a href=\"unterminated",
            "</p></div></html>",
            "<!--",
            "<![CDATA[",
            "<script>never closed",
            "<table><td><li><dd><option></select></table></ul>",
            "<svg><p/><math><mi/></svg>",
            "&&&<<<>>>",
        ] {
            for config in configs() {
                let once = minify(html, &config);
                assert_eq!(minify(&once, &config), once, "{:?}", html);
            }
        }
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        assert!(matches!(
            guarded(|| panic!("inside")),
            Err(MinifyError::Panic(message)) if message == "inside"
        ));
    }

    #[test]
    fn test_report_serializes() {
        let (_, report) = minify_with_report("<p>x</p>", &PassConfig::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["fell_back"], false);
        assert_eq!(json["passes_run"], serde_json::json!([]));
    }
}
