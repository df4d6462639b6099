//! Pass System - ordered, prerequisite-gated tree transformations
//!
//! Philosophy:
//! - One static table says which passes exist, in which order, and what
//!   each one needs
//! - Gating is resolved once per run, before the tree is touched
//! - A pass with an inactive prerequisite is skipped, never an error

use ahash::AHashSet;
use dom::{DomArena, SerializerConfig};
use std::fmt;

use crate::config::PassConfig;
use crate::error::{MinifyError, Result};
use crate::passes;

/// Every pass the minifier knows, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassName {
    OptimizeViaDomParser,
    RemoveComments,
    SumUpWhitespace,
    RemoveWhitespaceAroundTags,
    OptimizeAttributes,
    RemoveHttpPrefix,
    RemoveHttpsPrefix,
    RemoveDefaultAttributes,
    RemoveDeprecatedAnchorName,
    RemoveDeprecatedScriptCharset,
    RemoveDeprecatedScriptType,
    RemoveDeprecatedStylesheetLinkType,
    RemoveEmptyAttributes,
    RemoveValueFromEmptyInput,
    SortCssClassNames,
    SortHtmlAttributes,
    KeepExternalPrefix,
    MakeSameDomainLinksRelative,
    RemoveStyleAndLinkType,
    RemoveDefaultMediaType,
    RemoveDefaultButtonType,
    RemoveSpacesBetweenTags,
    RemoveOmittedQuotes,
    RemoveOmittedHtmlTags,
}

impl PassName {
    /// Settings key
    pub fn as_str(&self) -> &'static str {
        match self {
            PassName::OptimizeViaDomParser => "optimize_via_dom_parser",
            PassName::RemoveComments => "remove_comments",
            PassName::SumUpWhitespace => "sum_up_whitespace",
            PassName::RemoveWhitespaceAroundTags => "remove_whitespace_around_tags",
            PassName::OptimizeAttributes => "optimize_attributes",
            PassName::RemoveHttpPrefix => "remove_http_prefix_from_attributes",
            PassName::RemoveHttpsPrefix => "remove_https_prefix_from_attributes",
            PassName::RemoveDefaultAttributes => "remove_default_attributes",
            PassName::RemoveDeprecatedAnchorName => "remove_deprecated_anchor_name",
            PassName::RemoveDeprecatedScriptCharset => {
                "remove_deprecated_script_charset_attribute"
            }
            PassName::RemoveDeprecatedScriptType => "remove_deprecated_type_from_script_tag",
            PassName::RemoveDeprecatedStylesheetLinkType => {
                "remove_deprecated_type_from_stylesheet_link"
            }
            PassName::RemoveEmptyAttributes => "remove_empty_attributes",
            PassName::RemoveValueFromEmptyInput => "remove_value_from_empty_input",
            PassName::SortCssClassNames => "sort_css_class_names",
            PassName::SortHtmlAttributes => "sort_html_attributes",
            PassName::KeepExternalPrefix => "keep_http_and_https_prefix_on_external_attributes",
            PassName::MakeSameDomainLinksRelative => "make_same_domains_links_relative",
            PassName::RemoveStyleAndLinkType => "remove_deprecated_type_from_style_and_link_tag",
            PassName::RemoveDefaultMediaType => {
                "remove_default_media_type_from_style_and_link_tag"
            }
            PassName::RemoveDefaultButtonType => "remove_default_type_from_button",
            PassName::RemoveSpacesBetweenTags => "remove_spaces_between_tags",
            PassName::RemoveOmittedQuotes => "remove_omitted_quotes",
            PassName::RemoveOmittedHtmlTags => "remove_omitted_html_tags",
        }
    }

    /// Look up a pass by its settings key
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .map(|spec| spec.name)
            .find(|pass| pass.as_str() == name)
    }

    /// Declared prerequisite, if any
    pub fn requires(&self) -> Option<PassName> {
        REGISTRY
            .iter()
            .find(|spec| spec.name == *self)
            .and_then(|spec| spec.requires)
    }
}

impl fmt::Display for PassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entry
#[derive(Debug, Clone, Copy)]
pub struct PassSpec {
    pub name: PassName,
    pub requires: Option<PassName>,
}

const fn pass(name: PassName, requires: Option<PassName>) -> PassSpec {
    PassSpec { name, requires }
}

const DOM: Option<PassName> = Some(PassName::OptimizeViaDomParser);
const ATTRS: Option<PassName> = Some(PassName::OptimizeAttributes);

/// The pass table. Order is execution order; a prerequisite always comes
/// before the passes that need it.
pub static REGISTRY: &[PassSpec] = &[
    pass(PassName::OptimizeViaDomParser, None),
    pass(PassName::RemoveComments, DOM),
    pass(PassName::SumUpWhitespace, DOM),
    pass(PassName::RemoveWhitespaceAroundTags, DOM),
    pass(PassName::OptimizeAttributes, DOM),
    pass(PassName::RemoveHttpPrefix, ATTRS),
    pass(PassName::RemoveHttpsPrefix, ATTRS),
    pass(PassName::RemoveDefaultAttributes, ATTRS),
    pass(PassName::RemoveDeprecatedAnchorName, ATTRS),
    pass(PassName::RemoveDeprecatedScriptCharset, ATTRS),
    pass(PassName::RemoveDeprecatedScriptType, ATTRS),
    pass(PassName::RemoveDeprecatedStylesheetLinkType, ATTRS),
    pass(PassName::RemoveEmptyAttributes, ATTRS),
    pass(PassName::RemoveValueFromEmptyInput, ATTRS),
    pass(PassName::SortCssClassNames, ATTRS),
    pass(PassName::SortHtmlAttributes, ATTRS),
    pass(PassName::KeepExternalPrefix, None),
    pass(PassName::MakeSameDomainLinksRelative, None),
    pass(PassName::RemoveStyleAndLinkType, None),
    pass(PassName::RemoveDefaultMediaType, None),
    pass(PassName::RemoveDefaultButtonType, None),
    pass(PassName::RemoveSpacesBetweenTags, None),
    pass(PassName::RemoveOmittedQuotes, None),
    pass(PassName::RemoveOmittedHtmlTags, None),
];

/// Read-only inputs shared by every pass of one run
#[derive(Debug, Clone, Default)]
pub struct PassContext {
    /// Hosts of this site, lowercased
    pub local_domains: AHashSet<String>,
    /// Only strip URL schemes on links to `local_domains`
    pub keep_external_prefix: bool,
    /// Restricts default-attribute removal to these names; `None` is all
    pub default_attribute_filter: Option<AHashSet<String>>,
}

impl PassContext {
    pub fn from_config(config: &PassConfig, active: &[PassName]) -> Self {
        let filter: AHashSet<String> = config
            .remove_default_attributes
            .values()
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();

        Self {
            local_domains: config.local_domains().into_iter().collect(),
            keep_external_prefix: active.contains(&PassName::KeepExternalPrefix),
            default_attribute_filter: (!filter.is_empty()).then_some(filter),
        }
    }

    /// Host matches a local domain exactly, through `www.`, or through a
    /// `*.` pattern
    pub fn is_local_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if self.local_domains.contains(&host) {
            return true;
        }

        let alternate = match host.strip_prefix("www.") {
            Some(bare) => bare.to_string(),
            None => format!("www.{}", host),
        };
        if self.local_domains.contains(&alternate) {
            return true;
        }

        self.local_domains.iter().any(|pattern| {
            pattern.strip_prefix("*.").map_or(false, |domain| {
                host == domain || host.ends_with(&format!(".{}", domain))
            })
        })
    }
}

/// Pass trait - one named transformation of the document tree
pub trait Pass: Send + Sync {
    fn name(&self) -> PassName;

    /// Mutate the tree in place. Returns how many nodes or attributes were
    /// changed, for logging.
    fn apply(&self, arena: &mut DomArena, ctx: &PassContext) -> Result<usize>;

    /// Optional: passes that act at output time adjust the serializer
    fn configure_output(&self, output: &mut SerializerConfig) {
        let _ = output;
    }
}

/// Resolved, ordered list of active passes for one configuration
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
    skipped: Vec<PassName>,
    context: PassContext,
}

impl Pipeline {
    /// Walk the registry once: a pass is active when its flag is set and its
    /// prerequisite is active
    pub fn from_config(config: &PassConfig) -> Self {
        let mut active: Vec<PassName> = Vec::new();
        let mut skipped = Vec::new();

        for spec in REGISTRY {
            if !config.is_enabled(spec.name) {
                continue;
            }
            match spec.requires {
                Some(required) if !active.contains(&required) => {
                    tracing::debug!("Skipping pass {}: requires {}", spec.name, required);
                    skipped.push(spec.name);
                }
                _ => active.push(spec.name),
            }
        }

        let context = PassContext::from_config(config, &active);
        let mut pipeline = Self {
            passes: Vec::with_capacity(active.len()),
            skipped,
            context,
        };
        for name in active {
            pipeline.register(passes::create(name));
        }
        pipeline
    }

    fn register(&mut self, pass: Box<dyn Pass>) {
        tracing::debug!("Registered pass: {}", pass.name());
        self.passes.push(pass);
    }

    /// Active passes in execution order
    pub fn active(&self) -> Vec<PassName> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Enabled passes dropped for a missing prerequisite
    pub fn skipped(&self) -> &[PassName] {
        &self.skipped
    }

    pub fn context(&self) -> &PassContext {
        &self.context
    }

    /// Apply every active pass in order and collect the output settings.
    ///
    /// After each pass the tree is normalized and its invariants checked;
    /// a violation aborts the run.
    pub fn run(&self, arena: &mut DomArena) -> Result<SerializerConfig> {
        let mut output = SerializerConfig::default();

        for pass in &self.passes {
            let changes = pass.apply(arena, &self.context)?;
            let merged = arena.normalize()?;
            arena.validate().map_err(|e| MinifyError::Pass {
                pass: pass.name().as_str(),
                reason: e.to_string(),
            })?;
            pass.configure_output(&mut output);

            tracing::trace!(pass = pass.name().as_str(), changes, merged, "applied pass");
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_and_prerequisites() {
        assert_eq!(REGISTRY.len(), 24);
        assert_eq!(REGISTRY[0].name, PassName::OptimizeViaDomParser);

        for (index, spec) in REGISTRY.iter().enumerate() {
            if let Some(required) = spec.requires {
                let at = REGISTRY.iter().position(|s| s.name == required).unwrap();
                assert!(at < index, "{} listed before {}", spec.name, required);
            }
        }
    }

    #[test]
    fn test_names_roundtrip() {
        for spec in REGISTRY {
            assert_eq!(PassName::from_name(spec.name.as_str()), Some(spec.name));
        }
        assert_eq!(PassName::from_name("nope"), None);
        assert_eq!(
            PassName::SortHtmlAttributes.requires(),
            Some(PassName::OptimizeAttributes)
        );
        assert_eq!(PassName::RemoveOmittedQuotes.requires(), None);
    }

    #[test]
    fn test_pipeline_skips_missing_prerequisite() {
        let config = PassConfig::default()
            .with(PassName::SortHtmlAttributes, true)
            .with(PassName::RemoveOmittedQuotes, true);
        let pipeline = Pipeline::from_config(&config);

        assert_eq!(pipeline.active(), vec![PassName::RemoveOmittedQuotes]);
        assert_eq!(pipeline.skipped(), &[PassName::SortHtmlAttributes]);
    }

    #[test]
    fn test_pipeline_prerequisites_are_transitive() {
        // optimize_attributes is on but its own gate is off
        let config = PassConfig::default()
            .with(PassName::OptimizeAttributes, true)
            .with(PassName::SortHtmlAttributes, true);
        let pipeline = Pipeline::from_config(&config);

        assert!(pipeline.active().is_empty());
        assert_eq!(
            pipeline.skipped(),
            &[PassName::OptimizeAttributes, PassName::SortHtmlAttributes]
        );
    }

    #[test]
    fn test_pipeline_all_runs_everything_in_order() {
        let pipeline = Pipeline::from_config(&PassConfig::all());
        let expected: Vec<_> = REGISTRY.iter().map(|s| s.name).collect();

        assert_eq!(pipeline.active(), expected);
        assert!(pipeline.skipped().is_empty());
        assert!(pipeline.context().keep_external_prefix);
    }

    #[test]
    fn test_output_passes_configure_serializer() {
        let config = PassConfig::default()
            .with(PassName::RemoveOmittedQuotes, true)
            .with(PassName::RemoveOmittedHtmlTags, true);
        let mut arena = dom::parse("<p>x</p>").unwrap();
        let output = Pipeline::from_config(&config).run(&mut arena).unwrap();

        assert!(output.omit_attribute_quotes);
        assert!(output.omit_optional_end_tags);
    }

    #[test]
    fn test_local_host_matching() {
        let ctx = PassContext {
            local_domains: ["example.com", "*.cdn.net"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Default::default()
        };

        assert!(ctx.is_local_host("example.com"));
        assert!(ctx.is_local_host("WWW.Example.com"));
        assert!(ctx.is_local_host("cdn.net"));
        assert!(ctx.is_local_host("a.b.cdn.net"));
        assert!(!ctx.is_local_host("other.com"));
        assert!(!ctx.is_local_host("notexample.com"));
        assert!(!ctx.is_local_host("sub.example.com"));
    }

    #[test]
    fn test_default_attribute_filter() {
        let mut config = PassConfig::all();
        let ctx = PassContext::from_config(&config, &[]);
        assert!(ctx.default_attribute_filter.is_none());
        assert!(!ctx.keep_external_prefix);

        config.remove_default_attributes =
            crate::config::Setting::List(vec!["Method".to_string()]);
        let ctx = PassContext::from_config(&config, &[]);
        let filter = ctx.default_attribute_filter.unwrap();
        assert!(filter.contains("method"));
        assert_eq!(filter.len(), 1);
    }
}
