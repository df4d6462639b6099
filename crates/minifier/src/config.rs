//! Minifier settings
//!
//! A flat map of pass names to flags, as stored by the hosting application
//! (`settings.json`). Unknown keys are ignored and missing keys are off.

use serde::{Deserialize, Serialize};

use crate::error::{MinifyError, Result};
use crate::pass::{PassName, REGISTRY};

/// A flag that may also carry a list parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Flag(bool),
    List(Vec<String>),
}

impl Setting {
    /// A list counts as enabled even when empty
    pub fn is_enabled(&self) -> bool {
        match self {
            Setting::Flag(enabled) => *enabled,
            Setting::List(_) => true,
        }
    }

    /// List parameter, empty for plain flags
    pub fn values(&self) -> &[String] {
        match self {
            Setting::Flag(_) => &[],
            Setting::List(values) => values,
        }
    }
}

impl Default for Setting {
    fn default() -> Self {
        Setting::Flag(false)
    }
}

impl From<bool> for Setting {
    fn from(enabled: bool) -> Self {
        Setting::Flag(enabled)
    }
}

impl From<Vec<String>> for Setting {
    fn from(values: Vec<String>) -> Self {
        Setting::List(values)
    }
}

/// Pass configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    #[serde(alias = "dom_structural_optimization")]
    pub optimize_via_dom_parser: bool,
    pub remove_comments: bool,
    pub sum_up_whitespace: bool,
    pub remove_whitespace_around_tags: bool,
    pub optimize_attributes: bool,
    pub remove_http_prefix_from_attributes: bool,
    pub remove_https_prefix_from_attributes: bool,
    /// `true` or a list of attribute names to restrict the defaults to
    pub remove_default_attributes: Setting,
    pub remove_deprecated_anchor_name: bool,
    #[serde(alias = "remove_deprecated_script_charset")]
    pub remove_deprecated_script_charset_attribute: bool,
    #[serde(alias = "remove_deprecated_type_from_script")]
    pub remove_deprecated_type_from_script_tag: bool,
    pub remove_deprecated_type_from_stylesheet_link: bool,
    pub remove_empty_attributes: bool,
    pub remove_value_from_empty_input: bool,
    pub sort_css_class_names: bool,
    pub sort_html_attributes: bool,
    #[serde(alias = "keep_http_and_https_prefix_on_external_links")]
    pub keep_http_and_https_prefix_on_external_attributes: bool,
    /// Hosts whose absolute links become host-relative
    #[serde(alias = "make_same_domain_links_relative")]
    pub make_same_domains_links_relative: Setting,
    #[serde(alias = "remove_deprecated_type_from_style_and_link")]
    pub remove_deprecated_type_from_style_and_link_tag: bool,
    #[serde(alias = "remove_default_media_type")]
    pub remove_default_media_type_from_style_and_link_tag: bool,
    pub remove_default_type_from_button: bool,
    pub remove_spaces_between_tags: bool,
    pub remove_omitted_quotes: bool,
    #[serde(alias = "remove_omitted_closing_tags")]
    pub remove_omitted_html_tags: bool,

    /// Parser nesting limit; past it the page is left untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl PassConfig {
    /// Everything off
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pass on, default attributes for all known tags
    pub fn all() -> Self {
        let mut config = Self::default();
        for spec in REGISTRY {
            config.set_enabled(spec.name, true);
        }
        config
    }

    /// Parse the settings map
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(MinifyError::Config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(MinifyError::Config)
    }

    /// Builder-style toggle
    pub fn with(mut self, name: PassName, enabled: bool) -> Self {
        self.set_enabled(name, enabled);
        self
    }

    /// Whether the flag for `name` is set, regardless of prerequisites
    pub fn is_enabled(&self, name: PassName) -> bool {
        match name {
            PassName::OptimizeViaDomParser => self.optimize_via_dom_parser,
            PassName::RemoveComments => self.remove_comments,
            PassName::SumUpWhitespace => self.sum_up_whitespace,
            PassName::RemoveWhitespaceAroundTags => self.remove_whitespace_around_tags,
            PassName::OptimizeAttributes => self.optimize_attributes,
            PassName::RemoveHttpPrefix => self.remove_http_prefix_from_attributes,
            PassName::RemoveHttpsPrefix => self.remove_https_prefix_from_attributes,
            PassName::RemoveDefaultAttributes => self.remove_default_attributes.is_enabled(),
            PassName::RemoveDeprecatedAnchorName => self.remove_deprecated_anchor_name,
            PassName::RemoveDeprecatedScriptCharset => {
                self.remove_deprecated_script_charset_attribute
            }
            PassName::RemoveDeprecatedScriptType => self.remove_deprecated_type_from_script_tag,
            PassName::RemoveDeprecatedStylesheetLinkType => {
                self.remove_deprecated_type_from_stylesheet_link
            }
            PassName::RemoveEmptyAttributes => self.remove_empty_attributes,
            PassName::RemoveValueFromEmptyInput => self.remove_value_from_empty_input,
            PassName::SortCssClassNames => self.sort_css_class_names,
            PassName::SortHtmlAttributes => self.sort_html_attributes,
            PassName::KeepExternalPrefix => self.keep_http_and_https_prefix_on_external_attributes,
            PassName::MakeSameDomainLinksRelative => {
                self.make_same_domains_links_relative.is_enabled()
            }
            PassName::RemoveStyleAndLinkType => {
                self.remove_deprecated_type_from_style_and_link_tag
            }
            PassName::RemoveDefaultMediaType => {
                self.remove_default_media_type_from_style_and_link_tag
            }
            PassName::RemoveDefaultButtonType => self.remove_default_type_from_button,
            PassName::RemoveSpacesBetweenTags => self.remove_spaces_between_tags,
            PassName::RemoveOmittedQuotes => self.remove_omitted_quotes,
            PassName::RemoveOmittedHtmlTags => self.remove_omitted_html_tags,
        }
    }

    /// Set the flag for `name`. List settings keep their list when enabled.
    pub fn set_enabled(&mut self, name: PassName, enabled: bool) {
        let flag = match name {
            PassName::OptimizeViaDomParser => &mut self.optimize_via_dom_parser,
            PassName::RemoveComments => &mut self.remove_comments,
            PassName::SumUpWhitespace => &mut self.sum_up_whitespace,
            PassName::RemoveWhitespaceAroundTags => &mut self.remove_whitespace_around_tags,
            PassName::OptimizeAttributes => &mut self.optimize_attributes,
            PassName::RemoveHttpPrefix => &mut self.remove_http_prefix_from_attributes,
            PassName::RemoveHttpsPrefix => &mut self.remove_https_prefix_from_attributes,
            PassName::RemoveDefaultAttributes => {
                set_list(&mut self.remove_default_attributes, enabled);
                return;
            }
            PassName::RemoveDeprecatedAnchorName => &mut self.remove_deprecated_anchor_name,
            PassName::RemoveDeprecatedScriptCharset => {
                &mut self.remove_deprecated_script_charset_attribute
            }
            PassName::RemoveDeprecatedScriptType => {
                &mut self.remove_deprecated_type_from_script_tag
            }
            PassName::RemoveDeprecatedStylesheetLinkType => {
                &mut self.remove_deprecated_type_from_stylesheet_link
            }
            PassName::RemoveEmptyAttributes => &mut self.remove_empty_attributes,
            PassName::RemoveValueFromEmptyInput => &mut self.remove_value_from_empty_input,
            PassName::SortCssClassNames => &mut self.sort_css_class_names,
            PassName::SortHtmlAttributes => &mut self.sort_html_attributes,
            PassName::KeepExternalPrefix => {
                &mut self.keep_http_and_https_prefix_on_external_attributes
            }
            PassName::MakeSameDomainLinksRelative => {
                set_list(&mut self.make_same_domains_links_relative, enabled);
                return;
            }
            PassName::RemoveStyleAndLinkType => {
                &mut self.remove_deprecated_type_from_style_and_link_tag
            }
            PassName::RemoveDefaultMediaType => {
                &mut self.remove_default_media_type_from_style_and_link_tag
            }
            PassName::RemoveDefaultButtonType => &mut self.remove_default_type_from_button,
            PassName::RemoveSpacesBetweenTags => &mut self.remove_spaces_between_tags,
            PassName::RemoveOmittedQuotes => &mut self.remove_omitted_quotes,
            PassName::RemoveOmittedHtmlTags => &mut self.remove_omitted_html_tags,
        };
        *flag = enabled;
    }

    /// Domains treated as this site, lowercased
    pub fn local_domains(&self) -> Vec<String> {
        self.make_same_domains_links_relative
            .values()
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }
}

fn set_list(setting: &mut Setting, enabled: bool) {
    if enabled != setting.is_enabled() {
        *setting = Setting::Flag(enabled);
    }
}
