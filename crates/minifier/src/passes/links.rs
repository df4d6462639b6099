//! Link passes - shorten URL attribute values
//!
//! Responsibilities:
//! - Strip `http:` / `https:` so links become scheme-relative
//! - Rewrite absolute links to this site's domains as host-relative paths
//! - Leave anything the `url` crate would read differently than the source
//!   text alone

use dom::{is_url_attribute, DomArena, DomNode};
use std::borrow::Cow;
use url::Url;

use crate::error::Result;
use crate::pass::{Pass, PassContext, PassName};
use crate::passes::for_each_element;

fn strip_prefix_ignore_case<'v>(value: &'v str, prefix: &str) -> Option<&'v str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Rewrite every URL attribute value through `rewrite`
fn rewrite_urls<F>(node: &mut DomNode, rewrite: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let mut changes = 0;
    for attr in node.attributes.iter_mut() {
        if !is_url_attribute(&attr.name) {
            continue;
        }
        let Some(value) = &attr.value else {
            continue;
        };
        if let Some(rewritten) = rewrite(value) {
            attr.value = Some(rewritten);
            changes += 1;
        }
    }
    changes
}

/// `http://host/x` → `//host/x` (or `https:`)
pub struct SchemePrefix {
    name: PassName,
    scheme: &'static str,
}

impl SchemePrefix {
    pub fn http() -> Self {
        Self {
            name: PassName::RemoveHttpPrefix,
            scheme: "http:",
        }
    }

    pub fn https() -> Self {
        Self {
            name: PassName::RemoveHttpsPrefix,
            scheme: "https:",
        }
    }

    fn strip(&self, value: &str, ctx: &PassContext) -> Option<String> {
        let rest = strip_prefix_ignore_case(value, self.scheme)?;
        if !rest.starts_with("//") {
            return None;
        }

        if ctx.keep_external_prefix {
            let url = Url::parse(value).ok()?;
            if !ctx.is_local_host(url.host_str()?) {
                return None;
            }
        }

        Some(rest.to_string())
    }
}

impl Pass for SchemePrefix {
    fn name(&self) -> PassName {
        self.name
    }

    fn apply(&self, arena: &mut DomArena, ctx: &PassContext) -> Result<usize> {
        for_each_element(arena, |node| rewrite_urls(node, |value| self.strip(value, ctx)))
    }
}

/// `https://example.com/page?q` → `/page?q` for local domains
pub struct SameDomainLinks;

impl SameDomainLinks {
    fn relative(value: &str, ctx: &PassContext) -> Option<String> {
        let authority_start = if strip_prefix_ignore_case(value, "http://").is_some() {
            7
        } else if strip_prefix_ignore_case(value, "https://").is_some() {
            8
        } else if value.starts_with("//") {
            2
        } else {
            return None;
        };

        let absolute = if authority_start == 2 {
            Cow::Owned(format!("http:{}", value))
        } else {
            Cow::Borrowed(value)
        };
        let url = Url::parse(&absolute).ok()?;
        if !url.username().is_empty() || url.password().is_some() || url.port().is_some() {
            return None;
        }
        let host = url.host_str()?;
        if !ctx.is_local_host(host) {
            return None;
        }

        // The source text must spell the authority exactly as the parsed
        // host, so the path sliced from it is the one the browser resolves
        let after_scheme = &value[authority_start..];
        let authority_len = after_scheme
            .find(|c| matches!(c, '/' | '?' | '#'))
            .unwrap_or(after_scheme.len());
        if !after_scheme[..authority_len].eq_ignore_ascii_case(host) {
            return None;
        }

        let rest = &after_scheme[authority_len..];
        if rest.starts_with("//") {
            // Would turn into a link to another host
            return None;
        }
        Some(match rest.chars().next() {
            None => "/".to_string(),
            Some('/') => rest.to_string(),
            Some(_) => format!("/{}", rest),
        })
    }
}

impl Pass for SameDomainLinks {
    fn name(&self) -> PassName {
        PassName::MakeSameDomainLinksRelative
    }

    fn apply(&self, arena: &mut DomArena, ctx: &PassContext) -> Result<usize> {
        if ctx.local_domains.is_empty() {
            return Ok(0);
        }
        for_each_element(arena, |node| rewrite_urls(node, |value| Self::relative(value, ctx)))
    }
}
