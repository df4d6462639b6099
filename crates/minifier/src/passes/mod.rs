//! Concrete Pass Implementations
//!
//! Grouped by what they touch: tree structure, attributes, links, output.

pub mod attributes;
pub mod links;
pub mod output;
pub mod structure;

use dom::{DomArena, DomNode};

use crate::error::Result;
use crate::pass::{Pass, PassContext, PassName};

pub use attributes::AttributeCleanup;
pub use links::{SameDomainLinks, SchemePrefix};
pub use output::{OmitOptionalTags, OmitQuotes};
pub use structure::{RemoveComments, SpacesBetweenTags, SumUpWhitespace, WhitespaceAroundTags};

/// Build the pass behind a registry entry
pub fn create(name: PassName) -> Box<dyn Pass> {
    match name {
        PassName::OptimizeViaDomParser
        | PassName::OptimizeAttributes
        | PassName::KeepExternalPrefix => Box::new(Gate(name)),

        PassName::RemoveComments => Box::new(RemoveComments),
        PassName::SumUpWhitespace => Box::new(SumUpWhitespace),
        PassName::RemoveWhitespaceAroundTags => Box::new(WhitespaceAroundTags),
        PassName::RemoveSpacesBetweenTags => Box::new(SpacesBetweenTags),

        PassName::RemoveHttpPrefix => Box::new(SchemePrefix::http()),
        PassName::RemoveHttpsPrefix => Box::new(SchemePrefix::https()),
        PassName::MakeSameDomainLinksRelative => Box::new(SameDomainLinks),

        PassName::RemoveOmittedQuotes => Box::new(OmitQuotes),
        PassName::RemoveOmittedHtmlTags => Box::new(OmitOptionalTags),

        // Everything else is an element-local attribute rule
        _ => match AttributeCleanup::for_pass(name) {
            Some(cleanup) => Box::new(cleanup),
            None => Box::new(Gate(name)),
        },
    }
}

/// Umbrella flags. They change nothing themselves: their dependents only
/// run when they are active, and `keep_http_and_https_prefix_on_external_attributes`
/// is read from the context.
pub struct Gate(pub PassName);

impl Pass for Gate {
    fn name(&self) -> PassName {
        self.0
    }

    fn apply(&self, _arena: &mut DomArena, _ctx: &PassContext) -> Result<usize> {
        Ok(0)
    }
}

/// Run `f` over every reachable element, summing the reported changes
pub(crate) fn for_each_element<F>(arena: &mut DomArena, mut f: F) -> Result<usize>
where
    F: FnMut(&mut DomNode) -> usize,
{
    let mut changes = 0;
    for id in arena.elements(None)? {
        changes += f(arena.get_mut(id)?);
    }
    Ok(changes)
}
