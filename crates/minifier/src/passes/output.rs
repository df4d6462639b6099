//! Output passes
//!
//! These leave the tree alone and switch serializer behaviour instead.

use dom::{DomArena, SerializerConfig};

use crate::error::Result;
use crate::pass::{Pass, PassContext, PassName};

/// `class=foo` instead of `class="foo"` where the value allows it
pub struct OmitQuotes;

impl Pass for OmitQuotes {
    fn name(&self) -> PassName {
        PassName::RemoveOmittedQuotes
    }

    fn apply(&self, _arena: &mut DomArena, _ctx: &PassContext) -> Result<usize> {
        Ok(0)
    }

    fn configure_output(&self, output: &mut SerializerConfig) {
        output.omit_attribute_quotes = true;
    }
}

/// Drop optional end tags (`</p>`, `</li>`, `</td>`, ...)
pub struct OmitOptionalTags;

impl Pass for OmitOptionalTags {
    fn name(&self) -> PassName {
        PassName::RemoveOmittedHtmlTags
    }

    fn apply(&self, _arena: &mut DomArena, _ctx: &PassContext) -> Result<usize> {
        Ok(0)
    }

    fn configure_output(&self, output: &mut SerializerConfig) {
        output.omit_optional_end_tags = true;
    }
}
