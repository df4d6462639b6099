//! HTML Document Model
//!
//! Tolerant parsing of real-world markup into an arena tree, and
//! serialization back to markup.
//!
//! ## Design
//!
//! - **Data structures first**: one arena per document, `u32` node ids
//! - **Source fidelity**: text and attribute values stay as written, entities
//!   are never decoded, so `serialize(parse(x))` only normalizes syntax
//! - **No failure on bad markup**: the parser recovers from anything except
//!   pathological nesting depth
//!
//! ```text
//! &str → Tokenizer → TreeBuilder → DomArena → DomSerializer → String
//!                                     ↑   ↓
//!                              passes mutate in place
//! ```

pub mod arena;
pub mod error;
pub mod parser;
pub mod serializer;
pub mod types;
pub mod utils;

pub use arena::DomArena;
pub use error::{DomError, Result};
pub use parser::{parse, DomParser, ParserConfig};
pub use serializer::{serialize, DomSerializer, SerializerConfig};
pub use types::*;
