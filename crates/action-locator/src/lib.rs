//! Element locator for the hosted form
//!
//! Lookup strategies in priority order:
//! - Selector - a stable attribute selector from the flow definition
//! - Text - normalized visible-text containment over candidate tag categories
//!
//! A third family walks from a found label to its surrounding container or
//! labelled control. A miss is `Ok(None)`, never an error; errors are reserved
//! for the page itself failing.

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod text;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use strategies::*;
pub use text::{normalize_text, texts_match};
pub use types::*;
