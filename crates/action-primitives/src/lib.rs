//! Action primitives - element interactions and bounded waits
//!
//! This crate provides the building blocks every step executor uses:
//! - click, per-character typing, framework-safe value assignment,
//!   keyboard activation and checked-state assignment
//! - a deadline-bounded poll loop with named timing profiles
//! - a page fingerprint for detecting whether an action changed anything

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
