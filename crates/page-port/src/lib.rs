//! Page port - the hosted form's element tree as seen by the engine
//!
//! The engine never talks to a browser directly. Everything it reads or
//! writes goes through [`PagePort`], with elements addressed by opaque
//! [`NodeId`] handles. Two implementations exist:
//! - `cdp-adapter::CdpPage` drives a real Chromium tab
//! - [`memory::MemoryPage`] is an in-memory tree for tests and rehearsals

pub mod errors;
pub mod events;
pub mod memory;
mod port;

pub use errors::PageError;
pub use events::DomEvent;
pub use port::{NodeId, PagePort};
