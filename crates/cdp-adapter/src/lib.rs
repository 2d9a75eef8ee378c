//! Chromium DevTools backend for the form engine.
//!
//! [`CdpBrowser`] launches (or attaches to) Chromium over the raw DevTools
//! websocket and opens tabs; each tab is a [`CdpPage`], an implementation of
//! the engine's page port that evaluates a small helper script per call.

mod browser;
pub mod config;
pub mod error;
mod launch;
mod page;
pub mod script;
pub mod transport;

pub use browser::CdpBrowser;
pub use config::{detect_chrome_executable, CdpConfig};
pub use error::{AdapterError, AdapterErrorKind};
pub use page::CdpPage;
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget};
