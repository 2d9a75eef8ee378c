//! formflow CLI library
//!
//! Exposes the configuration, Chromium page factory and HTTP command
//! router for integration testing.

pub mod cli;
pub mod config;
pub mod pages;
pub mod server;

pub use config::Config;
pub use pages::CdpPageFactory;
