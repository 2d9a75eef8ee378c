pub mod app;
pub mod commands;
pub mod console;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod flows;
pub mod run;
pub mod runtime;
pub mod serve;
pub mod validate;

pub use console::ConsoleOperator;
pub use context::CliContext;
