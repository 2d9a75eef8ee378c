use clap::Subcommand;

use super::flows::FlowsArgs;
use super::run::RunArgs;
use super::serve::ServeArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Fill the hosted form in Chromium from a JSON payload
    Run(RunArgs),

    /// Load and check a flow definition
    Validate(ValidateArgs),

    /// List the flows in the catalog
    Flows(FlowsArgs),

    /// Accept START_FLOW_WITH_PAYLOAD commands over HTTP
    Serve(ServeArgs),
}
