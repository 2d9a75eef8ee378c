use super::commands::Commands;
use super::context::CliContext;
use super::env::CliArgs;
use super::flows::cmd_flows;
use super::run::cmd_run;
use super::serve::cmd_serve;
use super::validate::cmd_validate;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Validate(args) => cmd_validate(args, ctx).await,
        Commands::Flows(args) => cmd_flows(args, ctx).await,
        Commands::Serve(args) => cmd_serve(args, ctx).await,
    }
}
