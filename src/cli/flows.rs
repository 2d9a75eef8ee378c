use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct FlowsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn cmd_flows(args: FlowsArgs, ctx: &CliContext) -> Result<()> {
    let catalog = ctx.catalog()?;

    if args.json {
        let flows: Vec<_> = catalog
            .flows()
            .map(|flow| {
                json!({
                    "id": flow.id,
                    "name": flow.name,
                    "targetUrl": flow.target_url,
                    "steps": flow.steps.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&flows)?);
        return Ok(());
    }

    for flow in catalog.flows() {
        println!(
            "{:<20} {:>3} steps  {}",
            flow.id,
            flow.steps.len(),
            flow.target_url
        );
    }
    Ok(())
}
