use anyhow::{bail, Context, Result};
use clap::Args;
use formflow_core_types::StepKind;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Catalog flow id, or a path to a definition file (.yaml/.yml/.json)
    #[arg(short, long)]
    pub flow: String,

    /// Print every step
    #[arg(short, long)]
    pub verbose: bool,
}

/// Loading already validates structure; this also rejects step types no
/// executor handles.
pub async fn cmd_validate(args: ValidateArgs, ctx: &CliContext) -> Result<()> {
    let mut catalog = ctx.catalog()?;
    let flow = catalog
        .resolve(&args.flow)
        .with_context(|| format!("Flow {} is not valid", args.flow))?;

    println!(
        "{}: {} steps, target {}",
        flow.id,
        flow.steps.len(),
        flow.target_url
    );
    if args.verbose {
        for step in &flow.steps {
            let gate = step
                .conditional
                .as_ref()
                .map(|rule| format!(" (after {})", rule.prerequisite))
                .unwrap_or_default();
            println!("  {} [{}]{}", step.id, step.kind, gate);
        }
    }

    let unknown: Vec<String> = flow
        .steps
        .iter()
        .filter(|step| matches!(step.kind, StepKind::Unknown(_)))
        .map(|step| format!("{} ({})", step.id, step.kind))
        .collect();
    if !unknown.is_empty() {
        bail!("Flow {} has unknown step types: {}", flow.id, unknown.join(", "));
    }
    Ok(())
}
