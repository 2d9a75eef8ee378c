use std::path::PathBuf;
use std::sync::Arc;

use action_flow::{StartFlow, DEFAULT_FLOW_ID};
use anyhow::{bail, Context, Result};
use clap::Args;
use formflow_core_types::RunStatus;
use serde_json::Value;
use tokio::fs;
use tracing::info;

use super::console::ConsoleOperator;
use super::context::CliContext;
use crate::pages::CdpPageFactory;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Catalog flow id, or a path to a definition file
    #[arg(short, long, default_value = DEFAULT_FLOW_ID)]
    pub flow: String,

    /// JSON file holding the payload object
    #[arg(short, long, value_name = "FILE")]
    pub payload: PathBuf,

    /// Open this address instead of the flow's target
    #[arg(long)]
    pub url: Option<String>,

    /// Run Chromium without a window
    #[arg(long)]
    pub headless: bool,

    /// Attach to a running Chrome DevTools websocket instead of launching
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Write the run report to this file as well
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit right after the run instead of watching for the submission
    #[arg(long)]
    pub no_wait: bool,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let payload = read_payload(&args.payload).await?;

    let mut cdp = ctx.config().cdp_config();
    if args.headless {
        cdp.headless = true;
    }
    if let Some(ws_url) = args.ws_url.clone() {
        cdp.websocket_url = Some(ws_url);
    }
    let pages = Arc::new(CdpPageFactory::new(cdp));
    let service = ctx.flow_service(pages.clone(), Arc::new(ConsoleOperator::stdin()))?;

    let run = service
        .run_flow(StartFlow {
            payload,
            source: Some("cli".to_string()),
            flow: Some(args.flow.clone()),
            url: args.url.clone(),
        })
        .await
        .with_context(|| format!("Flow {} could not start", args.flow))?;

    let report = serde_json::to_string_pretty(&run.report)?;
    println!("{report}");
    if let Some(path) = &args.output {
        fs::write(path, &report)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if !args.no_wait && run.watchdog.is_running() {
        info!("Watching for the submission confirmation; finish the form in the browser or press Ctrl+C");
        tokio::select! {
            outcome = run.watchdog.wait() => {
                if let Some(outcome) = outcome {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                run.watchdog.stop();
                info!("Submission monitoring stopped");
            }
        }
    }
    pages.shutdown().await;

    if run.report.run.status == RunStatus::Error {
        bail!(
            "Flow {} ended with an error: {}",
            run.report.run.flow_id,
            run.report.run.error.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

async fn read_payload(path: &PathBuf) -> Result<Value> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    let payload: Value = serde_json::from_str(&text)
        .with_context(|| format!("Payload {} is not valid JSON", path.display()))?;
    if !payload.is_object() {
        bail!("Payload {} must be a JSON object", path.display());
    }
    Ok(payload)
}
