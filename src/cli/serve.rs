use std::net::SocketAddr;
use std::sync::Arc;

use action_flow::{LoggingOperator, Operator};
use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use super::console::ConsoleOperator;
use super::context::CliContext;
use crate::pages::CdpPageFactory;
use crate::server::router;

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8787")]
    pub bind: SocketAddr,

    /// Run Chromium without a window
    #[arg(long)]
    pub headless: bool,

    /// Attach to a running Chrome DevTools websocket instead of launching
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Log operator prompts instead of asking on the terminal
    #[arg(long)]
    pub unattended: bool,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let mut cdp = ctx.config().cdp_config();
    if args.headless {
        cdp.headless = true;
    }
    if let Some(ws_url) = args.ws_url.clone() {
        cdp.websocket_url = Some(ws_url);
    }
    let pages = Arc::new(CdpPageFactory::new(cdp));
    let operator: Arc<dyn Operator> = if args.unattended {
        Arc::new(LoggingOperator::new())
    } else {
        Arc::new(ConsoleOperator::stdin())
    };
    let service = Arc::new(ctx.flow_service(pages.clone(), operator)?);

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(
        addr = %listener.local_addr()?,
        flows = ?service.flow_ids(),
        "Accepting commands on POST /commands"
    );

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Command server failed")?;

    pages.shutdown().await;
    Ok(())
}
