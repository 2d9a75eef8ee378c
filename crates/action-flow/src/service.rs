//! Inbound command handling: `START_FLOW_WITH_PAYLOAD` opens the target
//! page, starts the submission monitor, runs the flow and answers with the
//! run record.

use std::sync::Arc;

use async_trait::async_trait;
use extensions_bridge::{Bridge, BridgeConfig, RemoteFileRelay, SubmissionPersister};
use formflow_core_types::{FormProfile, Payload, RunResult, RunStatus};
use formflow_event_bus::ProgressReporter;
use formflow_page_port::PagePort;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{FlowCatalog, DEFAULT_FLOW_ID};
use crate::context::{EngineTimings, ExecCtx};
use crate::errors::FlowError;
use crate::operator::{LoggingOperator, Operator};
use crate::orchestrator::Orchestrator;
use crate::registry::ExecutorRegistry;
use crate::watchdog::{SubmissionWatchdog, WatchOutcome, WatchdogConfig};

/// Opens the hosted form at an address and waits for it to load.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn PagePort>, FlowError>;
}

/// Commands accepted from the supervising context.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundCommand {
    #[serde(rename = "START_FLOW_WITH_PAYLOAD")]
    StartFlowWithPayload(StartFlow),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFlow {
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Catalog id or definition path; the bundled form flow when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    /// Overrides the flow's target address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// What a finished run reports back.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRunReport {
    pub run_id: String,
    pub run: RunResult,
    /// Explicit confirmation poll outcome; `None` when the run errored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<WatchOutcome>,
}

/// A run's report plus the watchdog that may still be monitoring.
pub struct FlowRun {
    pub report: FlowRunReport,
    pub watchdog: SubmissionWatchdog,
}

pub struct FlowService {
    catalog: Mutex<FlowCatalog>,
    pages: Arc<dyn PageFactory>,
    registry: Arc<ExecutorRegistry>,
    reporter: ProgressReporter,
    operator: Arc<dyn Operator>,
    profile: Arc<FormProfile>,
    timings: EngineTimings,
    watchdog: WatchdogConfig,
    bridge: Option<(Arc<dyn Bridge>, BridgeConfig)>,
}

impl FlowService {
    pub fn new(catalog: FlowCatalog, pages: Arc<dyn PageFactory>) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            pages,
            registry: Arc::new(ExecutorRegistry::with_defaults()),
            reporter: ProgressReporter::silent(),
            operator: Arc::new(LoggingOperator::new()),
            profile: Arc::new(FormProfile::default()),
            timings: EngineTimings::default(),
            watchdog: WatchdogConfig::default(),
            bridge: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ExecutorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_profile(mut self, profile: FormProfile) -> Self {
        self.profile = Arc::new(profile);
        self
    }

    pub fn with_timings(mut self, timings: EngineTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_watchdog(mut self, config: WatchdogConfig) -> Self {
        self.watchdog = config;
        self
    }

    /// Connect the privileged host: remote attachments and submission saving.
    pub fn with_bridge(mut self, bridge: Arc<dyn Bridge>, config: BridgeConfig) -> Self {
        self.bridge = Some((bridge, config));
        self
    }

    pub fn flow_ids(&self) -> Vec<String> {
        self.catalog.lock().ids().map(str::to_string).collect()
    }

    /// Answer one inbound command.
    pub async fn handle(&self, command: InboundCommand) -> CommandResponse {
        match command {
            InboundCommand::StartFlowWithPayload(start) => match self.run_flow(start).await {
                Ok(run) => match serde_json::to_value(&run.report) {
                    Ok(report) => CommandResponse::ok(report),
                    Err(err) => CommandResponse::failed(err.to_string()),
                },
                Err(err) => {
                    warn!(error = %err, "Flow could not start");
                    CommandResponse::failed(err.to_string())
                }
            },
        }
    }

    /// Resolve the flow, open its page and run it to the end, including the
    /// explicit confirmation poll. The background monitor is left running
    /// when nothing was confirmed yet.
    pub async fn run_flow(&self, start: StartFlow) -> Result<FlowRun, FlowError> {
        let payload = Payload::from_value(start.payload)
            .map_err(|err| FlowError::InvalidPayload(err.to_string()))?;
        let flow_ref = start.flow.as_deref().unwrap_or(DEFAULT_FLOW_ID);
        let flow = self.catalog.lock().resolve(flow_ref)?;
        let url = start.url.unwrap_or_else(|| flow.target_url.clone());
        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            flow_id = %flow.id,
            source = start.source.as_deref().unwrap_or("unknown"),
            url = %url,
            "Starting flow"
        );

        let page = self.pages.open(&url).await?;
        let mut ctx = ExecCtx::new(page.clone(), self.profile.clone())
            .with_operator(self.operator.clone())
            .with_timings(self.timings.clone());
        let persister = self.bridge.as_ref().map(|(bridge, config)| {
            ctx.relay = Some(RemoteFileRelay::new(bridge.clone()));
            SubmissionPersister::new(bridge.clone(), config)
        });

        let watchdog = SubmissionWatchdog::new(
            page,
            &self.profile,
            self.watchdog.clone(),
            self.reporter.clone(),
            self.operator.clone(),
            persister,
        )?;
        watchdog.start(&payload);

        let orchestrator = Orchestrator::new(self.registry.clone(), self.reporter.clone());
        let run = orchestrator.run(&flow, &payload, &ctx).await;

        let submission = if run.status == RunStatus::Error {
            watchdog.stop();
            None
        } else {
            match watchdog.poll_after_submit(&payload).await {
                Ok(outcome) => {
                    if outcome.is_confirmed() {
                        watchdog.stop();
                    }
                    Some(outcome)
                }
                Err(err) => {
                    warn!(run_id = %run_id, error = %err, "Confirmation poll aborted");
                    watchdog.stop();
                    None
                }
            }
        };

        Ok(FlowRun {
            report: FlowRunReport {
                run_id,
                run,
                submission,
            },
            watchdog,
        })
    }
}
