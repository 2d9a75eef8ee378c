//! Flow Orchestration Layer
//!
//! Runs a flow definition against the hosted form page:
//! - Orchestrator walks the ordered steps, gating and dispatching each one
//! - Step executors, one per step type, behind a registry
//! - Submission watchdog detecting the confirmation page, explicitly after
//!   the run or in the background while a human finishes the form
//! - FlowService answering the inbound `START_FLOW_WITH_PAYLOAD` command

pub mod catalog;
pub mod context;
pub mod errors;
pub mod executors;
pub mod gate;
pub mod operator;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod watchdog;

pub use catalog::{FlowCatalog, DEFAULT_FLOW_ID};
pub use context::{EngineTimings, ExecCtx};
pub use errors::FlowError;
pub use gate::{ConditionalGate, GateDecision};
pub use operator::{LoggingOperator, Operator};
pub use orchestrator::Orchestrator;
pub use registry::{ExecutorRegistry, StepExecutor};
pub use service::{
    CommandResponse, FlowRun, FlowRunReport, FlowService, InboundCommand, PageFactory, StartFlow,
};
pub use watchdog::{SubmissionRecord, SubmissionWatchdog, WatchOutcome, WatchdogConfig};
