//! Orchestrator: walks a flow's steps in order and records every outcome.

use std::sync::Arc;

use formflow_core_types::{FlowDefinition, Payload, ReasonCode, RunResult, Step, StepResult};
use formflow_event_bus::ProgressReporter;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::context::ExecCtx;
use crate::gate::{ConditionalGate, GateDecision};
use crate::registry::ExecutorRegistry;

pub struct Orchestrator {
    registry: Arc<ExecutorRegistry>,
    gate: ConditionalGate,
    reporter: ProgressReporter,
}

impl Orchestrator {
    pub fn new(registry: Arc<ExecutorRegistry>, reporter: ProgressReporter) -> Self {
        Self {
            registry,
            gate: ConditionalGate::new(),
            reporter,
        }
    }

    /// Run every step of `flow` and return the run record.
    ///
    /// Step failures never stop the run. Only a fatal page error does; the
    /// run is then marked `error` with the message attached.
    pub async fn run(&self, flow: &FlowDefinition, payload: &Payload, ctx: &ExecCtx) -> RunResult {
        let mut run = RunResult::new(&flow.id);
        info!(flow_id = %flow.id, steps = flow.steps.len(), "Flow started");
        self.reporter.flow_started(&flow.name).await;

        for (index, step) in flow.steps.iter().enumerate() {
            if index > 0 {
                sleep(ctx.timings.step_pause()).await;
            }
            if let Err(message) = self.run_step(flow, step, payload, ctx, &mut run).await {
                error!(flow_id = %flow.id, step_id = %step.id, error = %message, "Flow aborted");
                run.fail(message);
                return run;
            }
        }

        run.complete();
        info!(
            flow_id = %flow.id,
            failed = run.failed_steps().count(),
            duration_ms = run.duration_ms().unwrap_or_default(),
            "Flow completed"
        );
        run
    }

    async fn run_step(
        &self,
        flow: &FlowDefinition,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
        run: &mut RunResult,
    ) -> Result<(), String> {
        let decision = match self.gate.evaluate(step, flow, run, payload, ctx).await {
            Ok(decision) => decision,
            Err(err) => {
                run.push(StepResult::failed(&step.id, ReasonCode::Exception));
                return Err(err.to_string());
            }
        };
        if let GateDecision::Skip { reason } = decision {
            debug!(step_id = %step.id, reason, "Step gated out");
            run.push(StepResult::skipped(&step.id).with_diagnostic("gate", reason));
            return Ok(());
        }

        let label = step_label(step);
        self.reporter.filling_field(&step.id, &label).await;

        let result = match self.registry.dispatch(step, payload, ctx).await {
            Ok(result) => result,
            Err(err) => {
                run.push(
                    StepResult::failed(&step.id, ReasonCode::Exception)
                        .with_diagnostic("error", err.to_string()),
                );
                return Err(err.to_string());
            }
        };

        if result.success {
            debug!(step_id = %step.id, step_type = %step.kind, "Step succeeded");
            self.reporter.field_completed(&step.id, &label).await;
        } else {
            let reason = result
                .reason
                .as_ref()
                .map(|r| r.as_str())
                .unwrap_or_else(|| "unknown".to_string());
            if step.required {
                warn!(step_id = %step.id, step_type = %step.kind, reason = %reason, "Required step failed");
            } else {
                info!(step_id = %step.id, step_type = %step.kind, reason = %reason, "Step failed");
            }
            self.reporter.field_failed(&step.id, &label, &reason).await;
        }
        run.push(result);
        Ok(())
    }
}

fn step_label(step: &Step) -> String {
    step.locator
        .label
        .clone()
        .or_else(|| step.locator.section.clone())
        .unwrap_or_else(|| step.id.clone())
}
