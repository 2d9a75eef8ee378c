//! Conditional gate: decides whether a gated step runs.

use action_primitives::{wait_for_text, ActionError};
use formflow_core_types::{FlowDefinition, Payload, RunResult, Step};
use tracing::debug;

use crate::context::ExecCtx;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Run,
    Skip { reason: &'static str },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConditionalGate;

impl ConditionalGate {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `step`'s conditional against the run so far.
    ///
    /// A prerequisite that has not run, or failed, skips the step. Otherwise
    /// the prerequisite's payload value is tested against the rule. When the
    /// step runs, its label gets a bounded chance to appear; a timeout there
    /// does not stop the step.
    pub async fn evaluate(
        &self,
        step: &Step,
        flow: &FlowDefinition,
        run: &RunResult,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<GateDecision, ActionError> {
        let Some(conditional) = &step.conditional else {
            return Ok(GateDecision::Run);
        };

        match run.result_for(&conditional.prerequisite) {
            None => return Ok(GateDecision::Skip { reason: "prerequisite_not_run" }),
            Some(result) if !result.success => {
                return Ok(GateDecision::Skip { reason: "prerequisite_failed" })
            }
            Some(_) => {}
        }

        let value = flow
            .step(&conditional.prerequisite)
            .and_then(|prerequisite| prerequisite.data_key.as_deref())
            .and_then(|key| payload.get(key));
        if !conditional.rule.matches(value) {
            return Ok(GateDecision::Skip { reason: "condition_not_met" });
        }

        if let Some(label) = step.locator.label.as_deref() {
            match wait_for_text(&ctx.locator, None, label, ctx.timings.conditional_wait()).await {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => debug!(step_id = %step.id, error = %err, "Gated field not visible yet"),
            }
        }
        Ok(GateDecision::Run)
    }
}
