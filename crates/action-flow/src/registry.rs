//! Step executor interface and the registry keyed by step type.

use std::collections::HashMap;
use std::sync::Arc;

use action_primitives::ActionError;
use async_trait::async_trait;
use formflow_core_types::{Payload, ReasonCode, Step, StepKind, StepResult};
use tracing::warn;

use crate::context::ExecCtx;
use crate::executors;

/// One step type's behavior.
///
/// Expected failures (nothing found, nothing took) come back as a failed
/// [`StepResult`]; `Err` is for the page itself misbehaving.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn kind(&self) -> StepKind;

    async fn execute(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError>;
}

#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<StepKind, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in step type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for executor in executors::default_executors() {
            registry.register(executor);
        }
        registry
    }

    /// Add or replace the executor for its kind.
    pub fn register(&mut self, executor: Arc<dyn StepExecutor>) {
        self.executors.insert(executor.kind(), executor);
    }

    pub fn get(&self, kind: &StepKind) -> Option<&Arc<dyn StepExecutor>> {
        self.executors.get(kind)
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.executors.keys().cloned().collect()
    }

    /// Run one step. Unknown types and non-fatal errors become failed
    /// results; only fatal page errors are returned as `Err`.
    pub async fn dispatch(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let Some(executor) = self.executors.get(&step.kind) else {
            warn!(step_id = %step.id, step_type = %step.kind, "No executor for step type");
            return Ok(StepResult::failed(&step.id, ReasonCode::UnknownType)
                .with_diagnostic("type", step.kind.as_str()));
        };

        match executor.execute(step, payload, ctx).await {
            Ok(result) => Ok(result),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(step_id = %step.id, error = %err, "Step raised an error");
                Ok(StepResult::failed(&step.id, ReasonCode::Exception)
                    .with_diagnostic("error", err.to_string()))
            }
        }
    }
}
