//! Best-effort progress reporting toward the supervising context.

use std::sync::Arc;

use formflow_core_types::{ProgressEvent, ProgressStage};
use tracing::debug;

use crate::{EventBus, InMemoryBus};

/// Publishes `FILLING_STATUS` events. Delivery failures are swallowed; a run
/// never fails because nobody is watching it.
#[derive(Clone)]
pub struct ProgressReporter {
    bus: Option<Arc<dyn EventBus<ProgressEvent>>>,
}

impl ProgressReporter {
    pub fn new(bus: Arc<dyn EventBus<ProgressEvent>>) -> Self {
        Self { bus: Some(bus) }
    }

    /// Reporter that drops everything.
    pub fn silent() -> Self {
        Self { bus: None }
    }

    /// Reporter over a fresh in-memory bus, plus that bus for subscribers.
    pub fn in_memory(capacity: usize) -> (Self, Arc<InMemoryBus<ProgressEvent>>) {
        let bus = InMemoryBus::new(capacity);
        (Self::new(bus.clone()), bus)
    }

    pub async fn report(&self, event: ProgressEvent) {
        debug!(stage = ?event.stage, message = %event.message, "Progress");
        let Some(bus) = &self.bus else {
            return;
        };
        if let Err(err) = bus.publish(event).await {
            debug!(error = %err, "Progress event not delivered");
        }
    }

    pub async fn flow_started(&self, flow: &str) {
        self.report(ProgressEvent::new(
            ProgressStage::FlowStarted,
            format!("Starting flow {}", flow),
        ))
        .await;
    }

    pub async fn filling_field(&self, step_id: &str, label: &str) {
        self.report(
            ProgressEvent::new(ProgressStage::FillingField, format!("Filling {}", label))
                .for_step(step_id),
        )
        .await;
    }

    pub async fn field_completed(&self, step_id: &str, label: &str) {
        self.report(
            ProgressEvent::new(ProgressStage::FieldCompleted, format!("Completed {}", label))
                .for_step(step_id)
                .succeeded(),
        )
        .await;
    }

    /// Per-step failures ask a human to finish the field.
    pub async fn field_failed(&self, step_id: &str, label: &str, reason: &str) {
        self.report(
            ProgressEvent::new(
                ProgressStage::FieldFailed,
                format!("Could not fill {} ({}); please complete it manually", label, reason),
            )
            .for_step(step_id)
            .manual(),
        )
        .await;
    }

    pub async fn monitoring_active(&self) {
        self.report(ProgressEvent::new(
            ProgressStage::MonitoringActive,
            "Watching for the submission confirmation",
        ))
        .await;
    }

    pub async fn success_detected(&self, confirmation: Option<&str>) {
        let message = match confirmation {
            Some(number) => format!("Submission detected, confirmation {}", number),
            None => "Submission detected".to_string(),
        };
        self.report(ProgressEvent::new(ProgressStage::SuccessDetected, message).succeeded())
            .await;
    }

    pub async fn saving(&self) {
        self.report(ProgressEvent::new(
            ProgressStage::Saving,
            "Saving the submission record",
        ))
        .await;
    }

    pub async fn submission_complete(&self, message: &str) {
        self.report(ProgressEvent::new(ProgressStage::SubmissionComplete, message).complete(true))
            .await;
    }

    pub async fn manual_required(&self, message: &str) {
        self.report(ProgressEvent::new(ProgressStage::ManualRequired, message).manual())
            .await;
    }

    pub async fn submission_failed(&self, message: &str) {
        self.report(
            ProgressEvent::new(ProgressStage::SubmissionFailed, message)
                .manual()
                .complete(false),
        )
        .await;
    }
}
