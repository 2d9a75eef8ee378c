//! Submission watchdog.
//!
//! Detects the third-party confirmation page, either right after the last
//! step (explicit poll) or in the background while a human finishes the
//! form and presses submit themselves. The first detection wins; the other
//! path sees the same outcome.

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{wait_for, wait_for_cancellable, ActionError, WaitProfile};
use chrono::{DateTime, Utc};
use extensions_bridge::{SaveOutcome, SubmissionPersister};
use formflow_core_types::{FormProfile, Payload};
use formflow_event_bus::ProgressReporter;
use formflow_page_port::PagePort;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::FlowError;
use crate::operator::Operator;

/// Polling cadence of both detection paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    pub monitor_interval_ms: u64,
    pub monitor_budget_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            poll_attempts: 30,
            monitor_interval_ms: 2_000,
            monitor_budget_ms: 300_000,
        }
    }
}

impl WatchdogConfig {
    fn poll_profile(&self) -> WaitProfile {
        WaitProfile::attempts(
            self.poll_attempts.max(1),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    fn monitor_profile(&self) -> WaitProfile {
        WaitProfile::from_millis(self.monitor_budget_ms, self.monitor_interval_ms)
    }
}

/// What gets handed to the case API once a submission is confirmed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub confirmation_number: Option<String>,
    /// Full HTML of the confirmation page
    pub snapshot: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
}

/// How a watch ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WatchOutcome {
    /// Confirmed and recorded through the case API
    Saved { confirmation_number: Option<String> },
    /// Confirmed, but a human has to record it
    ManualRecording {
        confirmation_number: Option<String>,
        reason: String,
    },
    /// No confirmation within the budget; the human was asked to check
    TimedOut,
    /// Explicit poll gave up while the background monitor is still watching
    Pending,
    /// Stopped before anything was detected
    Stopped,
}

impl WatchOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            WatchOutcome::Saved { .. } | WatchOutcome::ManualRecording { .. }
        )
    }
}

#[derive(Clone, Debug)]
struct Detection {
    confirmation_number: Option<String>,
}

enum Sighting {
    Detected(Detection),
    /// The other path already handled it
    Finished(WatchOutcome),
}

struct Inner {
    page: Arc<dyn PagePort>,
    reporter: ProgressReporter,
    operator: Arc<dyn Operator>,
    persister: Option<SubmissionPersister>,
    markers: Vec<String>,
    pattern: Regex,
    config: WatchdogConfig,
    finished: OnceCell<WatchOutcome>,
    task: Mutex<Option<(CancellationToken, JoinHandle<WatchOutcome>)>>,
}

/// Handle owned by the caller of one flow run. Cloning shares the watch.
#[derive(Clone)]
pub struct SubmissionWatchdog {
    inner: Arc<Inner>,
}

impl SubmissionWatchdog {
    /// Without a persister every confirmation needs manual recording.
    pub fn new(
        page: Arc<dyn PagePort>,
        profile: &FormProfile,
        config: WatchdogConfig,
        reporter: ProgressReporter,
        operator: Arc<dyn Operator>,
        persister: Option<SubmissionPersister>,
    ) -> Result<Self, FlowError> {
        let pattern = Regex::new(&profile.confirmation_pattern).map_err(|err| {
            FlowError::Config(format!("invalid confirmation pattern: {}", err))
        })?;
        Ok(Self {
            inner: Arc::new(Inner {
                page,
                reporter,
                operator,
                persister,
                markers: profile.success_url_markers.clone(),
                pattern,
                config,
                finished: OnceCell::new(),
                task: Mutex::new(None),
            }),
        })
    }

    /// Start the background monitor. A second call while it runs is a no-op.
    pub fn start(&self, payload: &Payload) {
        let mut task = self.inner.task.lock();
        if let Some((_, handle)) = task.as_ref() {
            if !handle.is_finished() {
                debug!("Submission monitor already running");
                return;
            }
        }
        let token = CancellationToken::new();
        let inner = self.inner.clone();
        let payload = payload.clone();
        let cancel = token.clone();
        let handle = tokio::spawn(async move { inner.monitor(payload, cancel).await });
        *task = Some((token, handle));
        info!(
            budget_ms = self.inner.config.monitor_budget_ms,
            "Submission monitor started"
        );
    }

    /// Cancel the background monitor, if any.
    pub fn stop(&self) {
        if let Some((token, _)) = self.inner.task.lock().as_ref() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .map(|(_, handle)| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Outcome of a confirmed submission, once there is one.
    pub fn outcome(&self) -> Option<WatchOutcome> {
        self.inner.finished.get().cloned()
    }

    /// Wait for the background monitor to end. `None` when it never ran.
    pub async fn wait(&self) -> Option<WatchOutcome> {
        let handle = self.inner.task.lock().take().map(|(_, handle)| handle);
        match handle?.await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(error = %err, "Submission monitor task failed");
                None
            }
        }
    }

    /// Poll for the confirmation page right after the last step.
    pub async fn poll_after_submit(&self, payload: &Payload) -> Result<WatchOutcome, FlowError> {
        let inner = self.inner.as_ref();
        let observed = wait_for(
            "submission confirmation",
            inner.config.poll_profile(),
            move || async move { inner.observe().await },
        )
        .await;
        match observed {
            Ok(Sighting::Finished(outcome)) => Ok(outcome),
            Ok(Sighting::Detected(detection)) => Ok(inner.complete(detection, payload).await),
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                if self.is_running() {
                    debug!(error = %err, "No confirmation yet, background monitor still watching");
                    return Ok(WatchOutcome::Pending);
                }
                inner.timed_out().await;
                Ok(WatchOutcome::TimedOut)
            }
        }
    }
}

impl Inner {
    async fn monitor(&self, payload: Payload, cancel: CancellationToken) -> WatchOutcome {
        self.reporter.monitoring_active().await;
        let observed = wait_for_cancellable(
            "submission confirmation",
            self.config.monitor_profile(),
            &cancel,
            move || async move { self.observe().await },
        )
        .await;
        match observed {
            Ok(Sighting::Finished(outcome)) => outcome,
            Ok(Sighting::Detected(detection)) => self.complete(detection, &payload).await,
            Err(ActionError::Interrupted(_)) => {
                debug!("Submission monitor stopped");
                WatchOutcome::Stopped
            }
            Err(err) if err.is_fatal() => {
                warn!(error = %err, "Page gone, submission monitor stopped");
                WatchOutcome::Stopped
            }
            Err(_) => {
                self.timed_out().await;
                WatchOutcome::TimedOut
            }
        }
    }

    async fn observe(&self) -> Result<Option<Sighting>, ActionError> {
        if let Some(outcome) = self.finished.get() {
            return Ok(Some(Sighting::Finished(outcome.clone())));
        }
        Ok(self.detect().await?.map(Sighting::Detected))
    }

    /// Success marker in the address, or a labelled confirmation number in
    /// the visible text.
    async fn detect(&self) -> Result<Option<Detection>, ActionError> {
        let url = self.page.current_url().await?;
        let marked = self.markers.iter().any(|marker| url.contains(marker.as_str()));
        let text = self.page.body_text().await?;
        let confirmation_number = self
            .pattern
            .captures(&text)
            .and_then(|captures| captures.get(1))
            .map(|number| number.as_str().to_string());
        if marked || confirmation_number.is_some() {
            debug!(url = %url, marked, ?confirmation_number, "Submission confirmed");
            return Ok(Some(Detection { confirmation_number }));
        }
        Ok(None)
    }

    /// Record a detection exactly once; later callers get the same outcome.
    async fn complete(&self, detection: Detection, payload: &Payload) -> WatchOutcome {
        self.finished
            .get_or_init(|| self.record(detection, payload))
            .await
            .clone()
    }

    async fn record(&self, detection: Detection, payload: &Payload) -> WatchOutcome {
        let mut confirmation_number = detection.confirmation_number;
        info!(?confirmation_number, "Submission detected");
        self.reporter
            .success_detected(confirmation_number.as_deref())
            .await;

        let snapshot = match self.page.snapshot_html().await {
            Ok(html) => html,
            Err(err) => {
                warn!(error = %err, "Confirmation page snapshot failed");
                String::new()
            }
        };
        if confirmation_number.is_none() {
            confirmation_number = self
                .operator
                .prompt("The form was submitted but no confirmation number was found. Enter it here:")
                .await
                .map(|number| number.trim().to_string())
                .filter(|number| !number.is_empty());
        }

        let record = SubmissionRecord {
            confirmation_number: confirmation_number.clone(),
            snapshot,
            timestamp: Utc::now(),
            case_id: payload.text("caseId"),
        };
        let Some(persister) = &self.persister else {
            return self
                .manual(confirmation_number, "case API not connected".to_string())
                .await;
        };

        self.reporter.saving().await;
        let data = match serde_json::to_value(&record) {
            Ok(data) => data,
            Err(err) => return self.manual(confirmation_number, err.to_string()).await,
        };
        match persister.save(data).await {
            SaveOutcome::Saved => {
                let message = match &confirmation_number {
                    Some(number) => format!("Submission {} saved", number),
                    None => "Submission saved".to_string(),
                };
                self.reporter.submission_complete(&message).await;
                WatchOutcome::Saved {
                    confirmation_number,
                }
            }
            SaveOutcome::RequiresManual => {
                self.manual(confirmation_number, "manual recording requested".to_string())
                    .await
            }
            SaveOutcome::Failed { error } => {
                let message = format!(
                    "Saving the submission failed ({}). Record confirmation number {} manually.",
                    error,
                    confirmation_number.as_deref().unwrap_or("(unknown)")
                );
                self.operator.alert(&message).await;
                self.reporter.submission_failed(&message).await;
                WatchOutcome::ManualRecording {
                    confirmation_number,
                    reason: error,
                }
            }
        }
    }

    async fn manual(&self, confirmation_number: Option<String>, reason: String) -> WatchOutcome {
        let message = format!(
            "Submission confirmed. Record confirmation number {} manually.",
            confirmation_number.as_deref().unwrap_or("(unknown)")
        );
        warn!(reason = %reason, "Submission needs manual recording");
        self.operator.alert(&message).await;
        self.reporter.manual_required(&message).await;
        WatchOutcome::ManualRecording {
            confirmation_number,
            reason,
        }
    }

    async fn timed_out(&self) {
        let message =
            "No submission confirmation was detected. Check the form manually and upload the confirmation as evidence.";
        warn!("Submission confirmation not detected in time");
        self.operator.alert(message).await;
        self.reporter.manual_required(message).await;
    }
}
