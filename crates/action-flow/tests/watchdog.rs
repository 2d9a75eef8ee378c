mod common;

use std::sync::Arc;
use std::time::Duration;

use action_flow::{FlowError, LoggingOperator, SubmissionWatchdog, WatchOutcome, WatchdogConfig};
use extensions_bridge::{RelayBridge, SubmissionPersister};
use formflow_core_types::{FormProfile, Payload, ProgressStage};
use formflow_event_bus::{EventBus, ProgressReporter};
use formflow_page_port::memory::MemoryPage;
use serde_json::json;

use common::FakeHost;

const CONFIRMATION: &str = r#"
<main>
  <h1>תודה, הבקשה התקבלה</h1>
  <p>מספר בקשה: 778899</p>
</main>
"#;

const FORM: &str = r#"<form><button type="submit">שליחה</button></form>"#;

fn fast_config() -> WatchdogConfig {
    WatchdogConfig {
        poll_interval_ms: 100,
        poll_attempts: 5,
        monitor_interval_ms: 100,
        monitor_budget_ms: 2_000,
    }
}

fn persister(host: Arc<FakeHost>) -> SubmissionPersister {
    let (bridge, _task) = RelayBridge::spawn(host, &common::bridge_config());
    SubmissionPersister::new(bridge, &common::bridge_config())
}

fn watchdog(
    page: &MemoryPage,
    operator: Arc<LoggingOperator>,
    reporter: ProgressReporter,
    host: Option<Arc<FakeHost>>,
) -> SubmissionWatchdog {
    SubmissionWatchdog::new(
        Arc::new(page.clone()),
        &FormProfile::default(),
        fast_config(),
        reporter,
        operator,
        host.map(persister),
    )
    .unwrap()
}

fn payload() -> Payload {
    Payload::from_value(json!({"caseId": "C-17"})).unwrap()
}

#[tokio::test]
async fn confirmation_page_is_saved_with_its_number() {
    let page = MemoryPage::from_html(CONFIRMATION).with_url("https://forms.example/done?gbxid=success");
    let host = Arc::new(FakeHost::default());
    let operator = Arc::new(LoggingOperator::new());
    let (reporter, bus) = ProgressReporter::in_memory(16);
    let mut events = bus.subscribe();
    let watchdog = watchdog(&page, operator.clone(), reporter, Some(host.clone()));

    let outcome = watchdog.poll_after_submit(&payload()).await.unwrap();
    assert_eq!(
        outcome,
        WatchOutcome::Saved {
            confirmation_number: Some("778899".into())
        }
    );
    assert_eq!(watchdog.outcome(), Some(outcome));
    assert!(operator.messages().is_empty());

    let saved = host.saved.lock().clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["confirmationNumber"], "778899");
    assert_eq!(saved[0]["caseId"], "C-17");
    assert!(saved[0]["snapshot"].as_str().unwrap().contains("778899"));

    let mut stages = Vec::new();
    while let Ok(event) = events.try_recv() {
        stages.push(event.stage);
    }
    assert_eq!(
        stages,
        vec![
            ProgressStage::SuccessDetected,
            ProgressStage::Saving,
            ProgressStage::SubmissionComplete
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn monitor_catches_a_submission_made_by_hand() {
    let page = MemoryPage::from_html(FORM).with_url("https://forms.example/claims/new");
    let host = Arc::new(FakeHost::default());
    let operator = Arc::new(LoggingOperator::answering(" 445566 "));
    let watchdog = watchdog(&page, operator.clone(), ProgressReporter::silent(), Some(host.clone()));

    watchdog.start(&payload());
    assert!(watchdog.is_running());

    let human = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        human.set_url("https://forms.example/claims/done?gbxid=success");
    });

    let outcome = watchdog.wait().await;
    assert_eq!(
        outcome,
        Some(WatchOutcome::Saved {
            confirmation_number: Some("445566".into())
        })
    );
    // No number on the page, so the operator was asked for it.
    assert_eq!(operator.messages().len(), 1);
    assert_eq!(host.saved.lock()[0]["confirmationNumber"], "445566");
}

#[tokio::test]
async fn failed_save_falls_back_to_manual_recording() {
    let page = MemoryPage::from_html(CONFIRMATION).with_url("https://forms.example/done?gbxid=success");
    let host = Arc::new(FakeHost::failing());
    let operator = Arc::new(LoggingOperator::new());
    let watchdog = watchdog(&page, operator.clone(), ProgressReporter::silent(), Some(host.clone()));

    let outcome = watchdog.poll_after_submit(&payload()).await.unwrap();
    match outcome {
        WatchOutcome::ManualRecording {
            confirmation_number,
            ..
        } => assert_eq!(confirmation_number.as_deref(), Some("778899")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(host.save_count(), 5);
    let messages = operator.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("778899"));
}

#[tokio::test]
async fn missing_case_api_needs_manual_recording() {
    let page = MemoryPage::from_html(CONFIRMATION);
    let operator = Arc::new(LoggingOperator::new());
    let watchdog = watchdog(&page, operator.clone(), ProgressReporter::silent(), None);

    let outcome = watchdog.poll_after_submit(&payload()).await.unwrap();
    assert_eq!(
        outcome,
        WatchOutcome::ManualRecording {
            confirmation_number: Some("778899".into()),
            reason: "case API not connected".into()
        }
    );
    assert_eq!(operator.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn poll_without_monitor_times_out_and_alerts() {
    let page = MemoryPage::from_html(FORM);
    let operator = Arc::new(LoggingOperator::new());
    let (reporter, bus) = ProgressReporter::in_memory(8);
    let mut events = bus.subscribe();
    let watchdog = watchdog(&page, operator.clone(), reporter, None);

    let outcome = watchdog.poll_after_submit(&payload()).await.unwrap();
    assert_eq!(outcome, WatchOutcome::TimedOut);
    assert!(operator.messages()[0].contains("No submission confirmation was detected"));
    let event = events.try_recv().unwrap();
    assert_eq!(event.stage, ProgressStage::ManualRequired);
    assert!(event.requires_manual_action);
}

#[tokio::test(start_paused = true)]
async fn poll_is_pending_while_the_monitor_watches() {
    let page = MemoryPage::from_html(FORM);
    let operator = Arc::new(LoggingOperator::new());
    let watchdog = watchdog(&page, operator.clone(), ProgressReporter::silent(), None);

    watchdog.start(&payload());
    let outcome = watchdog.poll_after_submit(&payload()).await.unwrap();
    assert_eq!(outcome, WatchOutcome::Pending);
    assert!(operator.messages().is_empty());

    watchdog.stop();
    assert_eq!(watchdog.wait().await, Some(WatchOutcome::Stopped));
    assert_eq!(watchdog.outcome(), None);
}

#[tokio::test(start_paused = true)]
async fn unattended_monitor_times_out_once() {
    let page = MemoryPage::from_html(FORM);
    let operator = Arc::new(LoggingOperator::new());
    let watchdog = watchdog(&page, operator.clone(), ProgressReporter::silent(), None);

    watchdog.start(&payload());
    assert_eq!(watchdog.wait().await, Some(WatchOutcome::TimedOut));
    assert_eq!(operator.messages().len(), 1);
}

#[tokio::test]
async fn both_paths_share_one_save() {
    let page = MemoryPage::from_html(CONFIRMATION).with_url("https://forms.example/done?gbxid=success");
    let host = Arc::new(FakeHost::default());
    let watchdog = watchdog(
        &page,
        Arc::new(LoggingOperator::new()),
        ProgressReporter::silent(),
        Some(host.clone()),
    );

    let payload = payload();
    watchdog.start(&payload);
    let (polled, monitored) = tokio::join!(watchdog.poll_after_submit(&payload), watchdog.wait());
    let polled = polled.unwrap();
    assert!(polled.is_confirmed());
    assert_eq!(monitored, Some(polled));
    assert_eq!(host.save_count(), 1);
}

#[test]
fn invalid_confirmation_pattern_is_a_config_error() {
    let profile = FormProfile {
        confirmation_pattern: "(unclosed".into(),
        ..FormProfile::default()
    };
    let result = SubmissionWatchdog::new(
        Arc::new(MemoryPage::from_html(FORM)),
        &profile,
        WatchdogConfig::default(),
        ProgressReporter::silent(),
        Arc::new(LoggingOperator::new()),
        None,
    );
    assert!(matches!(result, Err(FlowError::Config(_))));
}
