mod common;

use std::sync::Arc;

use action_flow::{ExecutorRegistry, Orchestrator};
use formflow_core_types::{
    FlowDefinition, Payload, ProgressStage, ReasonCode, RunStatus,
};
use formflow_event_bus::{EventBus, ProgressReporter};
use formflow_page_port::memory::MemoryPage;
use serde_json::json;

const HELP_PAGE: &str = r#"
<form>
  <div class="form-group">
    <span>Do you need help filling the form?</span>
    <input type="radio" id="help-yes" name="help" value="1"><label for="help-yes">Yes</label>
    <input type="radio" id="help-no" name="help" value="2"><label for="help-no">No</label>
  </div>
  <div class="form-group">
    <label for="helper">Helper name</label>
    <input id="helper">
  </div>
</form>
"#;

const HELP_FLOW: &str = r#"
id: help
name: Help
targetUrl: https://forms.example/help
steps:
  - id: gate
    type: radio
    locator:
      label: Do you need help filling the form?
    dataKey: hasHelp
  - id: helper_name
    type: text_input
    locator:
      label: Helper name
    dataKey: helperName
    conditional:
      prerequisite: gate
      value: "1"
"#;

fn orchestrator() -> Orchestrator {
    Orchestrator::new(
        Arc::new(ExecutorRegistry::with_defaults()),
        ProgressReporter::silent(),
    )
}

fn payload(value: serde_json::Value) -> Payload {
    Payload::from_value(value).unwrap()
}

#[tokio::test(start_paused = true)]
async fn satisfied_condition_runs_dependent_step() {
    let page = MemoryPage::from_html(HELP_PAGE);
    let flow = FlowDefinition::from_yaml_str(HELP_FLOW).unwrap();

    let run = orchestrator()
        .run(
            &flow,
            &payload(json!({"hasHelp": "1", "helperName": "Dana"})),
            &common::ctx(&page),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    let gate = run.result_for("gate").unwrap();
    assert!(gate.success);
    let helper = run.result_for("helper_name").unwrap();
    assert!(helper.success);
    assert!(!helper.skipped);

    let input = page.find("#helper").unwrap();
    assert_eq!(page.read(|tree| tree.value(input)), "Dana");
}

#[tokio::test(start_paused = true)]
async fn required_flag_does_not_change_the_outcome() {
    let flow_for = |required: bool| {
        FlowDefinition::from_yaml_str(&format!(
            r#"
id: help
name: Help
targetUrl: https://forms.example/help
steps:
  - id: gate
    type: radio
    required: {required}
    locator:
      label: Do you need help filling the form?
    dataKey: hasHelp
  - id: helper_name
    type: text_input
    locator:
      label: Helper name
    dataKey: helperName
    conditional:
      prerequisite: gate
      predicate: {{ op: falsy }}
"#
        ))
        .unwrap()
    };

    for required in [false, true] {
        let page = MemoryPage::from_html(HELP_PAGE);
        let run = orchestrator()
            .run(
                &flow_for(required),
                &payload(json!({"helperName": "Dana"})),
                &common::ctx(&page),
            )
            .await;

        let gate = run.result_for("gate").unwrap();
        assert!(gate.success, "required={required}");
        assert_eq!(gate.reason, None, "required={required}");
        let helper = run.result_for("helper_name").unwrap();
        assert!(!helper.skipped, "required={required}");
        assert!(helper.success, "required={required}");
    }
}

#[tokio::test(start_paused = true)]
async fn unmet_condition_skips_dependent_step() {
    let page = MemoryPage::from_html(HELP_PAGE);
    let flow = FlowDefinition::from_yaml_str(HELP_FLOW).unwrap();

    let run = orchestrator()
        .run(
            &flow,
            &payload(json!({"hasHelp": "2", "helperName": "Dana"})),
            &common::ctx(&page),
        )
        .await;

    let helper = run.result_for("helper_name").unwrap();
    assert!(helper.success);
    assert!(helper.skipped);
    assert_eq!(helper.diagnostics["gate"], "condition_not_met");

    let input = page.find("#helper").unwrap();
    assert_eq!(page.read(|tree| tree.value(input)), "");
}

#[tokio::test(start_paused = true)]
async fn failed_prerequisite_skips_dependent_step() {
    let page = MemoryPage::from_html(HELP_PAGE);
    let flow = FlowDefinition::from_yaml_str(HELP_FLOW).unwrap();

    // "3" matches no radio, so the gate step fails.
    let run = orchestrator()
        .run(&flow, &payload(json!({"hasHelp": "3"})), &common::ctx(&page))
        .await;

    let gate = run.result_for("gate").unwrap();
    assert!(!gate.success);
    assert_eq!(gate.reason, Some(ReasonCode::NoMatchingValue));
    let helper = run.result_for("helper_name").unwrap();
    assert!(helper.skipped);
    assert_eq!(helper.diagnostics["gate"], "prerequisite_failed");
}

#[tokio::test(start_paused = true)]
async fn every_step_is_recorded_once_and_failures_do_not_stop_the_run() {
    let page = MemoryPage::from_html(
        r#"<div class="form-group"><label for="a">Accept</label><input type="checkbox" id="a"></div>"#,
    );
    let flow = FlowDefinition::from_yaml_str(
        r#"
id: mixed
name: Mixed
targetUrl: https://forms.example/mixed
steps:
  - id: missing_field
    type: text_input
    locator:
      label: Nowhere to be found
    dataKey: name
  - id: teleport
    type: teleport
  - id: accept
    type: checkbox
    locator:
      label: Accept
"#,
    )
    .unwrap();

    let run = orchestrator()
        .run(&flow, &payload(json!({"name": "Dana"})), &common::ctx(&page))
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.steps().len(), flow.steps.len());
    assert_eq!(
        run.result_for("missing_field").unwrap().reason,
        Some(ReasonCode::LabelNotFound)
    );
    let teleport = run.result_for("teleport").unwrap();
    assert_eq!(teleport.reason, Some(ReasonCode::UnknownType));
    assert_eq!(teleport.diagnostics["type"], "teleport");
    assert!(run.result_for("accept").unwrap().success);
    assert_eq!(run.failed_steps().count(), 2);
}

#[tokio::test(start_paused = true)]
async fn closed_page_ends_the_run_with_an_error() {
    let page = MemoryPage::from_html(HELP_PAGE);
    page.close();
    let flow = FlowDefinition::from_yaml_str(HELP_FLOW).unwrap();

    let run = orchestrator()
        .run(&flow, &payload(json!({"hasHelp": "1"})), &common::ctx(&page))
        .await;

    assert_eq!(run.status, RunStatus::Error);
    assert!(run.error.as_deref().unwrap().contains("closed"));
    assert_eq!(run.steps().len(), 1);
    assert_eq!(run.steps()[0].reason, Some(ReasonCode::Exception));
}

#[tokio::test(start_paused = true)]
async fn progress_follows_each_step() {
    let page = MemoryPage::from_html(HELP_PAGE);
    let flow = FlowDefinition::from_yaml_str(HELP_FLOW).unwrap();
    let (reporter, bus) = ProgressReporter::in_memory(32);
    let mut rx = bus.subscribe();

    Orchestrator::new(Arc::new(ExecutorRegistry::with_defaults()), reporter)
        .run(&flow, &payload(json!({"hasHelp": "2"})), &common::ctx(&page))
        .await;

    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        stages.push(event.stage);
    }
    // The gated-out step reports nothing.
    assert_eq!(
        stages,
        vec![
            ProgressStage::FlowStarted,
            ProgressStage::FillingField,
            ProgressStage::FieldCompleted,
        ]
    );
}
