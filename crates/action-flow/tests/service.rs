mod common;

use std::sync::Arc;

use action_flow::{
    FlowCatalog, FlowError, FlowService, InboundCommand, PageFactory, StartFlow, WatchOutcome,
    WatchdogConfig,
};
use async_trait::async_trait;
use extensions_bridge::RelayBridge;
use formflow_core_types::{FlowDefinition, RunStatus};
use formflow_page_port::memory::MemoryPage;
use formflow_page_port::PagePort;
use parking_lot::Mutex;
use serde_json::json;

use common::FakeHost;

const CONTACT_PAGE: &str = r#"
<form>
  <div class="form-group"><label for="name">Full name</label><input id="name"></div>
  <div class="form-group"><input type="checkbox" id="ok"><label for="ok">I confirm the details</label></div>
  <button type="button" id="send">Send</button>
</form>
"#;

const CONTACT_FLOW: &str = r#"
id: contact
name: Contact request
targetUrl: https://forms.example/contact
steps:
  - id: full_name
    type: text_input
    locator:
      label: Full name
    dataKey: fullName
    required: true
  - id: confirm
    type: checkbox
    locator:
      label: I confirm the details
  - id: send
    type: button
    locator:
      label: Send
"#;

/// Hands out one in-memory page and remembers the addresses it was opened at.
struct MemoryPages {
    page: MemoryPage,
    opened: Mutex<Vec<String>>,
}

impl MemoryPages {
    fn contact() -> Arc<Self> {
        let page = MemoryPage::from_html(CONTACT_PAGE);
        page.on_click("#send", |tree, _| {
            tree.set_url("https://forms.example/contact/done?gbxid=success");
            let root = tree.root();
            tree.append_html(root, "<p>Request number: 120034</p>");
        });
        Arc::new(Self {
            page,
            opened: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PageFactory for MemoryPages {
    async fn open(&self, url: &str) -> Result<Arc<dyn PagePort>, FlowError> {
        self.opened.lock().push(url.to_string());
        self.page.set_url(url);
        Ok(Arc::new(self.page.clone()))
    }
}

fn service(pages: Arc<MemoryPages>, host: Option<Arc<FakeHost>>) -> FlowService {
    let mut catalog = FlowCatalog::bundled().unwrap();
    catalog.insert(FlowDefinition::from_yaml_str(CONTACT_FLOW).unwrap());
    let service = FlowService::new(catalog, pages)
        .with_timings(common::fast_timings())
        .with_watchdog(WatchdogConfig {
            poll_interval_ms: 50,
            poll_attempts: 3,
            monitor_interval_ms: 50,
            monitor_budget_ms: 1_000,
        });
    match host {
        Some(host) => {
            let (bridge, _task) = RelayBridge::spawn(host, &common::bridge_config());
            service.with_bridge(bridge, common::bridge_config())
        }
        None => service,
    }
}

fn start(value: serde_json::Value) -> InboundCommand {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn start_command_runs_the_flow_and_saves_the_submission() {
    let pages = MemoryPages::contact();
    let host = Arc::new(FakeHost::default());
    let service = service(pages.clone(), Some(host.clone()));

    let response = service
        .handle(start(json!({
            "type": "START_FLOW_WITH_PAYLOAD",
            "source": "case-portal",
            "flow": "contact",
            "payload": {"fullName": "Dana Levi", "caseId": "C-9"}
        })))
        .await;
    assert!(response.success, "{:?}", response);
    let result = response.result.unwrap();
    assert_eq!(result["run"]["status"], "completed");
    assert_eq!(result["run"]["steps"].as_array().unwrap().len(), 3);
    assert_eq!(result["submission"]["outcome"], "saved");
    assert_eq!(result["submission"]["confirmation_number"], "120034");
    assert!(result["runId"].as_str().is_some_and(|id| !id.is_empty()));

    assert_eq!(*pages.opened.lock(), vec!["https://forms.example/contact"]);
    assert_eq!(host.save_count(), 1);
    assert_eq!(host.saved.lock()[0]["caseId"], "C-9");
}

#[tokio::test]
async fn run_without_case_api_asks_for_manual_recording() {
    let pages = MemoryPages::contact();
    let service = service(pages, None);

    let run = tokio_test::assert_ok!(
        service
            .run_flow(StartFlow {
                payload: json!({"fullName": "Dana Levi"}),
                flow: Some("contact".into()),
                url: Some("https://staging.forms.example/contact".into()),
                ..StartFlow::default()
            })
            .await
    );
    assert_eq!(run.report.run.status, RunStatus::Completed);
    assert!(matches!(
        run.report.submission,
        Some(WatchOutcome::ManualRecording { .. })
    ));
    assert!(run.watchdog.outcome().is_some());
}

#[tokio::test]
async fn url_override_is_opened_instead_of_the_target() {
    let pages = MemoryPages::contact();
    let service = service(pages.clone(), None);

    service
        .run_flow(StartFlow {
            payload: json!({"fullName": "Dana Levi"}),
            flow: Some("contact".into()),
            url: Some("https://staging.forms.example/contact".into()),
            ..StartFlow::default()
        })
        .await
        .unwrap();
    assert_eq!(
        *pages.opened.lock(),
        vec!["https://staging.forms.example/contact"]
    );
}

#[tokio::test]
async fn payload_must_be_an_object() {
    let pages = MemoryPages::contact();
    let service = service(pages.clone(), None);

    let response = service
        .handle(start(json!({
            "type": "START_FLOW_WITH_PAYLOAD",
            "flow": "contact",
            "payload": ["not", "an", "object"]
        })))
        .await;
    assert!(!response.success);
    assert!(response.error.unwrap().starts_with("Invalid payload"));
    assert!(pages.opened.lock().is_empty());
}

#[tokio::test]
async fn unknown_flow_is_reported() {
    let service = service(MemoryPages::contact(), None);

    let response = service
        .handle(start(json!({
            "type": "START_FLOW_WITH_PAYLOAD",
            "flow": "no_such_flow",
            "payload": {}
        })))
        .await;
    assert_eq!(response.error.as_deref(), Some("Unknown flow: no_such_flow"));
}

#[test]
fn bundled_and_inserted_flows_are_listed() {
    let service = service(MemoryPages::contact(), None);
    assert_eq!(service.flow_ids(), vec!["claim_form", "contact"]);
}
