use std::sync::{Arc, Mutex};

use action_flow::{
    EngineTimings, FlowCatalog, FlowError, FlowService, LoggingOperator, PageFactory,
    WatchdogConfig,
};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use formflow_cli::server::router;
use formflow_core_types::FlowDefinition;
use formflow_page_port::memory::MemoryPage;
use formflow_page_port::PagePort;
use serde_json::{json, Value};
use tower::ServiceExt;

const SIGNUP_PAGE: &str = r#"
<form>
  <div class="form-group"><label for="email">Email</label><input id="email"></div>
  <button type="button" id="go">Register</button>
</form>
"#;

const SIGNUP_FLOW: &str = r#"
id: signup
name: Newsletter signup
targetUrl: https://forms.example/signup
steps:
  - id: email
    type: text_input
    locator:
      label: Email
    dataKey: email
  - id: register
    type: button
    locator:
      label: Register
"#;

struct Pages {
    page: MemoryPage,
    opened: Mutex<Vec<String>>,
}

#[async_trait]
impl PageFactory for Pages {
    async fn open(&self, url: &str) -> Result<Arc<dyn PagePort>, FlowError> {
        self.opened.lock().unwrap().push(url.to_string());
        self.page.set_url(url);
        Ok(Arc::new(self.page.clone()))
    }
}

fn app() -> (axum::Router, Arc<Pages>) {
    let page = MemoryPage::from_html(SIGNUP_PAGE);
    page.on_click("#go", |tree, _| {
        tree.set_url("https://forms.example/signup/done?gbxid=success");
        let root = tree.root();
        tree.append_html(root, "<p>Request number: 5512</p>");
    });
    let pages = Arc::new(Pages {
        page,
        opened: Mutex::new(Vec::new()),
    });

    let mut catalog = FlowCatalog::bundled().unwrap();
    catalog.insert(FlowDefinition::from_yaml_str(SIGNUP_FLOW).unwrap());
    let service = FlowService::new(catalog, pages.clone())
        .with_operator(Arc::new(LoggingOperator::new()))
        .with_timings(EngineTimings {
            step_pause_ms: 0,
            typing_delay_ms: 0,
            settle_ms: 0,
            ..EngineTimings::default()
        })
        .with_watchdog(WatchdogConfig {
            poll_interval_ms: 20,
            poll_attempts: 3,
            monitor_interval_ms: 20,
            monitor_budget_ms: 500,
        });
    (router(Arc::new(service)), pages)
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_command(body: Value) -> Request<Body> {
    Request::post("/commands")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_lists_flows() {
    let (app, _) = app();
    let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["flows"], json!(["claim_form", "signup"]));
}

#[tokio::test]
async fn start_command_runs_the_flow() {
    let (app, pages) = app();
    let (status, body) = send(
        app,
        post_command(json!({
            "type": "START_FLOW_WITH_PAYLOAD",
            "source": "portal",
            "flow": "signup",
            "payload": {"email": "dana@example.com"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "{body}");
    assert_eq!(body["result"]["run"]["status"], "completed");
    assert_eq!(body["result"]["run"]["flowId"], "signup");
    assert_eq!(body["result"]["submission"]["confirmation_number"], "5512");
    assert_eq!(
        pages.opened.lock().unwrap().as_slice(),
        ["https://forms.example/signup".to_string()]
    );
}

#[tokio::test]
async fn unknown_flows_fail_in_the_response() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_command(json!({
            "type": "START_FLOW_WITH_PAYLOAD",
            "flow": "missing_flow",
            "payload": {}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unknown flow: missing_flow");
}

#[tokio::test]
async fn unsupported_commands_are_rejected() {
    let (app, pages) = app();
    let (status, body) = send(app, post_command(json!({"type": "STOP_EVERYTHING"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Unsupported command"));
    assert!(pages.opened.lock().unwrap().is_empty());
}
