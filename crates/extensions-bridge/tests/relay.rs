use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header;
use axum::routing::{get, post};
use axum::{Json, Router};
use extensions_bridge::{
    event_bus, Bridge, BridgeConfig, BridgeError, BridgeEvent, HttpRelayHost, RelayBridge,
    RelayHost, RelayRequest, RemoteFileRelay, SaveOutcome, SubmissionPersister,
    SubmissionResponse, WireFile,
};
use serde_json::{json, Value};

struct FakeHost {
    save_failures: u32,
    saves: AtomicU32,
    manual: bool,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            save_failures: 0,
            saves: AtomicU32::new(0),
            manual: false,
        }
    }
}

#[async_trait]
impl RelayHost for FakeHost {
    async fn fetch_file(&self, url: &str, filename: &str) -> Result<WireFile, BridgeError> {
        if url.contains("missing") {
            return Err(BridgeError::Remote("404".into()));
        }
        Ok(WireFile::from_bytes(filename, "application/pdf", vec![37, 80, 68, 70]))
    }

    async fn save_submission(&self, _data: &Value) -> Result<SubmissionResponse, BridgeError> {
        let attempt = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if self.manual {
            return Ok(SubmissionResponse {
                success: true,
                requires_manual: Some(true),
                error: None,
            });
        }
        if attempt <= self.save_failures {
            return Err(BridgeError::Transport("connection reset".into()));
        }
        Ok(SubmissionResponse::saved())
    }
}

fn fast_config() -> BridgeConfig {
    BridgeConfig {
        save_backoff_ms: 10,
        ..BridgeConfig::default()
    }
}

#[tokio::test]
async fn fetch_rebuilds_the_file() {
    let (bridge, _host) = RelayBridge::spawn(Arc::new(FakeHost::new()), &fast_config());
    let relay = RemoteFileRelay::new(bridge);

    let file = relay
        .fetch_file("https://files.example/form.pdf", "form.pdf")
        .await
        .unwrap();
    assert_eq!(file.name, "form.pdf");
    assert_eq!(file.mime_type, "application/pdf");
    assert_eq!(file.size, 4);
}

#[tokio::test]
async fn fetch_failures_are_none() {
    let (bridge, _host) = RelayBridge::spawn(Arc::new(FakeHost::new()), &fast_config());
    let relay = RemoteFileRelay::new(bridge);

    assert!(relay
        .fetch_file("https://files.example/missing.pdf", "missing.pdf")
        .await
        .is_none());
    assert!(matches!(
        relay
            .try_fetch_file("https://files.example/missing.pdf", "missing.pdf")
            .await,
        Err(BridgeError::Remote(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn silent_host_times_out() {
    let config = BridgeConfig {
        request_deadline_ms: 2_000,
        ..BridgeConfig::default()
    };
    let (events, mut observed) = event_bus(4);
    let (bridge, _receiver) = RelayBridge::channel(&config);
    let bridge = bridge.with_events(events);

    let err = bridge
        .invoke(RelayRequest::FetchFile {
            url: "https://files.example/a.pdf".into(),
            filename: "a.pdf".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err, BridgeError::Timeout);
    assert_eq!(
        observed.recv().await.unwrap(),
        BridgeEvent::InvokeFail {
            op: "fetchFile".into(),
            error: "timeout".into()
        }
    );
}

#[tokio::test]
async fn dropped_host_closes_the_channel() {
    let (bridge, receiver) = RelayBridge::channel(&BridgeConfig::default());
    drop(receiver);
    let err = bridge
        .invoke(RelayRequest::SaveSubmission { data: json!({}) })
        .await
        .unwrap_err();
    assert_eq!(err, BridgeError::ChannelClosed);
}

#[tokio::test]
async fn save_retries_until_success() {
    let host = Arc::new(FakeHost {
        save_failures: 2,
        ..FakeHost::new()
    });
    let (bridge, _task) = RelayBridge::spawn(host.clone(), &fast_config());
    let persister = SubmissionPersister::new(bridge, &fast_config());

    let outcome = persister.save(json!({"confirmationNumber": "778899"})).await;
    assert_eq!(outcome, SaveOutcome::Saved);
    assert_eq!(host.saves.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn save_gives_up_after_configured_attempts() {
    let host = Arc::new(FakeHost {
        save_failures: u32::MAX,
        ..FakeHost::new()
    });
    let (bridge, _task) = RelayBridge::spawn(host.clone(), &fast_config());
    let persister = SubmissionPersister::new(bridge, &fast_config());

    let outcome = persister.save(json!({})).await;
    assert!(matches!(outcome, SaveOutcome::Failed { .. }));
    assert_eq!(host.saves.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn manual_recording_stops_retries() {
    let host = Arc::new(FakeHost {
        manual: true,
        ..FakeHost::new()
    });
    let (bridge, _task) = RelayBridge::spawn(host.clone(), &fast_config());
    let persister = SubmissionPersister::new(bridge, &fast_config());

    assert_eq!(persister.save(json!({})).await, SaveOutcome::RequiresManual);
    assert_eq!(host.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn http_host_fetches_and_saves() {
    let app = Router::new()
        .route(
            "/files/sig",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![137u8, 80, 78, 71]) }),
        )
        .route(
            "/api/submissions",
            post(|Json(body): Json<Value>| async move {
                Json(json!({"success": body["confirmationNumber"] == "778899"}))
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let host = HttpRelayHost::new(Some(format!("http://{}/api/", addr)));
    let file = host
        .fetch_file(&format!("http://{}/files/sig", addr), "signature.png")
        .await
        .unwrap();
    assert_eq!(file.mime_type, "image/png");
    assert_eq!(file.data, vec![137, 80, 78, 71]);

    let saved = host
        .save_submission(&json!({"confirmationNumber": "778899"}))
        .await
        .unwrap();
    assert!(saved.success);

    let missing = host
        .fetch_file(&format!("http://{}/files/none", addr), "none.png")
        .await;
    assert!(matches!(missing, Err(BridgeError::Remote(_))));
}

#[tokio::test]
async fn http_host_without_api_requires_manual() {
    let host = HttpRelayHost::new(None);
    let response = host.save_submission(&json!({})).await.unwrap();
    assert!(response.requires_manual());
}
