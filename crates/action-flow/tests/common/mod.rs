#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use action_flow::{EngineTimings, ExecCtx, LoggingOperator};
use async_trait::async_trait;
use extensions_bridge::{
    BridgeConfig, BridgeError, RelayBridge, RelayHost, RemoteFileRelay, SubmissionResponse,
    WireFile,
};
use formflow_core_types::FormProfile;
use formflow_page_port::memory::MemoryPage;
use parking_lot::Mutex;
use serde_json::Value;

/// No pauses between steps or after clicks.
pub fn fast_timings() -> EngineTimings {
    EngineTimings {
        step_pause_ms: 0,
        typing_delay_ms: 0,
        settle_ms: 0,
        ..EngineTimings::default()
    }
}

pub fn ctx(page: &MemoryPage) -> ExecCtx {
    ExecCtx::new(Arc::new(page.clone()), Arc::new(FormProfile::default()))
        .with_timings(fast_timings())
}

pub fn ctx_with_operator(page: &MemoryPage, operator: Arc<LoggingOperator>) -> ExecCtx {
    ctx(page).with_operator(operator)
}

/// Privileged host stand-in: serves small files and records saves.
#[derive(Default)]
pub struct FakeHost {
    pub saves: AtomicU32,
    pub saved: Mutex<Vec<Value>>,
    pub fail_saves: bool,
}

impl FakeHost {
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayHost for FakeHost {
    async fn fetch_file(&self, url: &str, filename: &str) -> Result<WireFile, BridgeError> {
        if url.contains("missing") {
            return Err(BridgeError::Remote("404".into()));
        }
        Ok(WireFile::from_bytes(filename, "image/png", vec![137, 80, 78, 71]))
    }

    async fn save_submission(&self, data: &Value) -> Result<SubmissionResponse, BridgeError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.saved.lock().push(data.clone());
        if self.fail_saves {
            return Err(BridgeError::Transport("connection reset".into()));
        }
        Ok(SubmissionResponse::saved())
    }
}

pub fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        save_backoff_ms: 10,
        ..BridgeConfig::default()
    }
}

pub fn relay(host: Arc<FakeHost>) -> RemoteFileRelay {
    let (bridge, _task) = RelayBridge::spawn(host, &bridge_config());
    RemoteFileRelay::new(bridge)
}
