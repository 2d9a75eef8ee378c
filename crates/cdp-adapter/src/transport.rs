use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, Message, MethodId, Response};
use futures::{future::BoxFuture, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::launch;

/// Where a raw command is sent: the browser endpoint or one attached tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

/// Raw DevTools command channel. Responses are the command's `result`
/// object; protocol errors come back as [`AdapterErrorKind::Protocol`].
#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;

    /// Tear the browser down. Transports without a process are no-ops.
    async fn shutdown(&self) {}
}

type Connector =
    Arc<dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Arc<Runtime>, AdapterError>> + Send + Sync>;

/// Transport over chromiumoxide's websocket connection. The browser is
/// reached lazily and reached again when the previous connection died.
#[derive(Clone)]
pub struct ChromiumTransport {
    cfg: CdpConfig,
    current: Arc<Mutex<Option<Arc<Runtime>>>>,
    connector: Connector,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let connector: Connector =
            Arc::new(|cfg: CdpConfig| Box::pin(async move { Runtime::open(&cfg).await.map(Arc::new) }));
        Self::with_connector(cfg, connector)
    }

    fn with_connector(cfg: CdpConfig, connector: Connector) -> Self {
        Self {
            cfg,
            current: Arc::new(Mutex::new(None)),
            connector,
        }
    }

    /// Launch or attach now rather than on the first command.
    pub async fn connect(&self) -> Result<(), AdapterError> {
        self.runtime().await.map(|_| ())
    }

    async fn runtime(&self) -> Result<Arc<Runtime>, AdapterError> {
        let mut current = self.current.lock().await;
        match current.as_ref() {
            Some(runtime) if runtime.is_alive() => return Ok(runtime.clone()),
            Some(_) => warn!(target: "cdp-transport", "browser connection lost; reconnecting"),
            None => {}
        }

        let runtime = (self.connector)(self.cfg.clone()).await?;
        *current = Some(runtime.clone());
        Ok(runtime)
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let runtime = self.runtime().await?;
        runtime
            .requester
            .call(target, method, params, self.deadline())
            .await
    }

    async fn shutdown(&self) {
        let runtime = self.current.lock().await.take();
        if let Some(runtime) = runtime {
            runtime.stop().await;
        }
    }
}

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

struct Request {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

/// Handle for queueing commands onto the pump.
#[derive(Clone)]
struct Requester {
    queue: mpsc::Sender<Request>,
}

impl Requester {
    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (reply, answer) = oneshot::channel();
        self.queue
            .send(Request {
                target,
                method: method.to_string(),
                params,
                reply,
            })
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::CdpIo).with_hint("cdp connection closed")
            })?;

        match tokio::time::timeout(deadline, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint("cdp connection closed before replying")),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::Timeout)
                .with_hint(format!("{method} timed out"))
                .retriable(true)),
        }
    }
}

/// One live connection: the pump task, an optional heartbeat and the
/// Chromium process when we launched it.
struct Runtime {
    requester: Requester,
    tasks: Vec<JoinHandle<()>>,
    process: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
}

impl Runtime {
    async fn open(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let launch::Endpoint { ws_url, process } = launch::endpoint(cfg).await?;
        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (queue, requests) = mpsc::channel(128);
        let requester = Requester { queue };
        let alive = Arc::new(AtomicBool::new(true));

        let mut tasks = vec![tokio::spawn(
            Pump::new(conn, requests).run(alive.clone()),
        )];
        let every = Duration::from_millis(cfg.heartbeat_interval_ms);
        if !every.is_zero() {
            let deadline = Duration::from_millis(cfg.default_deadline_ms).min(Duration::from_secs(5));
            tasks.push(tokio::spawn(heartbeat(
                requester.clone(),
                alive.clone(),
                every,
                deadline,
            )));
        }

        info!(target: "cdp-transport", url = %ws_url, "devtools connection established");
        Ok(Self {
            requester,
            tasks,
            process: Mutex::new(process),
            alive,
        })
    }

    #[cfg(test)]
    fn detached() -> (Arc<Self>, Arc<AtomicBool>) {
        let (queue, _requests) = mpsc::channel(1);
        let alive = Arc::new(AtomicBool::new(true));
        let runtime = Self {
            requester: Requester { queue },
            tasks: Vec::new(),
            process: Mutex::new(None),
            alive: alive.clone(),
        };
        (Arc::new(runtime), alive)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn stop(&self) {
        self.alive.store(false, Ordering::Relaxed);
        let process = self.process.lock().await.take();
        if let Some(mut process) = process {
            match process.kill().await {
                Ok(_) => info!(target: "cdp-transport", "chromium stopped"),
                Err(err) => warn!(target: "cdp-transport", ?err, "failed to stop chromium"),
            }
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        for task in &self.tasks {
            task.abort();
        }

        let Some(mut process) = self.process.get_mut().take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = process.kill().await {
                        warn!(target: "cdp-transport", ?err, "failed to stop chromium");
                    }
                });
            }
            Err(_) => debug!(target: "cdp-transport", "no runtime left to stop chromium"),
        }
    }
}

/// Owns the websocket: writes queued requests, matches responses to
/// their callers by call id.
struct Pump {
    conn: Connection<CdpEventMessage>,
    requests: mpsc::Receiver<Request>,
    pending: HashMap<CallId, Reply>,
}

impl Pump {
    fn new(conn: Connection<CdpEventMessage>, requests: mpsc::Receiver<Request>) -> Self {
        Self {
            conn,
            requests,
            pending: HashMap::new(),
        }
    }

    async fn run(mut self, alive: Arc<AtomicBool>) {
        let reason = self.drive().await;
        alive.store(false, Ordering::Relaxed);
        warn!(target: "cdp-transport", %reason, "devtools connection ended");
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(reason.clone()));
        }
    }

    /// Runs until the connection ends and returns why.
    async fn drive(&mut self) -> AdapterError {
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => {
                        if let Err(err) = self.submit(request) {
                            return err;
                        }
                    }
                    None => {
                        return AdapterError::new(AdapterErrorKind::CdpIo)
                            .with_hint("transport dropped");
                    }
                },
                message = self.conn.next() => match message {
                    Some(Ok(Message::Response(response))) => self.settle(response),
                    // Page state is always re-read through Runtime.evaluate.
                    Some(Ok(Message::Event(_))) => trace!(target: "cdp-transport", "event ignored"),
                    Some(Err(err)) => return connection_error(err),
                    None => {
                        return AdapterError::new(AdapterErrorKind::CdpIo)
                            .with_hint("cdp connection closed");
                    }
                },
            }
        }
    }

    fn submit(&mut self, request: Request) -> Result<(), AdapterError> {
        let session = match request.target {
            CommandTarget::Browser => None,
            CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
        };
        let method: MethodId = request.method.into();
        match self.conn.submit_command(method, session, request.params) {
            Ok(call_id) => {
                self.pending.insert(call_id, request.reply);
                Ok(())
            }
            Err(err) => {
                let err = AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string());
                let _ = request.reply.send(Err(err.clone()));
                Err(err)
            }
        }
    }

    fn settle(&mut self, response: Response) {
        match self.pending.remove(&response.id) {
            Some(reply) => {
                let _ = reply.send(response_result(response));
            }
            None => trace!(target: "cdp-transport", id = ?response.id, "response without caller"),
        }
    }
}

/// Periodic `Browser.getVersion`; a missed deadline marks the runtime
/// dead so the next command reconnects.
async fn heartbeat(requester: Requester, alive: Arc<AtomicBool>, every: Duration, deadline: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    while alive.load(Ordering::Relaxed) {
        ticker.tick().await;
        let result = requester
            .call(CommandTarget::Browser, "Browser.getVersion", json!({}), deadline)
            .await;
        match result {
            Ok(_) => {}
            Err(err) if err.kind == AdapterErrorKind::Timeout => {
                warn!(target: "cdp-transport", "heartbeat timed out");
                alive.store(false, Ordering::Relaxed);
                break;
            }
            Err(err) => {
                debug!(target: "cdp-transport", %err, "heartbeat stopped");
                break;
            }
        }
    }
}

fn connection_error(err: CdpError) -> AdapterError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::Timeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::FrameNotFound(_) | CdpError::JavascriptException(_) | CdpError::Serde(_) => {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(hint)
        }
        _ => AdapterError::new(AdapterErrorKind::CdpIo).with_hint(hint),
    }
}

fn response_result(response: Response) -> Result<Value, AdapterError> {
    match (response.result, response.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::Protocol)
            .with_hint(format!("cdp error {}: {}", error.code, error.message))),
        (None, None) => {
            Err(AdapterError::new(AdapterErrorKind::Internal).with_hint("empty cdp response"))
        }
    }
}
