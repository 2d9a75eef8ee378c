//! Request/response channel to the privileged host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::host::RelayHost;
use crate::messages::{BridgeRequest, BridgeResponse, RelayRequest, RelayResponse};
use crate::{BridgeError, BridgeEvent, BridgeEventBus};

#[async_trait]
pub trait Bridge: Send + Sync {
    /// Send one request and await its typed reply.
    async fn invoke(&self, request: RelayRequest) -> Result<RelayResponse, BridgeError>;
}

/// One in-flight request and the slot its reply goes to.
pub struct Envelope {
    pub request: BridgeRequest,
    reply: oneshot::Sender<BridgeResponse>,
}

impl Envelope {
    pub fn respond(self, message: RelayResponse) {
        let response = BridgeResponse {
            req_id: self.request.req_id,
            message,
        };
        if self.reply.send(response).is_err() {
            debug!("Relay caller went away before the reply");
        }
    }
}

/// Engine side of the relay: typed requests over tokio mpsc with a oneshot
/// reply per request and a per-request deadline.
pub struct RelayBridge {
    sender: mpsc::Sender<Envelope>,
    deadline: Duration,
    events: Option<BridgeEventBus>,
}

impl RelayBridge {
    /// Bridge plus the receiving end the host drains.
    pub fn channel(config: &BridgeConfig) -> (Self, mpsc::Receiver<Envelope>) {
        let (sender, receiver) = mpsc::channel(config.queue_depth.max(1));
        (
            Self {
                sender,
                deadline: Duration::from_millis(config.request_deadline_ms),
                events: None,
            },
            receiver,
        )
    }

    /// Bridge wired to `host`, served on a background task.
    pub fn spawn(host: Arc<dyn RelayHost>, config: &BridgeConfig) -> (Arc<Self>, JoinHandle<()>) {
        let (bridge, receiver) = Self::channel(config);
        let handle = tokio::spawn(serve(receiver, host));
        (Arc::new(bridge), handle)
    }

    pub fn with_events(mut self, events: BridgeEventBus) -> Self {
        self.events = Some(events);
        self
    }

    async fn round_trip(&self, request: BridgeRequest) -> Result<RelayResponse, BridgeError> {
        let (reply, receive) = oneshot::channel();
        self.sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        match timeout(self.deadline, receive).await {
            Ok(Ok(response)) => Ok(response.message),
            Ok(Err(_)) => Err(BridgeError::ChannelClosed),
            Err(_) => Err(BridgeError::Timeout),
        }
    }

    fn emit(&self, event: BridgeEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl Bridge for RelayBridge {
    async fn invoke(&self, request: RelayRequest) -> Result<RelayResponse, BridgeError> {
        let op = request.op();
        let request = BridgeRequest::new(request, self.deadline.as_millis() as u64);
        let req_id = request.req_id;

        debug!(%req_id, op, "Relaying request");
        let result = self.round_trip(request).await;

        match &result {
            Ok(_) => self.emit(BridgeEvent::InvokeOk {
                op: op.to_string(),
            }),
            Err(err) => {
                warn!(%req_id, op, error = %err, "Relay request failed");
                self.emit(BridgeEvent::InvokeFail {
                    op: op.to_string(),
                    error: err.to_string(),
                });
            }
        }
        result
    }
}

/// Host loop. Requests are handled one at a time in arrival order; upload
/// widgets on the page are order-sensitive.
pub async fn serve(mut receiver: mpsc::Receiver<Envelope>, host: Arc<dyn RelayHost>) {
    while let Some(envelope) = receiver.recv().await {
        let response = host.handle(&envelope.request.message).await;
        envelope.respond(response);
    }
    debug!("Relay host loop finished");
}

/// Broadcast sender for bridge observers.
pub fn event_bus(capacity: usize) -> (BridgeEventBus, broadcast::Receiver<BridgeEvent>) {
    broadcast::channel(capacity.max(1))
}
