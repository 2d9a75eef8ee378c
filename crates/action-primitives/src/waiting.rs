//! Bounded wait/poll
//!
//! Every wait is an explicit deadline plus a fixed poll interval. The check
//! runs immediately, then once per interval; the last check lands on the
//! deadline itself. A condition that becomes true at `t` is therefore seen
//! no later than `t + interval`.

use std::future::Future;
use std::time::Duration;

use action_locator::Locator;
use formflow_page_port::{NodeId, PagePort};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::ActionError;

/// Deadline and poll interval of one wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitProfile {
    #[serde(with = "millis")]
    pub timeout: Duration,
    #[serde(with = "millis")]
    pub interval: Duration,
}

impl WaitProfile {
    /// Generic text appearance
    pub const TEXT_APPEAR: Self = Self::from_millis(30_000, 300);
    /// Selector appearance
    pub const SELECTOR_APPEAR: Self = Self::from_millis(30_000, 250);
    /// Cascading dropdown population
    pub const DROPDOWN_POPULATE: Self = Self::from_millis(10_000, 500);
    /// Upload completion; waits on a human
    pub const UPLOAD_COMPLETION: Self = Self::from_millis(300_000, 1_000);

    pub const fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(interval_ms),
        }
    }

    /// Profile with `attempts` checks spaced by `interval`.
    pub fn attempts(attempts: u32, interval: Duration) -> Self {
        Self {
            timeout: interval * attempts.saturating_sub(1),
            interval,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Poll `check` until it yields a value or the profile's deadline passes.
///
/// Non-fatal check errors count as "not yet"; fatal ones end the wait.
pub async fn wait_for<T, F, Fut>(
    what: &str,
    profile: WaitProfile,
    check: F,
) -> Result<T, ActionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ActionError>>,
{
    poll(what, profile, None, check).await
}

/// [`wait_for`] that also stops when `cancel` fires.
pub async fn wait_for_cancellable<T, F, Fut>(
    what: &str,
    profile: WaitProfile,
    cancel: &CancellationToken,
    check: F,
) -> Result<T, ActionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ActionError>>,
{
    poll(what, profile, Some(cancel), check).await
}

async fn poll<T, F, Fut>(
    what: &str,
    profile: WaitProfile,
    cancel: Option<&CancellationToken>,
    mut check: F,
) -> Result<T, ActionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ActionError>>,
{
    let started = Instant::now();
    let deadline = started + profile.timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match check().await {
            Ok(Some(value)) => {
                debug!(
                    what,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Wait satisfied"
                );
                return Ok(value);
            }
            Ok(None) => trace!(what, attempts, "Condition not met yet"),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => debug!(what, attempts, error = %err, "Check failed, polling on"),
        }

        let now = Instant::now();
        if now >= deadline {
            let elapsed_ms = now.duration_since(started).as_millis() as u64;
            debug!(what, attempts, elapsed_ms, "Wait timed out");
            return Err(ActionError::WaitTimeout {
                what: what.to_string(),
                attempts,
                elapsed_ms,
            });
        }

        let pause = profile.interval.min(deadline - now);
        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(ActionError::Interrupted(format!("wait for {} cancelled", what)));
                    }
                    _ = sleep(pause) => {}
                }
            }
            None => sleep(pause).await,
        }
    }
}

/// Wait until a visible element matches `selector`.
pub async fn wait_for_selector(
    page: &dyn PagePort,
    scope: Option<NodeId>,
    selector: &str,
    profile: WaitProfile,
) -> Result<NodeId, ActionError> {
    wait_for(&format!("selector '{}'", selector), profile, move || async move {
        for node in page.query_selector_all(scope, selector).await? {
            if page.is_visible(node).await? {
                return Ok(Some(node));
            }
        }
        Ok::<_, ActionError>(None)
    })
    .await
}

/// Wait until a visible element carries text matching `text`.
pub async fn wait_for_text(
    locator: &Locator,
    scope: Option<NodeId>,
    text: &str,
    profile: WaitProfile,
) -> Result<NodeId, ActionError> {
    wait_for(&format!("text '{}'", text), profile, move || async move {
        let Some(node) = locator.find_by_text(scope, text).await? else {
            return Ok(None);
        };
        if locator.page().is_visible(node).await? {
            Ok(Some(node))
        } else {
            Ok::<_, ActionError>(None)
        }
    })
    .await
}
