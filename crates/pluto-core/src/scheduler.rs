//! Client for the remote price-refresh scheduler.
//!
//! Start and stop are fire-and-observe: the command is posted, and the
//! resulting state is learned from a status poll after a settle delay.
//! Status polls are not ordered; whichever response resolves last wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::ShapeError;
use crate::transport::{HttpRequest, HttpTransport, RawResponse};

/// Wait between a start/stop command and the status poll that observes it.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Period of the passive status poll.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Locally known view of the remote schedule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScheduleState {
    /// No successful poll yet, or the last poll failed.
    #[default]
    Unknown,
    Stopped,
    Running {
        next_run_time: Option<String>,
        interval_seconds: Option<u64>,
    },
}

impl ScheduleState {
    pub fn is_known(&self) -> bool {
        !matches!(self, ScheduleState::Unknown)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ScheduleState::Running { .. })
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleState::Unknown => write!(f, "unknown"),
            ScheduleState::Stopped => write!(f, "stopped"),
            ScheduleState::Running {
                next_run_time,
                interval_seconds,
            } => {
                write!(f, "running")?;
                match (interval_seconds, next_run_time) {
                    (Some(secs), Some(next)) => write!(f, " (every {}s, next run {})", secs, next),
                    (Some(secs), None) => write!(f, " (every {}s)", secs),
                    (None, Some(next)) => write!(f, " (next run {})", next),
                    (None, None) => Ok(()),
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    running: Option<bool>,
    #[serde(default)]
    next_run_time: Option<String>,
    #[serde(default)]
    interval_seconds: Option<u64>,
}

/// Decode a `/schedule/status` response into a complete state.
///
/// Any error means the caller knows nothing; there is no partial state.
pub fn decode_status(response: &RawResponse) -> Result<ScheduleState, ShapeError> {
    if !response.is_success() {
        return Err(ShapeError::Status(response.status));
    }

    let status: StatusResponse = response.json()?;
    if status.ok != Some(true) {
        return Err(ShapeError::MissingAck);
    }

    match status.running {
        Some(true) => Ok(ScheduleState::Running {
            next_run_time: status.next_run_time,
            interval_seconds: status.interval_seconds,
        }),
        Some(false) => Ok(ScheduleState::Stopped),
        None => Err(ShapeError::MissingField("running")),
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    settle_delay: Duration,
    poll_interval: Duration,
    state: Arc<watch::Sender<ScheduleState>>,
}

impl SchedulerClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        let (state, _) = watch::channel(ScheduleState::Unknown);
        Self {
            transport,
            base_url: base_url.into(),
            settle_delay: SETTLE_DELAY,
            poll_interval: POLL_INTERVAL,
            state: Arc::new(state),
        }
    }

    pub fn with_timing(mut self, settle_delay: Duration, poll_interval: Duration) -> Self {
        self.settle_delay = settle_delay;
        self.poll_interval = poll_interval;
        self
    }

    pub fn state(&self) -> ScheduleState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScheduleState> {
        self.state.subscribe()
    }

    /// Ask the scheduler to refresh `symbol` every `interval_seconds`.
    ///
    /// State is not touched here. The returned task polls status once the
    /// settle delay has passed.
    pub async fn start(
        &self,
        symbol: &str,
        interval_seconds: u64,
        token: Option<&str>,
    ) -> JoinHandle<()> {
        info!(symbol, interval_seconds, "starting remote schedule");
        let body = json!({ "symbol": symbol, "interval_seconds": interval_seconds });
        let request = HttpRequest::post(self.url("start")).json(body).bearer(token);
        self.command(request, token).await
    }

    /// Ask the scheduler to stop. Same settle-then-refresh behavior as [`start`](Self::start).
    pub async fn stop(&self, token: Option<&str>) -> JoinHandle<()> {
        info!("stopping remote schedule");
        let request = HttpRequest::post(self.url("stop")).bearer(token);
        self.command(request, token).await
    }

    /// Poll `/schedule/status` and overwrite the local state with the outcome.
    pub async fn refresh_status(&self, token: Option<&str>) -> ScheduleState {
        let request = HttpRequest::get(self.url("status")).bearer(token);
        let next = match self.transport.send(request).await {
            Ok(response) => decode_status(&response).unwrap_or_else(|e| {
                warn!(error = %e, "schedule status rejected, state unknown");
                ScheduleState::Unknown
            }),
            Err(e) => {
                warn!(error = %e, "schedule status unreachable, state unknown");
                ScheduleState::Unknown
            }
        };

        debug!(state = %next, "schedule state refreshed");
        self.state.send_replace(next.clone());
        next
    }

    /// Poll every interval until the returned [`Poller`] is dropped.
    ///
    /// The token is read from `tokens` at each tick.
    pub fn spawn_poller(&self, tokens: watch::Receiver<Option<String>>) -> Poller {
        let client = self.clone();
        let period = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let token = tokens.borrow().clone();
                client.refresh_status(token.as_deref()).await;
            }
        });

        Poller { handle }
    }

    async fn command(&self, request: HttpRequest, token: Option<&str>) -> JoinHandle<()> {
        let url = request.url.clone();
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => debug!(url = %url, "schedule command accepted"),
            Ok(response) => {
                warn!(url = %url, status = response.status, "schedule command rejected")
            }
            Err(e) => warn!(url = %url, error = %e, "schedule command failed"),
        }
        self.refresh_after_settle(token.map(str::to_string))
    }

    fn refresh_after_settle(&self, token: Option<String>) -> JoinHandle<()> {
        let client = self.clone();
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.refresh_status(token.as_deref()).await;
        })
    }

    fn url(&self, action: &str) -> String {
        format!("{}/schedule/{}", self.base_url, action)
    }
}

/// Handle to the passive status poll; dropping it cancels the poll.
#[derive(Debug)]
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    /// Same as dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
