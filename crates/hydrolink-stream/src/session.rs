//! Session lifecycle for one event-stream subscription.
//!
//! The session moves through `Stopped -> Connecting -> Connected ->
//! Disconnected -> Connecting -> ...`; `Stopped` is terminal and reached
//! only through [`EventStream::stop`]. Two background jobs drive it:
//!
//! - the reconnect job fires once after a short bootstrap delay and then
//!   on a long steady interval, each tick doing disconnect-then-connect;
//!   after a failed attempt or a transport error the next tick comes after
//!   the short delay again;
//! - the keep-alive job sends a ping on a fixed period while connected.
//!
//! A single mutex guards the phase, the live connection, and the job
//! handles; transport callbacks and scheduled jobs all cross it. Handler
//! callbacks run outside the lock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use hydrolink_core::config::endpoints;
use hydrolink_core::{ClientRequest, DeviceHandler};

use crate::transport::{Connection, Transport, TransportEvent};
use crate::{Result, StreamError};

/// Timing and endpoint configuration for the event stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Event service endpoint.
    pub endpoint: String,
    /// Delay before the first keep-alive ping after connect.
    pub ping_delay: Duration,
    /// Period between keep-alive pings.
    pub ping_interval: Duration,
    /// Bootstrap delay before the first reconnect tick.
    pub reconnect_delay: Duration,
    /// Steady-state interval between reconnect ticks.
    pub reconnect_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::EVENTS.to_string(),
            ping_delay: Duration::from_secs(20),
            ping_interval: Duration::from_secs(25),
            reconnect_delay: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(10800),
        }
    }
}

/// Connection phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Not started, or stopped. No jobs armed, no connection.
    Stopped,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected and subscribed.
    Connected,
    /// Between connections; the reconnect job is armed.
    Disconnected,
}

struct SessionState {
    phase: SessionPhase,
    /// Invariant: `Some` iff `phase == Connected` (modulo the short window
    /// inside a locked transition).
    connection: Option<Connection>,
    reconnect_job: Option<JoinHandle<()>>,
    keepalive_job: Option<JoinHandle<()>>,
    reader_job: Option<JoinHandle<()>>,
}

struct Inner {
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn DeviceHandler>,
    state: Mutex<SessionState>,
}

/// Event-stream client for a single device subscription.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<Inner>,
}

impl EventStream {
    /// Create a stream for one device handler. Nothing happens until
    /// [`start`](Self::start) is called.
    pub fn new(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn DeviceHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                handler,
                state: Mutex::new(SessionState {
                    phase: SessionPhase::Stopped,
                    connection: None,
                    reconnect_job: None,
                    keepalive_job: None,
                    reader_job: None,
                }),
            }),
        }
    }

    /// Arm the reconnect job. Idempotent: a second call while the job is
    /// armed is a no-op.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        if state.reconnect_job.is_some() {
            debug!("event stream already started");
            return;
        }
        debug!(
            delay_secs = self.inner.config.reconnect_delay.as_secs_f64(),
            "starting event stream"
        );
        if state.phase == SessionPhase::Stopped {
            state.phase = SessionPhase::Disconnected;
        }
        self.arm_reconnect_locked(&mut state, self.inner.config.reconnect_delay);
    }

    /// Stop the session: cancel both jobs, close the transport, mark
    /// Stopped, and report offline. Safe to call at any time, including
    /// while a connect attempt is in flight.
    pub async fn stop(&self) {
        let was_stopped = {
            let mut state = self.inner.state.lock().await;
            debug!("stopping event stream");
            if let Some(job) = state.reconnect_job.take() {
                job.abort();
            }
            if let Some(job) = state.keepalive_job.take() {
                job.abort();
            }
            if let Some(job) = state.reader_job.take() {
                job.abort();
            }
            if let Some(connection) = state.connection.take() {
                connection.close().await;
            }
            let was_stopped = state.phase == SessionPhase::Stopped;
            state.phase = SessionPhase::Stopped;
            was_stopped
        };
        if !was_stopped {
            self.inner.handler.on_offline("event stream stopped").await;
        }
    }

    /// Write a message to the event service. Fails with
    /// [`StreamError::NotConnected`] unless the session is Connected.
    pub async fn send(&self, message: &str) -> Result<()> {
        let state = self.inner.state.lock().await;
        match (&state.phase, &state.connection) {
            (SessionPhase::Connected, Some(connection)) => {
                trace!(message, "sending message to event service");
                connection.send(message.to_string()).await
            }
            _ => Err(StreamError::NotConnected),
        }
    }

    /// Serialize and send a client request.
    pub async fn send_request(&self, request: &ClientRequest) -> Result<()> {
        self.send(&request.to_json()).await
    }

    /// Current phase of the session.
    pub async fn phase(&self) -> SessionPhase {
        self.inner.state.lock().await.phase
    }

    pub async fn is_connected(&self) -> bool {
        self.phase().await == SessionPhase::Connected
    }

    fn arm_reconnect_locked(&self, state: &mut SessionState, initial_delay: Duration) {
        if state.reconnect_job.is_some() {
            return;
        }
        let this = self.clone();
        state.reconnect_job = Some(tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                // a failed attempt retries on the short delay; only a live
                // connection earns the long steady interval
                let interval = if this.reconnect_tick().await {
                    this.inner.config.reconnect_interval
                } else {
                    this.inner.config.reconnect_delay
                };
                tokio::time::sleep(interval).await;
            }
        }));
    }

    /// One reconnect tick: drop whatever is connected, then connect.
    /// Returns whether the session came up.
    async fn reconnect_tick(&self) -> bool {
        trace!("reconnect tick");
        self.disconnect("reconnecting to event service").await;
        self.connect().await
    }

    /// Tear down the live connection, if any. No-op otherwise.
    async fn disconnect(&self, reason: &str) {
        let had_connection = {
            let mut state = self.inner.state.lock().await;
            if let Some(job) = state.keepalive_job.take() {
                job.abort();
            }
            if let Some(job) = state.reader_job.take() {
                job.abort();
            }
            match state.connection.take() {
                Some(connection) => {
                    debug!("closing event service connection");
                    connection.close().await;
                    if state.phase == SessionPhase::Connected {
                        state.phase = SessionPhase::Disconnected;
                    }
                    true
                }
                None => false,
            }
        };
        if had_connection {
            self.inner.handler.on_offline(reason).await;
        }
    }

    async fn connect(&self) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            if state.phase == SessionPhase::Stopped || state.connection.is_some() {
                return false;
            }
            state.phase = SessionPhase::Connecting;
        }

        let device_id = self.inner.handler.device_id();
        let session_token = self.inner.handler.session_token().await;
        debug!(device_id = %device_id, "connecting to event service");

        match self.inner.transport.connect().await {
            Ok(mut connection) => {
                let events = connection.take_events();
                {
                    let mut state = self.inner.state.lock().await;
                    if state.phase == SessionPhase::Stopped {
                        // stop() won the race; discard the fresh connection
                        connection.close().await;
                        return false;
                    }
                    debug!("event service connection established");
                    state.connection = Some(connection);
                    state.phase = SessionPhase::Connected;
                    if let Some(events) = events {
                        let this = self.clone();
                        state.reader_job = Some(tokio::spawn(async move {
                            this.read_loop(events).await;
                        }));
                    }
                    if state.keepalive_job.is_none() {
                        debug!(
                            delay_secs = self.inner.config.ping_delay.as_secs_f64(),
                            "starting keep-alive job"
                        );
                        let this = self.clone();
                        state.keepalive_job = Some(tokio::spawn(async move {
                            this.keepalive_loop().await;
                        }));
                    }
                }
                self.inner.handler.on_online().await;
                match session_token {
                    Some(token) => {
                        let subscribe = ClientRequest::subscribe(token, device_id);
                        if let Err(e) = self.send_request(&subscribe).await {
                            debug!(error = %e, "failed to send subscribe request");
                        }
                    }
                    None => debug!("no session token yet; skipping subscribe request"),
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "connection to event service failed");
                {
                    let mut state = self.inner.state.lock().await;
                    if state.phase != SessionPhase::Stopped {
                        state.phase = SessionPhase::Disconnected;
                    }
                }
                self.inner
                    .handler
                    .on_offline("unable to connect to event service")
                    .await;
                false
            }
        }
    }

    /// Consume transport events until the connection goes away.
    async fn read_loop(&self, mut events: tokio::sync::mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(text) => self.dispatch(&text).await,
                TransportEvent::Closed { code, reason } => {
                    debug!(?code, reason, "event service connection closed");
                    self.on_connection_closed().await;
                    break;
                }
                TransportEvent::Error(error) => {
                    warn!(error, "event service transport error");
                    self.on_transport_error().await;
                }
            }
        }
    }

    /// Forward a message to the handler if it carries an event tag;
    /// drop it silently otherwise.
    async fn dispatch(&self, raw: &str) {
        trace!(raw, "message received from event service");
        let tag = serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|value| value.get("event").and_then(Value::as_str).map(String::from));
        match tag {
            Some(tag) => {
                debug!(event = %tag, "dispatching event");
                self.inner.handler.on_event(&tag, raw).await;
            }
            None => trace!("dropping message without event tag"),
        }
    }

    /// Connection closed under us: clear it and cancel the keep-alive.
    /// Recovery is left to the armed reconnect job.
    async fn on_connection_closed(&self) {
        let mut state = self.inner.state.lock().await;
        state.connection = None;
        // the reader job is the caller; just drop its handle
        state.reader_job = None;
        if let Some(job) = state.keepalive_job.take() {
            job.abort();
        }
        if state.phase == SessionPhase::Connected {
            state.phase = SessionPhase::Disconnected;
        }
    }

    /// Transport error: re-arm the reconnect job on its short bootstrap
    /// delay so recovery does not wait out the steady interval.
    async fn on_transport_error(&self) {
        let mut state = self.inner.state.lock().await;
        if state.phase == SessionPhase::Stopped {
            return;
        }
        if let Some(job) = state.reconnect_job.take() {
            job.abort();
        }
        self.arm_reconnect_locked(&mut state, self.inner.config.reconnect_delay);
    }

    async fn keepalive_loop(&self) {
        tokio::time::sleep(self.inner.config.ping_delay).await;
        let ping = ClientRequest::Ping.to_json();
        loop {
            if let Err(e) = self.send(&ping).await {
                debug!(error = %e, "keep-alive ping failed");
            }
            tokio::time::sleep(self.inner.config.ping_interval).await;
        }
    }
}
