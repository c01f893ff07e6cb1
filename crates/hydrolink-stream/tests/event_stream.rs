//! Lifecycle tests for the event-stream session, driven by an in-process
//! mock transport and millisecond-scale timing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::time::sleep;

use hydrolink_core::{Device, DeviceHandler};
use hydrolink_stream::{
    Connection, EventStream, OutboundFrame, SessionPhase, StreamConfig, StreamError, Transport,
    TransportEvent,
};

/// Timing fast enough for tests: bootstrap 20ms, steady interval far
/// beyond the test horizon so a connected session never re-ticks.
fn test_config() -> StreamConfig {
    StreamConfig {
        endpoint: "ws://test.invalid/events".to_string(),
        ping_delay: Duration::from_millis(30),
        ping_interval: Duration::from_millis(30),
        reconnect_delay: Duration::from_millis(20),
        reconnect_interval: Duration::from_secs(3600),
    }
}

/// Handle to one mock connection: what the session wrote, and a way to
/// inject inbound transport events.
struct MockConnection {
    outbound: mpsc::Receiver<OutboundFrame>,
    events: mpsc::Sender<TransportEvent>,
}

impl MockConnection {
    async fn inject(&self, event: TransportEvent) {
        self.events.send(event).await.expect("session reader gone");
    }

    /// Wait for the next text frame written by the session.
    async fn next_text(&mut self) -> Option<String> {
        loop {
            match self.outbound.recv().await? {
                OutboundFrame::Text(text) => return Some(text),
                OutboundFrame::Close => return None,
            }
        }
    }
}

/// Transport that hands out channel-backed connections and counts
/// attempts. `fail_first` makes the first N attempts return an error.
struct MockTransport {
    attempts: AtomicUsize,
    fail_first: usize,
    connections: Mutex<Vec<MockConnection>>,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Self::failing(0)
    }

    fn failing(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
            fail_first,
            connections: Mutex::new(Vec::new()),
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Take the most recent connection's endpoints.
    async fn last_connection(&self) -> MockConnection {
        self.connections
            .lock()
            .await
            .pop()
            .expect("no connection was made")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<Connection, StreamError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(StreamError::ConnectFailed("mock refused".to_string()));
        }
        let (connection, outbound, events) = Connection::pipe(32);
        self.connections.lock().await.push(MockConnection { outbound, events });
        Ok(connection)
    }
}

/// Handler that records callbacks.
#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<(String, String)>>,
    online: AtomicUsize,
    offline: AtomicUsize,
}

#[async_trait]
impl DeviceHandler for RecordingHandler {
    fn device_id(&self) -> String {
        "device-1".to_string()
    }
    async fn session_token(&self) -> Option<String> {
        Some("token-1".to_string())
    }
    async fn on_event(&self, event_type: &str, raw: &str) {
        self.events
            .lock()
            .await
            .push((event_type.to_string(), raw.to_string()));
    }
    async fn on_device_update(&self, _device: &Device) {}
    async fn on_online(&self) {
        self.online.fetch_add(1, Ordering::SeqCst);
    }
    async fn on_offline(&self, _reason: &str) {
        self.offline.fetch_add(1, Ordering::SeqCst);
    }
}

fn stream_with(
    transport: &Arc<MockTransport>,
) -> (EventStream, Arc<RecordingHandler>) {
    let handler = Arc::new(RecordingHandler::default());
    let stream = EventStream::new(
        test_config(),
        transport.clone() as Arc<dyn Transport>,
        handler.clone(),
    );
    (stream, handler)
}

// One connect attempt within the bootstrap delay.
#[tokio::test]
async fn start_connects_once_within_bootstrap_delay() {
    let transport = MockTransport::new();
    let (stream, _handler) = stream_with(&transport);

    stream.start().await;
    assert_eq!(transport.attempts(), 0, "no attempt before the delay");

    sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(stream.phase().await, SessionPhase::Connected);

    stream.stop().await;
}

// Idempotent start.
#[tokio::test]
async fn double_start_schedules_one_reconnect_job() {
    let transport = MockTransport::new();
    let (stream, _handler) = stream_with(&transport);

    stream.start().await;
    stream.start().await;

    sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.attempts(), 1);

    stream.stop().await;
}

// The subscribe handshake goes out first, carrying token and device id.
#[tokio::test]
async fn subscribe_request_is_sent_on_connect() {
    let transport = MockTransport::new();
    let (stream, _handler) = stream_with(&transport);

    stream.start().await;
    sleep(Duration::from_millis(50)).await;

    let mut connection = transport.last_connection().await;
    let first = connection.next_text().await.expect("nothing was sent");
    let value: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(value["event"], "app_connection");
    assert_eq!(value["orbit_session_token"], "token-1");
    assert_eq!(value["subscribe_device_id"], "device-1");

    stream.stop().await;
}

// Pings while connected, none after stop.
#[tokio::test]
async fn keepalive_pings_flow_until_stop() {
    let transport = MockTransport::new();
    let (stream, _handler) = stream_with(&transport);

    stream.start().await;
    sleep(Duration::from_millis(50)).await;
    let mut connection = transport.last_connection().await;

    // subscribe first, then pings on the keep-alive cadence
    let subscribe = connection.next_text().await.unwrap();
    assert!(subscribe.contains("app_connection"));
    let ping = connection.next_text().await.unwrap();
    assert_eq!(ping, r#"{"event":"ping"}"#);
    let ping = connection.next_text().await.unwrap();
    assert_eq!(ping, r#"{"event":"ping"}"#);

    stream.stop().await;
    // drain anything queued before stop returned, then the channel must
    // fall silent for several ping periods
    sleep(Duration::from_millis(20)).await;
    while connection.outbound.try_recv().is_ok() {}
    sleep(Duration::from_millis(120)).await;
    assert!(
        connection.outbound.try_recv().is_err(),
        "frame sent after stop"
    );
}

// Send while disconnected is an explicit error.
#[tokio::test]
async fn send_while_disconnected_fails() {
    let transport = MockTransport::new();
    let (stream, _handler) = stream_with(&transport);

    let result = stream.send(r#"{"event":"ping"}"#).await;
    assert!(matches!(result, Err(StreamError::NotConnected)));
    assert_eq!(transport.attempts(), 0);
}

// Inbound event dispatched exactly once with the full raw payload.
#[tokio::test]
async fn inbound_event_reaches_handler_once() {
    let transport = MockTransport::new();
    let (stream, handler) = stream_with(&transport);

    stream.start().await;
    sleep(Duration::from_millis(50)).await;
    let connection = transport.last_connection().await;

    let raw = r#"{"event":"change_mode","mode":"manual","device_id":"device-1"}"#;
    connection.inject(TransportEvent::Message(raw.to_string())).await;
    // a tagless message is dropped silently
    connection
        .inject(TransportEvent::Message(r#"{"status":"ok"}"#.to_string()))
        .await;
    sleep(Duration::from_millis(50)).await;

    let events = handler.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "change_mode");
    assert_eq!(events[0].1, raw);
    drop(events);

    stream.stop().await;
}

// A transport error triggers one prompt extra reconnect attempt.
#[tokio::test]
async fn transport_error_triggers_prompt_reconnect() {
    let transport = MockTransport::new();
    let (stream, _handler) = stream_with(&transport);

    stream.start().await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.attempts(), 1);

    let connection = transport.last_connection().await;
    connection
        .inject(TransportEvent::Error("connection reset".to_string()))
        .await;

    // well before the steady one-hour interval, exactly one more attempt
    sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(stream.phase().await, SessionPhase::Connected);

    stream.stop().await;
}

// A peer close does not reconnect by itself; the armed job's next tick
// does. With the steady interval out of reach, the session just parks in
// Disconnected.
#[tokio::test]
async fn peer_close_waits_for_reconnect_tick() {
    let transport = MockTransport::new();
    let (stream, _handler) = stream_with(&transport);

    stream.start().await;
    sleep(Duration::from_millis(50)).await;
    let connection = transport.last_connection().await;

    connection
        .inject(TransportEvent::Closed {
            code: Some(1001),
            reason: "going away".to_string(),
        })
        .await;
    sleep(Duration::from_millis(100)).await;

    assert_eq!(stream.phase().await, SessionPhase::Disconnected);
    assert_eq!(transport.attempts(), 1, "close alone must not reconnect");

    // send in this state is refused
    assert!(matches!(
        stream.send("x").await,
        Err(StreamError::NotConnected)
    ));

    stream.stop().await;
}

// Repeated connect failures keep retrying at the short cadence and
// degrade to offline, never to a crash.
#[tokio::test]
async fn connect_failures_report_offline_and_keep_session_down() {
    let transport = MockTransport::failing(usize::MAX);
    let (stream, handler) = stream_with(&transport);

    stream.start().await;
    sleep(Duration::from_millis(100)).await;

    assert!(
        transport.attempts() >= 3,
        "retries must not wait out the steady interval"
    );
    assert!(handler.offline.load(Ordering::SeqCst) >= 1);
    assert_eq!(handler.online.load(Ordering::SeqCst), 0);
    assert_eq!(stream.phase().await, SessionPhase::Disconnected);

    stream.stop().await;
}

// A failed attempt is retried after the short delay, not the steady
// interval; once the endpoint is back the session comes up by itself.
#[tokio::test]
async fn failed_connect_retries_on_short_delay() {
    let transport = MockTransport::failing(3);
    let (stream, handler) = stream_with(&transport);

    stream.start().await;
    sleep(Duration::from_millis(200)).await;

    assert!(transport.attempts() >= 4);
    assert!(stream.is_connected().await);
    assert!(handler.online.load(Ordering::SeqCst) >= 1);
    assert!(handler.offline.load(Ordering::SeqCst) >= 3);

    stream.stop().await;
}

// Stop during an in-flight connect leaves a clean Stopped session.
#[tokio::test]
async fn stop_races_in_flight_connect() {
    // Transport that blocks in connect() until released.
    struct SlowTransport {
        release: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn connect(&self) -> Result<Connection, StreamError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = self.release.lock().await.take() {
                let _ = release.await;
            }
            let (connection, _outbound, _events) = Connection::pipe(8);
            Ok(connection)
        }
    }

    let (release_tx, release_rx) = tokio::sync::oneshot::channel();
    let transport = Arc::new(SlowTransport {
        release: Mutex::new(Some(release_rx)),
        attempts: AtomicUsize::new(0),
    });
    let handler = Arc::new(RecordingHandler::default());
    let stream = EventStream::new(
        test_config(),
        transport.clone() as Arc<dyn Transport>,
        handler.clone(),
    );

    stream.start().await;
    // let the bootstrap tick enter connect() and block
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);

    stream.stop().await;
    let _ = release_tx.send(());
    sleep(Duration::from_millis(50)).await;

    assert_eq!(stream.phase().await, SessionPhase::Stopped);
    assert!(matches!(
        stream.send("x").await,
        Err(StreamError::NotConnected)
    ));
    // no further attempts after stop
    sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
}
