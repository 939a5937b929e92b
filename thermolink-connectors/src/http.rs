//! HTTP control surface
//!
//! Routes:
//! - `GET /` - greeting
//! - `GET /send?blink=<n>` - queue a blink of `n` cycles, acknowledge at once
//! - `GET /status` - HTML status page rendered from a loop snapshot
//! - `POST /calibrate` - `{"device": string, "value": number}`, dispatched
//!   on the device's calibrate channel and mirrored to the broker
//!
//! The server runs on its own tokio runtime. Handlers never touch agent
//! state: they push [`ControlRequest`]s into a bounded queue that the agent
//! drains at the top of each tick through [`HttpControlSurface`]. A full
//! queue answers 503 instead of waiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{debug, info, warn};
use thermolink_core::{
    agent::{ControlRequest, StatusSnapshot},
    constants::time::STATUS_REFRESH_SECS,
    traits::ControlSurface,
    wire::CalibrationCommand,
    DeviceTopics,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Body of `GET /`
pub const GREETING: &str = "<h1>You are connected to thermolink</h1>";
/// Body of a 500 from `POST /calibrate`
pub const BAD_JSON: &str = "Bad JSON";
/// Body of a 400 from `POST /calibrate`
pub const NO_JSON: &str = "No JSON data";
/// Body of a 200 from `POST /calibrate`
pub const CALIBRATE_ACCEPTED: &str = r#"{"response":"Received and parsed JSON"}"#;

/// Default request queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 16;
/// Default time `/status` waits for the loop
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP surface errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Listener could not be bound
    #[error("cannot bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Bind error
        source: std::io::Error,
    },

    /// Server task panicked or was cancelled
    #[error("http server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

struct PendingRequest {
    request: ControlRequest,
    reply: Option<oneshot::Sender<StatusSnapshot>>,
}

struct ControlState {
    requests: mpsc::Sender<PendingRequest>,
    topics: DeviceTopics,
    status_timeout: Duration,
}

impl ControlState {
    fn enqueue(
        &self,
        request: ControlRequest,
        reply: Option<oneshot::Sender<StatusSnapshot>>,
    ) -> Result<(), Response> {
        match self.requests.try_send(PendingRequest { request, reply }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("control queue full, rejecting request");
                Err((StatusCode::SERVICE_UNAVAILABLE, "Agent busy").into_response())
            }
            Err(TrySendError::Closed(_)) => {
                Err((StatusCode::SERVICE_UNAVAILABLE, "Agent stopped").into_response())
            }
        }
    }
}

/// Builder used to configure and spawn the HTTP control server
pub struct HttpControlBuilder {
    listen: SocketAddr,
    topics: DeviceTopics,
    queue_depth: usize,
    status_timeout: Duration,
}

impl HttpControlBuilder {
    /// Serve on `listen`; `topics` resolves calibrate channels
    pub fn new(listen: SocketAddr, topics: DeviceTopics) -> Self {
        Self {
            listen,
            topics,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// Requests buffered before the server answers 503
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// How long `/status` waits for the loop to answer
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Bind and start serving on the current runtime
    ///
    /// Returns the server handle and the surface the agent loop drains.
    pub async fn spawn(self) -> Result<(HttpControlHandle, HttpControlSurface), HttpError> {
        let listener = TcpListener::bind(self.listen)
            .await
            .map_err(|source| HttpError::Bind { addr: self.listen, source })?;
        let address = listener
            .local_addr()
            .map_err(|source| HttpError::Bind { addr: self.listen, source })?;
        info!("http control surface listening on {}", address);

        let (requests, queue) = mpsc::channel(self.queue_depth);
        let state = ControlState {
            requests,
            topics: self.topics,
            status_timeout: self.status_timeout,
        };
        let router = Router::new()
            .route("/", get(get_root))
            .route("/send", get(get_send))
            .route("/status", get(get_status))
            .route("/calibrate", post(post_calibrate))
            .with_state(Arc::new(state));

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!("http server exited with error: {}", err);
            }
        });

        Ok((
            HttpControlHandle {
                address,
                task,
                shutdown: shutdown_tx,
            },
            HttpControlSurface { requests: queue },
        ))
    }
}

/// Handle returned from [`HttpControlBuilder::spawn`]
pub struct HttpControlHandle {
    address: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl HttpControlHandle {
    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Request graceful shutdown and wait for the server task
    pub async fn shutdown(self) -> Result<(), HttpError> {
        let _ = self.shutdown.send(true);
        self.task.await?;
        Ok(())
    }
}

/// Loop side of the HTTP surface
pub struct HttpControlSurface {
    requests: mpsc::Receiver<PendingRequest>,
}

impl ControlSurface for HttpControlSurface {
    type Ticket = Option<oneshot::Sender<StatusSnapshot>>;

    fn next_request(&mut self) -> Option<(ControlRequest, Self::Ticket)> {
        let pending = self.requests.try_recv().ok()?;
        Some((pending.request, pending.reply))
    }

    fn reply_status(&mut self, ticket: Self::Ticket, status: StatusSnapshot) {
        if let Some(reply) = ticket {
            // The handler may have timed out already.
            let _ = reply.send(status);
        }
    }
}

async fn get_root() -> Html<&'static str> {
    Html(GREETING)
}

async fn get_send(
    State(state): State<Arc<ControlState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let count = params.get("blink").map(|value| blink_count(value)).unwrap_or(0);
    if count > 0 {
        if let Err(response) = state.enqueue(ControlRequest::Blink { count }, None) {
            return response;
        }
    }
    (StatusCode::OK, format!("Will blink LED {} times", count)).into_response()
}

async fn get_status(State(state): State<Arc<ControlState>>) -> Response {
    let (reply, answer) = oneshot::channel();
    if let Err(response) = state.enqueue(ControlRequest::Status, Some(reply)) {
        return response;
    }

    match tokio::time::timeout(state.status_timeout, answer).await {
        Ok(Ok(status)) => Html(render_status_page(&status)).into_response(),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Agent did not answer").into_response(),
    }
}

async fn post_calibrate(State(state): State<Arc<ControlState>>, body: String) -> Response {
    if body.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, NO_JSON).into_response();
    }
    debug!("calibrate body: {}", body);

    let command: CalibrationCommand = match serde_json::from_str(&body) {
        Ok(command) => command,
        Err(err) => {
            warn!("rejected calibrate body: {}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, BAD_JSON).into_response();
        }
    };

    let device = match command.device.as_deref() {
        Some(device) if !device.is_empty() => device,
        _ => state.topics.device_id(),
    };
    let request = ControlRequest::Calibrate {
        channel: state.topics.calibrate_for(device),
        value: command.value,
        mirror: true,
    };
    if let Err(response) = state.enqueue(request, None) {
        return response;
    }

    ([(header::CONTENT_TYPE, "application/json")], CALIBRATE_ACCEPTED).into_response()
}

/// Leading integer of `text`; garbage and negatives count as zero
fn blink_count(text: &str) -> u32 {
    let text = text.trim();
    if text.starts_with('-') {
        return 0;
    }
    let digits = text.strip_prefix('+').unwrap_or(text);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return 0;
    }
    digits[..end].parse().unwrap_or(u32::MAX)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Status page for `status`, refreshing itself every few seconds
pub fn render_status_page(status: &StatusSnapshot) -> String {
    let device = escape_html(&status.device_id);
    let temperature = status
        .temperature
        .map(|t| format!("{:.2} C", t))
        .unwrap_or_else(|| "unavailable".to_string());
    let signal = status
        .link
        .signal_dbm
        .map(|dbm| format!("{} dBm", dbm))
        .unwrap_or_else(|| "n/a".to_string());
    let address = status.link.address.as_deref().map(escape_html).unwrap_or_else(|| "none".to_string());
    let hardware = status
        .link
        .hardware_address
        .as_deref()
        .map(escape_html)
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "<!DOCTYPE html>\
         <html lang='en'>\
         <head>\
         <meta charset='UTF-8'>\
         <meta http-equiv='refresh' content='{refresh}'>\
         <meta name='viewport' content='width=device-width, initial-scale=1.0'>\
         <title>{device} status</title>\
         <style>\
         body {{ font-family: sans-serif; background: #1e2127; color: #9cdcfe; }}\
         h1 {{ color: #e5a04b; }}\
         p {{ font-size: 1.1em; margin: 0.3em 0; }}\
         </style>\
         </head>\
         <body>\
         <h1>{device} status</h1>\
         <p>System Uptime: {uptime} seconds</p>\
         <p>Operating Voltage: {voltage:.1}V</p>\
         <p>WiFi SSID: {network}</p>\
         <p>IP Address: {address}</p>\
         <p>MAC Address: {hardware}</p>\
         <p>Signal Strength: {signal}</p>\
         <p>Room Temperature: {temperature}</p>\
         <p>Connection: {state} (next attempt in {retry} ms)</p>\
         <p>Calibration Offset: {offset:.2}</p>\
         <p>Telemetry: {sent} published, {skipped} skipped offline, {dropped} dropped</p>\
         <p>Calibrations: {applied} applied, {unmapped} unmapped, {rejected} rejected</p>\
         <p>Sessions: {opened} opened, {lost} lost, {relinks} link resets</p>\
         <p>Version: {version}</p>\
         </body>\
         </html>",
        refresh = STATUS_REFRESH_SECS,
        device = device,
        uptime = status.uptime_secs,
        voltage = status.operating_voltage(),
        network = escape_html(&status.link.network),
        address = address,
        hardware = hardware,
        signal = signal,
        temperature = temperature,
        state = status.state,
        retry = status.retry_in_ms,
        offset = status.offset,
        sent = status.agent.telemetry_sent,
        skipped = status.agent.telemetry_skipped,
        dropped = status.connection.dropped,
        applied = status.agent.calibrations_applied,
        unmapped = status.agent.calibrations_unmapped,
        rejected = status.agent.payloads_rejected,
        opened = status.connection.sessions_opened,
        lost = status.connection.sessions_lost,
        relinks = status.connection.relinks,
        version = status.version,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use thermolink_core::{AgentStats, ConnectionState, ConnectionStats, LinkInfo};

    fn topics() -> DeviceTopics {
        DeviceTopics::new("dev_test", "termometer").unwrap()
    }

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            device_id: "termometer".into(),
            version: "0.1.0",
            uptime_secs: 42,
            state: ConnectionState::SessionUp,
            link: LinkInfo {
                network: "lab<wifi>".into(),
                address: Some("192.168.1.40".into()),
                hardware_address: None,
                signal_dbm: Some(-61),
            },
            offset: 5.0,
            temperature: Some(21.375),
            raw: Some(80),
            last_telemetry: None,
            retry_in_ms: 0,
            connection: ConnectionStats::default(),
            agent: AgentStats::default(),
        }
    }

    /// Stand-in for the agent loop: drains the surface on a plain thread
    struct Responder {
        seen: Arc<Mutex<Vec<ControlRequest>>>,
        stop: Arc<AtomicBool>,
        thread: thread::JoinHandle<()>,
    }

    impl Responder {
        fn start(mut surface: HttpControlSurface) -> Self {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let stop = Arc::new(AtomicBool::new(false));
            let thread = {
                let seen = Arc::clone(&seen);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    loop {
                        // Read the flag before draining so requests queued
                        // before `finish` are never left behind.
                        let stopping = stop.load(Ordering::SeqCst);
                        while let Some((request, ticket)) = surface.next_request() {
                            if request == ControlRequest::Status {
                                surface.reply_status(ticket, snapshot());
                            }
                            seen.lock().unwrap().push(request);
                        }
                        if stopping {
                            break;
                        }
                        thread::sleep(Duration::from_millis(5));
                    }
                })
            };
            Self { seen, stop, thread }
        }

        fn finish(self) -> Vec<ControlRequest> {
            self.stop.store(true, Ordering::SeqCst);
            self.thread.join().unwrap();
            let seen = self.seen.lock().unwrap();
            seen.clone()
        }
    }

    async fn spawn(builder: HttpControlBuilder) -> (HttpControlHandle, HttpControlSurface, String) {
        let (handle, surface) = builder.spawn().await.unwrap();
        let base = format!("http://{}", handle.local_addr());
        (handle, surface, base)
    }

    fn builder() -> HttpControlBuilder {
        HttpControlBuilder::new("127.0.0.1:0".parse().unwrap(), topics())
    }

    #[tokio::test]
    async fn root_returns_greeting() {
        let (handle, _surface, base) = spawn(builder()).await;

        let response = Client::new().get(&base).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), GREETING);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn calibrate_is_queued_for_own_device_and_mirrored() {
        let (handle, surface, base) = spawn(builder()).await;
        let responder = Responder::start(surface);

        let response = Client::new()
            .post(format!("{base}/calibrate"))
            .body(r#"{"device":"termometer","value":3.5}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE.as_str()],
            "application/json"
        );
        assert_eq!(response.text().await.unwrap(), CALIBRATE_ACCEPTED);

        handle.shutdown().await.unwrap();
        assert_eq!(
            responder.finish(),
            [ControlRequest::Calibrate {
                channel: "dev_test/termometer/calibrate".into(),
                value: 3.5,
                mirror: true,
            }]
        );
    }

    #[tokio::test]
    async fn calibrate_for_other_device_targets_its_channel() {
        let (handle, surface, base) = spawn(builder()).await;
        let responder = Responder::start(surface);

        let response = Client::new()
            .post(format!("{base}/calibrate"))
            .body(r#"{"device":"hygrometer","value":-1}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        handle.shutdown().await.unwrap();
        let seen = responder.finish();
        assert!(matches!(
            &seen[..],
            [ControlRequest::Calibrate { channel, .. }] if channel == "dev_test/hygrometer/calibrate"
        ));
    }

    #[tokio::test]
    async fn malformed_calibrate_is_rejected_without_side_effects() {
        let (handle, surface, base) = spawn(builder()).await;
        let responder = Responder::start(surface);
        let client = Client::new();

        let response = client
            .post(format!("{base}/calibrate"))
            .body("{\"device\": \"termometer\", value")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
        assert_eq!(response.text().await.unwrap(), BAD_JSON);

        let response = client.post(format!("{base}/calibrate")).send().await.unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(response.text().await.unwrap(), NO_JSON);

        handle.shutdown().await.unwrap();
        assert!(responder.finish().is_empty());
    }

    #[tokio::test]
    async fn blink_is_acknowledged_and_queued() {
        let (handle, surface, base) = spawn(builder()).await;
        let responder = Responder::start(surface);
        let client = Client::new();

        let response = client.get(format!("{base}/send?blink=3")).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "Will blink LED 3 times");

        let response = client.get(format!("{base}/send?blink=lots")).send().await.unwrap();
        assert_eq!(response.text().await.unwrap(), "Will blink LED 0 times");

        handle.shutdown().await.unwrap();
        assert_eq!(responder.finish(), [ControlRequest::Blink { count: 3 }]);
    }

    #[tokio::test]
    async fn status_page_renders_loop_snapshot() {
        let (handle, surface, base) = spawn(builder()).await;
        let responder = Responder::start(surface);

        let response = Client::new().get(format!("{base}/status")).send().await.unwrap();
        assert_eq!(response.status(), 200);
        let page = response.text().await.unwrap();

        assert!(page.contains("System Uptime: 42 seconds"));
        assert!(page.contains("Operating Voltage: 3.3V"));
        assert!(page.contains("WiFi SSID: lab&lt;wifi&gt;"));
        assert!(page.contains("Signal Strength: -61 dBm"));
        assert!(page.contains("Room Temperature: 21.38 C"));
        assert!(page.contains("content='3'"));

        handle.shutdown().await.unwrap();
        responder.finish();
    }

    #[tokio::test]
    async fn status_times_out_when_loop_is_stalled() {
        let builder = builder().with_status_timeout(Duration::from_millis(100));
        let (handle, _surface, base) = spawn(builder).await;

        let response = Client::new().get(format!("{base}/status")).send().await.unwrap();
        assert_eq!(response.status(), 503);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_answers_busy() {
        let (handle, _surface, base) = spawn(builder().with_queue_depth(1)).await;
        let client = Client::new();

        let first = client.get(format!("{base}/send?blink=1")).send().await.unwrap();
        assert_eq!(first.status(), 200);
        let second = client.get(format!("{base}/send?blink=1")).send().await.unwrap();
        assert_eq!(second.status(), 503);

        handle.shutdown().await.unwrap();
    }

    #[test]
    fn blink_count_parses_leading_integer() {
        assert_eq!(blink_count("5"), 5);
        assert_eq!(blink_count(" 7x"), 7);
        assert_eq!(blink_count("+2"), 2);
        assert_eq!(blink_count("-3"), 0);
        assert_eq!(blink_count(""), 0);
        assert_eq!(blink_count("99999999999"), u32::MAX);
    }
}
