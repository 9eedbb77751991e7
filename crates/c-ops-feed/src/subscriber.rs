//! ---
//! cops_section: "05-networking-external-interfaces"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Server-push twin feed subscription."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use c_ops_common::config::FeedConfig;
use c_ops_model::{FeedFrame, TwinSnapshot};
use c_ops_store::TwinCollection;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::FeedMetrics;

/// Connection health of the feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedHealth {
    /// First connection attempt is in flight.
    Connecting,
    /// Stream attached; frames are being applied.
    Live,
    /// Stream dropped; a reconnect is pending or in flight.
    Reconnecting,
    /// Subscription torn down; no further frames will be processed.
    Stopped,
}

/// Receives complete twin collections parsed from feed frames.
///
/// The subscriber never patches individual twins: every accepted frame
/// arrives here as a full replacement.
pub trait TwinSink: Send + Sync + 'static {
    fn replace_all(&self, twins: Vec<TwinSnapshot>);
}

impl TwinSink for RwLock<TwinCollection> {
    fn replace_all(&self, twins: Vec<TwinSnapshot>) {
        self.write().replace(twins);
    }
}

/// Builder for the feed subscriber task.
pub struct TwinFeedBuilder {
    config: FeedConfig,
    sink: Arc<dyn TwinSink>,
    metrics: Option<FeedMetrics>,
}

impl TwinFeedBuilder {
    pub fn new(config: FeedConfig, sink: Arc<dyn TwinSink>) -> Self {
        Self {
            config,
            sink,
            metrics: None,
        }
    }

    /// Attach feed counters registered on a shared registry.
    pub fn with_metrics(mut self, metrics: FeedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the subscriber and return a handle carrying the health signal
    /// and shutdown control. One logical subscription per handle.
    pub fn spawn(self) -> Result<FeedHandle> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to construct feed http client")?;

        let (health_tx, health_rx) = watch::channel(FeedHealth::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(feed_loop(
            self.config,
            client,
            self.sink,
            self.metrics,
            health_tx,
            shutdown_rx,
        ));

        Ok(FeedHandle {
            health: health_rx,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle for the running feed subscription.
pub struct FeedHandle {
    health: watch::Receiver<FeedHealth>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Watchable connection-health signal.
    pub fn health(&self) -> watch::Receiver<FeedHealth> {
        self.health.clone()
    }

    /// Close the subscription and await task completion.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => Ok(()),
            Err(err) => Err(anyhow::anyhow!(err)),
        }
    }
}

async fn feed_loop(
    config: FeedConfig,
    client: reqwest::Client,
    sink: Arc<dyn TwinSink>,
    metrics: Option<FeedMetrics>,
    health: watch::Sender<FeedHealth>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Some(url) = &config.snapshot_url {
        fetch_initial_snapshot(&client, url, sink.as_ref(), metrics.as_ref()).await;
    }

    let mut backoff = config.reconnect_initial;
    loop {
        if *shutdown.borrow() {
            break;
        }

        let outcome = tokio::select! {
            _ = shutdown.changed() => break,
            outcome = run_stream(
                &client,
                &config.stream_url,
                sink.as_ref(),
                metrics.as_ref(),
                &health,
            ) => outcome,
        };

        let was_live = *health.borrow() == FeedHealth::Live;
        match outcome {
            Ok(()) => warn!(url = %config.stream_url, "feed stream ended; scheduling reconnect"),
            Err(err) => {
                warn!(url = %config.stream_url, error = %err, "feed stream failed; scheduling reconnect")
            }
        }
        let _ = health.send(FeedHealth::Reconnecting);
        if let Some(metrics) = &metrics {
            metrics.record_reconnect();
        }

        // A stream that reached Live resets the backoff ladder.
        if was_live {
            backoff = config.reconnect_initial;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(config.reconnect_max);
    }

    let _ = health.send(FeedHealth::Stopped);
    info!("feed subscription closed");
}

async fn run_stream(
    client: &reqwest::Client,
    url: &str,
    sink: &dyn TwinSink,
    metrics: Option<&FeedMetrics>,
    health: &watch::Sender<FeedHealth>,
) -> Result<()> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .context("feed stream request failed")?
        .error_for_status()
        .context("feed stream returned an error status")?;

    let _ = health.send(FeedHealth::Live);
    info!(%url, "feed stream connected");

    let mut stream = response.bytes_stream();
    let mut parser = SseParser::default();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("feed stream read failed")?;
        for payload in parser.push(&chunk) {
            apply_frame(&payload, sink, metrics);
        }
    }
    Ok(())
}

async fn fetch_initial_snapshot(
    client: &reqwest::Client,
    url: &str,
    sink: &dyn TwinSink,
    metrics: Option<&FeedMetrics>,
) {
    let fetch = async {
        let frame: FeedFrame = client
            .get(url)
            .send()
            .await
            .context("snapshot request failed")?
            .error_for_status()
            .context("snapshot returned an error status")?
            .json()
            .await
            .context("snapshot payload failed to parse")?;
        anyhow::Ok(frame)
    };
    match fetch.await {
        Ok(frame) => {
            let twins = frame.items.len();
            sink.replace_all(frame.items);
            if let Some(metrics) = metrics {
                metrics.record_applied();
            }
            info!(%url, twins, "initial twin snapshot applied");
        }
        Err(err) => {
            warn!(%url, error = %err, "initial twin snapshot fetch failed; waiting for the stream")
        }
    }
}

/// Apply one decoded feed payload. Malformed payloads are discarded and
/// the collection left untouched.
fn apply_frame(payload: &str, sink: &dyn TwinSink, metrics: Option<&FeedMetrics>) {
    match serde_json::from_str::<FeedFrame>(payload) {
        Ok(frame) => {
            let twins = frame.items.len();
            sink.replace_all(frame.items);
            if let Some(metrics) = metrics {
                metrics.record_applied();
            }
            debug!(twins, "feed frame applied");
        }
        Err(err) => {
            if let Some(metrics) = metrics {
                metrics.record_rejected();
            }
            warn!(error = %err, "discarding malformed feed frame");
        }
    }
}

/// Incremental `text/event-stream` framing: accumulates `data:` lines and
/// emits one payload per blank-line-terminated event. Other SSE fields
/// (`event:`, `id:`, `retry:`, comments) are ignored.
#[derive(Debug, Default)]
struct SseParser {
    buffer: String,
    data: Vec<String>,
}

impl SseParser {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut complete = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.data.is_empty() {
                    complete.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_owned());
            }
        }
        complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use axum::body::Body;
    use axum::response::Response;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingSink {
        frames: parking_lot::Mutex<Vec<Vec<TwinSnapshot>>>,
    }

    impl TwinSink for RecordingSink {
        fn replace_all(&self, twins: Vec<TwinSnapshot>) {
            self.frames.lock().push(twins);
        }
    }

    fn sse_frame(value: serde_json::Value) -> String {
        format!("data: {value}\n\n")
    }

    async fn spawn_stub_feed(
        snapshot: Option<serde_json::Value>,
    ) -> (SocketAddr, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let rx_slot = Arc::new(StdMutex::new(Some(rx)));

        let mut app = Router::new().route(
            "/stream/twins",
            get(move || {
                let rx_slot = rx_slot.clone();
                async move {
                    let Some(rx) = rx_slot.lock().unwrap().take() else {
                        // Only one live stream per test; later attempts fail.
                        return Response::builder()
                            .status(410)
                            .body(Body::empty())
                            .unwrap();
                    };
                    let stream = futures::stream::unfold(rx, |mut rx| async move {
                        rx.recv()
                            .await
                            .map(|chunk| (Ok::<_, std::convert::Infallible>(chunk), rx))
                    });
                    Response::builder()
                        .header("content-type", "text/event-stream")
                        .body(Body::from_stream(stream))
                        .unwrap()
                }
            }),
        );
        if let Some(snapshot) = snapshot {
            app = app.route("/twins", get(move || {
                let snapshot = snapshot.clone();
                async move { Json(snapshot) }
            }));
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, tx)
    }

    fn test_config(addr: SocketAddr, with_snapshot: bool) -> FeedConfig {
        FeedConfig {
            stream_url: format!("http://{addr}/stream/twins"),
            snapshot_url: with_snapshot.then(|| format!("http://{addr}/twins")),
            reconnect_initial: Duration::from_millis(50),
            reconnect_max: Duration::from_millis(200),
        }
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn sse_parser_reassembles_split_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"data: {\"items\"").is_empty());
        assert!(parser.push(b": []}\n").is_empty());
        let frames = parser.push(b"\n");
        assert_eq!(frames, vec!["{\"items\": []}".to_string()]);
    }

    #[test]
    fn sse_parser_ignores_non_data_fields_and_crlf() {
        let mut parser = SseParser::default();
        let frames = parser.push(b": keep-alive\r\nevent: twins\r\nid: 7\r\ndata: {}\r\n\r\n");
        assert_eq!(frames, vec!["{}".to_string()]);
    }

    #[test]
    fn sse_parser_joins_multiline_data() {
        let mut parser = SseParser::default();
        let frames = parser.push(b"data: {\"items\":\ndata: []}\n\n");
        assert_eq!(frames, vec!["{\"items\":\n[]}".to_string()]);
    }

    #[test]
    fn malformed_payload_leaves_sink_untouched() {
        let sink = RecordingSink::default();
        apply_frame("{ nope", &sink, None);
        assert!(sink.frames.lock().is_empty());
        apply_frame(r#"{"items": []}"#, &sink, None);
        assert_eq!(sink.frames.lock().len(), 1);
    }

    #[tokio::test]
    async fn frames_replace_the_collection_in_delivery_order() {
        let (addr, tx) = spawn_stub_feed(None).await;
        let sink = Arc::new(RecordingSink::default());
        let handle = TwinFeedBuilder::new(test_config(addr, false), sink.clone())
            .spawn()
            .unwrap();

        tx.send(sse_frame(json!({
            "items": [
                {"stationId": "S1", "chargerId": "C1"},
                {"stationId": "S2", "chargerId": "C1"}
            ]
        })))
        .unwrap();
        wait_for(|| sink.frames.lock().len() == 1).await;

        // A malformed frame is discarded without touching state.
        tx.send("data: { definitely not json\n\n".to_string()).unwrap();
        tx.send(sse_frame(json!({
            "items": [{"stationId": "S9", "chargerId": "C9"}]
        })))
        .unwrap();
        wait_for(|| sink.frames.lock().len() == 2).await;

        let frames = sink.frames.lock();
        assert_eq!(frames[0].len(), 2);
        assert_eq!(frames[1].len(), 1);
        assert_eq!(frames[1][0].key().composite(), "S9::C9");
        drop(frames);

        assert_eq!(*handle.health().borrow(), FeedHealth::Live);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_stream_flips_health_to_reconnecting() {
        let (addr, tx) = spawn_stub_feed(None).await;
        let sink = Arc::new(RecordingSink::default());
        let registry = crate::metrics::new_registry();
        let metrics = FeedMetrics::new(registry.clone()).unwrap();
        let handle = TwinFeedBuilder::new(test_config(addr, false), sink.clone())
            .with_metrics(metrics)
            .spawn()
            .unwrap();

        tx.send(sse_frame(json!({"items": []}))).unwrap();
        wait_for(|| sink.frames.lock().len() == 1).await;

        let health = handle.health();
        drop(tx);
        wait_for(|| *health.borrow() != FeedHealth::Live).await;
        assert_eq!(*health.borrow(), FeedHealth::Reconnecting);

        handle.shutdown().await.unwrap();
        assert_eq!(*health.borrow(), FeedHealth::Stopped);

        let reconnects = registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == "c_ops_feed_reconnects_total")
            .expect("reconnect counter registered");
        assert!(reconnects.get_metric()[0].get_counter().get_value() >= 1.0);
    }

    #[tokio::test]
    async fn initial_snapshot_is_applied_before_stream_frames() {
        let snapshot = json!({
            "items": [{"stationId": "BOOT", "chargerId": "01"}]
        });
        let (addr, _tx) = spawn_stub_feed(Some(snapshot)).await;
        let sink = Arc::new(RecordingSink::default());
        let handle = TwinFeedBuilder::new(test_config(addr, true), sink.clone())
            .spawn()
            .unwrap();

        wait_for(|| !sink.frames.lock().is_empty()).await;
        assert_eq!(sink.frames.lock()[0][0].key().composite(), "BOOT::01");
        handle.shutdown().await.unwrap();
    }
}
