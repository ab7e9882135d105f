//! Realtime change feed over WebSocket, with auto-reconnect.
//!
//! Speaks the Phoenix channel protocol used by the hosted backend: one
//! `phx_join` per watched table carrying a `postgres_changes` config,
//! a heartbeat on the `phoenix` topic, and `postgres_changes` pushes that
//! are turned into [`ChangeEvent`]s on a [`ChangeBus`].

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::event::{ChangeBus, ChangeEvent, ChangeKind};
use super::interest::ChangeInterest;

/// Errors from the realtime connection.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    #[error("WebSocket send failed: {0}")]
    Send(String),

    #[error("channel join rejected for {topic}: {reason}")]
    JoinRejected { topic: String, reason: String },
}

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
    /// Give up after this many consecutive failures; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Configuration for the change feed.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Full websocket URL including `apikey` and `vsn` query parameters
    pub url: String,
    /// Token sent with each channel join
    pub access_token: String,
    /// Heartbeat period. Default: 25s.
    pub heartbeat: Duration,
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    /// Derive the websocket endpoint from the backend's HTTP base URL.
    ///
    /// ```
    /// use ride_server::realtime::RealtimeConfig;
    ///
    /// let config = RealtimeConfig::for_backend("https://abc.example.co", "key");
    /// assert_eq!(
    ///     config.url,
    ///     "wss://abc.example.co/realtime/v1/websocket?apikey=key&vsn=1.0.0"
    /// );
    /// ```
    pub fn for_backend(base_url: &str, api_key: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };

        Self {
            url: format!("{ws_base}/realtime/v1/websocket?apikey={api_key}&vsn=1.0.0"),
            access_token: api_key.to_string(),
            heartbeat: Duration::from_secs(25),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Handle to the running feed. Dropping it does not stop the feed; call
/// [`shutdown`](Self::shutdown) or cancel the token passed to `connect`.
pub struct ChangeFeed {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChangeFeed {
    /// Spawn the connection loop and return immediately.
    pub fn connect(
        config: RealtimeConfig,
        interests: Vec<ChangeInterest>,
        bus: ChangeBus,
        cancel: CancellationToken,
    ) -> Self {
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            feed_loop(config, interests, bus, task_cancel).await;
        });
        Self { cancel, task }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// connect → read → on error, backoff → reconnect.
async fn feed_loop(
    config: RealtimeConfig,
    interests: Vec<ChangeInterest>,
    bus: ChangeBus,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_read(&config, &interests, &bus, &cancel) => {
                match result {
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("realtime feed disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "realtime feed error");

                        if let Some(max) = config.reconnect.max_retries
                            && attempt >= max
                        {
                            tracing::error!(max_retries = max, "realtime reconnection limit reached, giving up");
                            break;
                        }

                        let delay = calculate_backoff(attempt, &config.reconnect);
                        tracing::info!(delay_ms = delay.as_millis() as u64, attempt, "waiting before reconnect");

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("realtime feed loop exiting");
}

/// One connection lifetime: join every interest, then pump frames.
async fn connect_and_read(
    config: &RealtimeConfig,
    interests: &[ChangeInterest],
    bus: &ChangeBus,
    cancel: &CancellationToken,
) -> Result<(), RealtimeError> {
    tracing::info!("connecting to realtime feed");

    let (ws, _response) = tokio_tungstenite::connect_async(config.url.as_str())
        .await
        .map_err(|e| RealtimeError::Connect(e.to_string()))?;
    let (mut write, mut read) = ws.split();

    let mut msg_ref: u64 = 0;
    for interest in interests {
        msg_ref += 1;
        let join = join_message(interest, &config.access_token, msg_ref);
        write
            .send(Message::text(join.to_string()))
            .await
            .map_err(|e| RealtimeError::Send(e.to_string()))?;
    }
    tracing::info!(channels = interests.len(), "realtime feed connected");

    let mut heartbeat = tokio::time::interval(config.heartbeat);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            _ = heartbeat.tick() => {
                msg_ref += 1;
                let beat = json!({"topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": msg_ref.to_string()});
                write
                    .send(Message::text(beat.to_string()))
                    .await
                    .map_err(|e| RealtimeError::Send(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match parse_frame(text.as_str()) {
                            Ok(Some(event)) => bus.publish(event),
                            Ok(None) => {}
                            Err(e) => return Err(e),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "realtime close frame received");
                        }
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(RealtimeError::Connect(e.to_string())),
                    None => {
                        tracing::info!("realtime stream ended");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Channel topic for an interest.
fn topic_for(interest: &ChangeInterest) -> String {
    match &interest.filter {
        Some(filter) => format!("realtime:{}:{}", interest.table, filter),
        None => format!("realtime:{}", interest.table),
    }
}

fn join_message(interest: &ChangeInterest, access_token: &str, msg_ref: u64) -> serde_json::Value {
    let mut change = json!({"event": "*", "schema": "public", "table": interest.table});
    if let Some(filter) = &interest.filter {
        change["filter"] = json!(filter.to_string());
    }
    json!({
        "topic": topic_for(interest),
        "event": "phx_join",
        "payload": {
            "config": {"postgres_changes": [change]},
            "access_token": access_token,
        },
        "ref": msg_ref.to_string(),
        "join_ref": msg_ref.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct PhoenixFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PostgresChange {
    table: String,
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Option<serde_json::Value>,
    #[serde(default)]
    old_record: Option<serde_json::Value>,
}

/// Interpret one text frame.
///
/// Returns `Ok(None)` for frames that carry no change (replies, heartbeats,
/// system notices). A rejected join is an error so the loop reconnects.
fn parse_frame(text: &str) -> Result<Option<ChangeEvent>, RealtimeError> {
    let frame: PhoenixFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparseable realtime frame");
            return Ok(None);
        }
    };

    match frame.event.as_str() {
        "postgres_changes" => {
            let data = frame.payload.get("data").cloned().unwrap_or_default();
            match serde_json::from_value::<PostgresChange>(data) {
                Ok(change) => {
                    let record = match change.kind {
                        ChangeKind::Delete => change.old_record,
                        _ => change.record,
                    }
                    .filter(|r| !r.is_null());
                    Ok(Some(ChangeEvent {
                        table: change.table,
                        kind: change.kind,
                        record,
                    }))
                }
                Err(e) => {
                    tracing::debug!(error = %e, topic = %frame.topic, "malformed postgres_changes payload");
                    Ok(None)
                }
            }
        }
        "phx_reply" => {
            let status = frame.payload.get("status").and_then(|s| s.as_str());
            if status == Some("error") {
                let reason = frame
                    .payload
                    .pointer("/response/reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                return Err(RealtimeError::JoinRejected {
                    topic: frame.topic,
                    reason,
                });
            }
            Ok(None)
        }
        "phx_error" => Err(RealtimeError::JoinRejected {
            topic: frame.topic,
            reason: "channel error".to_string(),
        }),
        _ => Ok(None),
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(30) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (attempt as f64 * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::RowFilter;

    #[test]
    fn backend_url_to_websocket() {
        let config = RealtimeConfig::for_backend("http://localhost:54321/", "anon");
        assert_eq!(
            config.url,
            "ws://localhost:54321/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        assert_eq!(config.heartbeat, Duration::from_secs(25));
    }

    #[test]
    fn join_carries_filter() {
        let interest = ChangeInterest::table("ride_requests")
            .with_filter(RowFilter::parse("status=eq.pending").unwrap());
        let msg = join_message(&interest, "tok", 3);
        assert_eq!(msg["topic"], "realtime:ride_requests:status=eq.pending");
        assert_eq!(msg["event"], "phx_join");
        assert_eq!(msg["ref"], "3");
        let change = &msg["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["table"], "ride_requests");
        assert_eq!(change["filter"], "status=eq.pending");
        assert_eq!(msg["payload"]["access_token"], "tok");
    }

    #[test]
    fn join_without_filter() {
        let msg = join_message(&ChangeInterest::table("drivers"), "tok", 1);
        assert_eq!(msg["topic"], "realtime:drivers");
        assert!(msg["payload"]["config"]["postgres_changes"][0].get("filter").is_none());
    }

    #[test]
    fn parse_insert() {
        let text = r#"{"topic":"realtime:ride_requests","event":"postgres_changes","ref":null,
            "payload":{"data":{"schema":"public","table":"ride_requests","type":"INSERT",
            "record":{"id":"r1","status":"pending"},"old_record":null}}}"#;
        let event = parse_frame(text).unwrap().unwrap();
        assert_eq!(event.table, "ride_requests");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record.unwrap()["status"], "pending");
    }

    #[test]
    fn parse_delete_uses_old_record() {
        let text = r#"{"topic":"realtime:drivers","event":"postgres_changes",
            "payload":{"data":{"table":"drivers","type":"DELETE","old_record":{"id":"d1"}}}}"#;
        let event = parse_frame(text).unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.record.unwrap()["id"], "d1");
    }

    #[test]
    fn replies_and_noise_are_ignored() {
        let ok = r#"{"topic":"realtime:drivers","event":"phx_reply","payload":{"status":"ok","response":{}}}"#;
        assert!(parse_frame(ok).unwrap().is_none());
        let beat = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"}}"#;
        assert!(parse_frame(beat).unwrap().is_none());
        assert!(parse_frame("not json").unwrap().is_none());
        let system = r#"{"topic":"realtime:drivers","event":"system","payload":{"status":"ok"}}"#;
        assert!(parse_frame(system).unwrap().is_none());
    }

    #[test]
    fn rejected_join_is_error() {
        let text = r#"{"topic":"realtime:drivers","event":"phx_reply",
            "payload":{"status":"error","response":{"reason":"unauthorized"}}}"#;
        match parse_frame(text) {
            Err(RealtimeError::JoinRejected { topic, reason }) => {
                assert_eq!(topic, "realtime:drivers");
                assert_eq!(reason, "unauthorized");
            }
            other => panic!("expected JoinRejected, got {other:?}"),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };
        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);
        assert!(calculate_backoff(40, &config) <= Duration::from_millis(12_500));
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let config = RealtimeConfig::for_backend("http://127.0.0.1:9", "k").with_reconnect(ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            max_retries: None,
        });
        let cancel = CancellationToken::new();
        let feed = ChangeFeed::connect(config, vec![], ChangeBus::new(), cancel);
        feed.shutdown();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !feed.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
