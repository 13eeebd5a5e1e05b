use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::{CrawlError, Result};

/// Command/response client for the DevTools wire protocol.
///
/// One WebSocket carries every command for the whole browser; commands aimed
/// at a page ride the same socket with a `sessionId` stamped on. Responses
/// are matched back to callers by id, so calls from any number of tasks can
/// be in flight at once. Events are ignored: readiness is polled, not pushed.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl CdpClient {
    /// Open the socket and start the reader and writer tasks.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (stream, _) = connect_async(ws_url).await?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_outbound = outbound.clone();
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(raw)) => {
                        if let Some((id, outcome)) = parse_frame(&raw) {
                            let sender = reader_pending.lock().await.remove(&id);
                            if let Some(sender) = sender {
                                let _ = sender.send(outcome);
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = reader_outbound.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("devtools socket read failed: {}", e);
                        break;
                    }
                }
            }
            // Wake every waiter so callers see the drop instead of hanging.
            let mut pending = reader_pending.lock().await;
            for (_, sender) in pending.drain() {
                let _ = sender.send(Err(CrawlError::Closed(
                    "devtools connection dropped".to_string(),
                )));
            }
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            outbound,
        })
    }

    /// Send one command and wait for its response.
    pub async fn call(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = build_command(id, session_id, method, &params);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.outbound.send(Message::Text(frame)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(CrawlError::Closed(format!(
                "devtools connection closed before '{method}' was sent"
            )));
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CrawlError::Closed(format!(
                "devtools connection closed while waiting on '{method}'"
            ))),
        }
    }
}

fn build_command(id: u64, session_id: Option<&str>, method: &str, params: &Value) -> String {
    let mut command = serde_json::json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if let Some(session) = session_id {
        command["sessionId"] = Value::String(session.to_string());
    }
    command.to_string()
}

/// Split a response frame into its command id and outcome. Frames without an
/// id are protocol events and return `None`.
fn parse_frame(raw: &str) -> Option<(u64, Result<Value>)> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    let id = value.get("id")?.as_u64()?;
    let outcome = match value.get("error") {
        Some(error) => {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            Err(CrawlError::CdpError { code, message })
        }
        None => Ok(value
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null)),
    };
    Some((id, outcome))
}
