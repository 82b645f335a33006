// Samsung remote-control channel messaging
//
// The 2016+ protocols speak JSON over a WebSocket: the TV announces the
// channel with `ms.channel.connect`, and key presses are sent as
// `ms.remote.control` requests. This module holds the shared framing and a
// long-lived channel wrapper that reports when the TV drops the socket.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::transport::{WsStream, map_ws_error};

pub(crate) const REMOTE_CONTROL_PATH: &str = "/api/v2/channels/samsung.remote.control";

/// An event frame from the remote-control channel.
#[derive(Debug, Deserialize)]
pub(crate) struct ChannelEvent {
    pub event: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Outcome of the channel handshake.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelGreeting {
    /// Token issued by the TV, present when the remote was newly allowed.
    pub token: Option<String>,
}

/// Base64-encode the client name the way the TV expects it in the URL.
pub(crate) fn encode_name(name: &str) -> String {
    STANDARD.encode(name)
}

/// Build the JSON body of a single key click.
pub(crate) fn click_message(key: &str) -> String {
    serde_json::json!({
        "method": "ms.remote.control",
        "params": {
            "Cmd": "Click",
            "DataOfCmd": key,
            "Option": "false",
            "TypeOfRemote": "SendRemoteKey"
        }
    })
    .to_string()
}

/// Read frames until the TV confirms the channel.
///
/// `ms.channel.unauthorized` means the user denied the remote on the TV,
/// `ms.channel.timeOut` means the allow prompt expired.
pub(crate) async fn await_greeting(ws: &mut WsStream) -> Result<ChannelGreeting, Error> {
    while let Some(frame) = ws.next().await {
        match frame.map_err(map_ws_error)? {
            Message::Text(text) => {
                let event: ChannelEvent =
                    serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                        message: e.to_string(),
                        body: text.to_string(),
                    })?;
                match event.event.as_str() {
                    "ms.channel.connect" => {
                        let token = event
                            .data
                            .as_ref()
                            .and_then(|d| d.get("token"))
                            .and_then(|t| match t {
                                serde_json::Value::String(s) => Some(s.clone()),
                                serde_json::Value::Number(n) => Some(n.to_string()),
                                _ => None,
                            });
                        return Ok(ChannelGreeting { token });
                    }
                    "ms.channel.unauthorized" => return Err(Error::Unauthorized),
                    "ms.channel.timeOut" => return Err(Error::AwaitingApproval),
                    other => tracing::trace!(event = other, "ignoring pre-connect channel event"),
                }
            }
            Message::Close(frame) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                    .unwrap_or((1005, String::new()));
                return Err(Error::WebSocketClosed { code, reason });
            }
            _ => {}
        }
    }

    Err(Error::WebSocketClosed {
        code: 1006,
        reason: "stream ended before channel connect".into(),
    })
}

// ── Long-lived channel ───────────────────────────────────────────────

/// Keep-alive convention of the far end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Heartbeat {
    /// Plain WebSocket ping/pong (handled by tungstenite).
    WebSocket,
    /// socket.io v0.9 text heartbeats (`2::`), echoed back verbatim.
    SocketIo,
}

/// A connected WebSocket whose reader runs in the background.
///
/// The `closed` token is cancelled when the far end goes away, which is how
/// callers learn about unsolicited disconnects.
pub struct SessionChannel {
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    closed: CancellationToken,
    reader: JoinHandle<()>,
}

impl SessionChannel {
    pub(crate) fn spawn(ws: WsStream, heartbeat: Heartbeat) -> Self {
        let (sink, mut read) = ws.split();
        let sink = Arc::new(Mutex::new(sink));
        let closed = CancellationToken::new();

        let reader_sink = Arc::clone(&sink);
        let reader_closed = closed.clone();
        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = reader_closed.cancelled() => break,
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if heartbeat == Heartbeat::SocketIo && text.as_str() == "2::" {
                                let reply = reader_sink.lock().await.send(Message::text("2::")).await;
                                if let Err(e) = reply {
                                    tracing::debug!(error = %e, "heartbeat reply failed");
                                    break;
                                }
                            } else {
                                tracing::trace!(frame = text.as_str(), "session frame");
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "TV closed the session channel");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "session channel read failed");
                            break;
                        }
                        None => {
                            tracing::debug!("session channel stream ended");
                            break;
                        }
                    }
                }
            }
            reader_closed.cancel();
        });

        Self {
            sink,
            closed,
            reader,
        }
    }

    /// Send one text frame.
    pub async fn send_text(&self, text: String) -> Result<(), Error> {
        if self.closed.is_cancelled() {
            return Err(Error::WebSocketClosed {
                code: 1006,
                reason: "session already closed".into(),
            });
        }
        self.sink
            .lock()
            .await
            .send(Message::text(text))
            .await
            .map_err(map_ws_error)
    }

    /// Token cancelled when the channel is gone.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Close the channel from our side.
    pub async fn shutdown(&self) {
        self.closed.cancel();
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::debug!(error = %e, "close frame not delivered");
        }
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.closed.cancel();
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_message_carries_key() {
        let msg: serde_json::Value =
            serde_json::from_str(&click_message("KEY_VOLUP")).expect("valid json");
        assert_eq!(msg["method"], "ms.remote.control");
        assert_eq!(msg["params"]["DataOfCmd"], "KEY_VOLUP");
        assert_eq!(msg["params"]["Cmd"], "Click");
    }

    #[test]
    fn name_is_base64() {
        assert_eq!(encode_name("tvbridge"), "dHZicmlkZ2U=");
    }
}
