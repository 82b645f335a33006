// 2016-series WebSocket remote
//
// Unencrypted channel on port 8001. Every key press opens a fresh socket,
// waits for `ms.channel.connect`, sends the click, and closes again.
// Opening a channel without a key doubles as model detection.

use std::time::Duration;

use futures_util::SinkExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use crate::channel::{self, REMOTE_CONTROL_PATH};
use crate::error::Error;
use crate::transport::{self, TransportConfig};

pub const DEFAULT_PORT: u16 = 8001;

/// How long the socket stays open after a click, so the TV registers it
/// before the close frame arrives.
const LINGER: Duration = Duration::from_millis(300);

/// Client for the 2016 WebSocket remote protocol.
#[derive(Debug, Clone)]
pub struct LegacyClient {
    url: Url,
    transport: TransportConfig,
}

impl LegacyClient {
    /// Create a client for the TV at `host`. No I/O happens here.
    pub fn new(
        host: &str,
        port: u16,
        name: &str,
        transport: TransportConfig,
    ) -> Result<Self, Error> {
        let mut url = Url::parse(&format!("ws://{host}:{port}{REMOTE_CONTROL_PATH}"))?;
        url.query_pairs_mut()
            .append_pair("name", &channel::encode_name(name));
        Ok(Self { url, transport })
    }

    /// The channel URL this client connects to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open and close a channel without sending anything.
    ///
    /// Succeeds only on TVs that speak the 2016 protocol, which is what
    /// makes it usable as model detection.
    pub async fn probe(&self) -> Result<(), Error> {
        self.exchange(None).await
    }

    /// Send a single key press.
    pub async fn send_key(&self, key: &str) -> Result<(), Error> {
        self.exchange(Some(key)).await
    }

    async fn exchange(&self, key: Option<&str>) -> Result<(), Error> {
        let mut ws = transport::connect_websocket(&self.url, &self.transport).await?;
        self.transport
            .within(channel::await_greeting(&mut ws))
            .await?;

        if let Some(key) = key {
            debug!(key, "sending key over 2016 channel");
            ws.send(Message::text(channel::click_message(key)))
                .await
                .map_err(transport::map_ws_error)?;
            tokio::time::sleep(LINGER).await;
        }

        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "channel close failed (non-fatal)");
        }
        Ok(())
    }
}
