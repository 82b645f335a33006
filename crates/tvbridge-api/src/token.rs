// Token-authenticated secure remote (2018+ models)
//
// TLS channel on port 8002 that stays open for the whole session. The
// first connection makes the TV show an allow prompt; once accepted the
// TV issues a token which must be sent on every later connection.

use url::Url;

use crate::channel::{self, ChannelGreeting, Heartbeat, REMOTE_CONTROL_PATH, SessionChannel};
use crate::error::Error;
use crate::transport::{self, TransportConfig};

pub const DEFAULT_PORT: u16 = 8002;

/// Client for the token-authenticated secure channel.
#[derive(Debug, Clone)]
pub struct TokenClient {
    host: String,
    port: u16,
    name: String,
    transport: TransportConfig,
}

/// A live token session.
pub struct TokenSession {
    channel: SessionChannel,
    /// Token the TV issued during this handshake, if any.
    pub issued_token: Option<String>,
}

impl TokenClient {
    pub fn new(host: &str, port: u16, name: &str, transport: TransportConfig) -> Self {
        Self {
            host: host.to_owned(),
            port,
            name: name.to_owned(),
            transport,
        }
    }

    /// Build the channel URL, attaching `token` when one is known.
    pub fn channel_url(&self, token: Option<&str>) -> Result<Url, Error> {
        let mut url = Url::parse(&format!(
            "wss://{}:{}{REMOTE_CONTROL_PATH}",
            self.host, self.port
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", &channel::encode_name(&self.name));
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }

    /// Open a session. Without a token the TV prompts the user first.
    pub async fn connect(&self, token: Option<&str>) -> Result<TokenSession, Error> {
        let url = self.channel_url(token)?;
        let mut ws = transport::connect_websocket(&url, &self.transport).await?;
        let ChannelGreeting { token: issued } = self
            .transport
            .within(channel::await_greeting(&mut ws))
            .await?;

        let issued_token = issued.filter(|t| Some(t.as_str()) != token);
        if issued_token.is_some() {
            tracing::info!("TV issued a new remote token");
        }

        Ok(TokenSession {
            channel: SessionChannel::spawn(ws, Heartbeat::WebSocket),
            issued_token,
        })
    }
}

impl TokenSession {
    /// Send one key press over the open session.
    pub async fn send_key(&self, key: &str) -> Result<(), Error> {
        self.channel.send_text(channel::click_message(key)).await
    }

    /// Access the underlying channel (closure notification, shutdown).
    pub fn channel(&self) -> &SessionChannel {
        &self.channel
    }
}
