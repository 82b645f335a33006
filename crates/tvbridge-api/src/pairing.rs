// H/J-series PIN pairing remote
//
// Pairing runs over HTTP on port 8080: step 0 announces the client, the
// CloudPINPage app makes the TV display a PIN, and step 1 submits the PIN
// and returns a session id. Key presses then travel over a socket.io
// channel on port 8000, addressed with that session id.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::channel::{Heartbeat, SessionChannel};
use crate::error::Error;
use crate::transport::{self, TransportConfig};

pub const DEFAULT_PAIRING_PORT: u16 = 8080;
pub const DEFAULT_SESSION_PORT: u16 = 8000;

const COMPANION_NAMESPACE: &str = "/com.samsung.companion";

/// Identity this remote presents while pairing.
#[derive(Debug, Clone)]
pub struct PairingIdentity {
    pub app_id: String,
    pub device_id: String,
}

/// Client for the PIN-paired remote.
#[derive(Debug, Clone)]
pub struct PairingClient {
    http: reqwest::Client,
    host: String,
    pairing_port: u16,
    session_port: u16,
    identity: PairingIdentity,
    transport: TransportConfig,
}

/// Session id granted by a successful PIN confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedSession {
    pub session_id: String,
}

/// An open socket.io channel bound to a paired session.
pub struct PairedChannel {
    channel: SessionChannel,
    session: PairedSession,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    #[serde(default)]
    auth_data: Option<serde_json::Value>,
}

impl PairingClient {
    pub fn new(
        host: &str,
        pairing_port: u16,
        session_port: u16,
        identity: PairingIdentity,
        transport: TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_http_client()?,
            host: host.to_owned(),
            pairing_port,
            session_port,
            identity,
            transport,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        host: &str,
        pairing_port: u16,
        session_port: u16,
        identity: PairingIdentity,
        transport: TransportConfig,
    ) -> Self {
        Self {
            http,
            host: host.to_owned(),
            pairing_port,
            session_port,
            identity,
            transport,
        }
    }

    fn pairing_url(&self, path: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "http://{}:{}{path}",
            self.host, self.pairing_port
        ))?)
    }

    fn step_url(&self, step: u8) -> Result<Url, Error> {
        let mut url = self.pairing_url("/ws/pairing")?;
        url.query_pairs_mut()
            .append_pair("step", &step.to_string())
            .append_pair("app_id", &self.identity.app_id)
            .append_pair("device_id", &self.identity.device_id)
            .append_pair("type", "1");
        Ok(url)
    }

    /// Step 0: announce this remote. Fails when no pairing service answers.
    pub async fn start(&self) -> Result<(), Error> {
        let resp = self.http.get(self.step_url(0)?).send().await?;
        if !resp.status().is_success() {
            return Err(Error::HandshakeRejected {
                message: format!("pairing step 0 returned HTTP {}", resp.status()),
            });
        }
        tracing::debug!("pairing service reachable");
        Ok(())
    }

    /// Make the TV display a PIN.
    pub async fn show_pin_page(&self) -> Result<(), Error> {
        let resp = self
            .http
            .post(self.pairing_url("/ws/apps/CloudPINPage")?)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Protocol {
                message: format!("PIN page request returned HTTP {}", resp.status()),
            });
        }
        Ok(())
    }

    /// Dismiss the PIN page. Failures are logged and ignored.
    pub async fn hide_pin_page(&self) {
        let url = match self.pairing_url("/ws/apps/CloudPINPage/run") {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!(error = %e, "invalid PIN page URL");
                return;
            }
        };
        if let Err(e) = self.http.delete(url).send().await {
            tracing::debug!(error = %e, "could not hide PIN page (non-fatal)");
        }
    }

    /// Step 1: submit the PIN shown on the TV.
    pub async fn confirm_pin(&self, pin: &str) -> Result<PairedSession, Error> {
        let body = serde_json::json!({
            "auth_Data": { "auth_type": "SPC", "pin": pin }
        });
        let resp = self.http.post(self.step_url(1)?).json(&body).send().await?;

        match resp.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(Error::WrongPin),
            s => {
                return Err(Error::Protocol {
                    message: format!("pairing step 1 returned HTTP {s}"),
                });
            }
        }

        let text = resp.text().await?;
        let step: StepResponse =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.clone(),
            })?;

        let session_id = step
            .auth_data
            .as_ref()
            .and_then(extract_session_id)
            .ok_or(Error::WrongPin)?;

        Ok(PairedSession { session_id })
    }

    /// Open the socket.io command channel for a paired session.
    pub async fn open_channel(&self, session: PairedSession) -> Result<PairedChannel, Error> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let handshake_url = Url::parse(&format!(
            "http://{}:{}/socket.io/1/?t={millis}",
            self.host, self.session_port
        ))?;

        let body = self.http.get(handshake_url).send().await?.text().await?;
        let sid = parse_socketio_sid(&body).ok_or_else(|| Error::Protocol {
            message: format!("unexpected socket.io handshake: {body}"),
        })?;

        let ws_url = Url::parse(&format!(
            "ws://{}:{}/socket.io/1/websocket/{sid}",
            self.host, self.session_port
        ))?;
        let ws = transport::connect_websocket(&ws_url, &self.transport).await?;
        let channel = SessionChannel::spawn(ws, Heartbeat::SocketIo);
        channel.send_text(format!("1::{COMPANION_NAMESPACE}")).await?;

        tracing::debug!(session_id = %session.session_id, "paired channel open");
        Ok(PairedChannel { channel, session })
    }
}

impl PairedChannel {
    /// Send one key press through the companion namespace.
    pub async fn send_key(&self, key: &str) -> Result<(), Error> {
        self.channel
            .send_text(companion_frame(&self.session.session_id, key))
            .await
    }

    pub fn channel(&self) -> &SessionChannel {
        &self.channel
    }
}

/// `auth_data` is either an object or a JSON document encoded as a string.
fn extract_session_id(auth_data: &serde_json::Value) -> Option<String> {
    let object = match auth_data {
        serde_json::Value::String(s) => serde_json::from_str::<serde_json::Value>(s).ok()?,
        other => other.clone(),
    };
    match object.get("session_id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// socket.io v0.9 handshake body: `sid:heartbeat:close:transports`.
fn parse_socketio_sid(body: &str) -> Option<&str> {
    let sid = body.split(':').next()?.trim();
    (!sid.is_empty()).then_some(sid)
}

fn companion_frame(session_id: &str, key: &str) -> String {
    let body = serde_json::json!({
        "method": "POST",
        "body": {
            "plugin": "RemoteControl",
            "param1": "uuid:12345",
            "param2": "Click",
            "param3": key,
            "param4": false,
            "api": "SendRemoteKey",
            "version": "1.000"
        }
    });
    let event = serde_json::json!({
        "name": "callCommon",
        "args": [{ "Session_Id": session_id, "body": body.to_string() }]
    });
    format!("5::{COMPANION_NAMESPACE}:{event}")
}
