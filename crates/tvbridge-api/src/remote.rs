// Pre-2014 TCP remote (port 55000)
//
// Stateless: every key press opens a TCP connection, authenticates with
// a length-prefixed packet carrying base64 client identity, sends the key,
// and hangs up. Lengths are little-endian u16.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::Error;
use crate::transport::TransportConfig;

pub const DEFAULT_PORT: u16 = 55000;

const CONTROL_APP: &str = "iphone..iapp.samsung";
const TV_APP: &str = "iphone.UN60ES8000.iapp.samsung";

/// Identity announced in the authentication packet.
#[derive(Debug, Clone)]
pub struct RemoteIdentity {
    pub name: String,
    pub client_ip: String,
    pub client_mac: String,
}

/// Client for the legacy TCP remote.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    host: String,
    port: u16,
    identity: RemoteIdentity,
    transport: TransportConfig,
}

/// What the TV answered to the authentication packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReply {
    Granted,
    Denied,
    Pending,
    Unrecognized,
}

impl RemoteClient {
    pub fn new(host: &str, port: u16, identity: RemoteIdentity, transport: TransportConfig) -> Self {
        Self {
            host: host.to_owned(),
            port,
            identity,
            transport,
        }
    }

    /// Authenticate and send one key press on a fresh connection.
    pub async fn send_key(&self, key: &str) -> Result<(), Error> {
        let addr = format!("{}:{}", self.host, self.port);
        self.transport
            .within(async {
                let mut stream = TcpStream::connect(&addr).await?;
                stream.write_all(&auth_packet(&self.identity)).await?;

                match read_auth_reply(&mut stream).await? {
                    AuthReply::Granted | AuthReply::Unrecognized => {}
                    AuthReply::Denied => return Err(Error::Unauthorized),
                    AuthReply::Pending => return Err(Error::AwaitingApproval),
                }

                tracing::debug!(key, "sending key over TCP remote");
                stream.write_all(&key_packet(key)).await?;
                stream.flush().await?;
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!(error = %e, "remote socket shutdown failed");
                }
                Ok(())
            })
            .await
    }
}

fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
    let len = u16::try_from(field.len()).unwrap_or(u16::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(field);
}

fn frame(app: &str, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x00];
    push_field(&mut buf, app.as_bytes());
    push_field(&mut buf, payload);
    buf
}

/// Authentication packet: marker `0x64 0x00`, then base64 ip, mac, name.
pub fn auth_packet(identity: &RemoteIdentity) -> Vec<u8> {
    let mut payload = vec![0x64, 0x00];
    for value in [&identity.client_ip, &identity.client_mac, &identity.name] {
        push_field(&mut payload, STANDARD.encode(value).as_bytes());
    }
    frame(CONTROL_APP, &payload)
}

/// Key packet: three zero bytes, then the base64 key code.
pub fn key_packet(key: &str) -> Vec<u8> {
    let mut payload = vec![0x00, 0x00, 0x00];
    push_field(&mut payload, STANDARD.encode(key).as_bytes());
    frame(TV_APP, &payload)
}

async fn read_auth_reply(stream: &mut TcpStream) -> Result<AuthReply, Error> {
    let mut header = [0u8; 3];
    stream.read_exact(&mut header).await?;
    let app_len = usize::from(u16::from_le_bytes([header[1], header[2]]));
    let mut app = vec![0u8; app_len];
    stream.read_exact(&mut app).await?;

    let mut len = [0u8; 2];
    stream.read_exact(&mut len).await?;
    let mut payload = vec![0u8; usize::from(u16::from_le_bytes(len))];
    stream.read_exact(&mut payload).await?;

    Ok(classify_reply(&payload))
}

fn classify_reply(payload: &[u8]) -> AuthReply {
    match payload {
        [0x64, 0x00, 0x01, 0x00, ..] => AuthReply::Granted,
        [0x64, 0x00, 0x00, 0x00, ..] => AuthReply::Denied,
        [0x0a, 0x00, ..] => AuthReply::Pending,
        _ => AuthReply::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_packet_layout() {
        let packet = key_packet("KEY_MUTE");
        // 0x00, app len (LE), app, payload len (LE), payload
        assert_eq!(packet[0], 0x00);
        assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 30);
        let payload_start = 3 + TV_APP.len() + 2;
        assert_eq!(&packet[payload_start..payload_start + 3], &[0, 0, 0]);
        let encoded = STANDARD.encode("KEY_MUTE");
        assert!(packet.ends_with(encoded.as_bytes()));
    }

    #[test]
    fn auth_packet_starts_with_marker() {
        let identity = RemoteIdentity {
            name: "tvbridge".into(),
            client_ip: "10.0.0.2".into(),
            client_mac: "00-00-00-00".into(),
        };
        let packet = auth_packet(&identity);
        let payload_start = 3 + CONTROL_APP.len() + 2;
        assert_eq!(&packet[payload_start..payload_start + 2], &[0x64, 0x00]);
    }

    #[test]
    fn reply_classification() {
        assert_eq!(classify_reply(&[0x64, 0, 1, 0]), AuthReply::Granted);
        assert_eq!(classify_reply(&[0x64, 0, 0, 0]), AuthReply::Denied);
        assert_eq!(classify_reply(&[0x0a, 0, 2, 0, 0, 0]), AuthReply::Pending);
        assert_eq!(classify_reply(&[0x65]), AuthReply::Unrecognized);
    }
}
