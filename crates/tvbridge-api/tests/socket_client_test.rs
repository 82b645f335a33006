#![allow(clippy::unwrap_used)]
// Integration tests for the socket-based clients against local servers.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

use tvbridge_api::{Error, LegacyClient, RemoteClient, RemoteIdentity, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn transport() -> TransportConfig {
    TransportConfig {
        timeout: Duration::from_secs(2),
        accept_invalid_certs: true,
    }
}

/// Accept one WebSocket, greet with `greeting`, and report the first text
/// frame the client sends back.
async fn channel_server(greeting: &'static str) -> (u16, oneshot::Receiver<Option<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::text(greeting)).await.unwrap();

        let mut first = None;
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) if first.is_none() => first = Some(text.as_str().to_owned()),
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = tx.send(first);
    });

    (port, rx)
}

/// Read one length-prefixed remote frame and return its payload.
async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 3];
    stream.read_exact(&mut header).await.unwrap();
    let mut app = vec![0u8; usize::from(u16::from_le_bytes([header[1], header[2]]))];
    stream.read_exact(&mut app).await.unwrap();
    let mut len = [0u8; 2];
    stream.read_exact(&mut len).await.unwrap();
    let mut payload = vec![0u8; usize::from(u16::from_le_bytes(len))];
    stream.read_exact(&mut payload).await.unwrap();
    payload
}

fn reply_frame(payload: &[u8]) -> Vec<u8> {
    let app = b"iapp.samsung";
    let mut buf = vec![0x00];
    buf.extend_from_slice(&u16::try_from(app.len()).unwrap().to_le_bytes());
    buf.extend_from_slice(app);
    buf.extend_from_slice(&u16::try_from(payload.len()).unwrap().to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn identity() -> RemoteIdentity {
    RemoteIdentity {
        name: "tvbridge".into(),
        client_ip: "127.0.0.1".into(),
        client_mac: "00-00-00-00-00-00".into(),
    }
}

// ── 2016 WebSocket channel ──────────────────────────────────────────

#[tokio::test]
async fn test_legacy_send_key_after_greeting() {
    let (port, sent) = channel_server(r#"{"event":"ms.channel.connect","data":{}}"#).await;
    let client = LegacyClient::new("127.0.0.1", port, "tvbridge", transport()).unwrap();

    client.send_key("KEY_VOLUP").await.unwrap();

    let frame = sent.await.unwrap().expect("click frame");
    let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(json["method"], "ms.remote.control");
    assert_eq!(json["params"]["DataOfCmd"], "KEY_VOLUP");
}

#[tokio::test]
async fn test_legacy_probe_sends_nothing() {
    let (port, sent) = channel_server(r#"{"event":"ms.channel.connect"}"#).await;
    let client = LegacyClient::new("127.0.0.1", port, "tvbridge", transport()).unwrap();

    client.probe().await.unwrap();
    assert_eq!(sent.await.unwrap(), None);
}

#[tokio::test]
async fn test_legacy_unauthorized_greeting() {
    let (port, _sent) = channel_server(r#"{"event":"ms.channel.unauthorized"}"#).await;
    let client = LegacyClient::new("127.0.0.1", port, "tvbridge", transport()).unwrap();

    let err = client.send_key("KEY_MUTE").await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized), "got {err:?}");
}

#[tokio::test]
async fn test_legacy_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = LegacyClient::new("127.0.0.1", port, "tvbridge", transport()).unwrap();
    let err = client.probe().await.unwrap_err();
    assert!(err.is_transient(), "got {err:?}");
}

// ── TCP remote ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_remote_send_key_when_granted() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let auth = read_frame(&mut stream).await;
        stream.write_all(&reply_frame(&[0x64, 0, 1, 0])).await.unwrap();
        let key = read_frame(&mut stream).await;
        (auth, key)
    });

    let client = RemoteClient::new("127.0.0.1", port, identity(), transport());
    client.send_key("KEY_POWEROFF").await.unwrap();

    let (auth, key) = server.await.unwrap();
    assert_eq!(&auth[..2], &[0x64, 0x00]);
    assert_eq!(&key[..3], &[0, 0, 0]);
    assert!(key.ends_with(STANDARD.encode("KEY_POWEROFF").as_bytes()));
}

#[tokio::test]
async fn test_remote_denied() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut stream).await;
        stream.write_all(&reply_frame(&[0x64, 0, 0, 0])).await.unwrap();
    });

    let client = RemoteClient::new("127.0.0.1", port, identity(), transport());
    let err = client.send_key("KEY_MUTE").await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized), "got {err:?}");
}
