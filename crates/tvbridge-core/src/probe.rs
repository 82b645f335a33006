// ── Reachability probe ──
//
// Decides whether the TV is on the network. ICMP needs raw sockets, so the
// probe opens TCP connections instead: a completed or actively refused
// connect both prove the host answered.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::net::TcpStream;

/// Network reachability check. Never fails: errors read as unreachable.
#[async_trait]
pub trait Reachability: Send + Sync + 'static {
    async fn probe(&self, address: &str, timeout: Duration) -> bool;
}

/// Unprivileged TCP probe over a fixed set of ports.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    ports: Vec<u16>,
}

impl TcpProbe {
    pub fn new(ports: Vec<u16>) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl Reachability for TcpProbe {
    async fn probe(&self, address: &str, timeout: Duration) -> bool {
        let any_alive = async {
            let mut attempts: FuturesUnordered<_> = self
                .ports
                .iter()
                .map(|port| probe_port(address, *port))
                .collect();
            while let Some(alive) = attempts.next().await {
                if alive {
                    return true;
                }
            }
            false
        };

        let alive = tokio::time::timeout(timeout, any_alive)
            .await
            .unwrap_or(false);
        tracing::trace!(address, alive, "reachability sample");
        alive
    }
}

async fn probe_port(address: &str, port: u16) -> bool {
    match TcpStream::connect((address, port)).await {
        Ok(_) => true,
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => true,
        Err(e) => {
            tracing::trace!(address, port, error = %e, "probe connect failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_port_is_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let probe = TcpProbe::new(vec![port]);
        assert!(probe.probe("127.0.0.1", Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn refused_port_is_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let probe = TcpProbe::new(vec![port]);
        assert!(probe.probe("127.0.0.1", Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn silent_host_is_dead() {
        // TEST-NET-1 is never routed.
        let probe = TcpProbe::new(vec![8001]);
        assert!(!probe.probe("192.0.2.1", Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn unresolvable_host_is_dead() {
        let probe = TcpProbe::new(vec![8001]);
        assert!(!probe.probe("no-such-host.invalid", Duration::from_millis(500)).await);
    }
}
