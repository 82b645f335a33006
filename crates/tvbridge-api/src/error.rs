use thiserror::Error;

/// Top-level error type for the `tvbridge-api` crate.
///
/// Covers every failure mode across the supported wire protocols:
/// transport, WebSocket channels, the legacy TCP remote, and PIN pairing.
/// `tvbridge-core` maps these into the engine's error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Socket-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation did not complete within the configured timeout.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed before the exchange completed.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// The TV answered but refused the handshake (wrong endpoint or model).
    #[error("Handshake rejected: {message}")]
    HandshakeRejected { message: String },

    /// The TV denied access to this remote (not allowed on the TV, bad token).
    #[error("Access denied by the TV")]
    Unauthorized,

    /// The TV is showing an allow/deny prompt and has not answered yet.
    #[error("Waiting for the remote to be allowed on the TV")]
    AwaitingApproval,

    /// Unexpected frame or payload.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Pairing ─────────────────────────────────────────────────────
    /// The PIN entered does not match the one shown on the TV.
    #[error("Pairing rejected: incorrect PIN")]
    WrongPin,

    /// No paired session is available for this operation.
    #[error("Not paired -- confirm a PIN first")]
    NotPaired,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// MAC address could not be parsed.
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying
    /// after a delay (network hiccup, TV still booting).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_)
            | Self::Timeout { .. }
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. }
            | Self::AwaitingApproval => true,
            _ => false,
        }
    }

    /// Returns `true` if the TV itself refused us, as opposed to the
    /// network failing to reach it.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::HandshakeRejected { .. } | Self::WrongPin
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_closes_are_transient() {
        assert!(Error::Timeout { timeout_ms: 500 }.is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1006,
                reason: String::new()
            }
            .is_transient()
        );
        assert!(!Error::WrongPin.is_transient());
    }

    #[test]
    fn refusals_are_rejections() {
        assert!(Error::Unauthorized.is_rejection());
        assert!(Error::WrongPin.is_rejection());
        assert!(!Error::AwaitingApproval.is_rejection());
    }
}
