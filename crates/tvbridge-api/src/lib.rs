//! Async clients for the Samsung TV remote-control protocols.
//!
//! Each module speaks one wire protocol:
//!
//! - [`legacy`]: the 2016 WebSocket channel on port 8001, one socket per key
//! - [`token`]: the TLS channel on port 8002 that issues a reusable token
//! - [`pairing`]: H/J-series PIN pairing over HTTP plus a socket.io channel
//! - [`remote`]: the pre-2014 TCP remote on port 55000
//!
//! [`wol`] sends Wake-on-LAN packets. All clients share [`TransportConfig`]
//! for timeouts and TLS policy and report failures as [`Error`].

pub mod channel;
pub mod error;
pub mod legacy;
pub mod pairing;
pub mod remote;
pub mod token;
pub mod transport;
pub mod wol;

pub use channel::SessionChannel;
pub use error::Error;
pub use legacy::LegacyClient;
pub use pairing::{PairedChannel, PairedSession, PairingClient, PairingIdentity};
pub use remote::{RemoteClient, RemoteIdentity};
pub use token::{TokenClient, TokenSession};
pub use transport::TransportConfig;
pub use wol::MacAddr;
