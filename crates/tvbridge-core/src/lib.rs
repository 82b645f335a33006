//! Device connectivity and power-state reconciliation for `tvbridge`.
//!
//! This crate turns the wire clients of `tvbridge-api` into one logical
//! on/off and command surface for a TV:
//!
//! - **[`ConnectionController`]**: the (re)connection state machine. A
//!   single task processes triggers in order, guards against concurrent
//!   attempts with a latch, and retries at a fixed delay.
//!
//! - **[`PowerStateReconciler`]**: debounces reachability samples into a
//!   power state and runs the convergence loop behind power on/off.
//!
//! - **[`CommandDispatcher`]**: resolves command names against the
//!   [`keys`] table and sends them through the live adapter.
//!
//! - **[`ProtocolAdapter`]**: the capability contract the four protocol
//!   variants implement, built per attempt by an [`AdapterFactory`].
//!
//! - **[`Bridge`]**: wires everything to a [`HostPlatform`].

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod keys;
pub mod power;
pub mod probe;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::{
    AdapterFactory, DefaultAdapterFactory, LifecycleEvent, LifecycleSender, PairingChallenge,
    PowerKeys, ProtocolAdapter, Session,
};
pub use bridge::Bridge;
pub use config::{Credentials, DeviceConfig, ProtocolVariant};
pub use controller::{ConnectionController, ConnectionState};
pub use dispatch::CommandDispatcher;
pub use error::{ConnectError, CoreError, DispatchError, PairError, PowerError, SendError};
pub use host::{HostPlatform, Learned, MemoryHost, Published, StateValue};
pub use power::{PowerState, PowerStateReconciler};
pub use probe::{Reachability, TcpProbe};
pub use tvbridge_api::MacAddr;
