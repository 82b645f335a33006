// ── Connection controller ──
//
// Owns the (re)connection state machine. A single task holds the
// `ConnectionContext` and processes triggers one at a time in arrival
// order; network work (probes, handshakes, pairing) runs in short-lived
// tasks that report back as triggers. The live adapter sits in an atomic
// swap cell that callers only ever load.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use strum::Display;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::adapter::{
    AdapterFactory, LifecycleEvent, LifecycleNotice, LifecycleSender, PairingChallenge, PowerKeys,
    ProtocolAdapter, Session,
};
use crate::config::DeviceConfig;
use crate::error::{ConnectError, CoreError, DispatchError, PairError};
use crate::host::{self, HostPlatform};
use crate::probe::Reachability;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Idle,
    Connecting,
    PairingRequired,
    Connected,
    Disconnected,
}

/// The single live adapter, tagged with the attempt that created it.
pub(crate) struct ActiveAdapter {
    generation: u64,
    adapter: Box<dyn ProtocolAdapter>,
}

// ── Triggers ─────────────────────────────────────────────────────────

enum AttemptOutcome {
    Connected {
        adapter: Box<dyn ProtocolAdapter>,
        session: Session,
    },
    PairingRequired {
        adapter: Box<dyn ProtocolAdapter>,
        challenge: PairingChallenge,
    },
    Failed {
        error: ConnectError,
        reachable: bool,
    },
}

enum Trigger {
    Start,
    ReachabilityChanged(bool),
    ReconnectTimerFired {
        timer_id: u64,
    },
    ProbeFinished {
        reachable: bool,
    },
    AttemptFinished {
        generation: u64,
        outcome: AttemptOutcome,
    },
    PinSupplied {
        pin: String,
        reply: oneshot::Sender<Result<(), PairError>>,
    },
    PinAccepted {
        generation: u64,
    },
    PinRejected {
        generation: u64,
        adapter: Box<dyn ProtocolAdapter>,
    },
}

// ── ConnectionController ─────────────────────────────────────────────

/// Handle to the connection state machine.
///
/// Cheaply cloneable. Every method is a message to the controller task or
/// a read of state the task publishes; none of them block on a transition.
#[derive(Clone)]
pub struct ConnectionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    state: watch::Sender<ConnectionState>,
    active: ArcSwapOption<ActiveAdapter>,
    triggers: mpsc::UnboundedSender<Trigger>,
    cancel: CancellationToken,
}

impl ConnectionController {
    /// Spawn the controller task. Nothing connects until [`start`](Self::start).
    pub fn spawn(
        config: Arc<DeviceConfig>,
        host: Arc<dyn HostPlatform>,
        factory: Arc<dyn AdapterFactory>,
        probe: Arc<dyn Reachability>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (triggers, trigger_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ControllerInner {
            state,
            active: ArcSwapOption::empty(),
            triggers: triggers.clone(),
            cancel,
        });

        let task = ControllerTask {
            inner: Arc::clone(&inner),
            config,
            host,
            factory,
            probe,
            triggers,
            lifecycle_tx,
            ctx: ConnectionContext::default(),
        };
        let handle = tokio::spawn(task.run(trigger_rx, lifecycle_rx).in_current_span());

        (Self { inner }, handle)
    }

    /// Begin connecting. A failed first attempt waits for the TV to answer
    /// before retrying.
    pub fn start(&self) {
        self.send(Trigger::Start);
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.active.load().is_some()
    }

    /// Power keys of the live adapter, if any.
    pub fn power_keys(&self) -> Option<PowerKeys> {
        self.inner
            .active
            .load_full()
            .map(|active| active.adapter.power_keys())
    }

    /// Send one key press through the live adapter. Never retried.
    pub async fn send_key(&self, code: &str) -> Result<(), DispatchError> {
        let Some(active) = self.inner.active.load_full() else {
            return Err(DispatchError::NotConnected);
        };
        debug!(key = code, generation = active.generation, "sending key");
        active.adapter.send_key(code).await?;
        Ok(())
    }

    /// Report a debounced reachability change.
    pub fn reachability_changed(&self, reachable: bool) {
        self.send(Trigger::ReachabilityChanged(reachable));
    }

    /// Confirm the PIN shown on the TV. Resolves once the TV has accepted or
    /// rejected it; the session itself is established afterwards.
    pub async fn submit_pin(&self, pin: &str) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .triggers
            .send(Trigger::PinSupplied {
                pin: pin.trim().to_owned(),
                reply,
            })
            .map_err(|_| CoreError::ControllerStopped)?;
        rx.await.map_err(|_| CoreError::ControllerStopped)??;
        Ok(())
    }

    /// Stop the controller task and tear down the live session.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    fn send(&self, trigger: Trigger) {
        if self.inner.triggers.send(trigger).is_err() {
            debug!("controller task has stopped, trigger dropped");
        }
    }
}

// ── Controller task ──────────────────────────────────────────────────

struct ReconnectTimer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Mutable state of the state machine. Only the controller task touches it.
#[derive(Default)]
struct ConnectionContext {
    /// Latch: an attempt, a decision probe or an armed timer is outstanding.
    reconnect_pending: bool,
    /// Consecutive failed attempts since the last successful connect.
    failures: u32,
    generation: u64,
    next_timer_id: u64,
    timer: Option<ReconnectTimer>,
    /// Adapter waiting for a PIN while in `PairingRequired`.
    pending_pairing: Option<Box<dyn ProtocolAdapter>>,
    /// Learned values still being written by the host.
    persisting: Vec<JoinHandle<()>>,
}

struct ControllerTask {
    inner: Arc<ControllerInner>,
    config: Arc<DeviceConfig>,
    host: Arc<dyn HostPlatform>,
    factory: Arc<dyn AdapterFactory>,
    probe: Arc<dyn Reachability>,
    triggers: mpsc::UnboundedSender<Trigger>,
    lifecycle_tx: mpsc::UnboundedSender<LifecycleNotice>,
    ctx: ConnectionContext,
}

impl ControllerTask {
    async fn run(
        mut self,
        mut triggers: mpsc::UnboundedReceiver<Trigger>,
        mut lifecycle: mpsc::UnboundedReceiver<LifecycleNotice>,
    ) {
        let cancel = self.inner.cancel.clone();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(notice) = lifecycle.recv() => self.on_lifecycle(notice).await,
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => self.on_trigger(trigger).await,
                    None => break,
                },
            }
        }
        self.teardown().await;
    }

    fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.inner.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "connection state");
        }
    }

    async fn publish_connected(&self, connected: bool) {
        self.host
            .publish_state(host::CONNECTED, connected.into(), true)
            .await;
    }

    async fn publish_pairing(&self, required: bool) {
        self.host
            .publish_state(host::PAIRING_REQUIRED, required.into(), true)
            .await;
    }

    async fn on_trigger(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Start => self.on_start().await,
            Trigger::ReachabilityChanged(reachable) => {
                self.on_reachability(reachable).await;
            }
            Trigger::ReconnectTimerFired { timer_id } => self.on_timer(timer_id),
            Trigger::ProbeFinished { reachable } => self.on_probe_finished(reachable),
            Trigger::AttemptFinished {
                generation,
                outcome,
            } => self.on_attempt_finished(generation, outcome).await,
            Trigger::PinSupplied { pin, reply } => self.on_pin(pin, reply),
            Trigger::PinAccepted { generation } => {
                if generation == self.ctx.generation {
                    self.set_state(ConnectionState::Connecting);
                    self.publish_pairing(false).await;
                }
            }
            Trigger::PinRejected {
                generation,
                adapter,
            } => {
                if generation == self.ctx.generation {
                    warn!("PIN rejected, enter the PIN shown on the TV again");
                    self.ctx.pending_pairing = Some(adapter);
                    self.ctx.reconnect_pending = false;
                }
            }
        }
    }

    // ── Startup and reachability ─────────────────────────────────────

    async fn on_start(&mut self) {
        if self.state() != ConnectionState::Idle || self.ctx.reconnect_pending {
            debug!("start ignored, controller already running");
            return;
        }
        self.publish_connected(false).await;
        self.publish_pairing(false).await;
        self.begin_attempt("startup");
    }

    async fn on_reachability(&mut self, reachable: bool) {
        if reachable {
            self.begin_attempt("reachability regained");
            return;
        }

        // A sleeping TV will not answer a reconnect; wait for it to return.
        if let Some(timer) = self.ctx.timer.take() {
            timer.handle.abort();
            self.ctx.reconnect_pending = false;
            debug!("reconnect timer cancelled, TV unreachable");
        }

        match self.state() {
            ConnectionState::Connected => {
                info!(address = %self.config.address, "TV unreachable, dropping session");
                self.clear_active().await;
                self.set_state(ConnectionState::Disconnected);
                self.publish_connected(false).await;
            }
            ConnectionState::PairingRequired if !self.ctx.reconnect_pending => {
                info!("TV unreachable, pairing abandoned");
                self.ctx.pending_pairing = None;
                self.set_state(ConnectionState::Disconnected);
                self.publish_pairing(false).await;
            }
            _ => {}
        }
    }

    /// Decision probe after an unsolicited drop.
    fn on_probe_finished(&mut self, reachable: bool) {
        if self.state() == ConnectionState::Disconnected {
            self.schedule_or_wait(reachable);
        } else {
            self.ctx.reconnect_pending = false;
        }
    }

    // ── Attempts ─────────────────────────────────────────────────────

    /// Start an attempt unless one is already pending or not applicable.
    fn begin_attempt(&mut self, reason: &'static str) {
        let state = self.state();
        if self.ctx.reconnect_pending
            || !matches!(
                state,
                ConnectionState::Idle | ConnectionState::Disconnected
            )
        {
            debug!(reason, %state, "connect trigger ignored");
            return;
        }

        if let Some(timer) = self.ctx.timer.take() {
            timer.handle.abort();
        }
        self.ctx.reconnect_pending = true;
        self.ctx.generation += 1;
        let generation = self.ctx.generation;
        self.set_state(ConnectionState::Connecting);
        debug!(
            reason,
            generation,
            attempt = self.ctx.failures + 1,
            "connection attempt"
        );

        let events = LifecycleSender::new(generation, self.lifecycle_tx.clone());
        let adapter = self.factory.create(events);
        self.spawn_attempt(generation, adapter);
    }

    fn spawn_attempt(&self, generation: u64, adapter: Box<dyn ProtocolAdapter>) {
        let probe = Arc::clone(&self.probe);
        let config = Arc::clone(&self.config);
        let triggers = self.triggers.clone();
        tokio::spawn(
            async move {
                let outcome = run_attempt(adapter, probe.as_ref(), &config).await;
                let _ = triggers.send(Trigger::AttemptFinished {
                    generation,
                    outcome,
                });
            }
            .in_current_span(),
        );
    }

    async fn on_attempt_finished(&mut self, generation: u64, outcome: AttemptOutcome) {
        if generation != self.ctx.generation {
            debug!(generation, "stale attempt result ignored");
            return;
        }

        match outcome {
            AttemptOutcome::Connected { adapter, session } => {
                self.ctx.failures = 0;
                self.ctx.reconnect_pending = false;
                self.inner
                    .active
                    .store(Some(Arc::new(ActiveAdapter {
                        generation,
                        adapter,
                    })));
                self.set_state(ConnectionState::Connected);
                self.publish_connected(true).await;
                info!(address = %self.config.address, variant = %self.factory.variant(), "connected to TV");
                self.spawn_persist(session);
            }
            AttemptOutcome::PairingRequired { adapter, challenge } => {
                self.ctx.reconnect_pending = false;
                self.ctx.pending_pairing = Some(adapter);
                self.set_state(ConnectionState::PairingRequired);
                self.publish_pairing(true).await;
                info!(issued_at = %challenge.issued_at, "pairing required, enter the PIN shown on the TV");
            }
            AttemptOutcome::Failed { error, reachable } => {
                self.ctx.failures += 1;
                let attempt = self.ctx.failures;
                let delay_ms = u64::try_from(self.config.reconnect_delay.as_millis())
                    .unwrap_or(u64::MAX);
                if attempt > self.config.max_immediate_retries {
                    error!(attempt, delay_ms, error = %error, "connection to TV keeps failing");
                } else {
                    info!(attempt, delay_ms, error = %error, "connection to TV failed, retrying");
                }

                self.set_state(ConnectionState::Disconnected);
                self.publish_connected(false).await;
                self.publish_pairing(false).await;
                self.schedule_or_wait(reachable);
            }
        }
    }

    /// Hand learned values to the host off the controller task; the host
    /// may write files or talk to a keyring.
    fn spawn_persist(&mut self, session: Session) {
        if session.learned.is_empty() {
            return;
        }
        self.ctx.persisting.retain(|task| !task.is_finished());
        let host = Arc::clone(&self.host);
        let task = tokio::spawn(
            async move {
                for learned in session.learned {
                    host.persist(learned).await;
                }
            }
            .in_current_span(),
        );
        self.ctx.persisting.push(task);
    }

    /// After a failure or drop: arm the reconnect timer if the TV still
    /// answers, otherwise release the latch and wait for reachability.
    fn schedule_or_wait(&mut self, reachable: bool) {
        if reachable {
            self.arm_timer(self.config.reconnect_delay);
        } else {
            self.ctx.reconnect_pending = false;
            info!(address = %self.config.address, "TV unreachable, reconnect deferred until it answers");
        }
    }

    fn arm_timer(&mut self, delay: Duration) {
        if let Some(timer) = self.ctx.timer.take() {
            timer.handle.abort();
        }
        self.ctx.next_timer_id += 1;
        let timer_id = self.ctx.next_timer_id;
        let triggers = self.triggers.clone();
        let handle = tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                let _ = triggers.send(Trigger::ReconnectTimerFired { timer_id });
            }
            .in_current_span(),
        );
        self.ctx.timer = Some(ReconnectTimer {
            id: timer_id,
            handle,
        });
        self.ctx.reconnect_pending = true;
    }

    fn on_timer(&mut self, timer_id: u64) {
        match &self.ctx.timer {
            Some(timer) if timer.id == timer_id => {
                self.ctx.timer = None;
                self.ctx.reconnect_pending = false;
                self.begin_attempt("reconnect timer");
            }
            _ => debug!(timer_id, "stale reconnect timer ignored"),
        }
    }

    fn spawn_probe(&self) {
        let probe = Arc::clone(&self.probe);
        let config = Arc::clone(&self.config);
        let triggers = self.triggers.clone();
        tokio::spawn(
            async move {
                let reachable = probe.probe(&config.address, config.probe_timeout).await;
                let _ = triggers.send(Trigger::ProbeFinished { reachable });
            }
            .in_current_span(),
        );
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    async fn on_lifecycle(&mut self, notice: LifecycleNotice) {
        match notice.event {
            LifecycleEvent::Connecting | LifecycleEvent::Connected => {
                debug!(generation = notice.generation, event = ?notice.event, "adapter lifecycle");
            }
            LifecycleEvent::Disconnected { reason } => {
                let current = self.inner.active.load_full().map(|a| a.generation);
                if current != Some(notice.generation) {
                    debug!(generation = notice.generation, "disconnect from replaced adapter ignored");
                    return;
                }

                info!(reason = %reason, "TV dropped the session");
                self.inner.active.store(None);
                self.set_state(ConnectionState::Disconnected);
                self.publish_connected(false).await;

                if self.ctx.reconnect_pending {
                    return;
                }
                self.ctx.reconnect_pending = true;
                self.spawn_probe();
            }
        }
    }

    // ── Pairing ──────────────────────────────────────────────────────

    fn on_pin(&mut self, pin: String, reply: oneshot::Sender<Result<(), PairError>>) {
        if self.state() != ConnectionState::PairingRequired || self.ctx.reconnect_pending {
            let _ = reply.send(Err(PairError::NotPairing));
            return;
        }
        let Some(mut adapter) = self.ctx.pending_pairing.take() else {
            let _ = reply.send(Err(PairError::NotPairing));
            return;
        };

        self.ctx.reconnect_pending = true;
        let generation = self.ctx.generation;
        let probe = Arc::clone(&self.probe);
        let config = Arc::clone(&self.config);
        let triggers = self.triggers.clone();
        tokio::spawn(
            async move {
                match adapter.confirm_pairing(&pin).await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                        let _ = triggers.send(Trigger::PinAccepted { generation });
                        let outcome = run_attempt(adapter, probe.as_ref(), &config).await;
                        let _ = triggers.send(Trigger::AttemptFinished {
                            generation,
                            outcome,
                        });
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        let _ = triggers.send(Trigger::PinRejected {
                            generation,
                            adapter,
                        });
                    }
                }
            }
            .in_current_span(),
        );
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    async fn clear_active(&self) {
        if let Some(active) = self.inner.active.swap(None) {
            active.adapter.disconnect().await;
        }
    }

    async fn teardown(&mut self) {
        if let Some(timer) = self.ctx.timer.take() {
            timer.handle.abort();
        }
        self.ctx.pending_pairing = None;
        self.clear_active().await;
        self.set_state(ConnectionState::Idle);
        self.publish_connected(false).await;
        // Learned values must reach the host before the process exits.
        for task in self.ctx.persisting.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "persisting a learned value failed");
            }
        }
        debug!("connection controller stopped");
    }
}

/// One connection attempt: pair if needed, otherwise connect. On failure
/// the TV is probed so the controller can decide whether to retry.
async fn run_attempt(
    mut adapter: Box<dyn ProtocolAdapter>,
    probe: &dyn Reachability,
    config: &DeviceConfig,
) -> AttemptOutcome {
    let result = if adapter.requires_pairing() {
        match adapter.request_pairing().await {
            Ok(challenge) => return AttemptOutcome::PairingRequired { adapter, challenge },
            Err(e) => Err(ConnectError::Protocol(format!("pairing request failed: {e}"))),
        }
    } else {
        adapter.connect().await
    };

    match result {
        Ok(session) => AttemptOutcome::Connected { adapter, session },
        Err(error) => {
            let reachable = probe.probe(&config.address, config.probe_timeout).await;
            AttemptOutcome::Failed { error, reachable }
        }
    }
}
