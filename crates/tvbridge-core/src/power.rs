// ── Power-state reconciliation ──
//
// A background probe loop turns raw reachability samples into a debounced
// power state, and `wait_for_power` drives the TV towards a desired state
// by pressing the power key once and polling until the network agrees.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use strum::Display;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::config::DeviceConfig;
use crate::controller::ConnectionController;
use crate::error::{DispatchError, PowerError};
use crate::host::{self, HostPlatform};
use crate::probe::Reachability;

/// Logical power state of the TV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PowerState {
    Unknown,
    Off,
    TransitioningOn,
    TransitioningOff,
    On,
}

impl PowerState {
    fn confirmed(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    fn transitioning(on: bool) -> Self {
        if on {
            Self::TransitioningOn
        } else {
            Self::TransitioningOff
        }
    }
}

fn check_value(on: bool, confirmed: bool) -> &'static str {
    match (on, confirmed) {
        (true, false) => "on",
        (false, false) => "off",
        (true, true) => "ON",
        (false, true) => "OFF",
    }
}

// ── Debounce ─────────────────────────────────────────────────────────

/// Debounce window over reachability samples.
#[derive(Debug, Default)]
struct Debounce {
    /// Last published sample.
    published: Option<bool>,
    /// Consecutive samples equal to `published`.
    stable: u32,
    /// Sample last confirmed in upper case.
    confirmed: Option<bool>,
}

/// What a sample changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleEffect {
    /// Differs from the published sample.
    Flipped,
    /// Stable long enough to confirm for the first time.
    Confirmed,
    /// Same as before, already confirmed or still inside the window.
    Unchanged,
}

impl Debounce {
    fn observe(&mut self, alive: bool, confirm_samples: u32) -> Vec<SampleEffect> {
        let mut effects = Vec::with_capacity(2);
        if self.published == Some(alive) {
            self.stable = self.stable.saturating_add(1);
        } else {
            self.published = Some(alive);
            self.stable = 1;
            self.confirmed = None;
            effects.push(SampleEffect::Flipped);
        }

        if self.stable >= confirm_samples && self.confirmed != Some(alive) {
            self.confirmed = Some(alive);
            effects.push(SampleEffect::Confirmed);
        }
        if effects.is_empty() {
            effects.push(SampleEffect::Unchanged);
        }
        effects
    }

    fn is_settled(&self) -> bool {
        self.published.is_some() && self.confirmed == self.published
    }

    /// Forget the confirmation so the next samples confirm again.
    fn reset_window(&mut self) {
        self.stable = 0;
        self.confirmed = None;
    }
}

// ── PowerStateReconciler ─────────────────────────────────────────────

/// Handle to the power reconciler. Cheaply cloneable.
#[derive(Clone)]
pub struct PowerStateReconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    config: Arc<DeviceConfig>,
    host: Arc<dyn HostPlatform>,
    probe: Arc<dyn Reachability>,
    controller: ConnectionController,
    state: watch::Sender<PowerState>,
    recheck: Notify,
    /// Cancels the running convergence loop, if any.
    convergence: Mutex<Option<CancellationToken>>,
    cancel: CancellationToken,
}

impl PowerStateReconciler {
    /// Spawn the periodic probe loop.
    pub fn spawn(
        config: Arc<DeviceConfig>,
        host: Arc<dyn HostPlatform>,
        probe: Arc<dyn Reachability>,
        controller: ConnectionController,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (state, _) = watch::channel(PowerState::Unknown);
        let inner = Arc::new(ReconcilerInner {
            config,
            host,
            probe,
            controller,
            state,
            recheck: Notify::new(),
            convergence: Mutex::new(None),
            cancel,
        });
        let handle = tokio::spawn(probe_loop(Arc::clone(&inner)).in_current_span());
        (Self { inner }, handle)
    }

    pub fn state(&self) -> PowerState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PowerState> {
        self.inner.state.subscribe()
    }

    /// Re-confirm the power state: resets the debounce window and the
    /// probe interval.
    pub fn recheck(&self) {
        debug!("power re-check requested");
        self.inner.recheck.notify_one();
    }

    /// Drive the TV towards `desired` and report the power state it ended
    /// in. Starting a new convergence cancels the running one.
    pub async fn wait_for_power(&self, desired: bool) -> Result<bool, PowerError> {
        let token = self.inner.begin_convergence();
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(desired, "power convergence superseded");
                Err(PowerError::Superseded)
            }
            result = self.inner.converge(desired) => result,
        }
    }
}

impl ReconcilerInner {
    async fn sample(&self) -> bool {
        self.probe
            .probe(&self.config.address, self.config.probe_timeout)
            .await
    }

    fn set_state(&self, next: PowerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "power state");
        }
    }

    async fn publish_power(&self, on: bool) {
        self.host
            .publish_state(host::POWER_ON, on.into(), true)
            .await;
    }

    fn begin_convergence(&self) -> CancellationToken {
        let token = self.cancel.child_token();
        let previous = self
            .convergence
            .lock()
            .ok()
            .and_then(|mut slot| slot.replace(token.clone()));
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    async fn converge(&self, desired: bool) -> Result<bool, PowerError> {
        let initial = self.sample().await;
        if initial == desired {
            debug!(desired, "TV already in requested power state");
            self.set_state(PowerState::confirmed(desired));
            self.publish_power(desired).await;
            return Ok(desired);
        }

        self.set_state(PowerState::transitioning(desired));
        if let Err(e) = self.press_power(desired).await {
            self.set_state(PowerState::confirmed(initial));
            return Err(e);
        }

        let attempts = self.config.power_poll_attempts;
        for poll in 1..=attempts {
            tokio::time::sleep(self.config.power_poll_interval).await;
            if self.sample().await == desired {
                info!(desired, poll, "TV reached requested power state");
                self.set_state(PowerState::confirmed(desired));
                self.publish_power(desired).await;
                return Ok(desired);
            }
        }

        warn!(desired, attempts, "TV did not reach requested power state, giving up");
        self.set_state(PowerState::confirmed(initial));
        self.publish_power(initial).await;
        Ok(initial)
    }

    /// Press the power key once. Powering on an unconnected TV falls back to
    /// Wake-on-LAN when a MAC address is configured.
    async fn press_power(&self, on: bool) -> Result<(), PowerError> {
        if let Some(keys) = self.controller.power_keys() {
            let key = keys.for_direction(on);
            info!(key, on, "pressing power key");
            return self
                .controller
                .send_key(key)
                .await
                .map_err(|e| match e {
                    DispatchError::Send(send) => PowerError::Send(send),
                    _ => PowerError::NotConnected,
                });
        }

        match self.config.mac {
            Some(mac) if on => {
                info!(%mac, "no session, waking TV over the network");
                tvbridge_api::wol::wake(mac)
                    .await
                    .map_err(|e| PowerError::Wake(e.to_string()))
            }
            _ => Err(PowerError::NotConnected),
        }
    }

    /// Apply one sample to the debounce window and publish what changed.
    async fn observe(&self, debounce: &mut Debounce, alive: bool) {
        for effect in debounce.observe(alive, self.config.confirm_samples) {
            match effect {
                SampleEffect::Flipped => {
                    debug!(alive, "reachability changed");
                    self.host
                        .publish_state(host::POWER_CHECK, check_value(alive, false).into(), true)
                        .await;
                    self.set_state(PowerState::transitioning(alive));
                    self.controller.reachability_changed(alive);
                }
                SampleEffect::Confirmed => {
                    info!(on = alive, "power state confirmed");
                    self.host
                        .publish_state(host::POWER_CHECK, check_value(alive, true).into(), true)
                        .await;
                    self.publish_power(alive).await;
                    self.set_state(PowerState::confirmed(alive));
                }
                SampleEffect::Unchanged => {}
            }
        }
    }
}

/// Sample, debounce, sleep. The interval doubles while the state is
/// settled and drops back to the minimum whenever it is not.
async fn probe_loop(inner: Arc<ReconcilerInner>) {
    let min = inner.config.probe_interval_min;
    let max = inner.config.probe_interval_max;
    let mut debounce = Debounce::default();
    let mut interval = min;

    loop {
        let alive = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            alive = inner.sample() => alive,
        };
        inner.observe(&mut debounce, alive).await;

        interval = if debounce.is_settled() {
            next_interval(interval, max)
        } else {
            min
        };

        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            () = inner.recheck.notified() => {
                debounce.reset_window();
                interval = min;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!("power reconciler stopped");
}

fn next_interval(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}
