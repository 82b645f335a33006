#![allow(clippy::unwrap_used)]
// Power reconciliation and convergence tests on a paused clock.

mod common;

use std::time::Duration;

use common::{Behavior, FakeFactory, Harness, eventually};
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tvbridge_core::host::{POWER_CHECK, POWER_ON};
use tvbridge_core::{ConnectionState, PowerError, PowerState, StateValue};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn texts(values: &[&str]) -> Vec<StateValue> {
    values.iter().map(|v| StateValue::from(*v)).collect()
}

async fn connected(alive: bool) -> Harness {
    let h = Harness::start(alive, FakeFactory::new(Behavior::Succeed));
    let controller = h.bridge.controller().clone();
    assert!(eventually(secs(5), || controller.state() == ConnectionState::Connected).await);
    h
}

// ── Debounced power state ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_check_on_off_confirms_after_window() {
    let h = connected(true).await;

    tokio::time::sleep(secs(10)).await;
    assert_eq!(h.host.history_of(POWER_CHECK), texts(&["on", "ON"]));
    assert_eq!(h.host.state(POWER_ON), Some(StateValue::Bool(true)));
    assert_eq!(h.bridge.reconciler().state(), PowerState::On);

    h.probe.set_alive(false);
    assert!(eventually(secs(40), || h.host.history_of(POWER_CHECK).len() == 4).await);
    assert_eq!(h.host.history_of(POWER_CHECK), texts(&["on", "ON", "off", "OFF"]));
    assert_eq!(h.host.state(POWER_ON), Some(StateValue::Bool(false)));
    assert_eq!(h.bridge.reconciler().state(), PowerState::Off);
}

#[tokio::test(start_paused = true)]
async fn test_flapping_never_confirms() {
    let h = Harness::start(true, FakeFactory::new(Behavior::Succeed));

    // Samples land on whole seconds; flip the TV halfway between them.
    let probe = h.probe.clone();
    let flapper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut alive = true;
        loop {
            alive = !alive;
            probe.set_alive(alive);
            tokio::time::sleep(secs(1)).await;
        }
    });

    tokio::time::sleep(secs(12)).await;
    flapper.abort();

    let history = h.host.history_of(POWER_CHECK);
    assert!(history.len() >= 10, "every flip is published: {history:?}");
    assert!(
        history
            .iter()
            .all(|v| *v == StateValue::from("on") || *v == StateValue::from("off")),
        "upper case only after a stable window: {history:?}"
    );
    assert_ne!(h.bridge.reconciler().state(), PowerState::On);
    assert_ne!(h.bridge.reconciler().state(), PowerState::Off);
}

#[tokio::test(start_paused = true)]
async fn test_recheck_reconfirms_state() {
    let h = connected(true).await;
    tokio::time::sleep(secs(10)).await;
    assert_eq!(h.host.history_of(POWER_CHECK), texts(&["on", "ON"]));

    h.bridge.reconciler().recheck();
    tokio::time::sleep(secs(5)).await;
    assert_eq!(h.host.history_of(POWER_CHECK), texts(&["on", "ON", "ON"]));
}

#[tokio::test(start_paused = true)]
async fn test_probe_interval_backs_off_when_settled() {
    let h = connected(true).await;
    tokio::time::sleep(secs(120)).await;
    let early = h.probe.samples();
    tokio::time::sleep(secs(150)).await;
    let settled = h.probe.samples() - early;

    // At the 15 s ceiling, 150 s hold ten samples.
    assert_eq!(settled, 10);
}

// ── Convergence ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_power_on_when_already_on_sends_nothing() {
    let h = connected(true).await;

    let reached = h.bridge.reconciler().wait_for_power(true).await.unwrap();
    assert!(reached);
    assert!(h.recorder().sent().is_empty());
    assert_eq!(h.host.state(POWER_ON), Some(StateValue::Bool(true)));
}

#[tokio::test(start_paused = true)]
async fn test_matching_sample_settles_power_state() {
    let h = Harness::start(true, FakeFactory::new(Behavior::Succeed));
    let reconciler = h.bridge.reconciler().clone();

    // Before the probe loop has confirmed anything.
    assert_ne!(reconciler.state(), PowerState::On);
    assert!(reconciler.wait_for_power(true).await.unwrap());
    assert_eq!(reconciler.state(), PowerState::On);
    assert!(h.recorder().sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_power_off_gives_up_after_poll_budget() {
    let h = connected(true).await;

    let started = Instant::now();
    let reached = h.bridge.reconciler().wait_for_power(false).await.unwrap();
    let elapsed = started.elapsed();

    assert!(reached, "publishes the unchanged initial sample");
    assert_eq!(h.recorder().sent(), vec!["KEY_POWER".to_owned()]);
    assert!(elapsed >= secs(20) && elapsed < secs(21), "took {elapsed:?}");
    assert_eq!(h.host.state(POWER_ON), Some(StateValue::Bool(true)));
}

#[tokio::test(start_paused = true)]
async fn test_power_off_completes_when_tv_goes_dark() {
    let h = connected(true).await;

    let probe = h.probe.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        probe.set_alive(false);
    });

    let started = Instant::now();
    let reached = h.bridge.reconciler().wait_for_power(false).await.unwrap();

    assert!(!reached);
    assert_eq!(started.elapsed(), secs(4));
    assert_eq!(h.recorder().sent(), vec!["KEY_POWER".to_owned()]);
    assert_eq!(h.host.state(POWER_ON), Some(StateValue::Bool(false)));
}

#[tokio::test(start_paused = true)]
async fn test_power_on_without_session_or_mac_fails() {
    let h = Harness::start(false, FakeFactory::new(Behavior::Succeed));

    let err = h.bridge.reconciler().wait_for_power(true).await.unwrap_err();
    assert_eq!(err, PowerError::NotConnected);
    assert!(h.recorder().sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_power_request_supersedes_running_one() {
    let h = connected(true).await;

    let reconciler = h.bridge.reconciler().clone();
    let first = tokio::spawn(async move { reconciler.wait_for_power(false).await });
    tokio::time::sleep(secs(2)).await;

    let second = h.bridge.reconciler().wait_for_power(true).await;
    assert_eq!(second, Ok(true));
    assert_eq!(first.await.unwrap(), Err(PowerError::Superseded));
}
