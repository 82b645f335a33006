// ── Console host ──
//
// The CLI's stand-in for a home-automation platform: states live in a
// `MemoryHost`, and values the TV hands out are written back into the
// active profile so the next run starts paired.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use tvbridge_core::{HostPlatform, Learned, MemoryHost, StateValue};

use crate::config;

pub struct ConsoleHost {
    states: MemoryHost,
    /// Profile learned values are persisted to; `None` for flag-only runs.
    profile_name: Option<String>,
}

impl ConsoleHost {
    pub fn new(profile_name: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            states: MemoryHost::new(),
            profile_name,
        })
    }

    pub fn states(&self) -> &MemoryHost {
        &self.states
    }
}

#[async_trait]
impl HostPlatform for ConsoleHost {
    async fn publish_state(&self, key: &str, value: StateValue, ack: bool) {
        debug!(key, %value, ack, "state");
        self.states.publish_state(key, value, ack).await;
    }

    async fn get_state(&self, key: &str) -> Option<StateValue> {
        self.states.get_state(key).await
    }

    async fn persist(&self, learned: Learned) {
        self.states.persist(learned.clone()).await;

        let Some(profile_name) = self.profile_name.clone() else {
            if let Learned::Token(ref token) = learned {
                info!(token = %token, "TV issued a token; pass it with --token next time");
            }
            return;
        };

        let result =
            tokio::task::spawn_blocking(move || persist_to_profile(&profile_name, &learned)).await;
        match result {
            Ok(Ok(true)) => info!("saved learned TV settings to the config file"),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => warn!(error = %e, "could not save learned TV settings"),
            Err(e) => warn!(error = %e, "config writer task failed"),
        }
    }
}

/// Secrets go to the keyring when one is available, everything else (and
/// secrets without a keyring) into the profile.
fn persist_to_profile(
    profile_name: &str,
    learned: &Learned,
) -> Result<bool, tvbridge_config::ConfigError> {
    let stored_in_keyring = match learned {
        Learned::Token(token) => tvbridge_config::store_in_keyring(profile_name, "token", token),
        Learned::Pin(pin) => tvbridge_config::store_in_keyring(profile_name, "pin", pin),
        Learned::Model2016(_) => false,
    };
    if stored_in_keyring {
        debug!(profile = profile_name, "secret stored in system keyring");
        return Ok(true);
    }

    let mut cfg = config::load_config()?;
    let Some(profile) = cfg.profiles.get_mut(profile_name) else {
        return Ok(false);
    };
    if !profile.apply_learned(learned) {
        return Ok(false);
    }
    config::save_config(&cfg)?;
    Ok(true)
}
