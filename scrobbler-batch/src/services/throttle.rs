//! Request pacing between submissions
//!
//! Keeps the request rate under the service's implicit limits: a base delay
//! plus random jitter after every item, and a long cooldown every N items.

use crate::utils::Sleeper;
use rand::Rng;
use scrobbler_common::config::DEFAULT_BASE_DELAY_SECS;
use scrobbler_common::time::secs_to_duration;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_JITTER_MAX_SECS: f64 = 0.2;
pub const DEFAULT_COOLDOWN_EVERY: usize = 500;
pub const DEFAULT_COOLDOWN_SECS: u64 = 120;

/// Pacing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleSettings {
    /// Fixed part of the delay between items
    pub base_delay: Duration,
    /// Upper bound of the uniform random delay added to `base_delay`
    pub jitter_max: Duration,
    /// Cooldown after every this many processed items (0 disables)
    pub cooldown_every: usize,
    pub cooldown: Duration,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            base_delay: secs_to_duration(DEFAULT_BASE_DELAY_SECS),
            jitter_max: secs_to_duration(DEFAULT_JITTER_MAX_SECS),
            cooldown_every: DEFAULT_COOLDOWN_EVERY,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }
}

impl ThrottleSettings {
    pub fn with_base_delay_secs(mut self, secs: f64) -> Self {
        self.base_delay = secs_to_duration(secs);
        self
    }
}

pub struct ThrottleController {
    settings: ThrottleSettings,
    sleeper: Arc<dyn Sleeper>,
}

impl ThrottleController {
    pub fn new(settings: ThrottleSettings, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { settings, sleeper }
    }

    /// Inter-item delay for a jitter fraction in `[0.0, 1.0]`
    pub fn delay_with_jitter(&self, fraction: f64) -> Duration {
        let fraction = fraction.clamp(0.0, 1.0);
        self.settings.base_delay + self.settings.jitter_max.mul_f64(fraction)
    }

    /// Sleep `base_delay + uniform(0, jitter_max)`
    pub async fn wait_between_items(&self) {
        let fraction: f64 = rand::thread_rng().gen();
        let delay = self.delay_with_jitter(fraction);
        tracing::trace!(delay_ms = delay.as_millis() as u64, "Pacing delay");
        self.sleeper.sleep(delay).await;
    }

    /// Whether a cooldown follows after `items_processed` items (1-based count)
    pub fn cooldown_due(&self, items_processed: usize) -> bool {
        self.settings.cooldown_every > 0
            && items_processed > 0
            && items_processed % self.settings.cooldown_every == 0
    }

    /// Cooldown if due, calling `notify` with the pause length before sleeping
    ///
    /// Returns whether a cooldown happened.
    pub async fn maybe_cooldown<F>(&self, items_processed: usize, notify: F) -> bool
    where
        F: FnOnce(Duration) + Send,
    {
        if !self.cooldown_due(items_processed) {
            return false;
        }

        notify(self.settings.cooldown);
        self.sleeper.sleep(self.settings.cooldown).await;
        true
    }
}
