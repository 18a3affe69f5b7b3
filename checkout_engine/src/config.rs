//! Settlement tuning, read from the environment.
use std::time::Duration;

use checkout_common::helpers::{env_millis_or_default, env_or_default};
use log::*;

const DEFAULT_PRICING_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_CHARGE_TIMEOUT: Duration = Duration::from_millis(30_000);
const DEFAULT_LEASE_SECS: u64 = 300;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Upper bound on fetching price settings.
    pub pricing_timeout: Duration,
    /// Upper bound on a single charge attempt.
    pub charge_timeout: Duration,
    /// How long a settlement may hold an order before another caller can take over. Always longer than
    /// `charge_timeout`.
    pub lease_duration: Duration,
    /// Capacity of each notification channel.
    pub event_buffer_size: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            pricing_timeout: DEFAULT_PRICING_TIMEOUT,
            charge_timeout: DEFAULT_CHARGE_TIMEOUT,
            lease_duration: Duration::from_secs(DEFAULT_LEASE_SECS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl SettlementConfig {
    pub fn from_env_or_default() -> Self {
        let pricing_timeout = env_millis_or_default("CHECKOUT_PRICING_TIMEOUT_MS", DEFAULT_PRICING_TIMEOUT);
        let charge_timeout = env_millis_or_default("CHECKOUT_CHARGE_TIMEOUT_MS", DEFAULT_CHARGE_TIMEOUT);
        let lease_duration = Duration::from_secs(env_or_default("CHECKOUT_SETTLEMENT_LEASE_SECS", DEFAULT_LEASE_SECS));
        let event_buffer_size = env_or_default("CHECKOUT_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        Self { pricing_timeout, charge_timeout, lease_duration, event_buffer_size }.validated()
    }

    /// Stretches the lease if it would expire before a charge could time out.
    pub fn validated(mut self) -> Self {
        if self.lease_duration <= self.charge_timeout {
            let lease = self.charge_timeout * 2;
            warn!(
                "🪛️ The settlement lease ({}s) must outlast the charge timeout ({}ms). Using a {}s lease instead.",
                self.lease_duration.as_secs(),
                self.charge_timeout.as_millis(),
                lease.as_secs()
            );
            self.lease_duration = lease;
        }
        if self.event_buffer_size == 0 {
            warn!("🪛️ The event buffer size cannot be zero. Using {DEFAULT_EVENT_BUFFER_SIZE}.");
            self.event_buffer_size = DEFAULT_EVENT_BUFFER_SIZE;
        }
        self
    }

    pub fn with_pricing_timeout(mut self, timeout: Duration) -> Self {
        self.pricing_timeout = timeout;
        self
    }

    pub fn with_charge_timeout(mut self, timeout: Duration) -> Self {
        self.charge_timeout = timeout;
        self
    }

    pub fn with_lease_duration(mut self, lease: Duration) -> Self {
        self.lease_duration = lease;
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size.max(1);
        self
    }
}
