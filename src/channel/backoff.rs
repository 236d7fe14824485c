use std::time::Duration;

/// Delay between reconnect and token-retry attempts. The console has
/// always used a flat two seconds; acceptable for a low-churn
/// administrative tool, not a general backpressure strategy.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Pacing policy for token retries and reconnects. Pluggable so tests
/// can run without real delays and deployments can swap in exponential
/// pacing without touching the channel driver.
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(RECONNECT_DELAY)
    }
}

impl BackoffPolicy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
