use std::time::Duration;

/// Timing knobs for the router and reconciliation schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Quiet period a scheduler waits for after the last change.
    pub quiet_period: Duration,
    /// How often the router re-reads the location when no change arrives.
    pub poll_interval: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(100),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl RuntimeSettings {
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
