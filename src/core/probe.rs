use serde::Serialize;
use std::time::Duration;

/// Timing parameters of a container health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Grace period after start during which failures do not count
    pub start_period: Duration,
    /// Time between consecutive probes
    pub interval: Duration,
    /// Maximum time a single probe may take
    pub timeout: Duration,
    /// Consecutive counted failures before the container is unhealthy
    pub retries: u32,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            start_period: Duration::from_secs(15),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            retries: 3,
        }
    }
}

impl ProbePolicy {
    /// Offset from container start of the n-th probe (zero-based)
    pub fn probe_at(&self, n: u32) -> Duration {
        self.start_period + self.interval * n
    }

    /// Earliest moment a never-healthy container can be marked unhealthy
    ///
    /// The probe at the end of the start period is still in grace, so the
    /// `retries` counted failures land on the following probes.
    pub fn earliest_unhealthy(&self) -> Duration {
        self.probe_at(self.retries)
    }
}

/// Health state as reported to an orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
}

/// Tracks probe outcomes against a policy
#[derive(Debug, Clone)]
pub struct HealthTracker {
    policy: ProbePolicy,
    state: HealthState,
    consecutive_failures: u32,
}

impl HealthTracker {
    pub fn new(policy: ProbePolicy) -> Self {
        Self {
            policy,
            state: HealthState::Starting,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn policy(&self) -> &ProbePolicy {
        &self.policy
    }

    /// Record the outcome of the check scheduled `elapsed` after container start
    pub fn record(&mut self, elapsed: Duration, success: bool) -> HealthState {
        if success {
            self.consecutive_failures = 0;
            self.state = HealthState::Healthy;
            return self.state;
        }

        // Failures inside the start period are forgiven
        if elapsed <= self.policy.start_period {
            return self.state;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.policy.retries {
            self.state = HealthState::Unhealthy;
        }

        self.state
    }
}
