//! Health reporting derived from flush handler failures.

/// Health status of a batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Last flush succeeded (or none has run yet)
    Healthy,
    /// Recent flushes failed, but fewer than the threshold
    Degraded,
    /// At least `threshold` consecutive flushes failed
    Unhealthy,
}

impl HealthStatus {
    /// Evaluate health from a streak of consecutive flush failures
    pub fn from_failures(consecutive_failures: u64, threshold: usize) -> Self {
        if consecutive_failures == 0 {
            HealthStatus::Healthy
        } else if consecutive_failures >= threshold as u64 {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        }
    }

    /// Check if the status is healthy
    pub fn is_healthy(&self) -> bool {
        *self == HealthStatus::Healthy
    }

    /// Gauge value (1 = healthy, 0.5 = degraded, 0 = unhealthy)
    pub fn as_gauge(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.5,
            HealthStatus::Unhealthy => 0.0,
        }
    }
}
