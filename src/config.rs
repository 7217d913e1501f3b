//! Monitoring configuration.
//!
//! [`MonitorConfig`] holds the user-facing settings (reload delay and
//! similarity threshold). [`MonitorTimings`] holds the fixed delays of the
//! poll loop; they default to the production values and are only
//! overridden by tests.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use page_change_monitor::MonitorConfig;
//!
//! let config = MonitorConfig::new()
//!     .with_delay_after_load(Duration::from_secs(5))
//!     .with_similarity_threshold(90.0);
//!
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default wait after a reload before comparing, in seconds.
pub const DEFAULT_DELAY_AFTER_LOAD_SECS: u64 = 3;

/// Default similarity threshold in percent.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 95.0;

/// Delay before the next iteration after a reload or messaging failure.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(5000);

/// Delay between successful poll iterations, added to the load delay.
pub const INTER_POLL_DELAY: Duration = Duration::from_millis(3000);

/// Wait before checking that a requested reference capture was persisted.
pub const CAPTURE_VERIFY_DELAY: Duration = Duration::from_millis(2000);

/// Wait before checking the reference when leaving `AwaitingReference`.
pub const REFERENCE_VERIFY_DELAY: Duration = Duration::from_millis(3000);

/// Upper bound on a single rasterization.
pub const IMAGE_LOAD_TIMEOUT: Duration = Duration::from_millis(10_000);

// ============================================================================
// MonitorConfig
// ============================================================================

/// User-configured monitoring settings.
///
/// Read at session start; may be replaced on an active session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    /// Wait after a reload before capturing the region.
    pub delay_after_load: Duration,

    /// Similarity percentage below which a change is declared.
    pub similarity_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorConfig {
    /// Creates a config with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delay_after_load: Duration::from_secs(DEFAULT_DELAY_AFTER_LOAD_SECS),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Sets the wait after page load.
    #[inline]
    #[must_use]
    pub fn with_delay_after_load(mut self, delay: Duration) -> Self {
        self.delay_after_load = delay;
        self
    }

    /// Sets the similarity threshold in percent.
    #[inline]
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Builds a config from persisted values, falling back to defaults.
    ///
    /// `delay_secs` is the stored `delayAfterLoad` (seconds) and
    /// `threshold` the stored `similarityThreshold` (percent).
    #[must_use]
    pub fn from_persisted(delay_secs: Option<u64>, threshold: Option<f64>) -> Self {
        Self {
            delay_after_load: Duration::from_secs(
                delay_secs.unwrap_or(DEFAULT_DELAY_AFTER_LOAD_SECS),
            ),
            similarity_threshold: threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
        }
    }

    /// Checks the threshold lies within `[0, 100]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a non-finite or out-of-range threshold.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.similarity_threshold;
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(Error::config(format!(
                "similarity threshold must be within 0..=100, got {threshold}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// MonitorTimings
// ============================================================================

/// Fixed delays used by the monitor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTimings {
    /// Delay after a reload or messaging failure.
    pub retry_backoff: Duration,

    /// Delay after a successful comparison.
    pub inter_poll_delay: Duration,

    /// Wait before verifying a requested reference capture.
    pub capture_verify_delay: Duration,

    /// Wait before verifying the reference when starting a session.
    pub reference_verify_delay: Duration,
}

impl Default for MonitorTimings {
    fn default() -> Self {
        Self {
            retry_backoff: RETRY_BACKOFF,
            inter_poll_delay: INTER_POLL_DELAY,
            capture_verify_delay: CAPTURE_VERIFY_DELAY,
            reference_verify_delay: REFERENCE_VERIFY_DELAY,
        }
    }
}

impl MonitorTimings {
    /// Sets the failure backoff.
    #[inline]
    #[must_use]
    pub fn with_retry_backoff(mut self, delay: Duration) -> Self {
        self.retry_backoff = delay;
        self
    }

    /// Sets the delay between successful iterations.
    #[inline]
    #[must_use]
    pub fn with_inter_poll_delay(mut self, delay: Duration) -> Self {
        self.inter_poll_delay = delay;
        self
    }

    /// Sets both reference verification waits.
    #[inline]
    #[must_use]
    pub fn with_verify_delays(mut self, capture: Duration, reference: Duration) -> Self {
        self.capture_verify_delay = capture;
        self.reference_verify_delay = reference;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.delay_after_load, Duration::from_secs(3));
        assert_eq!(config.similarity_threshold, 95.0);

        let timings = MonitorTimings::default();
        assert_eq!(timings.retry_backoff.as_millis(), 5000);
        assert_eq!(timings.inter_poll_delay.as_millis(), 3000);
    }

    #[test]
    fn test_from_persisted() {
        let config = MonitorConfig::from_persisted(Some(10), Some(80.5));
        assert_eq!(config.delay_after_load, Duration::from_secs(10));
        assert_eq!(config.similarity_threshold, 80.5);

        let config = MonitorConfig::from_persisted(None, None);
        assert_eq!(config, MonitorConfig::default());

        let config = MonitorConfig::from_persisted(Some(0), Some(0.0));
        assert_eq!(config.delay_after_load, Duration::ZERO);
        assert_eq!(config.similarity_threshold, 0.0);
    }

    #[test]
    fn test_validate_threshold() {
        assert!(MonitorConfig::new().validate().is_ok());
        assert!(MonitorConfig::new().with_similarity_threshold(0.0).validate().is_ok());
        assert!(MonitorConfig::new().with_similarity_threshold(100.0).validate().is_ok());
        assert!(MonitorConfig::new().with_similarity_threshold(100.5).validate().is_err());
        assert!(MonitorConfig::new().with_similarity_threshold(-1.0).validate().is_err());
        assert!(MonitorConfig::new().with_similarity_threshold(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_timings_builders() {
        let timings = MonitorTimings::default()
            .with_retry_backoff(Duration::from_millis(10))
            .with_inter_poll_delay(Duration::from_millis(20));
        assert_eq!(timings.retry_backoff, Duration::from_millis(10));
        assert_eq!(timings.inter_poll_delay, Duration::from_millis(20));
        assert_eq!(timings.capture_verify_delay, CAPTURE_VERIFY_DELAY);
    }
}
