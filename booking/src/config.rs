//! Timing configuration for both flows.
//!
//! Loads from environment variables with the defaults the kiosk and booking
//! screens have always used.

use std::env;
use std::time::Duration;

/// Display windows, debounce and timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimings {
    /// Minimum gap between two processed scans.
    ///
    /// Default: 2 seconds
    pub scan_debounce: Duration,

    /// How long a scan rejection stays on screen.
    ///
    /// Default: 3 seconds
    pub rejection_display: Duration,

    /// How long a duplicate, not-found or error outcome stays on screen.
    ///
    /// Default: 3 seconds
    pub duplicate_display: Duration,

    /// How long a successful check-in stays on screen.
    ///
    /// Default: 5 seconds
    pub success_display: Duration,

    /// How long to wait for a payment result before giving up on the channel.
    ///
    /// Default: 5 minutes
    pub payment_timeout: Duration,
}

impl FlowTimings {
    /// Load from the process environment.
    ///
    /// Absent or unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            scan_debounce: read("RYFTY_SCAN_DEBOUNCE_MS")
                .map_or(defaults.scan_debounce, Duration::from_millis),
            rejection_display: read("RYFTY_REJECTION_DISPLAY_MS")
                .map_or(defaults.rejection_display, Duration::from_millis),
            duplicate_display: read("RYFTY_OUTCOME_DISPLAY_MS")
                .map_or(defaults.duplicate_display, Duration::from_millis),
            success_display: read("RYFTY_SUCCESS_DISPLAY_MS")
                .map_or(defaults.success_display, Duration::from_millis),
            payment_timeout: read("RYFTY_PAYMENT_TIMEOUT_SECS")
                .map_or(defaults.payment_timeout, Duration::from_secs),
        }
    }

    /// Set the scan debounce window.
    #[must_use]
    pub const fn with_scan_debounce(mut self, window: Duration) -> Self {
        self.scan_debounce = window;
        self
    }

    /// Set the payment timeout.
    #[must_use]
    pub const fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            scan_debounce: Duration::from_secs(2),
            rejection_display: Duration::from_secs(3),
            duplicate_display: Duration::from_secs(3),
            success_display: Duration::from_secs(5),
            payment_timeout: Duration::from_secs(300),
        }
    }
}
