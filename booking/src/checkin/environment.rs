//! Check-in flow dependencies.

use crate::config::FlowTimings;
use crate::credentials::CredentialProvider;
use crate::gateway::ReservationGateway;
use crate::scanner::ScanSource;
use ryfty_core::environment::Clock;
use std::sync::Arc;

/// Environment dependencies for the check-in flow
#[derive(Clone)]
pub struct CheckinEnvironment {
    /// Camera or scanner
    pub scanner: Arc<dyn ScanSource>,
    /// Check-in calls
    pub gateway: Arc<dyn ReservationGateway>,
    /// Device credential
    pub credentials: Arc<dyn CredentialProvider>,
    /// Clock for credential expiry
    pub clock: Arc<dyn Clock>,
    /// Debounce and display windows
    pub timings: FlowTimings,
}

impl CheckinEnvironment {
    /// Creates a new `CheckinEnvironment` with default timings
    #[must_use]
    pub fn new(
        scanner: Arc<dyn ScanSource>,
        gateway: Arc<dyn ReservationGateway>,
        credentials: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scanner,
            gateway,
            credentials,
            clock,
            timings: FlowTimings::default(),
        }
    }

    /// Override the timings
    #[must_use]
    pub fn with_timings(mut self, timings: FlowTimings) -> Self {
        self.timings = timings;
        self
    }
}
