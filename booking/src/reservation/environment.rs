//! Reservation flow dependencies.

use crate::config::FlowTimings;
use crate::credentials::CredentialProvider;
use crate::gateway::ReservationGateway;
use crate::notification::NotificationChannel;
use ryfty_core::environment::Clock;
use std::sync::Arc;

/// Environment dependencies for the reservation flow
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Backend calls
    pub gateway: Arc<dyn ReservationGateway>,
    /// Payment event subscriptions
    pub channel: Arc<dyn NotificationChannel>,
    /// Logged-in user
    pub credentials: Arc<dyn CredentialProvider>,
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Payment timeout
    pub timings: FlowTimings,
}

impl ReservationEnvironment {
    /// Creates a new `ReservationEnvironment` with default timings
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ReservationGateway>,
        channel: Arc<dyn NotificationChannel>,
        credentials: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            channel,
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
