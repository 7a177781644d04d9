//! Request/response backend operations.
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of `async fn` so the gateway
//! can live in an environment as `Arc<dyn ReservationGateway>` and be moved
//! into the effects a reducer returns.

use crate::error::GatewayError;
use crate::types::{CheckinReply, DeviceInfo, ReservationId, ReservationReceipt, ReservationRequest};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by gateway calls
pub type GatewayFuture<T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send>>;

/// Backend calls used by the reservation and check-in flows
pub trait ReservationGateway: Send + Sync {
    /// Create a reservation and start the mobile-money payment prompt.
    ///
    /// The payment result is reported later on the notification channel.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Rejected`] when the backend refuses the request (4xx)
    /// - [`GatewayError::Server`] on backend failure (5xx)
    /// - [`GatewayError::Transport`] when the request never completes
    fn create_reservation(&self, request: ReservationRequest) -> GatewayFuture<ReservationReceipt>;

    /// Check a reservation in on behalf of an authorized device.
    ///
    /// Duplicate and unknown reservations are normal replies, not errors.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Unauthorized`] when the device token is no longer valid
    /// - [`GatewayError::UnexpectedStatus`] for any other status
    /// - [`GatewayError::Transport`] when the request never completes
    fn checkin(&self, device_token: String, reservation_id: ReservationId) -> GatewayFuture<CheckinReply>;

    /// Verify a device token issued by a provider and return what it is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] or [`GatewayError::Rejected`] for
    /// tokens the backend does not accept.
    fn verify_device(&self, device_token: String) -> GatewayFuture<DeviceInfo>;
}
