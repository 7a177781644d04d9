//! Push channel carrying payment status for a user.
//!
//! A subscription is a stream owned by whoever holds it. Dropping it releases
//! the underlying connection, so the flow never has to remember to close it:
//! the effect that owns the stream is aborted and the connection goes with it.

use crate::error::ChannelError;
use crate::types::{PaymentEvent, UserId};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

/// Live payment events for one user, released when dropped
pub type PaymentSubscription = Pin<Box<dyn Stream<Item = Result<PaymentEvent, ChannelError>> + Send>>;

/// Opens payment event subscriptions
pub trait NotificationChannel: Send + Sync {
    /// Subscribe to payment events for `user_id`.
    ///
    /// The returned future resolves once the subscription is established, so
    /// anything the backend emits afterwards is delivered.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Connect`] when the connection cannot be made
    /// - [`ChannelError::Rejected`] when the server refuses the subscription
    fn open(
        &self,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentSubscription, ChannelError>> + Send>>;
}
