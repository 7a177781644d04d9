//! Mock payment event channel for testing.

use super::{lock, CallLog, LiveGuard};
use crate::error::ChannelError;
use crate::notification::{NotificationChannel, PaymentSubscription};
use crate::types::{PaymentEvent, UserId};
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type EventSender = mpsc::UnboundedSender<Result<PaymentEvent, ChannelError>>;

/// Mock notification channel.
///
/// Each `open` creates a subscription fed by [`MockNotificationChannel::emit`]
/// and friends, which always target the most recent subscription.
#[derive(Debug, Default)]
pub struct MockNotificationChannel {
    log: CallLog,
    open_replies: Mutex<VecDeque<Result<(), ChannelError>>>,
    users: Mutex<Vec<UserId>>,
    current: Mutex<Option<EventSender>>,
    live: Arc<AtomicUsize>,
}

impl MockNotificationChannel {
    /// Create a new mock channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls into a shared log.
    #[must_use]
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Make the next `open` fail.
    pub fn fail_next_open(&self, error: ChannelError) {
        lock(&self.open_replies).push_back(Err(error));
    }

    /// Deliver an event on the current subscription.
    ///
    /// Returns `false` if there is no live subscription.
    pub fn emit(&self, event: PaymentEvent) -> bool {
        self.send(Ok(event))
    }

    /// Deliver an error on the current subscription.
    pub fn fail(&self, error: ChannelError) -> bool {
        self.send(Err(error))
    }

    /// Close the current subscription from the server side.
    pub fn end(&self) {
        lock(&self.current).take();
    }

    /// Users subscriptions were opened for, in order.
    #[must_use]
    pub fn opened_for(&self) -> Vec<UserId> {
        lock(&self.users).clone()
    }

    /// Number of `open` calls.
    #[must_use]
    pub fn open_count(&self) -> usize {
        lock(&self.users).len()
    }

    /// Subscriptions not yet dropped by their holder.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn send(&self, item: Result<PaymentEvent, ChannelError>) -> bool {
        lock(&self.current)
            .as_ref()
            .is_some_and(|sender| sender.unbounded_send(item).is_ok())
    }
}

impl NotificationChannel for MockNotificationChannel {
    fn open(
        &self,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentSubscription, ChannelError>> + Send>> {
        self.log.record("open_channel");
        lock(&self.users).push(user_id);

        if let Some(Err(error)) = lock(&self.open_replies).pop_front() {
            return Box::pin(async move { Err(error) });
        }

        let (sender, receiver) = mpsc::unbounded();
        *lock(&self.current) = Some(sender);

        let guard = LiveGuard::new(&self.live);
        let subscription: PaymentSubscription = Box::pin(receiver.map(move |item| {
            let _held = &guard;
            item
        }));
        Box::pin(async move { Ok(subscription) })
    }
}
