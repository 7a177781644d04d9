//! Mock reservation gateway for testing.

use super::{lock, CallLog};
use crate::error::GatewayError;
use crate::gateway::{GatewayFuture, ReservationGateway};
use crate::types::{CheckinReply, DeviceInfo, ReservationId, ReservationReceipt, ReservationRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Mock gateway.
///
/// Replies are scripted per operation and consumed in order; when a script
/// runs out the default reply is used (an accepted reservation, a successful
/// check-in, a verified device).
#[derive(Debug, Default)]
pub struct MockGateway {
    log: CallLog,
    create_replies: Mutex<VecDeque<Result<ReservationReceipt, GatewayError>>>,
    checkin_replies: Mutex<VecDeque<Result<CheckinReply, GatewayError>>>,
    verify_replies: Mutex<VecDeque<Result<DeviceInfo, GatewayError>>>,
    requests: Mutex<Vec<ReservationRequest>>,
    checkins: Mutex<Vec<(String, ReservationId)>>,
    hold_checkins: AtomicBool,
}

impl MockGateway {
    /// Create a new mock gateway.
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

    /// Queue a reply for the next `create_reservation`.
    pub fn push_create(&self, reply: Result<ReservationReceipt, GatewayError>) {
        lock(&self.create_replies).push_back(reply);
    }

    /// Queue a reply for the next `checkin`.
    pub fn push_checkin(&self, reply: Result<CheckinReply, GatewayError>) {
        lock(&self.checkin_replies).push_back(reply);
    }

    /// Queue a reply for the next `verify_device`.
    pub fn push_verify(&self, reply: Result<DeviceInfo, GatewayError>) {
        lock(&self.verify_replies).push_back(reply);
    }

    /// Make check-in calls never complete.
    pub fn hold_checkins(&self, hold: bool) {
        self.hold_checkins.store(hold, Ordering::SeqCst);
    }

    /// Reservation requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ReservationRequest> {
        lock(&self.requests).clone()
    }

    /// Check-in calls received so far, as `(device_token, reservation_id)`.
    #[must_use]
    pub fn checkins(&self) -> Vec<(String, ReservationId)> {
        lock(&self.checkins).clone()
    }

    /// Number of check-in calls received.
    #[must_use]
    pub fn checkin_count(&self) -> usize {
        lock(&self.checkins).len()
    }
}

impl ReservationGateway for MockGateway {
    fn create_reservation(&self, request: ReservationRequest) -> GatewayFuture<ReservationReceipt> {
        self.log.record("create_reservation");
        lock(&self.requests).push(request);

        let reply = lock(&self.create_replies).pop_front().unwrap_or_else(|| {
            Ok(ReservationReceipt {
                reservation_id: None,
                message: Some("Reservation request was successful, initiating mpesa".to_owned()),
            })
        });
        Box::pin(async move { reply })
    }

    fn checkin(&self, device_token: String, reservation_id: ReservationId) -> GatewayFuture<CheckinReply> {
        self.log.record("checkin");
        lock(&self.checkins).push((device_token, reservation_id));

        if self.hold_checkins.load(Ordering::SeqCst) {
            return Box::pin(futures::future::pending());
        }

        let reply = lock(&self.checkin_replies).pop_front().unwrap_or_else(|| {
            Ok(CheckinReply::Success {
                message: "Guest checked in successfully".to_owned(),
                number_of_guests: Some(1),
            })
        });
        Box::pin(async move { reply })
    }

    fn verify_device(&self, _device_token: String) -> GatewayFuture<DeviceInfo> {
        self.log.record("verify_device");
        let reply = lock(&self.verify_replies)
            .pop_front()
            .unwrap_or_else(|| Ok(DeviceInfo::default()));
        Box::pin(async move { reply })
    }
}
