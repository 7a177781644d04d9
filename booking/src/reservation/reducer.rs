//! Reservation flow reducer.
//!
//! Drives the booking wizard, the submission and the payment reconciliation:
//! 1. Edit the draft across Details, Confirm and Pay
//! 2. Submit: open the payment channel, then create the reservation
//! 3. Follow payment events until success, failure, channel loss or timeout
//! 4. Retry: reconnect after a lost channel, or re-edit after a failed payment

use super::actions::ReservationAction;
use super::environment::ReservationEnvironment;
use super::types::{
    ChannelFault, PaymentAttempt, PaymentResult, PaymentStatus, ReservationDraft,
    ReservationPhase, ReservationState, WizardStep,
};
use crate::error::{ChannelError, ValidationError};
use crate::types::{
    PaymentEvent, PaymentState, ReservationReceipt, ReservationRequest, SlotSnapshot, UserId,
};
use futures::StreamExt;
use ryfty_core::effect::{Effect, EffectId};
use ryfty_core::reducer::Reducer;
use ryfty_core::{smallvec, SmallVec};
use std::sync::Arc;

/// Payment channel subscription (and the create call that follows it)
pub const PAYMENT_CHANNEL: EffectId = EffectId::new("payment-channel");

/// Payment result deadline
pub const PAYMENT_TIMEOUT: EffectId = EffectId::new("payment-timeout");

const REQUESTED_MESSAGE: &str = "Check your phone to complete the payment.";
const PENDING_MESSAGE: &str = "Waiting for payment confirmation...";
const SUCCEEDED_MESSAGE: &str = "Payment successful! Your reservation is confirmed.";
const FAILED_MESSAGE: &str = "Payment failed. Please try again.";
const TIMEOUT_MESSAGE: &str = "Payment timed out. Please check your phone or retry.";

type Effects = SmallVec<[Effect<ReservationAction>; 4]>;

/// Reducer for the reservation flow
#[derive(Clone, Debug, Default)]
pub struct ReservationReducer;

impl ReservationReducer {
    /// Creates a new `ReservationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn editing<'a>(
        state: &'a mut ReservationState,
        command: &'static str,
    ) -> Option<(&'a mut WizardStep, &'a mut ReservationDraft, &'a mut Option<String>)> {
        match &mut state.phase {
            ReservationPhase::Editing { step, draft, error } => Some((step, draft, error)),
            other => {
                tracing::warn!(command, phase = other.name(), "command rejected outside editing");
                None
            },
        }
    }

    /// Opens the channel for `user_id`, optionally creates the reservation once
    /// the subscription is live, then forwards channel events.
    ///
    /// The subscription lives inside the stream, so cancelling the effect
    /// releases it.
    fn channel_effect(
        env: &ReservationEnvironment,
        user_id: UserId,
        epoch: u64,
        create: Option<ReservationRequest>,
    ) -> Effect<ReservationAction> {
        let channel = Arc::clone(&env.channel);
        let gateway = Arc::clone(&env.gateway);

        let stream = async_stream::stream! {
            let mut subscription = match channel.open(user_id).await {
                Ok(subscription) => subscription,
                Err(error) => {
                    yield ReservationAction::ChannelOpenFailed { epoch, error };
                    return;
                },
            };
            yield ReservationAction::ChannelReady { epoch };

            if let Some(request) = create {
                match gateway.create_reservation(request).await {
                    Ok(receipt) => {
                        yield ReservationAction::ReservationCreated { epoch, receipt };
                    },
                    Err(error) => {
                        drop(subscription);
                        yield ReservationAction::ReservationRejected { epoch, error };
                        return;
                    },
                }
            }

            while let Some(item) = subscription.next().await {
                match item {
                    Ok(event) => {
                        yield ReservationAction::PaymentEventReceived { epoch, event };
                    },
                    Err(error) => {
                        yield ReservationAction::ChannelFailed { epoch, error };
                        return;
                    },
                }
            }
            yield ReservationAction::ChannelEnded { epoch };
        };

        Effect::Stream(Box::pin(stream)).cancellable(PAYMENT_CHANNEL)
    }

    fn payment_timeout(
        env: &ReservationEnvironment,
        state: &mut ReservationState,
    ) -> Effect<ReservationAction> {
        state.timer += 1;
        Effect::Delay {
            duration: env.timings.payment_timeout,
            action: Box::new(ReservationAction::PaymentTimedOut {
                epoch: state.epoch,
                timer: state.timer,
            }),
        }
        .cancellable(PAYMENT_TIMEOUT)
    }

    const fn status_message(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::PendingConfirmation => PENDING_MESSAGE,
            _ => REQUESTED_MESSAGE,
        }
    }

    fn select_slot(state: &mut ReservationState, slot: SlotSnapshot) -> Effects {
        let local = state.booked_locally(&slot.slot_id);
        let slot = SlotSnapshot {
            booked: slot.booked.saturating_add(local),
            ..slot
        };

        if let Some((_, draft, error)) = Self::editing(state, "select_slot") {
            tracing::debug!(slot_id = %slot.slot_id, remaining = slot.remaining(), "slot selected");
            let requested = draft.party_size.max(1);
            draft.slot = Some(slot);
            draft.set_party_size(requested);
            *error = None;
        }
        SmallVec::new()
    }

    fn advance(state: &mut ReservationState) -> Effects {
        let Some((step, draft, error)) = Self::editing(state, "advance") else {
            return SmallVec::new();
        };

        let result = match *step {
            WizardStep::Details => draft
                .slot
                .as_ref()
                .ok_or(ValidationError::NoSlotSelected)
                .and_then(|_| draft.contact.validate())
                .map(|()| WizardStep::Confirm),
            WizardStep::Confirm => draft
                .validate_party()
                .and_then(|()| draft.plan.validate(draft.total()))
                .map(|()| WizardStep::Pay),
            WizardStep::Pay => {
                tracing::warn!("advance rejected on the last step; submit instead");
                return SmallVec::new();
            },
        };

        match result {
            Ok(next) => {
                tracing::debug!(from = %step, to = %next, "wizard advanced");
                *step = next;
                *error = None;
            },
            Err(validation) => {
                tracing::debug!(step = %step, error = %validation, "wizard step invalid");
                *error = Some(validation.to_string());
            },
        }
        SmallVec::new()
    }

    fn submit(state: &mut ReservationState, env: &ReservationEnvironment) -> Effects {
        let (draft, request, user_id) = match &mut state.phase {
            ReservationPhase::Editing {
                step: WizardStep::Pay,
                draft,
                error,
            } => {
                let checked = draft.to_request().and_then(|request| {
                    env.credentials
                        .current_user()
                        .map(|user_id| (request, user_id))
                        .ok_or(ValidationError::NotLoggedIn)
                });
                match checked {
                    Ok((request, user_id)) => (draft.clone(), request, user_id),
                    Err(validation) => {
                        tracing::debug!(error = %validation, "submission invalid");
                        *error = Some(validation.to_string());
                        return SmallVec::new();
                    },
                }
            },
            other => {
                tracing::warn!(phase = other.name(), "submit rejected outside the pay step");
                return SmallVec::new();
            },
        };

        state.epoch += 1;
        let epoch = state.epoch;

        metrics::counter!("reservation.submitted").increment(1);
        tracing::info!(
            user_id = %user_id,
            slot_id = %request.slot_id,
            party_size = request.party_size,
            amount = %request.amount,
            epoch,
            "submitting reservation"
        );

        let effect = Self::channel_effect(env, user_id.clone(), epoch, Some(request.clone()));
        state.phase = ReservationPhase::Submitting {
            draft,
            request,
            user_id,
            submitted_at: env.clock.now(),
        };
        smallvec![effect]
    }

    fn back_to_pay(draft: ReservationDraft, error: Option<String>) -> ReservationPhase {
        ReservationPhase::Editing {
            step: WizardStep::Pay,
            draft,
            error,
        }
    }

    fn on_channel_open_failed(state: &mut ReservationState, error: ChannelError) -> Effects {
        metrics::counter!("reservation.channel.errors", "reason" => "connect").increment(1);
        match std::mem::take(&mut state.phase) {
            ReservationPhase::Submitting { draft, .. } => {
                tracing::warn!(error = %error, "payment channel unavailable; reservation not created");
                state.phase = Self::back_to_pay(draft, Some(error.user_message().to_owned()));
                SmallVec::new()
            },
            ReservationPhase::AwaitingPayment { attempt, status, .. } => {
                tracing::warn!(error = %error, "payment channel reconnect failed");
                state.phase = ReservationPhase::ChannelError {
                    attempt,
                    resume: status,
                    message: error.user_message().to_owned(),
                    fault: ChannelFault::Lost(error),
                };
                smallvec![Effect::Cancel(PAYMENT_TIMEOUT)]
            },
            other => {
                state.phase = other;
                SmallVec::new()
            },
        }
    }

    fn on_created(
        state: &mut ReservationState,
        receipt: ReservationReceipt,
        env: &ReservationEnvironment,
    ) -> Effects {
        match std::mem::take(&mut state.phase) {
            ReservationPhase::Submitting {
                draft,
                request,
                user_id,
                submitted_at,
            } => {
                tracing::info!(
                    reservation_id = ?receipt.reservation_id,
                    user_id = %user_id,
                    epoch = state.epoch,
                    "reservation created; awaiting payment"
                );
                state.phase = ReservationPhase::AwaitingPayment {
                    attempt: PaymentAttempt {
                        user_id,
                        request,
                        receipt,
                        draft,
                        submitted_at,
                    },
                    status: PaymentStatus::Requested,
                    message: REQUESTED_MESSAGE.to_owned(),
                };
                smallvec![Self::payment_timeout(env, state)]
            },
            other => {
                state.phase = other;
                SmallVec::new()
            },
        }
    }

    fn on_payment_event(
        state: &mut ReservationState,
        event: PaymentEvent,
        env: &ReservationEnvironment,
    ) -> Effects {
        let (attempt, status) = match std::mem::take(&mut state.phase) {
            ReservationPhase::AwaitingPayment { attempt, status, .. } => (attempt, status),
            other => {
                tracing::debug!(phase = other.name(), state = ?event.state, "payment event ignored");
                state.phase = other;
                return SmallVec::new();
            },
        };

        match event.state {
            PaymentState::PendingConfirmation => {
                tracing::debug!(previous = ?status, "payment pending confirmation");
                state.phase = ReservationPhase::AwaitingPayment {
                    attempt,
                    status: PaymentStatus::PendingConfirmation,
                    message: event.message.unwrap_or_else(|| PENDING_MESSAGE.to_owned()),
                };
                smallvec![Self::payment_timeout(env, state)]
            },
            PaymentState::Success => {
                let slot_id = attempt.request.slot_id.clone();
                *state.booked.entry(slot_id.clone()).or_insert(0) += attempt.request.party_size;

                metrics::counter!("reservation.payment.succeeded").increment(1);
                tracing::info!(
                    slot_id = %slot_id,
                    reservation_id = ?attempt.receipt.reservation_id,
                    party_size = attempt.request.party_size,
                    "payment succeeded"
                );
                state.phase = ReservationPhase::Resolved {
                    attempt,
                    outcome: PaymentResult::Succeeded,
                    message: event.message.unwrap_or_else(|| SUCCEEDED_MESSAGE.to_owned()),
                };
                smallvec![Effect::Cancel(PAYMENT_TIMEOUT)]
            },
            PaymentState::Failed => {
                metrics::counter!("reservation.payment.failed").increment(1);
                tracing::info!(
                    reservation_id = ?attempt.receipt.reservation_id,
                    message = ?event.message,
                    "payment failed"
                );
                state.phase = ReservationPhase::Resolved {
                    attempt,
                    outcome: PaymentResult::Failed,
                    message: event.message.unwrap_or_else(|| FAILED_MESSAGE.to_owned()),
                };
                smallvec![Effect::Cancel(PAYMENT_TIMEOUT)]
            },
        }
    }

    fn on_channel_lost(state: &mut ReservationState, error: ChannelError) -> Effects {
        match std::mem::take(&mut state.phase) {
            ReservationPhase::AwaitingPayment { attempt, status, .. } => {
                metrics::counter!("reservation.channel.errors", "reason" => "dropped").increment(1);
                tracing::warn!(error = %error, epoch = state.epoch, "payment channel lost");
                state.phase = ReservationPhase::ChannelError {
                    attempt,
                    resume: status,
                    message: error.user_message().to_owned(),
                    fault: ChannelFault::Lost(error),
                };
                smallvec![Effect::Cancel(PAYMENT_TIMEOUT)]
            },
            other => {
                tracing::debug!(phase = other.name(), "payment channel closed");
                state.phase = other;
                SmallVec::new()
            },
        }
    }

    fn on_timeout(state: &mut ReservationState) -> Effects {
        match std::mem::take(&mut state.phase) {
            ReservationPhase::AwaitingPayment { attempt, status, .. } => {
                state.epoch += 1;
                metrics::counter!("reservation.channel.errors", "reason" => "timeout").increment(1);
                tracing::warn!(
                    reservation_id = ?attempt.receipt.reservation_id,
                    "no payment result before the deadline"
                );
                state.phase = ReservationPhase::ChannelError {
                    attempt,
                    resume: status,
                    fault: ChannelFault::TimedOut,
                    message: TIMEOUT_MESSAGE.to_owned(),
                };
                smallvec![Effect::Cancel(PAYMENT_CHANNEL)]
            },
            other => {
                state.phase = other;
                SmallVec::new()
            },
        }
    }

    fn retry(state: &mut ReservationState, env: &ReservationEnvironment) -> Effects {
        match std::mem::take(&mut state.phase) {
            ReservationPhase::ChannelError { attempt, resume, .. } => {
                state.epoch += 1;
                let epoch = state.epoch;
                tracing::info!(epoch, user_id = %attempt.user_id, "reconnecting payment channel");

                let reconnect = Self::channel_effect(env, attempt.user_id.clone(), epoch, None);
                state.phase = ReservationPhase::AwaitingPayment {
                    attempt,
                    status: resume,
                    message: Self::status_message(resume).to_owned(),
                };
                smallvec![reconnect, Self::payment_timeout(env, state)]
            },
            ReservationPhase::Resolved {
                attempt,
                outcome: PaymentResult::Failed,
                ..
            } => {
                state.epoch += 1;
                tracing::info!("payment failed; back to payment details");
                state.phase = Self::back_to_pay(attempt.draft, None);
                smallvec![Effect::Cancel(PAYMENT_CHANNEL)]
            },
            other => {
                tracing::warn!(phase = other.name(), "retry rejected");
                state.phase = other;
                SmallVec::new()
            },
        }
    }

    fn close(state: &mut ReservationState) -> Effects {
        state.epoch += 1;
        let previous = std::mem::take(&mut state.phase);
        tracing::debug!(phase = previous.name(), epoch = state.epoch, "reservation flow closed");
        smallvec![Effect::Cancel(PAYMENT_CHANNEL), Effect::Cancel(PAYMENT_TIMEOUT)]
    }
}

impl Reducer for ReservationReducer {
    type State = ReservationState;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if let Some(epoch) = action.epoch().filter(|epoch| *epoch != state.epoch) {
            tracing::trace!(epoch, current = state.epoch, "stale channel action dropped");
            return SmallVec::new();
        }

        match action {
            // ========== Wizard ==========
            ReservationAction::SelectSlot { slot } => Self::select_slot(state, slot),

            ReservationAction::SetPartySize { count } => {
                if let Some((_, draft, error)) = Self::editing(state, "set_party_size") {
                    draft.set_party_size(count);
                    *error = None;
                }
                SmallVec::new()
            },

            ReservationAction::UpdateContact { contact } => {
                if let Some((_, draft, error)) = Self::editing(state, "update_contact") {
                    draft.contact = contact;
                    *error = None;
                }
                SmallVec::new()
            },

            ReservationAction::SetPaymentAccount { account } => {
                if let Some((_, draft, error)) = Self::editing(state, "set_payment_account") {
                    draft.payment_account = account;
                    *error = None;
                }
                SmallVec::new()
            },

            ReservationAction::SetPaymentPlan { plan } => {
                if let Some((_, draft, error)) = Self::editing(state, "set_payment_plan") {
                    draft.plan = plan;
                    *error = None;
                }
                SmallVec::new()
            },

            ReservationAction::Advance => Self::advance(state),

            ReservationAction::Retreat => {
                if let Some((step, _, error)) = Self::editing(state, "retreat") {
                    if let Some(previous) = step.previous() {
                        *step = previous;
                    }
                    *error = None;
                }
                SmallVec::new()
            },

            // ========== Submission ==========
            ReservationAction::Submit => Self::submit(state, env),

            ReservationAction::ChannelReady { epoch } => {
                tracing::debug!(epoch, phase = state.phase.name(), "payment channel ready");
                SmallVec::new()
            },

            ReservationAction::ChannelOpenFailed { error, .. } => {
                Self::on_channel_open_failed(state, error)
            },

            ReservationAction::ReservationCreated { receipt, .. } => {
                Self::on_created(state, receipt, env)
            },

            ReservationAction::ReservationRejected { error, .. } => {
                match std::mem::take(&mut state.phase) {
                    ReservationPhase::Submitting { draft, .. } => {
                        metrics::counter!("reservation.rejected").increment(1);
                        tracing::warn!(error = %error, "reservation rejected");
                        state.phase = Self::back_to_pay(draft, Some(error.user_message()));
                    },
                    other => state.phase = other,
                }
                SmallVec::new()
            },

            // ========== Payment reconciliation ==========
            ReservationAction::PaymentEventReceived { event, .. } => {
                Self::on_payment_event(state, event, env)
            },

            ReservationAction::ChannelFailed { error, .. } => Self::on_channel_lost(state, error),

            ReservationAction::ChannelEnded { .. } => Self::on_channel_lost(
                state,
                ChannelError::Dropped("closed by server".to_owned()),
            ),

            ReservationAction::PaymentTimedOut { timer, .. } if timer != state.timer => {
                tracing::trace!(timer, current = state.timer, "superseded payment timeout dropped");
                SmallVec::new()
            },
            ReservationAction::PaymentTimedOut { .. } => Self::on_timeout(state),

            // ========== Recovery ==========
            ReservationAction::Retry => Self::retry(state, env),

            ReservationAction::Close => Self::close(state),
        }
    }
}
