//! Reservation flow actions.

use crate::error::{ChannelError, GatewayError};
use crate::types::{ContactDetails, PaymentEvent, PaymentPlan, ReservationReceipt, SlotSnapshot};

/// Everything the reservation reducer reacts to
///
/// Commands come from the user. The rest are produced by effects and carry
/// the channel epoch they were started under; stale ones are dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationAction {
    // Commands
    /// Choose the slot to book
    SelectSlot {
        /// Latest availability from the backend
        slot: SlotSnapshot,
    },
    /// Change the number of people (clamped)
    SetPartySize {
        /// Requested count
        count: u32,
    },
    /// Replace the contact fields
    UpdateContact {
        /// New values
        contact: ContactDetails,
    },
    /// Replace the payment number as typed
    SetPaymentAccount {
        /// Raw input
        account: String,
    },
    /// Pay in full or book now and pay a deposit
    SetPaymentPlan {
        /// Chosen plan
        plan: PaymentPlan,
    },
    /// Next wizard step
    Advance,
    /// Previous wizard step
    Retreat,
    /// Open the payment channel and create the reservation
    Submit,
    /// Recover from a failed payment or a lost channel
    Retry,
    /// Release everything and start over
    Close,

    // Effect feedback
    /// Payment channel is subscribed
    ChannelReady {
        /// Channel epoch
        epoch: u64,
    },
    /// Payment channel could not be opened
    ChannelOpenFailed {
        /// Channel epoch
        epoch: u64,
        /// Why
        error: ChannelError,
    },
    /// Backend accepted the reservation
    ReservationCreated {
        /// Channel epoch
        epoch: u64,
        /// Backend answer
        receipt: ReservationReceipt,
    },
    /// Backend refused the reservation
    ReservationRejected {
        /// Channel epoch
        epoch: u64,
        /// Why
        error: GatewayError,
    },
    /// Event from the payment channel
    PaymentEventReceived {
        /// Channel epoch
        epoch: u64,
        /// The event
        event: PaymentEvent,
    },
    /// Payment channel failed
    ChannelFailed {
        /// Channel epoch
        epoch: u64,
        /// Why
        error: ChannelError,
    },
    /// Payment channel closed by the server
    ChannelEnded {
        /// Channel epoch
        epoch: u64,
    },
    /// No payment result in time
    PaymentTimedOut {
        /// Channel epoch
        epoch: u64,
        /// Timeout generation it was armed under
        timer: u64,
    },
}

impl ReservationAction {
    /// Epoch of effect-produced actions
    #[must_use]
    pub const fn epoch(&self) -> Option<u64> {
        match self {
            Self::ChannelReady { epoch }
            | Self::ChannelOpenFailed { epoch, .. }
            | Self::ReservationCreated { epoch, .. }
            | Self::ReservationRejected { epoch, .. }
            | Self::PaymentEventReceived { epoch, .. }
            | Self::ChannelFailed { epoch, .. }
            | Self::ChannelEnded { epoch }
            | Self::PaymentTimedOut { epoch, .. } => Some(*epoch),
            _ => None,
        }
    }
}
