//! Reservation flow state.
//!
//! The phase is a tagged union so a flow cannot be, say, resolved and still
//! awaiting payment at the same time.

use crate::error::{ChannelError, ValidationError};
use crate::types::{
    ContactDetails, Money, PaymentAccount, PaymentPlan, ReservationReceipt, ReservationRequest,
    SlotId, SlotSnapshot, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// Wizard step while editing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WizardStep {
    /// Contact details
    Details,
    /// Party size and payment plan review
    Confirm,
    /// Payment number entry
    Pay,
}

impl WizardStep {
    /// Step after this one
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Details => Some(Self::Confirm),
            Self::Confirm => Some(Self::Pay),
            Self::Pay => None,
        }
    }

    /// Step before this one
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Details => None,
            Self::Confirm => Some(Self::Details),
            Self::Pay => Some(Self::Confirm),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Details => f.write_str("details"),
            Self::Confirm => f.write_str("confirm"),
            Self::Pay => f.write_str("pay"),
        }
    }
}

/// In-progress booking owned by the wizard
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationDraft {
    /// Selected slot, with locally confirmed bookings folded in
    pub slot: Option<SlotSnapshot>,
    /// Number of people, kept within `[1, remaining]`
    pub party_size: u32,
    /// Contact fields
    pub contact: ContactDetails,
    /// Payment number as typed; validated on submit
    pub payment_account: String,
    /// Full payment or deposit
    pub plan: PaymentPlan,
}

impl Default for ReservationDraft {
    fn default() -> Self {
        Self {
            slot: None,
            party_size: 1,
            contact: ContactDetails::default(),
            payment_account: String::new(),
            plan: PaymentPlan::Full,
        }
    }
}

impl ReservationDraft {
    /// Largest bookable party, if a slot is selected
    #[must_use]
    pub fn max_party_size(&self) -> Option<u32> {
        self.slot.as_ref().map(SlotSnapshot::remaining)
    }

    /// Unit price times party size
    #[must_use]
    pub fn total(&self) -> Money {
        self.slot
            .as_ref()
            .map_or(Money::ZERO, |slot| slot.unit_price.times(self.party_size))
    }

    /// Set the party size, clamped into the bookable range.
    ///
    /// A sold-out slot forces zero. A deposit plan follows the new total.
    pub fn set_party_size(&mut self, count: u32) {
        self.party_size = match self.max_party_size() {
            Some(0) => 0,
            Some(max) => count.clamp(1, max),
            None => count.max(1),
        };
        if self.plan.is_deposit() {
            self.plan = PaymentPlan::default_deposit(self.total());
        }
    }

    /// Check that the party can be booked
    ///
    /// # Errors
    ///
    /// [`ValidationError::NoSlotSelected`], [`ValidationError::SlotFull`] or
    /// [`ValidationError::PartySize`].
    pub fn validate_party(&self) -> Result<(), ValidationError> {
        let max = self.max_party_size().ok_or(ValidationError::NoSlotSelected)?;
        if max == 0 {
            return Err(ValidationError::SlotFull);
        }
        if !(1..=max).contains(&self.party_size) {
            return Err(ValidationError::PartySize { max });
        }
        Ok(())
    }

    /// Build the request for a submission attempt
    ///
    /// # Errors
    ///
    /// Any local validation failure; nothing invalid reaches the gateway.
    pub fn to_request(&self) -> Result<ReservationRequest, ValidationError> {
        let slot = self.slot.as_ref().ok_or(ValidationError::NoSlotSelected)?;
        self.contact.validate()?;
        self.validate_party()?;
        let payment_account = PaymentAccount::parse(&self.payment_account)?;

        let total = self.total();
        self.plan.validate(total)?;
        let amount = self.plan.amount_due(total);

        Ok(ReservationRequest {
            slot_id: slot.slot_id.clone(),
            experience_id: slot.experience_id.clone(),
            amount,
            total_amount: total,
            remaining_amount: total.saturating_sub(amount),
            party_size: self.party_size,
            payment_account,
            deposit: self.plan.is_deposit(),
        })
    }
}

/// Payment status of an attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    /// Reservation created, payment prompt requested
    Requested,
    /// Backend reported the prompt is waiting on the customer
    PendingConfirmation,
    /// Paid
    Succeeded,
    /// Not paid
    Failed,
    /// Lost track of the payment; reconnect to resume
    ChannelError,
}

/// Final payment result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaymentResult {
    /// Paid
    Succeeded,
    /// Not paid
    Failed,
}

impl From<PaymentResult> for PaymentStatus {
    fn from(result: PaymentResult) -> Self {
        match result {
            PaymentResult::Succeeded => Self::Succeeded,
            PaymentResult::Failed => Self::Failed,
        }
    }
}

/// Why the flow lost track of a payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelFault {
    /// The channel failed or could not be reopened
    Lost(ChannelError),
    /// No result arrived in time
    TimedOut,
}

/// A reservation that was accepted by the backend and is being paid for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentAttempt {
    /// Who the channel is opened for
    pub user_id: UserId,
    /// What was sent
    pub request: ReservationRequest,
    /// What the backend answered
    pub receipt: ReservationReceipt,
    /// The draft it came from, restored if the payment fails
    pub draft: ReservationDraft,
    /// When the reservation was submitted
    pub submitted_at: DateTime<Utc>,
}

/// Where the flow is
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationPhase {
    /// Filling in the wizard
    Editing {
        /// Current step
        step: WizardStep,
        /// Draft being edited
        draft: ReservationDraft,
        /// Last validation or submission error
        error: Option<String>,
    },
    /// Channel opening and create call in flight
    Submitting {
        /// Draft being submitted
        draft: ReservationDraft,
        /// Request being sent
        request: ReservationRequest,
        /// Who submitted
        user_id: UserId,
        /// When
        submitted_at: DateTime<Utc>,
    },
    /// Reservation created, waiting for the payment result
    AwaitingPayment {
        /// The attempt
        attempt: PaymentAttempt,
        /// `Requested` or `PendingConfirmation`
        status: PaymentStatus,
        /// What to show
        message: String,
    },
    /// Payment result received
    Resolved {
        /// The attempt
        attempt: PaymentAttempt,
        /// Paid or not
        outcome: PaymentResult,
        /// What to show
        message: String,
    },
    /// Lost the payment channel
    ChannelError {
        /// The attempt, kept so a retry resumes without resubmitting
        attempt: PaymentAttempt,
        /// Status to resume with
        resume: PaymentStatus,
        /// What went wrong
        fault: ChannelFault,
        /// What to show
        message: String,
    },
}

impl ReservationPhase {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Editing { .. } => "editing",
            Self::Submitting { .. } => "submitting",
            Self::AwaitingPayment { .. } => "awaiting_payment",
            Self::Resolved { .. } => "resolved",
            Self::ChannelError { .. } => "channel_error",
        }
    }
}

impl Default for ReservationPhase {
    fn default() -> Self {
        Self::Editing {
            step: WizardStep::Details,
            draft: ReservationDraft::default(),
            error: None,
        }
    }
}

/// Reservation flow state for one session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservationState {
    /// Current phase
    pub phase: ReservationPhase,
    /// Bumped whenever the channel is (re)opened or released
    pub epoch: u64,
    /// Bumped whenever the payment timeout is (re)armed
    pub timer: u64,
    /// Places booked and paid for in this session, per slot
    pub booked: HashMap<SlotId, u32>,
}

impl ReservationState {
    /// Fresh state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payment status, if an attempt is live
    #[must_use]
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        match &self.phase {
            ReservationPhase::Editing { .. } => None,
            ReservationPhase::Submitting { .. } => Some(PaymentStatus::Requested),
            ReservationPhase::AwaitingPayment { status, .. } => Some(*status),
            ReservationPhase::Resolved { outcome, .. } => Some(PaymentStatus::from(*outcome)),
            ReservationPhase::ChannelError { .. } => Some(PaymentStatus::ChannelError),
        }
    }

    /// Current wizard step, if editing
    #[must_use]
    pub const fn step(&self) -> Option<WizardStep> {
        match &self.phase {
            ReservationPhase::Editing { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The draft, in any phase that has one
    #[must_use]
    pub const fn draft(&self) -> Option<&ReservationDraft> {
        match &self.phase {
            ReservationPhase::Editing { draft, .. } | ReservationPhase::Submitting { draft, .. } => {
                Some(draft)
            },
            ReservationPhase::AwaitingPayment { attempt, .. }
            | ReservationPhase::Resolved { attempt, .. }
            | ReservationPhase::ChannelError { attempt, .. } => Some(&attempt.draft),
        }
    }

    /// Error or status text to show, if any
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match &self.phase {
            ReservationPhase::Editing { error, .. } => error.as_deref(),
            ReservationPhase::Submitting { .. } => None,
            ReservationPhase::AwaitingPayment { message, .. }
            | ReservationPhase::Resolved { message, .. }
            | ReservationPhase::ChannelError { message, .. } => Some(message),
        }
    }

    /// Places this session has booked on `slot_id`
    #[must_use]
    pub fn booked_locally(&self, slot_id: &SlotId) -> u32 {
        self.booked.get(slot_id).copied().unwrap_or(0)
    }
}
