//! Reservation flow: booking wizard plus asynchronous payment reconciliation.
//!
//! ```text
//! Editing(Details → Confirm → Pay) ──Submit──▶ Submitting ──created──▶ AwaitingPayment
//!        ▲                                          │                      │
//!        └──────────── gateway error ───────────────┘        success / failed / lost
//!                                                                           ▼
//!                                                   Resolved(Succeeded | Failed) | ChannelError
//! ```
//!
//! The payment channel is opened before the reservation is created, so the
//! first status event cannot be missed.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod types;

pub use actions::ReservationAction;
pub use environment::ReservationEnvironment;
pub use reducer::{ReservationReducer, PAYMENT_CHANNEL, PAYMENT_TIMEOUT};
pub use types::{
    ChannelFault, PaymentAttempt, PaymentResult, PaymentStatus, ReservationDraft,
    ReservationPhase, ReservationState, WizardStep,
};
