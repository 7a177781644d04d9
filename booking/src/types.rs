//! Domain types shared by the reservation and check-in flows.
//!
//! Identifiers are opaque strings issued by the backend. Money is kept in
//! minor units to avoid floating point arithmetic.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a backend-issued identifier
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw identifier
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a bookable time slot
    SlotId
);
string_id!(
    /// Identifier of an experience (the thing being booked)
    ExperienceId
);
string_id!(
    /// Identifier of a reservation, as encoded in check-in QR codes
    ReservationId
);
string_id!(
    /// Identifier of the logged-in customer; scopes the payment event channel
    UserId
);

// ============================================================================
// Money Value Object (minor units)
// ============================================================================

/// An amount of money in minor units (cents)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole units, saturating on overflow
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiply by a quantity, saturating on overflow
    #[must_use]
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Subtract, flooring at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Half the amount, rounded down
    #[must_use]
    pub const fn half(self) -> Self {
        Self(self.0 / 2)
    }

    /// Decimal form without a currency, dropping a zero fraction
    /// (`1500`, `1500.50`); the backend accepts amounts as strings in this shape.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        let (units, cents) = (self.0 / 100, self.0 % 100);
        if cents == 0 {
            units.to_string()
        } else {
            format!("{units}.{cents:02}")
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KES {}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Slots and drafts
// ============================================================================

/// Availability of a slot as last seen by the client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    /// Slot identifier
    pub slot_id: SlotId,
    /// Experience the slot belongs to
    pub experience_id: ExperienceId,
    /// Price per person
    pub unit_price: Money,
    /// Total places
    pub capacity: u32,
    /// Places already taken
    pub booked: u32,
}

impl SlotSnapshot {
    /// Places still available
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.booked)
    }

    /// Whether nothing can be booked
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.remaining() == 0
    }
}

/// Customer contact fields collected on the details step
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
    /// Contact phone number
    pub phone: String,
}

impl ContactDetails {
    /// Check that every field has content
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingContact`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [("name", &self.name), ("email", &self.email), ("phone", &self.phone)] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingContact { field });
            }
        }
        Ok(())
    }
}

/// A validated mobile-money (M-Pesa) number, normalized to `2547XXXXXXXX` form
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentAccount(String);

impl PaymentAccount {
    /// Parse user input, ignoring spaces and dashes
    ///
    /// Accepts `07XXXXXXXX`, `01XXXXXXXX` and their international forms
    /// `2547XXXXXXXX`, `2541XXXXXXXX` (a leading `+` is allowed).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PaymentAccount`] for anything else.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let digits: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let digits = digits.strip_prefix('+').unwrap_or(&digits);

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::PaymentAccount);
        }

        let subscriber = match digits.len() {
            10 if digits.starts_with("07") || digits.starts_with("01") => &digits[1..],
            12 if digits.starts_with("2547") || digits.starts_with("2541") => &digits[3..],
            _ => return Err(ValidationError::PaymentAccount),
        };

        Ok(Self(format!("254{subscriber}")))
    }

    /// The normalized number
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How much is charged when the reservation is made
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentPlan {
    /// Pay the whole total now
    #[default]
    Full,
    /// Book now, pay later: charge a deposit now, the rest later
    Deposit {
        /// Amount charged now
        amount: Money,
    },
}

impl PaymentPlan {
    /// The default deposit plan for a total: half, rounded down
    #[must_use]
    pub const fn default_deposit(total: Money) -> Self {
        Self::Deposit {
            amount: total.half(),
        }
    }

    /// Whether this is a deposit plan
    #[must_use]
    pub const fn is_deposit(&self) -> bool {
        matches!(self, Self::Deposit { .. })
    }

    /// Amount charged now for the given total
    #[must_use]
    pub const fn amount_due(&self, total: Money) -> Money {
        match self {
            Self::Full => total,
            Self::Deposit { amount } => *amount,
        }
    }

    /// Check the plan against a total
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Deposit`] unless `0 < deposit <= total`.
    pub fn validate(&self, total: Money) -> Result<(), ValidationError> {
        match self {
            Self::Full => Ok(()),
            Self::Deposit { amount } if amount.is_zero() || *amount > total => {
                Err(ValidationError::Deposit {
                    amount: *amount,
                    total,
                })
            },
            Self::Deposit { .. } => Ok(()),
        }
    }
}

/// Immutable snapshot sent to the backend, one per submission attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    /// Slot being booked
    pub slot_id: SlotId,
    /// Experience the slot belongs to
    pub experience_id: ExperienceId,
    /// Amount charged now
    pub amount: Money,
    /// Full price of the booking
    pub total_amount: Money,
    /// Balance left after this charge (zero unless paying a deposit)
    pub remaining_amount: Money,
    /// Number of people
    pub party_size: u32,
    /// Account the payment prompt is sent to
    pub payment_account: PaymentAccount,
    /// Whether this is a book-now-pay-later deposit
    pub deposit: bool,
}

/// What the backend returns for an accepted reservation request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReceipt {
    /// Reservation identifier, when the backend includes one
    pub reservation_id: Option<ReservationId>,
    /// Backend message
    pub message: Option<String>,
}

// ============================================================================
// Payment events
// ============================================================================

/// Payment state reported on the push channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// The payment prompt is out, waiting for the customer
    PendingConfirmation,
    /// Payment went through
    Success,
    /// Payment was declined, cancelled, or timed out upstream
    Failed,
}

impl PaymentState {
    /// Parse the wire name
    #[must_use]
    pub fn from_wire(state: &str) -> Option<Self> {
        match state {
            "pending_confirmation" => Some(Self::PendingConfirmation),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this state ends the payment attempt
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// One event from the payment channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Reported state
    pub state: PaymentState,
    /// Human-readable detail, if the backend sent one
    pub message: Option<String>,
    /// When the backend emitted the event
    pub sent_at: Option<DateTime<Utc>>,
}

impl PaymentEvent {
    /// Event with just a state
    #[must_use]
    pub const fn new(state: PaymentState) -> Self {
        Self {
            state,
            message: None,
            sent_at: None,
        }
    }

    /// Attach a message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Parse a channel payload
    ///
    /// The state is read from `data.state`, `status.state` or a top-level
    /// `state`, in that order. Returns `Ok(None)` for well-formed JSON that
    /// carries no known state (keep-alives, unrelated notifications).
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the payload is not JSON at all.
    pub fn from_json(payload: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(payload)?;

        let body = ["data", "status"]
            .iter()
            .filter_map(|key| value.get(key))
            .find(|inner| inner.get("state").is_some())
            .unwrap_or(&value);

        let Some(state) = body
            .get("state")
            .and_then(serde_json::Value::as_str)
            .and_then(PaymentState::from_wire)
        else {
            return Ok(None);
        };

        let message = body
            .get("message")
            .or_else(|| value.get("message"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);

        let sent_at = value
            .get("sent_at")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(Some(Self {
            state,
            message,
            sent_at,
        }))
    }
}

// ============================================================================
// Check-in
// ============================================================================

/// Which way the camera faces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    /// Rear camera, the preferred one for scanning
    Environment,
    /// Front camera, the fallback when constraints cannot be met
    User,
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("environment"),
            Self::User => f.write_str("user"),
        }
    }
}

/// A raw decoded payload plus its capture time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanEvent {
    /// Decoded text
    pub payload: String,
    /// When the frame was captured
    pub captured_at: DateTime<Utc>,
}

impl ScanEvent {
    /// Create a scan event
    #[must_use]
    pub fn new(payload: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            payload: payload.into(),
            captured_at,
        }
    }
}

/// A validated scan awaiting confirmation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCheckin {
    /// Reservation extracted from the code
    pub reservation_id: ReservationId,
    /// When the code was scanned
    pub scanned_at: DateTime<Utc>,
}

/// Check-in result as reported by the backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckinReply {
    /// Guest admitted
    Success {
        /// Backend message, usually "<name> checked in successfully"
        message: String,
        /// Party size on the reservation
        number_of_guests: Option<u32>,
    },
    /// The reservation was checked in before
    AlreadyCheckedIn,
    /// No such reservation
    NotFound,
}

/// What the kiosk shows after a confirmation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckinOutcome {
    /// Guest admitted
    Success {
        /// Number of guests admitted
        guest_count: u32,
        /// Greeting, e.g. "Welcome, Jane Doe!"
        welcome_name: String,
    },
    /// Duplicate check-in
    AlreadyCheckedIn,
    /// Unknown reservation
    NotFound,
    /// Anything else went wrong
    Error {
        /// What to tell the operator
        message: String,
    },
}

impl CheckinOutcome {
    const SUCCESS_SUFFIX: &'static str = " checked in successfully";

    /// Build the success outcome from the backend reply
    #[must_use]
    pub fn success(message: &str, number_of_guests: Option<u32>) -> Self {
        Self::Success {
            guest_count: number_of_guests.filter(|n| *n > 0).unwrap_or(1),
            welcome_name: Self::welcome_from(message),
        }
    }

    /// Greeting derived from "<name> checked in successfully"
    ///
    /// Falls back to a generic greeting when the phrase is missing.
    #[must_use]
    pub fn welcome_from(message: &str) -> String {
        message
            .find(Self::SUCCESS_SUFFIX)
            .map(|end| message[..end].trim())
            .filter(|name| !name.is_empty())
            .map_or_else(|| "Welcome!".to_owned(), |name| format!("Welcome, {name}!"))
    }

    /// The text shown to the operator
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Success {
                guest_count,
                welcome_name,
            } => {
                let guests = if *guest_count == 1 { "guest" } else { "guests" };
                format!("{welcome_name} {guest_count} {guests} checked in.")
            },
            Self::AlreadyCheckedIn => "This customer has already been checked in.".to_owned(),
            Self::NotFound => {
                "Reservation not found. Please check the QR code and try again.".to_owned()
            },
            Self::Error { message } => message.clone(),
        }
    }

    /// Short label for logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::AlreadyCheckedIn => "already_checked_in",
            Self::NotFound => "not_found",
            Self::Error { .. } => "error",
        }
    }
}

/// Where a check-in device was authorized
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Experience the device checks guests in for
    pub experience_id: Option<ExperienceId>,
    /// Slot the device is bound to
    pub slot_id: Option<SlotId>,
    /// Name given by the provider
    pub device_name: Option<String>,
    /// Who authorized the device
    pub authorized_by: Option<String>,
}
