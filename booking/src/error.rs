//! Error types for the booking flows.
//!
//! Every error maps to a human-readable message through `Display` or a
//! dedicated accessor; raw status codes never reach the operator.

use crate::types::Money;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════
// Local validation
// ═══════════════════════════════════════════════════════════

/// Input rejected before anything is sent to the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A contact field is empty.
    #[error("Please enter your {field}.")]
    MissingContact {
        /// Which field
        field: &'static str,
    },

    /// No slot has been selected.
    #[error("Please select a time slot.")]
    NoSlotSelected,

    /// The slot has no places left.
    #[error("This slot is fully booked.")]
    SlotFull,

    /// Party size is outside the bookable range.
    #[error("Please select between 1 and {max} people.")]
    PartySize {
        /// Largest bookable party
        max: u32,
    },

    /// The payment number is not a valid mobile-money number.
    #[error("Please enter a valid M-Pesa number (e.g. 0712345678).")]
    PaymentAccount,

    /// The deposit is zero or larger than the total.
    #[error("Deposit must be more than zero and at most {total}.")]
    Deposit {
        /// Requested deposit
        amount: Money,
        /// Booking total
        total: Money,
    },

    /// No user session.
    #[error("Please log in to make a reservation.")]
    NotLoggedIn,
}

// ═══════════════════════════════════════════════════════════
// Gateway (request/response backend calls)
// ═══════════════════════════════════════════════════════════

/// A backend call failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The backend refused the request (4xx).
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Backend message
        message: String,
    },

    /// Missing or expired credentials (401).
    #[error("unauthorized")]
    Unauthorized,

    /// The backend failed (5xx).
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status
        status: u16,
        /// Backend message
        message: String,
    },

    /// A status the operation does not expect.
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// 4xx family, including `Unauthorized`
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Unauthorized)
    }

    /// 5xx family
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Text to show the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Rejected { .. } => "The reservation could not be made. Please check your details.".to_owned(),
            Self::Unauthorized => "Your session has expired. Please log in again.".to_owned(),
            Self::Server { .. } | Self::UnexpectedStatus(_) | Self::Decode(_) => {
                "Something went wrong on our side. Please try again.".to_owned()
            },
            Self::Transport(_) => "Network error. Please check your connection and try again.".to_owned(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Push channel
// ═══════════════════════════════════════════════════════════

/// The payment event channel failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Could not connect.
    #[error("could not connect to payment updates: {0}")]
    Connect(String),

    /// The server refused the subscription.
    #[error("payment updates refused with status {0}")]
    Rejected(u16),

    /// The connection dropped mid-stream.
    #[error("payment updates connection lost: {0}")]
    Dropped(String),

    /// A frame could not be decoded.
    #[error("invalid payment update: {0}")]
    Decode(String),
}

impl ChannelError {
    /// Text to show the user
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Connect(_) | Self::Rejected(_) => {
                "Could not connect to payment updates. Please try again."
            },
            Self::Dropped(_) | Self::Decode(_) => {
                "Lost connection to payment updates. Your reservation may still complete; retry to reconnect."
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Capture source
// ═══════════════════════════════════════════════════════════

/// The scan source could not be acquired.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The user or platform refused access.
    #[error("permission denied")]
    PermissionDenied,

    /// No capture device present.
    #[error("no capture device")]
    NoDevice,

    /// Another application holds the device.
    #[error("device busy")]
    DeviceBusy,

    /// The platform cannot capture at all.
    #[error("capture unsupported")]
    Unsupported,

    /// The requested constraints (e.g. facing) cannot be satisfied.
    #[error("constraints cannot be satisfied")]
    Constraint,

    /// Anything else.
    #[error("capture failed: {0}")]
    Other(String),
}

impl CaptureError {
    /// What the operator should do about it
    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Camera access denied. Please allow camera access to scan QR codes.".to_owned()
            },
            Self::NoDevice => "No camera found. Please ensure your device has a camera.".to_owned(),
            Self::DeviceBusy => "Camera is already in use by another application.".to_owned(),
            Self::Unsupported => {
                "Camera not supported. Please use a device with camera support.".to_owned()
            },
            Self::Constraint => {
                "Unable to access any camera. Please check your settings and try again.".to_owned()
            },
            Self::Other(detail) => format!("Failed to access camera: {detail}"),
        }
    }

    /// Short label for logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::NoDevice => "no_device",
            Self::DeviceBusy => "device_busy",
            Self::Unsupported => "unsupported",
            Self::Constraint => "constraint",
            Self::Other(_) => "other",
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Scan payloads
// ═══════════════════════════════════════════════════════════

/// A scanned code is not a reservation code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanRejection {
    /// Looks like a website link.
    #[error("This appears to be a website QR code. Please scan a reservation QR code.")]
    LooksLikeUrl,

    /// Looks like an email address.
    #[error("This appears to be an email QR code. Please scan a reservation QR code.")]
    LooksLikeEmail,

    /// Too short to be anything useful.
    #[error("This QR code is too short. Please scan a reservation QR code.")]
    TooShort,

    /// Anything else.
    #[error("Invalid QR code format. Expected reservation QR code.")]
    InvalidFormat,
}

impl ScanRejection {
    /// Short label for logs and metrics
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::LooksLikeUrl => "url",
            Self::LooksLikeEmail => "email",
            Self::TooShort => "too_short",
            Self::InvalidFormat => "invalid_format",
        }
    }
}
