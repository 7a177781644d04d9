//! Scan source abstraction and reservation code parsing.

use crate::error::{CaptureError, ScanRejection};
use crate::types::{CameraFacing, ReservationId, ScanEvent};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

/// Literal prefix of every reservation code
pub const RESERVATION_PREFIX: &str = "ryfty_reservation_";

/// Decoded codes from an acquired capture device, released when dropped
pub type ScanFeed = Pin<Box<dyn Stream<Item = ScanEvent> + Send>>;

/// Something that produces decoded codes: a camera, a scanner wedge, a test script
pub trait ScanSource: Send + Sync {
    /// Acquire the device facing `facing`.
    ///
    /// The feed keeps the device until it is dropped.
    ///
    /// # Errors
    ///
    /// Returns the [`CaptureError`] class describing why the device could not
    /// be acquired. [`CaptureError::Constraint`] means a different facing may
    /// still work.
    fn acquire(
        &self,
        facing: CameraFacing,
    ) -> Pin<Box<dyn Future<Output = Result<ScanFeed, CaptureError>> + Send>>;
}

/// Extract the reservation id from a scanned code.
///
/// Accepts `ryfty_reservation_<id>` and `ryfty_reservation_{<id>}`.
///
/// # Errors
///
/// Returns the most specific [`ScanRejection`] for anything else.
pub fn parse_scan_payload(payload: &str) -> Result<ReservationId, ScanRejection> {
    let payload = payload.trim();

    let Some(rest) = payload.strip_prefix(RESERVATION_PREFIX) else {
        return Err(classify_rejection(payload));
    };

    let id = rest
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(rest)
        .trim();

    if id.is_empty() || id.contains(['{', '}']) {
        return Err(ScanRejection::InvalidFormat);
    }

    Ok(ReservationId::new(id))
}

fn classify_rejection(payload: &str) -> ScanRejection {
    if payload.starts_with("http") {
        ScanRejection::LooksLikeUrl
    } else if payload.contains('@') {
        ScanRejection::LooksLikeEmail
    } else if payload.chars().count() < 10 {
        ScanRejection::TooShort
    } else {
        ScanRejection::InvalidFormat
    }
}
