//! Line input: operator commands and codes from a keyboard-wedge scanner.
//!
//! Wedge scanners type the decoded code followed by Enter, so every line that
//! is not a command is treated as a scan.

use chrono::Utc;
use futures::channel::mpsc;
use ryfty_booking::checkin::CheckinAction;
use ryfty_booking::error::CaptureError;
use ryfty_booking::scanner::{ScanFeed, ScanSource};
use ryfty_booking::types::{CameraFacing, ScanEvent};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

/// What one input line means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskInput {
    /// A check-in flow command
    Command(CheckinAction),
    /// A scanned code
    Scan(String),
    /// Leave the kiosk
    Quit,
    /// Nothing to do
    Empty,
}

impl KioskInput {
    /// Interpret a line
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => Self::Empty,
            "y" | "yes" | "confirm" => Self::Command(CheckinAction::Confirm),
            "n" | "no" | "cancel" => Self::Command(CheckinAction::Cancel),
            "start" => Self::Command(CheckinAction::StartScanning),
            "stop" => Self::Command(CheckinAction::StopScanning),
            "q" | "quit" | "exit" => Self::Quit,
            _ => Self::Scan(trimmed.to_owned()),
        }
    }
}

/// [`ScanSource`] fed from input lines
///
/// There is one logical device, so the requested facing is ignored.
#[derive(Debug, Default)]
pub struct LineScanner {
    current: Mutex<Option<mpsc::UnboundedSender<ScanEvent>>>,
}

impl LineScanner {
    /// Scanner with no live feed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a code to the live feed, stamped now
    ///
    /// Returns `false` when nothing is listening.
    pub fn push(&self, payload: &str) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sender| sender.unbounded_send(ScanEvent::new(payload, Utc::now())).is_ok())
    }
}

impl ScanSource for LineScanner {
    fn acquire(
        &self,
        facing: CameraFacing,
    ) -> Pin<Box<dyn Future<Output = Result<ScanFeed, CaptureError>> + Send>> {
        tracing::debug!(facing = %facing, "line scanner attached");
        let (sender, receiver) = mpsc::unbounded();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);

        let feed: ScanFeed = Box::pin(receiver);
        Box::pin(async move { Ok(feed) })
    }
}
