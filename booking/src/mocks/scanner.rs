//! Mock scan source for testing.

use super::{lock, LiveGuard};
use crate::error::CaptureError;
use crate::scanner::{ScanFeed, ScanSource};
use crate::types::{CameraFacing, ScanEvent};
use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock scan source.
///
/// Acquisition results are scripted in order (default: success). Codes are
/// pushed into the most recently acquired feed with [`MockScanSource::scan`].
#[derive(Debug, Default)]
pub struct MockScanSource {
    acquire_replies: Mutex<VecDeque<Result<(), CaptureError>>>,
    requested: Mutex<Vec<CameraFacing>>,
    current: Mutex<Option<mpsc::UnboundedSender<ScanEvent>>>,
    live: Arc<AtomicUsize>,
}

impl MockScanSource {
    /// Create a new mock scan source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next acquisition fail.
    pub fn fail_next(&self, error: CaptureError) {
        lock(&self.acquire_replies).push_back(Err(error));
    }

    /// Push a decoded code into the current feed.
    ///
    /// Returns `false` if no feed is live.
    pub fn scan(&self, payload: &str, captured_at: DateTime<Utc>) -> bool {
        lock(&self.current)
            .as_ref()
            .is_some_and(|sender| sender.unbounded_send(ScanEvent::new(payload, captured_at)).is_ok())
    }

    /// End the current feed as if the device disappeared.
    pub fn end_feed(&self) {
        lock(&self.current).take();
    }

    /// Facings requested so far, in order.
    #[must_use]
    pub fn requested(&self) -> Vec<CameraFacing> {
        lock(&self.requested).clone()
    }

    /// Feeds not yet dropped by their holder.
    #[must_use]
    pub fn live_feeds(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl ScanSource for MockScanSource {
    fn acquire(
        &self,
        facing: CameraFacing,
    ) -> Pin<Box<dyn Future<Output = Result<ScanFeed, CaptureError>> + Send>> {
        lock(&self.requested).push(facing);

        if let Some(Err(error)) = lock(&self.acquire_replies).pop_front() {
            return Box::pin(async move { Err(error) });
        }

        let (sender, receiver) = mpsc::unbounded();
        *lock(&self.current) = Some(sender);

        let guard = LiveGuard::new(&self.live);
        let feed: ScanFeed = Box::pin(receiver.map(move |event| {
            let _held = &guard;
            event
        }));
        Box::pin(async move { Ok(feed) })
    }
}
