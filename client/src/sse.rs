//! Payment updates over server-sent events.
//!
//! The backend pushes one `data:` frame per payment status change on
//! `GET /events/{user_id}`. Frames are decoded incrementally so chunk
//! boundaries may fall anywhere, including inside a multi-byte character.

use crate::config::ClientConfig;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use ryfty_booking::error::ChannelError;
use ryfty_booking::notification::{NotificationChannel, PaymentSubscription};
use ryfty_booking::types::{PaymentEvent, UserId};
use std::future::Future;
use std::pin::Pin;

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, if present
    pub event: Option<String>,
    /// `data:` lines joined with newlines
    pub data: String,
}

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    /// Empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            // Whole lines end on an ASCII byte, so no character is split here.
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line
            .split_once(':')
            .map_or((line, ""), |(field, value)| {
                (field, value.strip_prefix(' ').unwrap_or(value))
            });

        match field {
            "data" => self.data.push(value.to_owned()),
            "event" => self.event = Some(value.to_owned()),
            _ => {},
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// [`NotificationChannel`] backed by the backend's event stream
#[derive(Clone)]
pub struct SseNotificationChannel {
    client: Client,
    config: ClientConfig,
}

impl SseNotificationChannel {
    /// Create a channel
    ///
    /// The stream stays open indefinitely, so the request timeout only bounds
    /// connection setup.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        Ok(Self { client, config })
    }
}

impl NotificationChannel for SseNotificationChannel {
    fn open(
        &self,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentSubscription, ChannelError>> + Send>> {
        let url = self.config.url(&format!("/events/{user_id}"));
        let client = self.client.clone();

        Box::pin(async move {
            let response = client
                .get(&url)
                .header(ACCEPT, "text/event-stream")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await
                .map_err(|e| ChannelError::Connect(e.to_string()))?;

            if !response.status().is_success() {
                return Err(ChannelError::Rejected(response.status().as_u16()));
            }
            tracing::debug!(user_id = %user_id, "payment event stream open");

            let bytes = response.bytes_stream();
            let subscription: PaymentSubscription = Box::pin(async_stream::stream! {
                let mut decoder = SseDecoder::new();

                for await chunk in bytes {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            yield Err(ChannelError::Dropped(e.to_string()));
                            return;
                        },
                    };

                    for frame in decoder.push(&chunk) {
                        match PaymentEvent::from_json(&frame.data) {
                            Ok(Some(event)) => yield Ok(event),
                            Ok(None) => {
                                tracing::debug!(data = %frame.data, "event without a payment state skipped");
                            },
                            Err(e) => {
                                yield Err(ChannelError::Decode(e.to_string()));
                                return;
                            },
                        }
                    }
                }
                tracing::debug!(user_id = %user_id, "payment event stream closed by server");
            });

            Ok(subscription)
        })
    }
}
