//! Push streams (channel table and wavemeter digit)
//!
//! Each stream is subscribed once and consumed until the server ends it.
//! A malformed event is logged and dropped; the stream stays open.

use crate::error::Result;
use crate::state::{parse_digit, StreamSnapshot};
use crate::view::ViewEvent;
use tokio_stream::StreamExt;
use tracing::{info, warn};

impl super::DashboardSession {
    /// Consume `/stream/values` until it ends
    pub async fn run_table_stream(&self) {
        let mut stream = match self.backend.subscribe_channel_table().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Channel table stream unavailable: {}", e);
                return;
            }
        };

        let mut received = 0u64;
        while let Some(item) = stream.next().await {
            if let Some(snapshot) = self.decode_event(item, StreamSnapshot::parse) {
                received += 1;
                self.store.replace_table(snapshot.clone());
                self.emit(ViewEvent::TableSnapshot(snapshot));
            }
        }

        info!(events = received, "Channel table stream ended");
    }

    /// Consume `/stream/digit` until it ends
    pub async fn run_digit_stream(&self) {
        let mut stream = match self.backend.subscribe_digit_value().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Digit stream unavailable: {}", e);
                return;
            }
        };

        while let Some(item) = stream.next().await {
            if let Some(Some(value)) = self.decode_event(item, parse_digit) {
                self.emit(ViewEvent::DigitValue(value));
            }
        }

        info!("Digit stream ended");
    }

    fn decode_event<T>(
        &self,
        item: Result<String>,
        parse: impl FnOnce(&str) -> Result<T>,
    ) -> Option<T> {
        let payload = match item {
            Ok(p) => p,
            Err(e) => {
                warn!("Stream transport error: {}", e);
                return None;
            }
        };
        match parse(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping stream event: {}", e);
                None
            }
        }
    }
}
