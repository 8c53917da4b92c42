// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Sink trait for write-only event recording

use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::SinkError;
use crate::protocol::ParameterEvent;

/// First backoff delay of `record_with_retry`
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Upper bound for the backoff delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Destination that durably records parameter events
///
/// Each `record` call is one independent, synchronous write: it returns
/// only once the backend acknowledged the event. Reading stored data back is
/// NOT part of this trait; query the backend with its own tools.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Persist a single event
    async fn record(&mut self, event: ParameterEvent) -> Result<(), SinkError>;

    /// Persist with retry on transient failures (optional, has default implementation)
    ///
    /// Permanent failures are returned immediately. Transient ones are
    /// retried up to `max_retries` times with exponential backoff.
    async fn record_with_retry(
        &mut self,
        event: ParameterEvent,
        max_retries: u32,
    ) -> Result<(), SinkError> {
        let mut attempt = 0;
        let mut delay = INITIAL_RETRY_DELAY;

        loop {
            match self.record(event.clone()).await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(
                            "Recorded '{}' after {} retries",
                            event.name(),
                            attempt
                        );
                    }
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < max_retries => {
                    warn!(
                        "Write of '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        event.name(),
                        attempt + 1,
                        max_retries,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Write of '{}' failed after {} attempts: {}",
                        event.name(),
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Health check
    async fn health_check(&self) -> bool {
        true
    }

    /// Get sink type identifier
    fn sink_type(&self) -> &str;
}
