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

// Receive-decode-filter-record loop

use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{DecodeErrorPolicy, ErrorPolicy, SinkErrorPolicy};
use crate::error::ListenerError;
use crate::filter::ParameterFilter;
use crate::protocol::{ParameterBroadcast, ParameterEvent};
use crate::storage::EventSink;
use crate::transport::{Message, Subscription, ZenohSubscription};

/// Drives one subscription into one sink
///
/// Every `record` is awaited before the next message is taken off the
/// subscription, so a slow sink throttles the listener. With a queue
/// capacity set, up to that many filtered events wait between the two sides.
pub struct Listener {
    address: String,
    mode: String,
    filter: ParameterFilter,
    sink: Box<dyn EventSink>,
    policy: ErrorPolicy,
    queue_capacity: Option<usize>,
    clock: ReceiptClock,
}

impl Listener {
    pub fn new(address: impl Into<String>, filter: ParameterFilter, sink: Box<dyn EventSink>) -> Self {
        Self {
            address: address.into(),
            mode: "peer".to_string(),
            filter,
            sink,
            policy: ErrorPolicy::default(),
            queue_capacity: None,
            clock: ReceiptClock::default(),
        }
    }

    /// Zenoh session mode used by `run`
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: Option<usize>) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn filter(&self) -> &ParameterFilter {
        &self.filter
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    /// Connect and record until Ctrl+C or a fatal error
    pub async fn run(&mut self) -> Result<(), ListenerError> {
        self.run_until(interrupted()).await
    }

    /// Connect and record until `shutdown` resolves or a fatal error
    ///
    /// The subscription is closed on every exit path.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()>,
    {
        if !self.sink.health_check().await {
            warn!("{} sink failed its health check", self.sink.sink_type());
        }

        let mut subscription = ZenohSubscription::connect(&self.address, &self.mode).await?;
        let result = self.consume_until(&mut subscription, shutdown).await;

        if let Err(e) = subscription.close().await {
            warn!("Failed to release subscription: {}", e);
        }
        result
    }

    /// Consume an already open subscription until `shutdown` resolves
    pub async fn consume_until<S, F>(
        &mut self,
        subscription: &mut S,
        shutdown: F,
    ) -> Result<(), ListenerError>
    where
        S: Subscription + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.consume(subscription) => result,
            _ = shutdown => {
                info!("Program stopped manually");
                Ok(())
            }
        }
    }

    /// Consume messages until the subscription or the sink fails
    pub async fn consume<S>(&mut self, subscription: &mut S) -> Result<(), ListenerError>
    where
        S: Subscription + ?Sized,
    {
        match self.queue_capacity {
            None => self.consume_direct(subscription).await,
            Some(capacity) => self.consume_queued(subscription, capacity).await,
        }
    }

    async fn consume_direct<S>(&mut self, subscription: &mut S) -> Result<(), ListenerError>
    where
        S: Subscription + ?Sized,
    {
        loop {
            let message = subscription.recv().await?;
            if let Some(event) = admit(&mut self.clock, &self.filter, self.policy, message)? {
                deliver(self.sink.as_mut(), self.policy, event).await?;
            }
        }
    }

    async fn consume_queued<S>(
        &mut self,
        subscription: &mut S,
        capacity: usize,
    ) -> Result<(), ListenerError>
    where
        S: Subscription + ?Sized,
    {
        debug!("Decoupling receipt from the sink with a queue of {} events", capacity);

        let (tx, mut rx) = mpsc::channel::<ParameterEvent>(capacity);
        let policy = self.policy;
        let clock = &mut self.clock;
        let filter = &self.filter;
        let sink = self.sink.as_mut();

        // Stops only on error; queued events are still delivered before it surfaces
        let producer = async move {
            let stop = loop {
                let message = match subscription.recv().await {
                    Ok(message) => message,
                    Err(e) => break e,
                };
                match admit(clock, filter, policy, message) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            break ListenerError::Receive("event queue closed".to_string());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => break e,
                }
            };
            drop(tx);
            Ok::<ListenerError, ListenerError>(stop)
        };

        let consumer = async move {
            while let Some(event) = rx.recv().await {
                deliver(&mut *sink, policy, event).await?;
            }
            Ok::<(), ListenerError>(())
        };

        let (stop, ()) = tokio::try_join!(producer, consumer)?;
        Err(stop)
    }
}

/// Decode, stamp and filter one message
///
/// Returns `Ok(None)` for messages that are filtered out or skipped.
fn admit(
    clock: &mut ReceiptClock,
    filter: &ParameterFilter,
    policy: ErrorPolicy,
    message: Message,
) -> Result<Option<ParameterEvent>, ListenerError> {
    let received_at = clock.now();

    let decoded = ParameterBroadcast::decode(&message.payload)
        .and_then(|broadcast| broadcast.into_event(received_at));
    let event = match decoded {
        Ok(event) => event,
        Err(e) => match policy.on_decode_error {
            DecodeErrorPolicy::Abort => return Err(e.into()),
            DecodeErrorPolicy::Skip => {
                warn!("Skipping malformed message on '{}': {}", message.topic, e);
                return Ok(None);
            }
        },
    };

    if !filter.matches(event.name()) {
        debug!("Ignoring '{}' (not in filter)", event.name());
        return Ok(None);
    }

    let event = match event.published_at() {
        Some(_) => event,
        None => event.with_published_at(message.published_at),
    };
    Ok(Some(event))
}

async fn deliver(
    sink: &mut dyn EventSink,
    policy: ErrorPolicy,
    event: ParameterEvent,
) -> Result<(), ListenerError> {
    info!(
        parameter = event.name(),
        value = %event.value(),
        unit = event.unit(),
        "Writing data [{},{},{}]",
        event.name(),
        event.value(),
        event.unit()
    );

    let name = event.name().to_string();
    let result = match policy.on_sink_error {
        SinkErrorPolicy::Retry => sink.record_with_retry(event, policy.max_retries).await,
        SinkErrorPolicy::Abort | SinkErrorPolicy::Skip => sink.record(event).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if policy.on_sink_error == SinkErrorPolicy::Skip => {
            error!("Dropping '{}' after failed write: {}", name, e);
            Ok(())
        }
        Err(e) => Err(ListenerError::SinkWrite(e)),
    }
}

/// Resolves on Ctrl+C
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for interrupt signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Wall clock that never runs backwards within one listener
#[derive(Debug, Default)]
struct ReceiptClock {
    last: Option<DateTime<Utc>>,
}

impl ReceiptClock {
    fn now(&mut self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    fn observe(&mut self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let stamped = match self.last {
            Some(last) if last > wall => last,
            _ => wall,
        };
        self.last = Some(stamped);
        stamped
    }
}
