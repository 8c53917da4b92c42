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

// Pub/sub subscriptions feeding the listener
//
// A subscription yields two-part messages: the topic the publisher used and
// the raw payload. Decoding the payload is the listener's job.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;
use zenoh::Session;

use crate::error::{ConfigError, ListenerError};

/// Key expression matching every topic
pub const ALL_TOPICS: &str = "**";

/// How long `connect` keeps trying to reach the endpoint
pub const CONNECT_TIMEOUT_MS: u64 = 3000;

/// One message taken off a subscription
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
    /// Transport-level publish time, if the publisher stamped one
    pub published_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            published_at: None,
        }
    }
}

#[async_trait]
pub trait Subscription: Send {
    /// Block until the next message arrives
    async fn recv(&mut self) -> Result<Message, ListenerError>;

    /// Release the underlying connection
    async fn close(&mut self) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Convert a listener address into a zenoh endpoint
///
/// Accepts both `tcp://host:port` and zenoh's own `tcp/host:port`.
pub fn to_endpoint(address: &str) -> Result<String, ConfigError> {
    let address = address.trim();
    let (protocol, locator) = address
        .split_once("://")
        .or_else(|| address.split_once('/'))
        .ok_or_else(|| ConfigError::Invalid {
            field: "address",
            reason: format!("'{}' is not of the form <protocol>://<host>:<port>", address),
        })?;

    if protocol.is_empty()
        || locator.is_empty()
        || !protocol.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Invalid {
            field: "address",
            reason: format!("'{}' is not of the form <protocol>://<host>:<port>", address),
        });
    }

    Ok(format!("{}/{}", protocol, locator))
}

/// Zenoh subscriber on every key expression
pub struct ZenohSubscription {
    session: Session,
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
    address: String,
}

impl ZenohSubscription {
    /// Open a session connected to `address` and subscribe to all topics
    pub async fn connect(address: &str, mode: &str) -> Result<Self, ListenerError> {
        let endpoint = to_endpoint(address)?;
        let connect_error = |reason: String| ListenerError::Connect {
            address: address.to_string(),
            reason,
        };

        let mut config = zenoh::Config::default();
        config
            .insert_json5("mode", &serde_json::json!(mode).to_string())
            .map_err(|e| connect_error(e.to_string()))?;
        config
            .insert_json5("connect/endpoints", &serde_json::json!([endpoint]).to_string())
            .map_err(|e| connect_error(e.to_string()))?;
        // Peers otherwise open the session and keep retrying in the background
        config
            .insert_json5("connect/exit_on_failure", "true")
            .map_err(|e| connect_error(e.to_string()))?;
        config
            .insert_json5("connect/timeout_ms", &CONNECT_TIMEOUT_MS.to_string())
            .map_err(|e| connect_error(e.to_string()))?;

        info!("Connecting to {}", address);

        let session = zenoh::open(config)
            .await
            .map_err(|e| connect_error(format!("failed to open Zenoh session: {}", e)))?;

        let subscriber = session
            .declare_subscriber(ALL_TOPICS)
            .await
            .map_err(|e| connect_error(format!("failed to declare subscriber: {}", e)))?;

        info!("Listener connected to {} ({} mode)", endpoint, mode);

        Ok(Self {
            session,
            subscriber,
            address: address.to_string(),
        })
    }
}

#[async_trait]
impl Subscription for ZenohSubscription {
    async fn recv(&mut self) -> Result<Message, ListenerError> {
        let sample = self
            .subscriber
            .recv_async()
            .await
            .map_err(|e| ListenerError::Receive(e.to_string()))?;

        let published_at = sample
            .timestamp()
            .map(|ts| DateTime::<Utc>::from(ts.get_time().to_system_time()));

        Ok(Message {
            topic: sample.key_expr().as_str().to_string(),
            payload: Bytes::from(sample.payload().to_bytes().into_owned()),
            published_at,
        })
    }

    async fn close(&mut self) -> Result<(), ListenerError> {
        debug!("Closing Zenoh session for {}", self.address);
        self.session
            .close()
            .await
            .map_err(|e| ListenerError::Close(e.to_string()))
    }
}

/// In-process subscription fed through a bounded channel
///
/// Lets other parts of a process (and tests) drive a listener without a
/// network transport.
pub struct ChannelSubscription {
    receiver: mpsc::Receiver<Message>,
}

impl ChannelSubscription {
    pub fn new(capacity: usize) -> (mpsc::Sender<Message>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl Subscription for ChannelSubscription {
    async fn recv(&mut self) -> Result<Message, ListenerError> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| ListenerError::Receive("all publishers disconnected".to_string()))
    }

    async fn close(&mut self) -> Result<(), ListenerError> {
        self.receiver.close();
        Ok(())
    }
}
