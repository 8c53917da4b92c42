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

// Instrument parameter listener
//
// Subscribes to a feed of parameter broadcasts and records them:
// - Subscribes to every topic of a Zenoh endpoint
// - Decodes each payload into a parameter event stamped at receipt
// - Keeps only the configured parameter names (or all of them)
// - Records through a pluggable sink: CSV file or InfluxDB

pub mod config;
pub mod error;
pub mod filter;
pub mod listener;
pub mod logging;
pub mod protocol;
pub mod storage;
pub mod transport;
pub mod wiring;

// Re-export main types
pub use config::{load_config, validate, ConfigLoader, ListenerConfig, ListenerDocument};
pub use error::{ConfigError, DecodeError, ListenerError, SinkError};
pub use filter::ParameterFilter;
pub use listener::Listener;
pub use protocol::{ParameterBroadcast, ParameterEvent, ParameterValue};
pub use storage::{CsvSink, EventSink, InfluxSink, SinkFactory};
pub use transport::{ChannelSubscription, Message, Subscription, ZenohSubscription};
pub use wiring::ListenerFactory;
