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

// Listener factory: configuration in, running listener out

use tracing::{error, info};

use crate::config::{validate, ListenerConfig, ListenerDocument};
use crate::error::ListenerError;
use crate::filter::ParameterFilter;
use crate::listener::Listener;
use crate::storage::SinkFactory;

pub struct ListenerFactory;

impl ListenerFactory {
    /// Build a listener from a validated configuration
    ///
    /// Opens the sink (loading an existing CSV table, preparing the
    /// InfluxDB client) but does not connect to the feed yet.
    pub fn build(config: &ListenerConfig) -> Result<Listener, ListenerError> {
        let sink = SinkFactory::create(&config.sink).map_err(|e| {
            error!("Failed to initialise {} sink: {}", config.sink.listener_type(), e);
            ListenerError::SinkSetup(e)
        })?;

        info!(
            "{} listener on {} recording {}",
            config.sink.listener_type(),
            config.address,
            if config.params.is_empty() {
                "all parameters".to_string()
            } else {
                config.params.join(", ")
            }
        );

        Ok(Listener::new(
            config.address.as_str(),
            ParameterFilter::new(config.params.iter().cloned()),
            sink,
        )
        .with_mode(config.mode.as_str())
        .with_policy(config.policy)
        .with_queue_capacity(config.queue_capacity))
    }

    /// Validate a raw document and build its listener
    ///
    /// Rejected documents are logged and produce no listener, no file access
    /// and no connection attempt.
    pub fn from_document(document: &ListenerDocument) -> Result<Listener, ListenerError> {
        let config = validate(document).map_err(|e| {
            error!("{}", e);
            ListenerError::Config(e)
        })?;
        Self::build(&config)
    }

    /// Validate, build and run until interrupted
    pub async fn start(document: &ListenerDocument) -> Result<(), ListenerError> {
        let mut listener = Self::from_document(document)?;
        listener.run().await.map_err(|e| {
            error!("Listener stopped: {}", e);
            e
        })
    }
}
