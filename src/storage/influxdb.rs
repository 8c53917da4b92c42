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

// InfluxDB v2 sink implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::EventSink;
use super::line_protocol::{FieldValue, Point};
use crate::config::{InfluxConfig, TimestampSource};
use crate::error::SinkError;
use crate::protocol::ParameterEvent;

/// Writes one point per event; batching is disabled so every failure maps
/// to exactly one event
pub struct InfluxSink {
    client: Client,
    base_url: String,
    org: String,
    bucket: String,
    measurement: String,
    timestamp_source: TimestampSource,
}

impl InfluxSink {
    pub fn new(config: InfluxConfig) -> Result<Self, SinkError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth_value = format!("Token {}", config.token);
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_value)
                .map_err(|_| SinkError::Setup("Invalid API token".to_string()))?,
        );

        let client = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| SinkError::Setup(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "Writing to InfluxDB at {} (org '{}', bucket '{}')",
            config.url, config.org, config.bucket
        );

        Ok(Self {
            client,
            base_url: config.url,
            org: config.org,
            bucket: config.bucket,
            measurement: config.measurement,
            timestamp_source: config.timestamp_source,
        })
    }

    fn point_time(&self, event: &ParameterEvent) -> DateTime<Utc> {
        match self.timestamp_source {
            TimestampSource::Record => Utc::now(),
            TimestampSource::Publish => event.published_at().unwrap_or(event.timestamp()),
        }
    }

    /// Line protocol for one event: tag `name`, field `value`
    pub fn line_for(&self, event: &ParameterEvent) -> Result<String, SinkError> {
        let value = FieldValue::try_from(event.value()).map_err(|reason| SinkError::InvalidValue {
            name: event.name().to_string(),
            reason,
        })?;

        let time = self.point_time(event);
        let timestamp_ns = time.timestamp_nanos_opt().ok_or_else(|| SinkError::InvalidValue {
            name: event.name().to_string(),
            reason: format!("timestamp {} is out of range", time),
        })?;

        Point::new(self.measurement.as_str())
            .tag("name", event.name())
            .field("value", value)
            .timestamp_ns(timestamp_ns)
            .to_line()
    }
}

#[async_trait]
impl EventSink for InfluxSink {
    async fn record(&mut self, event: ParameterEvent) -> Result<(), SinkError> {
        let line = self.line_for(&event)?;
        let url = format!("{}/api/v2/write", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status { status, body });
        }

        debug!("Wrote point for '{}' to bucket '{}'", event.name(), self.bucket);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Health check failed with status: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Health check error: {}", e);
                false
            }
        }
    }

    fn sink_type(&self) -> &str {
        "influxdb"
    }
}
