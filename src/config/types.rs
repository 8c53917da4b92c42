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

// Configuration types for the parameter listener

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration document exactly as written on disk
///
/// Every field is optional here; `validate` turns a document into a
/// `ListenerConfig` or explains what is missing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerDocument {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Older spelling of `type`
    #[serde(default)]
    pub listener_type: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub params: Option<Vec<String>>,

    #[serde(default)]
    pub csv_path: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_mode")]
    pub mode: String, // "peer" or "client"

    #[serde(default = "default_measurement")]
    pub measurement: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub timestamp_source: TimestampSource,

    #[serde(default)]
    pub on_decode_error: DecodeErrorPolicy,

    #[serde(default)]
    pub on_sink_error: SinkErrorPolicy,

    #[serde(default = "default_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub queue_capacity: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ListenerDocument {
    fn default() -> Self {
        Self {
            kind: None,
            listener_type: None,
            address: None,
            params: None,
            csv_path: None,
            token: None,
            org: None,
            bucket: None,
            url: None,
            mode: default_mode(),
            measurement: default_measurement(),
            timeout_seconds: default_timeout(),
            timestamp_source: TimestampSource::default(),
            on_decode_error: DecodeErrorPolicy::default(),
            on_sink_error: SinkErrorPolicy::default(),
            max_retries: default_retries(),
            queue_capacity: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl ListenerDocument {
    /// Selected listener type; `type` wins over `listener_type`
    pub fn listener_type(&self) -> Option<&str> {
        self.kind.as_deref().or(self.listener_type.as_deref())
    }
}

/// Validated listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub address: String,
    pub mode: String,
    pub params: Vec<String>,
    pub sink: SinkConfig,
    pub policy: ErrorPolicy,
    pub queue_capacity: Option<usize>,
    pub logging: LoggingConfig,
}

/// Sink selection with the fields each variant requires
#[derive(Debug, Clone)]
pub enum SinkConfig {
    Csv(CsvConfig),
    Influx(InfluxConfig),
}

impl SinkConfig {
    pub fn listener_type(&self) -> &'static str {
        match self {
            SinkConfig::Csv(_) => "CSV",
            SinkConfig::Influx(_) => "Influx",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
    pub timeout_seconds: u64,
    pub timestamp_source: TimestampSource,
}

impl InfluxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Which instant a time-series point is stamped with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Moment the point is written
    #[default]
    Record,
    /// Publisher's clock when available, receipt time otherwise
    Publish,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkErrorPolicy {
    #[default]
    Abort,
    Skip,
    /// Retry transient failures with exponential backoff, then abort
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub on_decode_error: DecodeErrorPolicy,
    pub on_sink_error: SinkErrorPolicy,
    pub max_retries: u32,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            on_decode_error: DecodeErrorPolicy::default(),
            on_sink_error: SinkErrorPolicy::default(),
            max_retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_mode() -> String {
    "peer".to_string()
}

fn default_measurement() -> String {
    "my_measurement".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}
