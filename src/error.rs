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

// Error taxonomy for the listener
//
// Every class here is fatal under the default policies. The skip/retry
// policies in `config::ErrorPolicy` decide which ones the loop absorbs.

use thiserror::Error;

/// Configuration problems detected at wiring time, before anything connects
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no listener type configured (set `type` or `listener_type`)")]
    MissingType,

    #[error("{listener_type} listener is missing required field(s): {}", .fields.join(", "))]
    MissingFields {
        listener_type: String,
        fields: Vec<&'static str>,
    },

    #[error("listener type '{0}' not supported. Supported: CSV, Influx")]
    UnsupportedType(String),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A broadcast payload that could not be turned into a parameter event
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a valid parameter broadcast: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parameter broadcast has an empty name")]
    EmptyName,

    #[error("parameter '{0}' carries no scalar value")]
    MissingValue(String),

    #[error("parameter '{name}' has an invalid timestamp '{raw}'")]
    Timestamp { name: String, raw: String },
}

/// Failure to persist one event
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("existing table '{path}' is malformed: {reason}")]
    MalformedTable { path: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("write rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("value of '{name}' cannot be stored: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("sink setup failed: {0}")]
    Setup(String),
}

impl SinkError {
    /// Whether retrying the same write could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::Request(e) => e.is_timeout() || e.is_connect(),
            SinkError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors that terminate `Listener::run`
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to '{address}': {reason}")]
    Connect { address: String, reason: String },

    #[error("subscription closed while waiting for messages: {0}")]
    Receive(String),

    #[error("failed to close subscription: {0}")]
    Close(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to initialise sink: {0}")]
    SinkSetup(SinkError),

    #[error("sink write failed: {0}")]
    SinkWrite(#[from] SinkError),
}
