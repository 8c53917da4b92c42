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

// Configuration loader with environment variable substitution

use super::types::*;
use crate::error::ConfigError;
use crate::transport::to_endpoint;
use regex::Regex;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ListenerConfig, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::load_str(&content)
    }

    /// Same as `load`, from an in-memory document
    pub fn load_str(content: &str) -> Result<ListenerConfig, ConfigError> {
        let document = Self::parse(content)?;
        validate(&document)
    }

    /// Parse a document without validating it
    pub fn parse(content: &str) -> Result<ListenerDocument, ConfigError> {
        let content = Self::substitute_env_vars(content)?;
        let document: ListenerDocument = serde_yaml::from_str(&content)?;
        Ok(document)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${INFLUX_TOKEN} -> secret
    /// - ${LISTENER_ADDRESS:-tcp://127.0.0.1:5555} -> tcp://127.0.0.1:5555 (if unset)
    fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").map_err(|e| ConfigError::Invalid {
            field: "environment substitution",
            reason: e.to_string(),
        })?;

        let substituted = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        });

        Ok(substituted.into_owned())
    }
}

/// Validate a configuration document
///
/// Pure function of the document: no file or network access happens here,
/// so a rejected document never causes side effects.
pub fn validate(document: &ListenerDocument) -> Result<ListenerConfig, ConfigError> {
    let listener_type = document.listener_type().ok_or(ConfigError::MissingType)?;

    let kind = if listener_type.eq_ignore_ascii_case("csv") {
        Kind::Csv
    } else if listener_type.eq_ignore_ascii_case("influx") {
        Kind::Influx
    } else {
        return Err(ConfigError::UnsupportedType(listener_type.to_string()));
    };

    let mut missing = Vec::new();
    let address = required(&document.address, "address", &mut missing);

    let sink = match kind {
        Kind::Csv => {
            let path = required(&document.csv_path, "csv_path", &mut missing);
            SinkConfig::Csv(CsvConfig {
                path: PathBuf::from(path),
            })
        }
        Kind::Influx => {
            let token = required(&document.token, "token", &mut missing);
            let org = required(&document.org, "org", &mut missing);
            let bucket = required(&document.bucket, "bucket", &mut missing);
            let url = required(&document.url, "url", &mut missing);
            SinkConfig::Influx(InfluxConfig {
                url: url.trim_end_matches('/').to_string(),
                token: token.to_string(),
                org: org.to_string(),
                bucket: bucket.to_string(),
                measurement: document.measurement.clone(),
                timeout_seconds: document.timeout_seconds,
                timestamp_source: document.timestamp_source,
            })
        }
    };

    if !missing.is_empty() {
        return Err(ConfigError::MissingFields {
            listener_type: sink.listener_type().to_string(),
            fields: missing,
        });
    }

    to_endpoint(address)?;

    if !matches!(document.mode.as_str(), "peer" | "client") {
        return Err(ConfigError::Invalid {
            field: "mode",
            reason: format!("'{}' is not one of: peer, client", document.mode),
        });
    }

    if let SinkConfig::Influx(influx) = &sink {
        if influx.measurement.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "measurement",
                reason: "must not be empty".to_string(),
            });
        }
        if influx.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_seconds",
                reason: "must be > 0".to_string(),
            });
        }
    }

    if document.queue_capacity == Some(0) {
        return Err(ConfigError::Invalid {
            field: "queue_capacity",
            reason: "must be > 0 when set".to_string(),
        });
    }

    Ok(ListenerConfig {
        address: address.to_string(),
        mode: document.mode.clone(),
        params: document.params.clone().unwrap_or_default(),
        sink,
        policy: ErrorPolicy {
            on_decode_error: document.on_decode_error,
            on_sink_error: document.on_sink_error,
            max_retries: document.max_retries,
        },
        queue_capacity: document.queue_capacity,
        logging: document.logging.clone(),
    })
}

enum Kind {
    Csv,
    Influx,
}

/// Empty or blank strings count as missing
fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
    missing: &mut Vec<&'static str>,
) -> &'a str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(field);
            ""
        }
    }
}
