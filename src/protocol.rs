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

// Parameter broadcast payloads and the events decoded from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;

/// Scalar value carried by a parameter broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Integer(v) => write!(f, "{}", v),
            // Debug keeps the fractional part ("1.0"), so floats stay floats when re-read
            ParameterValue::Float(v) => write!(f, "{:?}", v),
            ParameterValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Integer(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

/// One decoded parameter change, stamped with the listener's receipt time
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEvent {
    timestamp: DateTime<Utc>,
    name: String,
    value: ParameterValue,
    unit: String,
    published_at: Option<DateTime<Utc>>,
}

impl ParameterEvent {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
        unit: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, DecodeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DecodeError::EmptyName);
        }
        Ok(Self {
            timestamp,
            name,
            value: value.into(),
            unit: unit.into(),
            published_at: None,
        })
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Receipt time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }
}

/// Wire form of a parameter broadcast blueprint
///
/// Publishers send JSON objects such as
/// `{"name": "dac.ch1", "action": "parameter-update", "value": 0.5, "unit": "V"}`.
/// `action` is informational only; `timestamp`, when present, is the
/// publisher's RFC 3339 clock reading.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterBroadcast {
    pub name: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub value: Option<ParameterValue>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ParameterBroadcast {
    /// Decode a raw payload, rejecting broadcasts that cannot become an event
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let broadcast: ParameterBroadcast = serde_json::from_slice(payload)?;

        if broadcast.name.is_empty() {
            return Err(DecodeError::EmptyName);
        }
        if broadcast.value.is_none() {
            return Err(DecodeError::MissingValue(broadcast.name));
        }
        if let Some(raw) = &broadcast.timestamp {
            if DateTime::parse_from_rfc3339(raw).is_err() {
                return Err(DecodeError::Timestamp {
                    name: broadcast.name.clone(),
                    raw: raw.clone(),
                });
            }
        }

        Ok(broadcast)
    }

    /// Publish time carried in the payload itself
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Build the event, stamping it with the listener's receipt time
    pub fn into_event(self, received_at: DateTime<Utc>) -> Result<ParameterEvent, DecodeError> {
        let published_at = self.published_at();
        let value = self
            .value
            .ok_or_else(|| DecodeError::MissingValue(self.name.clone()))?;
        let event = ParameterEvent::new(self.name, value, self.unit.unwrap_or_default(), received_at)?;
        Ok(event.with_published_at(published_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_float_update() {
        let payload = br#"{"name": "gate1", "action": "parameter-update", "value": 0.5, "unit": "V"}"#;
        let broadcast = ParameterBroadcast::decode(payload).unwrap();
        let event = broadcast.into_event(Utc::now()).unwrap();

        assert_eq!(event.name(), "gate1");
        assert_eq!(event.value(), &ParameterValue::Float(0.5));
        assert_eq!(event.unit(), "V");
        assert!(event.published_at().is_none());
    }

    #[test]
    fn test_decode_scalar_kinds() {
        let int = ParameterBroadcast::decode(br#"{"name": "n", "value": 3}"#).unwrap();
        assert_eq!(int.value, Some(ParameterValue::Integer(3)));

        let flag = ParameterBroadcast::decode(br#"{"name": "n", "value": true}"#).unwrap();
        assert_eq!(flag.value, Some(ParameterValue::Bool(true)));

        let text = ParameterBroadcast::decode(br#"{"name": "n", "value": "on"}"#).unwrap();
        assert_eq!(text.value, Some(ParameterValue::Text("on".to_string())));
    }

    #[test]
    fn test_missing_unit_is_empty() {
        let event = ParameterBroadcast::decode(br#"{"name": "n", "value": 1}"#)
            .unwrap()
            .into_event(Utc::now())
            .unwrap();
        assert_eq!(event.unit(), "");
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        assert!(matches!(
            ParameterBroadcast::decode(b"not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            ParameterBroadcast::decode(br#"{"name": "", "value": 1}"#),
            Err(DecodeError::EmptyName)
        ));
        assert!(matches!(
            ParameterBroadcast::decode(br#"{"name": "n", "value": null}"#),
            Err(DecodeError::MissingValue(_))
        ));
        assert!(matches!(
            ParameterBroadcast::decode(br#"{"name": "n", "value": [1, 2]}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            ParameterBroadcast::decode(br#"{"name": "n", "value": 1, "timestamp": "yesterday"}"#),
            Err(DecodeError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_publish_time_from_payload() {
        let payload = br#"{"name": "n", "value": 1, "timestamp": "2025-03-01T12:00:00+01:00"}"#;
        let event = ParameterBroadcast::decode(payload)
            .unwrap()
            .into_event(Utc::now())
            .unwrap();

        let expected = DateTime::parse_from_rfc3339("2025-03-01T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(event.published_at(), Some(expected));
    }

    #[test]
    fn test_value_display_keeps_float_shape() {
        assert_eq!(ParameterValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParameterValue::Float(0.5).to_string(), "0.5");
        assert_eq!(ParameterValue::Integer(-7).to_string(), "-7");
        assert_eq!(ParameterValue::Bool(false).to_string(), "false");
    }

    #[test]
    fn test_event_requires_name() {
        assert!(ParameterEvent::new("", 1i64, "", Utc::now()).is_err());
    }
}
