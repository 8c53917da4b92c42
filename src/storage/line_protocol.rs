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

//! InfluxDB line protocol points.
//!
//! ```text
//! measurement,tag1=val1 field1=val1 timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use crate::error::SinkError;
use crate::protocol::ParameterValue;

/// A value stored in a point field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
}

impl FieldValue {
    /// - Float: written as-is (`3.14`)
    /// - Integer: suffixed with `i` (`42i`)
    /// - String: double quoted, inner quotes and backslashes escaped
    /// - Boolean: `true` / `false`
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
            FieldValue::Boolean(v) => v.to_string(),
        }
    }
}

impl TryFrom<&ParameterValue> for FieldValue {
    type Error = String;

    fn try_from(value: &ParameterValue) -> Result<Self, Self::Error> {
        match value {
            ParameterValue::Float(v) if !v.is_finite() => {
                Err(format!("{} is not representable in line protocol", v))
            }
            ParameterValue::Float(v) => Ok(FieldValue::Float(*v)),
            ParameterValue::Integer(v) => Ok(FieldValue::Integer(*v)),
            ParameterValue::Bool(v) => Ok(FieldValue::Boolean(*v)),
            ParameterValue::Text(v) => Ok(FieldValue::String(v.clone())),
        }
    }
}

/// One time-series point
#[derive(Debug, Clone)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp_ns: Option<i64>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ns: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    pub fn timestamp_ns(mut self, timestamp_ns: i64) -> Self {
        self.timestamp_ns = Some(timestamp_ns);
        self
    }

    /// Render the point; InfluxDB requires at least one field
    pub fn to_line(&self) -> Result<String, SinkError> {
        if self.fields.is_empty() {
            return Err(SinkError::InvalidValue {
                name: self.measurement.clone(),
                reason: "point has no fields".to_string(),
            });
        }

        let mut line = escape_measurement(&self.measurement);

        // Tags sorted by key for canonical form
        let mut sorted_tags: Vec<_> = self.tags.iter().collect();
        sorted_tags.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in sorted_tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        if let Some(ts) = self.timestamp_ns {
            line.push(' ');
            line.push_str(&ts.to_string());
        }

        Ok(line)
    }
}

/// Spaces and commas must be escaped in measurement names
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys also escape `=`
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_formats() {
        assert_eq!(FieldValue::Float(0.5).to_line_protocol(), "0.5");
        assert_eq!(FieldValue::Integer(42).to_line_protocol(), "42i");
        assert_eq!(FieldValue::Boolean(true).to_line_protocol(), "true");
        assert_eq!(
            FieldValue::String("say \"hi\"".to_string()).to_line_protocol(),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_parameter_point() {
        let line = Point::new("my_measurement")
            .tag("name", "gate1")
            .field("value", FieldValue::Float(0.5))
            .timestamp_ns(1_000_000_000)
            .to_line()
            .unwrap();

        assert_eq!(line, "my_measurement,name=gate1 value=0.5 1000000000");
    }

    #[test]
    fn test_escaping() {
        let line = Point::new("lab data")
            .tag("name", "dac ch1,a=b")
            .field("value", FieldValue::Integer(1))
            .to_line()
            .unwrap();

        assert_eq!(line, "lab\\ data,name=dac\\ ch1\\,a\\=b value=1i");
    }

    #[test]
    fn test_point_without_fields_is_rejected() {
        assert!(Point::new("m").tag("name", "x").to_line().is_err());
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        assert!(FieldValue::try_from(&ParameterValue::Float(f64::NAN)).is_err());
        assert!(FieldValue::try_from(&ParameterValue::Float(f64::INFINITY)).is_err());
        assert_eq!(
            FieldValue::try_from(&ParameterValue::Integer(3)),
            Ok(FieldValue::Integer(3))
        );
    }
}
