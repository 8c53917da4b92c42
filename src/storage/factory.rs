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

// Sink factory for creating sinks from validated configuration

use super::backend::EventSink;
use super::influxdb::InfluxSink;
use super::tabular::CsvSink;
use crate::config::SinkConfig;
use crate::error::SinkError;

pub struct SinkFactory;

impl SinkFactory {
    /// Create the sink selected by the configuration
    pub fn create(config: &SinkConfig) -> Result<Box<dyn EventSink>, SinkError> {
        match config {
            SinkConfig::Csv(csv_config) => Ok(Box::new(CsvSink::new(csv_config.clone())?)),
            SinkConfig::Influx(influx_config) => {
                Ok(Box::new(InfluxSink::new(influx_config.clone())?))
            }
        }
    }
}
