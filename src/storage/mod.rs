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

// Storage sink module
//
// Provides a trait-based abstraction for event sinks, allowing the listener
// to record into different storage systems (CSV file, InfluxDB).
//
// This module focuses on WRITE-ONLY operations.

pub mod backend;
pub mod factory;
pub mod influxdb;
pub mod line_protocol;
pub mod tabular;

pub use backend::EventSink;
pub use factory::SinkFactory;
pub use influxdb::InfluxSink;
pub use tabular::{CsvSink, TableRow};
