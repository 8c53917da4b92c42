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

// CSV sink: an in-memory table mirrored to a single file

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::backend::EventSink;
use crate::config::CsvConfig;
use crate::error::SinkError;
use crate::protocol::ParameterEvent;

/// Fixed column order of the table file
pub const COLUMNS: [&str; 4] = ["time", "name", "value", "unit"];

/// One row of the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(with = "table_time")]
    pub time: DateTime<Utc>,
    pub name: String,
    pub value: String,
    pub unit: String,
}

impl From<&ParameterEvent> for TableRow {
    fn from(event: &ParameterEvent) -> Self {
        Self {
            time: event.timestamp(),
            name: event.name().to_string(),
            value: event.value().to_string(),
            unit: event.unit().to_string(),
        }
    }
}

/// Append-only table persisted by rewriting the whole file
///
/// After every successful `record` the file holds exactly the rows in
/// memory. A crash in the middle of a rewrite can leave a truncated file.
pub struct CsvSink {
    path: PathBuf,
    table: Vec<TableRow>,
}

impl CsvSink {
    pub fn new(config: CsvConfig) -> Result<Self, SinkError> {
        Self::open(config.path)
    }

    /// Open the table at `path`, loading prior history when the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();

        let table = if path.exists() {
            let table = Self::load(&path)?;
            info!(
                "Loaded {} existing rows from {}",
                table.len(),
                path.display()
            );
            table
        } else {
            info!("Starting new table at {}", path.display());
            Vec::new()
        };

        Ok(Self { path, table })
    }

    /// Rows recorded so far, including those loaded at startup
    pub fn table(&self) -> &[TableRow] {
        &self.table
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Vec<TableRow>, SinkError> {
        let file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
        let is_empty = file.metadata().map_err(|e| io_error(path, e))?.len() == 0;
        if is_empty {
            warn!("Table file {} is empty, starting fresh", path.display());
            return Ok(Vec::new());
        }

        let malformed = |reason: String| SinkError::MalformedTable {
            path: path.display().to_string(),
            reason,
        };

        let mut reader = csv::Reader::from_reader(file);
        let headers = reader
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .clone();

        let missing: Vec<&str> = COLUMNS
            .iter()
            .filter(|column| !headers.iter().any(|h| h == **column))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(malformed(format!("missing column(s): {}", missing.join(", "))));
        }

        // Extra columns (such as an unnamed leading index) are ignored
        reader
            .deserialize::<TableRow>()
            .map(|row| row.map_err(|e| malformed(e.to_string())))
            .collect()
    }

    fn render(&self) -> Result<Vec<u8>, SinkError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        writer.write_record(COLUMNS)?;
        for row in &self.table {
            writer.serialize(row)?;
        }

        writer
            .into_inner()
            .map_err(|e| io_error(&self.path, e.into_error()))
    }

    async fn persist(&self) -> Result<(), SinkError> {
        let contents = self.render()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                debug!("Creating directory: {}", parent.display());
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, e))?;
            }
        }

        fs::write(&self.path, contents)
            .await
            .map_err(|e| io_error(&self.path, e))
    }
}

#[async_trait]
impl EventSink for CsvSink {
    async fn record(&mut self, event: ParameterEvent) -> Result<(), SinkError> {
        self.table.push(TableRow::from(&event));

        if let Err(e) = self.persist().await {
            // Keep the table an exact mirror of the last successful write
            self.table.pop();
            return Err(e);
        }

        debug!(
            "Wrote row {} to {}",
            self.table.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => match fs::metadata(parent).await {
                Ok(metadata) => metadata.is_dir(),
                // Created on first write
                Err(_) => true,
            },
            None => true,
        }
    }

    fn sink_type(&self) -> &str {
        "csv"
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// RFC 3339 on write; also reads the naive `YYYY-MM-DD HH:MM:SS.ffffff`
/// timestamps found in older tables
mod table_time {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid time '{}'", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}
