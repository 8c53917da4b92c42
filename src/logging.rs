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

// Logger construction
//
// The binary builds one dispatcher from the `logging` section and installs
// it as the scoped default for the run. Nothing is configured at load time.

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Build a dispatcher writing to `writer`
pub fn build_dispatch<W>(config: &LoggingConfig, writer: W) -> Result<Dispatch, ConfigError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(config.level.to_lowercase()).map_err(|e| {
        ConfigError::Invalid {
            field: "logging.level",
            reason: e.to_string(),
        }
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    match config.format.to_lowercase().as_str() {
        "text" => Ok(Dispatch::new(builder.finish())),
        "json" => Ok(Dispatch::new(builder.json().finish())),
        other => Err(ConfigError::Invalid {
            field: "logging.format",
            reason: format!("'{}' is not one of: text, json", other),
        }),
    }
}
