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

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use parameter_listener::config::LoggingConfig;
use parameter_listener::logging::build_dispatch;
use parameter_listener::{ConfigLoader, ListenerDocument, ListenerFactory};

/// Parameter listener - record instrument parameter broadcasts to CSV or InfluxDB
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (overrides config file)
    #[arg(long)]
    log_level: Option<String>,
}

// Zenoh needs the multi-thread scheduler; one worker still runs a single receive loop
#[tokio::main(flavor = "multi_thread", worker_threads = 1)]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Default logger until the configuration has been read
    let bootstrap = build_dispatch(&LoggingConfig::default(), std::io::stdout).ok();
    let _bootstrap_guard = bootstrap.as_ref().map(tracing::dispatcher::set_default);

    let mut document = match read_document(&args.config) {
        Ok(document) => document,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(level) = args.log_level {
        document.logging.level = level;
    }

    let dispatch = match build_dispatch(&document.logging, std::io::stdout) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let _guard = tracing::dispatcher::set_default(&dispatch);

    info!("Starting parameter listener");
    info!("Loaded configuration from: {:?}", args.config);

    // Failures are logged where they happen
    match ListenerFactory::start(&document).await {
        Ok(()) => {
            info!("Parameter listener shut down successfully");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}

fn read_document(path: &Path) -> Result<ListenerDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ConfigLoader::parse(&content).context("Failed to parse configuration")
}
