//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::driver::{ExtractionDriver, SyncStats};
use crate::error::{Error, Result, ResultExt};
use crate::gateway::{HttpGateway, ResultSet, SearchGateway};
use crate::output::{JsonLinesSink, Message, RecordSink};
use crate::state::StateManager;
use crate::streams::{find_stream, select_streams, STREAMS};
use crate::window::Window;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::io::Stdout;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Read { streams } => self.read(streams.as_deref()).await,
            Commands::Streams => self.streams(),
        }
    }

    /// Load and validate configuration
    fn load_config(&self) -> Result<TapConfig> {
        // Inline config takes precedence
        let config = if let Some(json_str) = &self.cli.config_json {
            TapConfig::from_json(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?
        } else if let Some(path) = &self.cli.config {
            TapConfig::from_file(path)?
        } else {
            return Err(Error::config(
                "No configuration given, pass --config or --config-json",
            ));
        };

        config.validate()?;
        Ok(config)
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json).context("Invalid state JSON")
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
                .with_context(|| format!("Failed to load state from {}", path.display()))
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let gateway = HttpGateway::new(config.gateway_config())?;
        let stream = find_stream("transactions")?;

        info!("Checking connection to {}", config.base_url());

        let now = Utc::now();
        let window = Window::new(now - Duration::hours(1), now);

        match gateway.search(stream, window).await {
            Ok(results) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": format!(
                            "Connection successful, {} transactions in the last hour",
                            results.maximum_size()
                        )
                    }
                }));
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
            }
        }

        Ok(())
    }

    /// Read data
    async fn read(&self, streams: Option<&str>) -> Result<()> {
        let sync_start = Instant::now();
        let config = self.load_config()?;
        let selected = select_streams(streams)?;
        let state = self.load_state()?;

        let gateway = Arc::new(HttpGateway::new(config.gateway_config())?);
        let mut driver = ExtractionDriver::new(gateway, config, state);
        let mut sink = self.sink();

        // Track per-stream statistics
        let mut stream_results: Vec<Value> = Vec::new();

        for stream in selected {
            info!("Starting sync for stream: {}", stream.name);
            let stream_start = Instant::now();

            match driver.sync_stream(stream, &mut sink).await {
                Ok(stats) => stream_results.push(stream_result(stream.name, &stats)),
                Err(e) => {
                    error!("Error syncing stream {}: {e}", stream.name);
                    stream_results.push(json!({
                        "stream": stream.name,
                        "status": "FAILED",
                        "error": e.to_string(),
                        "duration_ms": stream_start.elapsed().as_millis() as u64
                    }));
                }
            }
        }

        let state_file_path: Option<String> = if let Some(state_path) = &self.cli.state {
            driver
                .state()
                .save_to_file(state_path)
                .await
                .with_context(|| format!("Failed to save state to {}", state_path.display()))?;
            Some(state_path.to_string_lossy().to_string())
        } else {
            None
        };

        let total_streams = stream_results.len();
        let failed_streams = stream_results
            .iter()
            .filter(|r| r["status"] == "FAILED")
            .count();
        let successful_streams = total_streams - failed_streams;
        let stats = driver.stats();

        sink.emit(Message::Summary(json!({
            "status": summary_status(successful_streams, failed_streams),
            "total_records": stats.records_synced,
            "total_streams": total_streams,
            "successful_streams": successful_streams,
            "failed_streams": failed_streams,
            "windows_abandoned": stats.windows_abandoned,
            "maintenance_outages": stats.maintenance_outages,
            "duration_ms": sync_start.elapsed().as_millis() as u64,
            "output": {
                "format": self.cli.format.as_str(),
                "state_file": state_file_path
            },
            "streams": stream_results
        })))?;
        sink.flush()?;

        if failed_streams > 0 {
            return Err(Error::Other(format!(
                "{failed_streams} of {total_streams} streams failed"
            )));
        }

        Ok(())
    }

    /// List available streams
    fn streams(&self) -> Result<()> {
        let stream_names: Vec<&str> = STREAMS.iter().map(|s| s.name).collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "streams": stream_names
        }));

        Ok(())
    }

    /// Sink for record and state messages
    fn sink(&self) -> JsonLinesSink<Stdout> {
        JsonLinesSink::stdout().pretty(self.cli.format == OutputFormat::Pretty)
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn stream_result(stream: &str, stats: &SyncStats) -> Value {
    json!({
        "stream": stream,
        "status": "SUCCESS",
        "records_synced": stats.records_synced,
        "windows_completed": stats.windows_completed,
        "windows_abandoned": stats.windows_abandoned,
        "maintenance_outages": stats.maintenance_outages,
        "duration_ms": stats.duration_ms
    })
}

fn summary_status(successful: usize, failed: usize) -> &'static str {
    if failed == 0 {
        "SUCCEEDED"
    } else if successful == 0 {
        "FAILED"
    } else {
        "PARTIAL"
    }
}
