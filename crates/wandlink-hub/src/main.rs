//! Wandlink hub: entry point.
//!
//! Connects to the controller gateway, keeps the device registry live, and
//! logs device lifecycle events until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! wandlink-hub [OPTIONS]
//!
//! Options:
//!   --config <PATH>              TOML config file
//!   --url <URL>                  Gateway WebSocket URL
//!   --schema <PATH>              Command schema JSON (default: built-in)
//!   --inactive-timeout-ms <MS>   Prune devices silent for longer than this
//!   --status-interval <SECS>     Log a device summary every N seconds (0 = off)
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                        | Flag                    |
//! |---------------------------------|-------------------------|
//! | `WANDLINK_CONFIG`               | `--config`              |
//! | `WANDLINK_URL`                  | `--url`                 |
//! | `WANDLINK_SCHEMA`               | `--schema`              |
//! | `WANDLINK_INACTIVE_TIMEOUT_MS`  | `--inactive-timeout-ms` |
//! | `WANDLINK_STATUS_INTERVAL`      | `--status-interval`     |
//!
//! Precedence: CLI flag, then environment, then config file, then default.
//! `RUST_LOG` overrides the configured log level.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wandlink_core::CommandSchema;
use wandlink_hub::domain::HubConfig;
use wandlink_hub::infrastructure::TaskHandle;
use wandlink_hub::{DeviceRegistry, RegistryConfig, RegistryEvent};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Device registry for Wandlink handheld controllers.
#[derive(Debug, Parser)]
#[command(
    name = "wandlink-hub",
    about = "Live registry and command relay for Wandlink controllers",
    version
)]
struct Cli {
    /// TOML configuration file.  Without it, built-in defaults apply.
    #[arg(long, env = "WANDLINK_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket URL of the controller gateway.
    #[arg(long, env = "WANDLINK_URL")]
    url: Option<String>,

    /// Command schema JSON file.
    #[arg(long, env = "WANDLINK_SCHEMA")]
    schema: Option<PathBuf>,

    /// Milliseconds of silence after which a device is pruned.
    #[arg(long, env = "WANDLINK_INACTIVE_TIMEOUT_MS")]
    inactive_timeout_ms: Option<u64>,

    /// Seconds between device summary log lines.  `0` disables them.
    #[arg(long, default_value_t = 10, env = "WANDLINK_STATUS_INTERVAL")]
    status_interval: u64,
}

impl Cli {
    /// Loads the config file (if any) and applies CLI overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or
    /// parsed.
    fn into_hub_config(self) -> anyhow::Result<HubConfig> {
        let mut config = match &self.config {
            Some(path) => HubConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => HubConfig::default(),
        };

        if let Some(url) = self.url {
            config.connection.url = url;
        }
        if let Some(schema) = self.schema {
            config.schema.path = Some(schema);
        }
        if let Some(ms) = self.inactive_timeout_ms {
            config.registry.inactive_timeout_ms = ms;
        }
        Ok(config)
    }
}

/// Loads the command schema named by the config, or the built-in one.
fn load_schema(config: &HubConfig) -> anyhow::Result<CommandSchema> {
    match &config.schema.path {
        Some(path) => CommandSchema::from_json_path(path)
            .with_context(|| format!("failed to load command schema from {}", path.display())),
        None => Ok(CommandSchema::builtin()),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let status_interval = cli.status_interval;
    let config = cli.into_hub_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let schema = Arc::new(load_schema(&config)?);
    info!(
        "wandlink hub starting: url={}, commands={:?}, inactive_timeout={:?}",
        config.connection.url,
        schema.command_names(),
        config.inactive_timeout()
    );

    let registry = DeviceRegistry::with_websocket(schema, RegistryConfig::from(&config));
    let mut events = registry.subscribe();
    registry.connect(config.connection.url.clone());

    // ── Event logging ─────────────────────────────────────────────────────────
    let event_task = TaskHandle::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RegistryEvent::ConnectionChanged(state)) => info!("connection {state}"),
                Ok(RegistryEvent::DeviceAdded(id)) => info!("device {id} joined"),
                Ok(RegistryEvent::DeviceRemoved { id, reason }) => {
                    info!("device {id} left ({reason:?})")
                }
                Err(RecvError::Lagged(n)) => warn!("event log lagged; skipped {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ── Periodic status ───────────────────────────────────────────────────────
    let status_task = (status_interval > 0).then(|| {
        let registry = registry.clone();
        TaskHandle::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(status_interval));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let devices = registry.get_all_devices();
                let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
                info!(
                    "{} device(s), connection {}: {:?}",
                    devices.len(),
                    registry.connection_state(),
                    ids
                );
            }
        })
    });

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C, shutting down");

    registry.disconnect();
    drop(status_task);
    drop(event_task);

    info!("wandlink hub stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
