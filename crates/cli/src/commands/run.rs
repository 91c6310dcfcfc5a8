//! Stream the built-in test pattern to every enabled panel in a config file

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use panelstream_engine::{DeviceConfig, PanelStreamConfig, SessionRegistry, TestPatternRenderer};
use panelstream_transport::SystemBus;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::CliError;
use crate::output;

/// How often the live status line is refreshed.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

pub async fn execute(config_path: Option<PathBuf>, duration_secs: Option<u64>, json: bool) -> Result<()> {
    let config = load_config(config_path.as_deref()).await?;

    let devices: Vec<DeviceConfig> = config.enabled_devices().cloned().collect();
    if devices.is_empty() {
        return Err(CliError::ValidationError("no enabled devices in configuration".to_string()).into());
    }

    let bus = SystemBus::new().with_scsi_node_limit(config.discovery.scsi_node_limit);
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(bus),
        Arc::new(TestPatternRenderer::new()),
        config.session_options(),
    ));

    let starter = Arc::clone(&registry);
    let started = tokio::task::spawn_blocking(move || starter.start_all(devices))
        .await
        .context("session start worker failed")?;
    output::print_start_results(&started, json);

    if registry.running_count() == 0 {
        let first = started.into_iter().find_map(|(_, r)| r.err());
        let err = match first {
            Some(e) => CliError::from(e),
            None => CliError::SessionFailed("no session started".to_string()),
        };
        return Err(err.into());
    }

    wait_for_shutdown(&registry, duration_secs.map(Duration::from_secs), json).await?;

    let stopper = Arc::clone(&registry);
    let stopped = tokio::task::spawn_blocking(move || {
        stopper
            .statuses()
            .into_iter()
            .map(|(id, _)| {
                let result = stopper.stop(&id);
                (id, result)
            })
            .collect::<Vec<_>>()
    })
    .await
    .context("session stop worker failed")?;
    output::print_run_summary(&stopped, json);
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<PanelStreamConfig, CliError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => PanelStreamConfig::default_config_path()?,
    };
    Ok(PanelStreamConfig::load_from_path(&path).await?)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}

/// Block until Ctrl+C, the deadline, or every session has ended.
async fn wait_for_shutdown(registry: &SessionRegistry, duration: Option<Duration>, json: bool) -> Result<()> {
    let deadline = duration.map(|d| Instant::now() + d);
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if registry.running_count() == 0 {
                    warn!("All panel sessions have ended");
                    return Ok(());
                }
                if !json {
                    output::print_status_line(&registry.statuses());
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl+C")?;
                info!("Interrupted, stopping sessions");
                return Ok(());
            }
            () = sleep_until(deadline) => {
                info!("Run duration elapsed");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn malformed_config_is_validation_error() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await?;

        let err = load_config(Some(&path)).await;
        assert!(matches!(err, Err(CliError::ValidationError(_))));
        Ok(())
    }

    #[tokio::test]
    async fn missing_config_is_created() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("config.json");
        let config = load_config(Some(&path)).await?;
        assert!(config.devices.is_empty());
        assert!(path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn deadline_ends_wait() -> TestResult {
        let started = Instant::now();
        sleep_until(Some(started + Duration::from_millis(20))).await;
        assert!(Instant::now() >= started + Duration::from_millis(20));
        Ok(())
    }
}
