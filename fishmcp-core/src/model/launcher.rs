use std::process::Stdio;
use std::time::Duration;

use anyhow::anyhow;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::ModelOptions;
use crate::error::ModelError;
use crate::settings::config::LaunchConfig;

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Starts the Fish Speech API server on first use. The device flags from
/// the command line are appended to the configured arguments.
pub struct BackendLauncher {
    config: LaunchConfig,
    options: ModelOptions,
    child: Mutex<Option<Child>>,
}

impl BackendLauncher {
    pub fn new(config: LaunchConfig, options: ModelOptions) -> Self {
        Self {
            config,
            options,
            child: Mutex::new(None),
        }
    }

    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.config.args.clone();
        args.extend(self.options.to_args());
        args
    }

    /// Make sure the server answers its health check, spawning it when it is
    /// not running. Concurrent callers wait on the same launch.
    pub async fn ensure_running(
        &self,
        client: &reqwest::Client,
        health_url: &str,
    ) -> Result<(), ModelError> {
        let mut child = self.child.lock().await;

        if let Some(running) = child.as_mut() {
            match running.try_wait() {
                Ok(None) => return Ok(()),
                Ok(Some(status)) => {
                    warn!(%status, "Fish Speech server exited; relaunching");
                    *child = None;
                }
                Err(e) => {
                    return Err(ModelError::Unavailable(anyhow!(
                        "Failed to query Fish Speech server process: {e:?}"
                    )))
                }
            }
        }

        if is_healthy(client, health_url).await {
            debug!(%health_url, "Fish Speech server already running");
            return Ok(());
        }

        let mut spawned = self.spawn()?;
        self.wait_until_healthy(&mut spawned, client, health_url)
            .await?;
        *child = Some(spawned);
        Ok(())
    }

    fn spawn(&self) -> Result<Child, ModelError> {
        let args = self.command_args();
        info!(command = %self.config.command, ?args, "Launching Fish Speech server");

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&args)
            .envs(self.config.env.iter())
            .stdin(Stdio::null())
            // stdout carries the MCP transport; the child must never write to it
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|e| {
            ModelError::Unavailable(anyhow!(
                "Failed to launch Fish Speech server '{}': {e}",
                self.config.command
            ))
        })
    }

    async fn wait_until_healthy(
        &self,
        child: &mut Child,
        client: &reqwest::Client,
        health_url: &str,
    ) -> Result<(), ModelError> {
        let timeout = Duration::from_secs(self.config.startup_timeout_secs);
        let started = Instant::now();

        loop {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(ModelError::Unavailable(anyhow!(
                    "Fish Speech server exited during startup with {status}"
                )));
            }

            if is_healthy(client, health_url).await {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Fish Speech server is ready"
                );
                return Ok(());
            }

            if started.elapsed() >= timeout {
                let _ = child.kill().await;
                return Err(ModelError::Unavailable(anyhow!(
                    "Fish Speech server did not become healthy within {}s",
                    timeout.as_secs()
                )));
            }

            sleep(HEALTH_POLL_INTERVAL).await;
        }
    }
}

async fn is_healthy(client: &reqwest::Client, health_url: &str) -> bool {
    match client.get(health_url).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Device;
    use std::collections::HashMap;

    fn launch_config(command: &str, startup_timeout_secs: u64) -> LaunchConfig {
        LaunchConfig {
            command: command.to_string(),
            args: vec!["-m".to_string(), "tools.api_server".to_string()],
            env: HashMap::new(),
            working_dir: None,
            startup_timeout_secs,
        }
    }

    #[test]
    fn test_device_flags_are_appended() {
        let launcher = BackendLauncher::new(
            launch_config("python", 10),
            ModelOptions {
                device: Device::Cpu,
                half: true,
                compile: true,
            },
        );
        assert_eq!(
            launcher.command_args(),
            vec![
                "-m",
                "tools.api_server",
                "--device",
                "cpu",
                "--half",
                "--compile"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let launcher = BackendLauncher::new(
            launch_config("/nonexistent/fish-speech-server", 1),
            ModelOptions::default(),
        );
        let client = reqwest::Client::new();

        let err = launcher
            .ensure_running(&client, "http://127.0.0.1:9/v1/health")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(_)));
    }
}
