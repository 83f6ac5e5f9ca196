// Process execution and HTTP helpers backing the pipeline traits

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

use super::errors::{PipelineError, Result};
use super::models::HostEnvironment;
use super::traits::{BinaryFetcher, CommandRunner, CommandSpec, ProcessOutput};

/// Runs commands as real child processes.
///
/// The child gets the environment's search path as `PATH` and runs inside
/// the working directory, so locally provisioned tools resolve by bare name.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(cmd: &CommandSpec, env: &HostEnvironment) -> TokioCommand {
        let mut command = TokioCommand::new(&cmd.program);
        command
            .args(&cmd.args)
            .env("PATH", env.search_path_value())
            .current_dir(&env.working_dir);
        command
    }

    async fn run_attached(
        cmd: &CommandSpec,
        env: &HostEnvironment,
    ) -> std::io::Result<ProcessOutput> {
        let status = Self::command(cmd, env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        Ok(ProcessOutput {
            code: status.code(),
            ..ProcessOutput::default()
        })
    }

    async fn run_captured(
        cmd: &CommandSpec,
        env: &HostEnvironment,
    ) -> std::io::Result<ProcessOutput> {
        let mut child = Self::command(cmd, env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| {
                std::io::Error::other(format!("failed to capture stdout from {}", cmd.program))
            })?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| {
                std::io::Error::other(format!("failed to capture stderr from {}", cmd.program))
            })?;

        // Drain both pipes concurrently so a chatty child can't block on a full pipe.
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = child.wait().await?;
        let stdout = stdout_task.await.map_err(std::io::Error::other)??;
        let stderr = stderr_task.await.map_err(std::io::Error::other)??;

        Ok(ProcessOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        cmd: &CommandSpec,
        env: &HostEnvironment,
    ) -> std::io::Result<ProcessOutput> {
        tracing::debug!(command = %cmd, attached = cmd.attached, "running");
        if cmd.attached {
            Self::run_attached(cmd, env).await
        } else {
            Self::run_captured(cmd, env).await
        }
    }
}

/// Downloads binaries over HTTP(S), optionally through a proxy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(30));

        if let Some(proxy_url) = proxy {
            tracing::info!(proxy = proxy_url, "using proxy for tool downloads");
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl BinaryFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::fetch(url, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::fetch(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Build `--proxy` arguments for the downloader.
pub fn proxy_args(proxy: Option<&str>) -> Vec<String> {
    match proxy {
        Some(url) => vec!["--proxy".to_string(), url.to_string()],
        None => Vec::new(),
    }
}
