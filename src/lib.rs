pub mod cli;
pub mod config;
pub mod pipeline;

use std::sync::Arc;

use config::Config;
use pipeline::{HostEnvironment, HttpFetcher, Orchestrator, RunSummary, SystemRunner};

pub use pipeline::{PipelineError, Result};

/// Run the whole pipeline against real processes and the network.
pub async fn run(config: &Config) -> Result<RunSummary> {
    let env = HostEnvironment::from_process(config.workdir.clone())?;
    tracing::info!(
        platform = %env.platform,
        workdir = %config.workdir.display(),
        "starting run"
    );

    let runner = Arc::new(SystemRunner::new());
    let fetcher = Arc::new(HttpFetcher::new(config.proxy.as_deref())?);

    let orchestrator = Orchestrator::new(runner, fetcher, config.release())
        .with_proxy(config.proxy.clone())
        .with_overwrite(config.overwrite);

    Ok(orchestrator.run(&config.run_request(), env).await)
}
