use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use futures_util::StreamExt;

use crate::api::kube_client::KubeApiClient;
use crate::api::SchedulerApi;
use crate::config::{Config, SCHEDULER_NAME_ENV};
use crate::scheduler::Orchestrator;

pub mod api;
pub mod config;
pub mod error;
pub mod log;
pub mod quantity;
pub mod scheduler;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Name this scheduler registers as; pods set `spec.schedulerName` to
    /// this value to be scheduled by it. Also selects which config file
    /// under `/init` is loaded.
    #[clap(env = SCHEDULER_NAME_ENV)]
    scheduler_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = Config::load(&cli.scheduler_name)?;
    crate::log::init(config.log_level)?;

    ::log::info!("starting scheduler {}", cli.scheduler_name);

    let api: Arc<dyn SchedulerApi> = Arc::new(KubeApiClient::create().await?);
    let orchestrator = Orchestrator::new(api.clone(), config.clone(), cli.scheduler_name.clone());

    run_watch_loop(api.as_ref(), &orchestrator, &config.namespace).await?;

    Ok(())
}

/// Watches pods in `namespace` and runs each applied event through the
/// orchestrator. A scheduling failure is logged and skipped; only a
/// failure to maintain the watch stream itself propagates up.
async fn run_watch_loop(api: &dyn SchedulerApi, orchestrator: &Orchestrator, namespace: &str) -> Result<()> {
    let mut events = api.watch_pods(namespace).await?;

    while let Some(event) = events.next().await {
        let pod = event?;
        if let Err(e) = orchestrator.schedule_pod(&pod).await {
            ::log::error!("could not schedule pod {:?}: {e}", pod.metadata.name);
        }
    }

    Ok(())
}
