use std::sync::Arc;

use clap::Parser as _;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use config::Cli;

mod config;
mod context;
mod error;
mod pipeline;
mod scenario;
mod stage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cancel = CancellationToken::new();
    let config = Arc::new(Cli::parse().into_config(cancel.clone())?);
    tracing::info!(scenarios = ?config.scenarios, project = %config.project, "Starting gke-e2e-runner");

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cleaning up");
            cancel.cancel();
        }
    });

    let mut runs = JoinSet::new();
    for &scenario in &config.scenarios {
        let config = Arc::clone(&config);
        let span = tracing::info_span!("scenario", %scenario);
        runs.spawn(
            async move { (scenario, pipeline::run_scenario(scenario, &config).await) }.instrument(span),
        );
    }

    let mut failed = 0;
    while let Some(run) = runs.join_next().await {
        match run? {
            (scenario, Ok(())) => tracing::info!(%scenario, "Scenario passed"),
            (scenario, Err(err)) => {
                tracing::error!(%scenario, error = %err, "Scenario failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} scenarios failed", config.scenarios.len()).into());
    }
    Ok(())
}
