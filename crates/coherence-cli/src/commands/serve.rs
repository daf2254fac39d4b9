//! `coherence serve`

use super::load_config;
use super::simulate::simulate;
use crate::scenario::Scenario;
use anyhow::{Context, Result};
use coherence_engine::CoherenceRuntime;
use std::path::Path;
use tracing::info;

pub async fn run(config_path: Option<&Path>, scenario_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let runtime = CoherenceRuntime::in_memory(config)?;
    let tasks = runtime.start();

    if let Some(path) = scenario_path {
        let scenario = Scenario::load(path)?;
        let outcome = simulate(&runtime, &scenario, None).await?;
        let failed = outcome.steps.iter().filter(|s| !s.ok).count();
        info!(
            steps = outcome.steps.len(),
            failed,
            records = outcome.records.len(),
            "Scenario applied"
        );
    }

    info!("Coherence engine running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    tasks.shutdown();
    let report = runtime.engine().metrics_report().await?;
    info!(
        total_operations = report.total_operations,
        distribution = ?report.state_distribution,
        "Coherence engine stopped"
    );
    Ok(())
}
