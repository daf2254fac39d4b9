//! `coherence simulate`

use super::load_config;
use crate::scenario::{Scenario, Step, SweepKind};
use anyhow::{Context, Result};
use coherence_core::effects::ClockEffects;
use coherence_core::{ComponentStateRecord, GomInstance};
use coherence_effects::SimulatedClock;
use coherence_engine::{CoherenceRuntime, CoherenceRuntimeBuilder, MetricsReport, TransitionRecord};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one scenario step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: String,
    pub ok: bool,
    pub detail: String,
}

/// Everything a simulation produced
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub steps: Vec<StepOutcome>,
    pub records: Vec<ComponentStateRecord>,
    pub instances: Vec<GomInstance>,
    pub recent_transitions: Vec<TransitionRecord>,
    pub metrics: MetricsReport,
}

pub async fn run(scenario_path: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let scenario = Scenario::load(scenario_path)?;
    let clock = SimulatedClock::default();
    let runtime = CoherenceRuntimeBuilder::new(config)
        .with_clock(Arc::new(clock.clone()))
        .build()?;

    let outcome = simulate(&runtime, &scenario, Some(&clock)).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("rendering outcome")?
        );
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// Declare the scenario's contracts and register its models
pub async fn seed(runtime: &CoherenceRuntime, scenario: &Scenario) -> Result<()> {
    for contract in &scenario.contracts {
        runtime
            .engine()
            .declare_contract(
                &contract.participant,
                &contract.component,
                contract.consistency,
            )
            .await?;
    }
    for model in &scenario.models {
        runtime.runner().register_model(model.clone()).await?;
    }
    info!(
        contracts = scenario.contracts.len(),
        models = scenario.models.len(),
        "Scenario seeded"
    );
    Ok(())
}

/// Seed, run every step, and collect the final state.
///
/// A failing step is reported and the run continues with the next one.
pub async fn simulate(
    runtime: &CoherenceRuntime,
    scenario: &Scenario,
    clock: Option<&SimulatedClock>,
) -> Result<SimulationOutcome> {
    seed(runtime, scenario).await?;

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let (ok, detail) = match apply_step(runtime, clock, step).await {
            Ok(detail) => (true, detail),
            Err(e) => {
                warn!(step = index + 1, error = %e, "Scenario step failed");
                (false, format!("{e:#}"))
            }
        };
        steps.push(StepOutcome {
            index: index + 1,
            step: step.label(),
            ok,
            detail,
        });
    }

    let mut instances = Vec::new();
    for model in &scenario.models {
        instances.extend(runtime.runner().list_instances(&model.id).await?);
    }

    Ok(SimulationOutcome {
        steps,
        records: runtime.engine().list_component_states().await?,
        instances,
        recent_transitions: runtime.metrics().recent_transitions(),
        metrics: runtime.engine().metrics_report().await?,
    })
}

async fn apply_step(
    runtime: &CoherenceRuntime,
    clock: Option<&SimulatedClock>,
    step: &Step,
) -> Result<String> {
    let detail = match step {
        Step::Read {
            participant,
            component,
        } => {
            let record = runtime.engine().handle_read(participant, component).await?;
            format!("{} v{}", record.state, record.version)
        }
        Step::Write {
            participant,
            component,
        } => {
            let record = runtime.engine().handle_write(participant, component).await?;
            format!("{} v{}", record.state, record.version)
        }
        Step::RunGom { gom, inputs } => {
            let instance = runtime.runner().execute_gom(gom, inputs).await?;
            format!(
                "{:?} with {} snapshots",
                instance.status,
                instance.snapshots.len()
            )
        }
        Step::Sweep { kind } => {
            let mut parts = Vec::new();
            if matches!(kind, SweepKind::Resync | SweepKind::Both) {
                let report = runtime.reconciler().resync_sweep().await;
                parts.push(format!("resync updated {}/{}", report.updated, report.examined));
            }
            if matches!(kind, SweepKind::Staleness | SweepKind::Both) {
                let report = runtime.reconciler().staleness_sweep().await;
                parts.push(format!(
                    "staleness updated {}/{}",
                    report.updated, report.examined
                ));
            }
            parts.join(", ")
        }
        Step::AdvanceSecs { secs } => match clock {
            Some(clock) => {
                clock.advance_secs(*secs);
                format!("clock at {}", clock.now().to_rfc3339())
            }
            None => "ignored on the system clock".to_string(),
        },
    };
    Ok(detail)
}

fn print_outcome(outcome: &SimulationOutcome) {
    println!("Steps:");
    for step in &outcome.steps {
        let status = if step.ok { "ok" } else { "FAILED" };
        println!("  [{}] {}: {} {}", step.index, step.step, status, step.detail);
    }

    println!("\nRecords:");
    for record in &outcome.records {
        let bound = record
            .staleness_bound
            .map(|b| format!(" stale after {}", b.to_rfc3339()))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<13} {:<18} v{}{}",
            record.key().to_string(),
            record.state.to_string(),
            record.consistency.to_string(),
            record.version,
            bound
        );
    }

    if !outcome.instances.is_empty() {
        println!("\nOperation model runs:");
        for instance in &outcome.instances {
            println!(
                "  {} {:?} ({} snapshots)",
                instance.name,
                instance.status,
                instance.snapshots.len()
            );
        }
    }

    println!("\nMetrics:");
    println!("  total transitions: {}", outcome.metrics.total_operations);
    for (state, count) in &outcome.metrics.state_distribution {
        let into = outcome
            .metrics
            .transition_counts
            .get(state)
            .copied()
            .unwrap_or_default();
        println!("  {:<13} live {:>3}  transitions into {:>3}", state.to_string(), count, into);
    }
}
