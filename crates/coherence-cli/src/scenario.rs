//! Scenario files
//!
//! A scenario declares contracts, operation models and an ordered list of
//! steps. Steps are tagged by `op`:
//!
//! ```toml
//! [[contracts]]
//! participant = "orders"
//! component = "cart"
//! consistency = "STRONG"
//!
//! [[steps]]
//! op = "write"
//! participant = "orders"
//! component = "cart"
//!
//! [[steps]]
//! op = "advance-secs"
//! secs = 31
//! ```

use anyhow::{Context, Result};
use coherence_core::{
    ComponentId, ConsistencyType, GlobalOperationModel, GomId, GomInputs, ParticipantId,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A contract declared before any step runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSeed {
    pub participant: ParticipantId,
    pub component: ComponentId,
    pub consistency: ConsistencyType,
}

/// Which reconciler sweep a `sweep` step runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepKind {
    Resync,
    Staleness,
    #[default]
    Both,
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    Read {
        participant: ParticipantId,
        component: ComponentId,
    },
    Write {
        participant: ParticipantId,
        component: ComponentId,
    },
    RunGom {
        gom: GomId,
        #[serde(default)]
        inputs: GomInputs,
    },
    Sweep {
        #[serde(default)]
        kind: SweepKind,
    },
    AdvanceSecs {
        secs: i64,
    },
}

impl Step {
    /// Short label for output
    pub fn label(&self) -> String {
        match self {
            Step::Read {
                participant,
                component,
            } => format!("read {participant}/{component}"),
            Step::Write {
                participant,
                component,
            } => format!("write {participant}/{component}"),
            Step::RunGom { gom, .. } => format!("run-gom {gom}"),
            Step::Sweep { kind } => format!("sweep {kind:?}").to_lowercase(),
            Step::AdvanceSecs { secs } => format!("advance {secs}s"),
        }
    }
}

/// A complete scenario file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub contracts: Vec<ContractSeed>,
    pub models: Vec<GlobalOperationModel>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}
