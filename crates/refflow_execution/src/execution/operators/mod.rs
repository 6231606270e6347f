pub mod all_to_all;
pub mod base;
pub mod input_data;
pub mod union;

use std::sync::Arc;

use parking_lot::Mutex;
use refflow_error::Result;

use crate::bundle::{RefBundle, StatsMap};
use crate::config::execution::ExecutionOptions;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

use self::all_to_all::AllToAllOperator;
use self::input_data::InputDataOperator;
use self::union::UnionOperator;

/// Shared handle to a physical operator in the DAG.
///
/// Downstream operators hold handles to their upstream dependencies so they
/// can observe completion; the executor holds handles to everything. The
/// control plane is single-threaded, so locks are uncontended and only ever
/// taken downstream-to-upstream on an acyclic graph.
pub type PhysicalOperatorRef = Arc<Mutex<PhysicalOperator>>;

pub fn operator_ref(operator: PhysicalOperator) -> PhysicalOperatorRef {
    Arc::new(Mutex::new(operator))
}

/// Runtime plan node, one variant per operator kind.
///
/// Mirrors the closed logical enum; the planner's mapping from logical to
/// physical is a total function over these tags.
#[derive(Debug)]
pub enum PhysicalOperator {
    InputData(InputDataOperator),
    Union(UnionOperator),
    AllToAll(AllToAllOperator),
}

impl PhysicalOperator {
    pub fn name(&self) -> &str {
        match self {
            Self::InputData(op) => op.base().name(),
            Self::Union(op) => op.base().name(),
            Self::AllToAll(op) => op.base().name(),
        }
    }

    pub fn input_dependencies(&self) -> &[PhysicalOperatorRef] {
        match self {
            Self::InputData(op) => op.base().input_dependencies(),
            Self::Union(op) => op.base().input_dependencies(),
            Self::AllToAll(op) => op.base().input_dependencies(),
        }
    }

    /// Receive the run's execution options. Must be called exactly once,
    /// before any `add_input`.
    pub fn start(&mut self, options: ExecutionOptions) -> Result<()> {
        match self {
            Self::InputData(op) => op.start(options),
            Self::Union(op) => op.start(options),
            Self::AllToAll(op) => op.start(options),
        }
    }

    /// Ingest one bundle from the upstream at `input_index`.
    ///
    /// Calling this on a completed operator, or with an out-of-range index,
    /// is a driver defect and panics.
    pub fn add_input(&mut self, bundle: RefBundle, input_index: usize) {
        assert!(
            !self.completed(),
            "add_input on completed operator '{}'",
            self.name(),
        );
        match self {
            Self::InputData(op) => op.add_input(bundle, input_index),
            Self::Union(op) => op.add_input(bundle, input_index),
            Self::AllToAll(op) => op.add_input(bundle, input_index),
        }
    }

    /// Signal that no further `add_input` will occur on any index. Triggers
    /// the operator's final flush, which for all-to-all operators is where
    /// the bulk transform actually runs.
    pub fn inputs_done(&mut self) -> Result<()> {
        match self {
            Self::InputData(op) => op.inputs_done(),
            Self::Union(op) => op.inputs_done(),
            Self::AllToAll(op) => op.inputs_done(),
        }
    }

    pub fn has_next(&self) -> bool {
        match self {
            Self::InputData(op) => op.has_next(),
            Self::Union(op) => op.has_next(),
            Self::AllToAll(op) => op.has_next(),
        }
    }

    /// Remove and return the oldest buffered output bundle.
    ///
    /// Only valid while `has_next` is true; pulling from an empty operator
    /// panics.
    pub fn get_next(&mut self) -> RefBundle {
        match self {
            Self::InputData(op) => op.get_next(),
            Self::Union(op) => op.get_next(),
            Self::AllToAll(op) => op.get_next(),
        }
    }

    pub fn num_outputs_total(&self) -> Option<u64> {
        match self {
            Self::InputData(op) => op.num_outputs_total(),
            Self::Union(op) => op.num_outputs_total(),
            Self::AllToAll(op) => op.num_outputs_total(),
        }
    }

    /// True once every upstream path has delivered `inputs_done` and the
    /// output buffer has been drained.
    pub fn completed(&self) -> bool {
        match self {
            Self::InputData(op) => op.completed(),
            Self::Union(op) => op.completed(),
            Self::AllToAll(op) => op.completed(),
        }
    }

    /// Per-phase block metadata collected while this operator ran. Empty for
    /// operators without runtime-side phases.
    pub fn statistics(&self) -> StatsMap {
        match self {
            Self::AllToAll(op) => op.statistics(),
            Self::InputData(_) | Self::Union(_) => StatsMap::new(),
        }
    }

    /// Create one progress counter per named sub-phase, positioned
    /// sequentially from `start_position`. Returns how many were created.
    pub fn initialize_sub_progress_bars(&mut self, start_position: usize) -> usize {
        match self {
            Self::AllToAll(op) => op.initialize_sub_progress_bars(start_position),
            Self::InputData(_) | Self::Union(_) => 0,
        }
    }

    /// Release all sub-phase counters. Safe when none were created.
    pub fn close_sub_progress_bars(&mut self) {
        if let Self::AllToAll(op) = self {
            op.close_sub_progress_bars()
        }
    }

    /// Tear down the operator, returning every bundle still buffered so a
    /// cancelling executor can release the exclusively owned ones.
    pub fn shutdown(&mut self) -> Vec<RefBundle> {
        match self {
            Self::InputData(op) => op.shutdown(),
            Self::Union(op) => op.shutdown(),
            Self::AllToAll(op) => op.shutdown(),
        }
    }
}

impl Explainable for PhysicalOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        match self {
            Self::InputData(op) => op.explain_entry(conf),
            Self::Union(op) => op.explain_entry(conf),
            Self::AllToAll(op) => op.explain_entry(conf),
        }
    }
}
