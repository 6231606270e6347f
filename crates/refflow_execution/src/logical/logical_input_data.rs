use std::fmt;
use std::sync::Arc;

use refflow_error::Result;

use crate::bundle::RefBundle;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

use super::operator::{LogicalNode, Node};

/// Produces the seed bundles for an input-synthesis operator.
///
/// The closure is invoked exactly once, when the physical operator starts.
/// Anything the factory needs (in-process arrays to hand to the task runtime,
/// a handle to the runtime itself) is captured at construction.
#[derive(Clone)]
pub struct InputDataFactory(Arc<dyn Fn() -> Result<Vec<RefBundle>> + Send + Sync>);

impl InputDataFactory {
    pub fn new(f: impl Fn() -> Result<Vec<RefBundle>> + Send + Sync + 'static) -> Self {
        InputDataFactory(Arc::new(f))
    }

    pub fn materialize(&self) -> Result<Vec<RefBundle>> {
        (self.0)()
    }
}

impl fmt::Debug for InputDataFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDataFactory").finish_non_exhaustive()
    }
}

impl PartialEq for InputDataFactory {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Where an input-synthesis node gets its bundles from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDataSource {
    /// Bundles already materialized when the plan was built.
    Eager(Vec<RefBundle>),
    /// Bundles produced on demand when execution starts.
    Factory(InputDataFactory),
}

/// Leaf node injecting externally provided bundles into the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalInputData {
    pub source: InputDataSource,
}

impl LogicalNode for Node<LogicalInputData> {
    fn name(&self) -> &'static str {
        "InputData"
    }

    fn num_outputs_total(&self) -> Option<u64> {
        match &self.node.source {
            InputDataSource::Eager(bundles) => Some(bundles.len() as u64),
            // Count is unknowable until the factory runs.
            InputDataSource::Factory(_) => None,
        }
    }
}

impl Explainable for LogicalInputData {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        let ent = ExplainEntry::new("InputData");
        match &self.source {
            InputDataSource::Eager(bundles) => ent.with_value("bundles", bundles.len()),
            InputDataSource::Factory(_) => ent.with_value("bundles", "deferred"),
        }
    }
}
