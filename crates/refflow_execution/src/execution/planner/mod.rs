//! Conversion of logical plan nodes into physical operator subtrees.

mod plan_all_to_all;
mod plan_input_data;
mod plan_union;

use std::sync::Arc;

use refflow_error::Result;
use tracing::debug;

use crate::execution::operators::PhysicalOperatorRef;
use crate::logical::operator::LogicalOperator;
use crate::runtime::progress::ProgressSink;
use crate::runtime::TaskRuntime;

/// Plans a logical DAG into a physical DAG, injecting the run's collaborators
/// into the operators that need them.
///
/// The mapping is total over the logical variants; a plan the planner cannot
/// realize is a malformed plan, reported as an error.
#[derive(Debug)]
pub struct PhysicalPlanner {
    runtime: Arc<dyn TaskRuntime>,
    progress: Arc<dyn ProgressSink>,
}

impl PhysicalPlanner {
    pub fn new(runtime: Arc<dyn TaskRuntime>, progress: Arc<dyn ProgressSink>) -> Self {
        PhysicalPlanner { runtime, progress }
    }

    pub fn plan(&self, plan: LogicalOperator) -> Result<PhysicalOperatorRef> {
        debug!(node = plan.name(), "planning logical node");
        match plan {
            LogicalOperator::InputData(node) => plan_input_data::plan(node),
            LogicalOperator::Union(node) => {
                let children = self.plan_children(node.children)?;
                plan_union::plan(children)
            }
            LogicalOperator::RandomizeBlocks(node) => {
                let mut children = self.plan_children(node.children)?;
                plan_all_to_all::plan_randomize_blocks(self, node.node, &mut children)
            }
            LogicalOperator::RandomShuffle(node) => {
                let mut children = self.plan_children(node.children)?;
                plan_all_to_all::plan_random_shuffle(self, node.node, &mut children)
            }
            LogicalOperator::Repartition(node) => {
                let mut children = self.plan_children(node.children)?;
                plan_all_to_all::plan_repartition(self, node.node, &mut children)
            }
            LogicalOperator::Sort(node) => {
                let mut children = self.plan_children(node.children)?;
                plan_all_to_all::plan_sort(self, node.node, &mut children)
            }
            LogicalOperator::Aggregate(node) => {
                let mut children = self.plan_children(node.children)?;
                plan_all_to_all::plan_aggregate(self, node.node, &mut children)
            }
        }
    }

    fn plan_children(&self, children: Vec<LogicalOperator>) -> Result<Vec<PhysicalOperatorRef>> {
        children.into_iter().map(|child| self.plan(child)).collect()
    }

    pub(crate) fn runtime(&self) -> Arc<dyn TaskRuntime> {
        Arc::clone(&self.runtime)
    }

    pub(crate) fn progress(&self) -> Arc<dyn ProgressSink> {
        Arc::clone(&self.progress)
    }
}
