use refflow_error::{RefflowError, Result};

use crate::execution::exchange::aggregate::AggregateTransform;
use crate::execution::exchange::randomize_blocks::RandomizeBlocksTransform;
use crate::execution::exchange::repartition::RepartitionTransform;
use crate::execution::exchange::shuffle::ShuffleTransform;
use crate::execution::exchange::sort::SortTransform;
use crate::execution::exchange::BulkTransform;
use crate::execution::operators::all_to_all::AllToAllOperator;
use crate::execution::operators::{operator_ref, PhysicalOperator, PhysicalOperatorRef};
use crate::logical::logical_all_to_all::{
    LogicalAggregate,
    LogicalRandomShuffle,
    LogicalRandomizeBlocks,
    LogicalRepartition,
    LogicalSort,
};

use super::PhysicalPlanner;

fn single_child(
    name: &'static str,
    children: &mut Vec<PhysicalOperatorRef>,
) -> Result<PhysicalOperatorRef> {
    if children.len() != 1 {
        return Err(RefflowError::new(format!(
            "{name} plan node requires exactly one child, got {}",
            children.len(),
        )));
    }
    Ok(children.remove(0))
}

fn build(
    planner: &PhysicalPlanner,
    name: &'static str,
    children: &mut Vec<PhysicalOperatorRef>,
    explicit_num_outputs: Option<u64>,
    transform: Box<dyn BulkTransform>,
) -> Result<PhysicalOperatorRef> {
    let input = single_child(name, children)?;
    Ok(operator_ref(PhysicalOperator::AllToAll(
        AllToAllOperator::new(
            name,
            input,
            explicit_num_outputs,
            transform,
            planner.runtime(),
            planner.progress(),
        ),
    )))
}

pub fn plan_randomize_blocks(
    planner: &PhysicalPlanner,
    node: LogicalRandomizeBlocks,
    children: &mut Vec<PhysicalOperatorRef>,
) -> Result<PhysicalOperatorRef> {
    build(
        planner,
        "RandomizeBlocks",
        children,
        None,
        Box::new(RandomizeBlocksTransform::new(node.seed)),
    )
}

pub fn plan_random_shuffle(
    planner: &PhysicalPlanner,
    node: LogicalRandomShuffle,
    children: &mut Vec<PhysicalOperatorRef>,
) -> Result<PhysicalOperatorRef> {
    build(
        planner,
        "RandomShuffle",
        children,
        node.num_outputs,
        Box::new(ShuffleTransform::new(
            node.seed,
            node.num_outputs,
            node.remote_args,
        )),
    )
}

pub fn plan_repartition(
    planner: &PhysicalPlanner,
    node: LogicalRepartition,
    children: &mut Vec<PhysicalOperatorRef>,
) -> Result<PhysicalOperatorRef> {
    build(
        planner,
        "Repartition",
        children,
        Some(node.num_outputs),
        Box::new(RepartitionTransform::new(node.num_outputs, node.shuffle)),
    )
}

pub fn plan_sort(
    planner: &PhysicalPlanner,
    node: LogicalSort,
    children: &mut Vec<PhysicalOperatorRef>,
) -> Result<PhysicalOperatorRef> {
    build(
        planner,
        "Sort",
        children,
        None,
        Box::new(SortTransform::new(node.key, node.descending)),
    )
}

pub fn plan_aggregate(
    planner: &PhysicalPlanner,
    node: LogicalAggregate,
    children: &mut Vec<PhysicalOperatorRef>,
) -> Result<PhysicalOperatorRef> {
    build(
        planner,
        "Aggregate",
        children,
        None,
        Box::new(AggregateTransform::new(node.key, node.aggregates)),
    )
}
