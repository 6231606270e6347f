use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

use super::logical_all_to_all::{
    LogicalAggregate,
    LogicalRandomShuffle,
    LogicalRandomizeBlocks,
    LogicalRepartition,
    LogicalSort,
};
use super::logical_input_data::LogicalInputData;
use super::logical_union::LogicalUnion;

/// Wrapper around a logical node payload and the operator's children.
///
/// The child list is fixed at construction; the plan DAG is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<N> {
    /// Inner logical node.
    pub node: N,
    /// Child operators feeding this node.
    pub children: Vec<LogicalOperator>,
}

impl<N> Node<N> {
    pub fn new(node: N, children: Vec<LogicalOperator>) -> Self {
        Node { node, children }
    }

    pub fn into_inner(self) -> N {
        self.node
    }

    /// Cardinality estimate of this node's single child.
    ///
    /// Unknown when the node has zero or several children.
    pub fn child_num_outputs_total(&self) -> Option<u64> {
        match self.children.as_slice() {
            [child] => child.num_outputs_total(),
            _ => None,
        }
    }
}

impl<N> AsRef<N> for Node<N> {
    fn as_ref(&self) -> &N {
        &self.node
    }
}

/// Common behavior of logical plan nodes.
pub trait LogicalNode {
    /// Name of this node as shown in plans and progress output.
    fn name(&self) -> &'static str;

    /// Best-effort count of output bundles this node will ultimately
    /// produce, or None when that's genuinely unknown.
    ///
    /// Implementations must never present a guess as a concrete count; the
    /// generic behavior is to return an explicit target when the node has
    /// one, otherwise delegate to a single child, otherwise return unknown.
    fn num_outputs_total(&self) -> Option<u64>;
}

/// Declarative plan node, one variant per operator kind.
///
/// A closed set so that planning stays a total function over the variants;
/// adding an operator kind is a compile-time event, not a runtime surprise.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    InputData(Node<LogicalInputData>),
    Union(Node<LogicalUnion>),
    RandomizeBlocks(Node<LogicalRandomizeBlocks>),
    RandomShuffle(Node<LogicalRandomShuffle>),
    Repartition(Node<LogicalRepartition>),
    Sort(Node<LogicalSort>),
    Aggregate(Node<LogicalAggregate>),
}

impl LogicalOperator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InputData(n) => n.name(),
            Self::Union(n) => n.name(),
            Self::RandomizeBlocks(n) => n.name(),
            Self::RandomShuffle(n) => n.name(),
            Self::Repartition(n) => n.name(),
            Self::Sort(n) => n.name(),
            Self::Aggregate(n) => n.name(),
        }
    }

    pub fn children(&self) -> &[LogicalOperator] {
        match self {
            Self::InputData(n) => &n.children,
            Self::Union(n) => &n.children,
            Self::RandomizeBlocks(n) => &n.children,
            Self::RandomShuffle(n) => &n.children,
            Self::Repartition(n) => &n.children,
            Self::Sort(n) => &n.children,
            Self::Aggregate(n) => &n.children,
        }
    }

    pub fn num_outputs_total(&self) -> Option<u64> {
        match self {
            Self::InputData(n) => n.num_outputs_total(),
            Self::Union(n) => n.num_outputs_total(),
            Self::RandomizeBlocks(n) => n.num_outputs_total(),
            Self::RandomShuffle(n) => n.num_outputs_total(),
            Self::Repartition(n) => n.num_outputs_total(),
            Self::Sort(n) => n.num_outputs_total(),
            Self::Aggregate(n) => n.num_outputs_total(),
        }
    }

    /// If this node globally reorganizes its input rather than transforming
    /// bundles locally.
    pub fn is_all_to_all(&self) -> bool {
        matches!(
            self,
            Self::RandomizeBlocks(_)
                | Self::RandomShuffle(_)
                | Self::Repartition(_)
                | Self::Sort(_)
                | Self::Aggregate(_)
        )
    }
}

impl Explainable for LogicalOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        match self {
            Self::InputData(n) => n.node.explain_entry(conf),
            Self::Union(n) => n.node.explain_entry(conf),
            Self::RandomizeBlocks(n) => n.node.explain_entry(conf),
            Self::RandomShuffle(n) => n.node.explain_entry(conf),
            Self::Repartition(n) => n.node.explain_entry(conf),
            Self::Sort(n) => n.node.explain_entry(conf),
            Self::Aggregate(n) => n.node.explain_entry(conf),
        }
    }
}
