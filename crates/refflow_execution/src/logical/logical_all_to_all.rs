use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

use super::operator::{LogicalNode, Node};

/// Resource and placement hints forwarded verbatim to the task runtime when
/// submitting shuffle work. Opaque to the engine.
pub type RemoteArgs = HashMap<String, serde_json::Value>;

/// Well-known aggregation functions applied per group during an aggregate.
///
/// Execution happens runtime-side; the engine only carries the tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Min,
    Max,
    Mean,
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
        };
        write!(f, "{name}")
    }
}

/// Cardinality for shuffle-class nodes.
///
/// Explicit target if set, else the upstream estimate, else zero. The zero
/// fallback (rather than unknown) is deliberate: progress counters for these
/// operators are sized from this value, and sizing clamps zero up to one.
fn all_to_all_num_outputs(explicit: Option<u64>, upstream: Option<u64>) -> Option<u64> {
    Some(explicit.or(upstream).unwrap_or(0))
}

/// Reorders the blocks of the dataset without touching any rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalRandomizeBlocks {
    pub seed: Option<u64>,
}

impl LogicalNode for Node<LogicalRandomizeBlocks> {
    fn name(&self) -> &'static str {
        "RandomizeBlocks"
    }

    fn num_outputs_total(&self) -> Option<u64> {
        all_to_all_num_outputs(None, self.child_num_outputs_total())
    }
}

impl Explainable for LogicalRandomizeBlocks {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("RandomizeBlocks").with_value_opt("seed", self.seed)
    }
}

/// Globally shuffles every row of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRandomShuffle {
    pub seed: Option<u64>,
    pub num_outputs: Option<u64>,
    /// Hints forwarded to the task runtime for the shuffle tasks.
    pub remote_args: RemoteArgs,
}

impl LogicalRandomShuffle {
    pub const SUB_PHASES: &'static [&'static str] = &["Shuffle Map", "Shuffle Reduce"];
}

impl LogicalNode for Node<LogicalRandomShuffle> {
    fn name(&self) -> &'static str {
        "RandomShuffle"
    }

    fn num_outputs_total(&self) -> Option<u64> {
        all_to_all_num_outputs(self.node.num_outputs, self.child_num_outputs_total())
    }
}

impl Explainable for LogicalRandomShuffle {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new("RandomShuffle")
            .with_value_opt("seed", self.seed)
            .with_value_opt("num_outputs", self.num_outputs);
        if conf.verbose && !self.remote_args.is_empty() {
            let mut keys: Vec<_> = self.remote_args.keys().collect();
            keys.sort();
            ent = ent.with_values("remote_args", keys);
        }
        ent
    }
}

/// Changes the number of blocks the dataset is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalRepartition {
    pub num_outputs: u64,
    /// Scatter rows across all outputs instead of splitting blocks
    /// contiguously.
    pub shuffle: bool,
}

impl LogicalRepartition {
    pub const SUB_PHASES: &'static [&'static str] = &["Shuffle Map", "Shuffle Reduce"];
}

impl LogicalNode for Node<LogicalRepartition> {
    fn name(&self) -> &'static str {
        "Repartition"
    }

    fn num_outputs_total(&self) -> Option<u64> {
        all_to_all_num_outputs(Some(self.node.num_outputs), self.child_num_outputs_total())
    }
}

impl Explainable for LogicalRepartition {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Repartition")
            .with_value("num_outputs", self.num_outputs)
            .with_value("shuffle", self.shuffle)
    }
}

/// Globally sorts the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSort {
    /// Column to sort on; None sorts on whole rows.
    pub key: Option<String>,
    pub descending: bool,
}

impl LogicalSort {
    pub const SUB_PHASES: &'static [&'static str] = &["Sort Sample", "Shuffle Map", "Shuffle Reduce"];
}

impl LogicalNode for Node<LogicalSort> {
    fn name(&self) -> &'static str {
        "Sort"
    }

    fn num_outputs_total(&self) -> Option<u64> {
        all_to_all_num_outputs(None, self.child_num_outputs_total())
    }
}

impl Explainable for LogicalSort {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Sort")
            .with_value_opt("key", self.key.as_deref())
            .with_value("descending", self.descending)
    }
}

/// Groups the dataset and folds each group with the given aggregations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalAggregate {
    /// Grouping column; None aggregates the whole dataset as one group.
    pub key: Option<String>,
    /// Applied in order to each group.
    pub aggregates: Vec<AggregateFn>,
}

impl LogicalNode for Node<LogicalAggregate> {
    fn name(&self) -> &'static str {
        "Aggregate"
    }

    fn num_outputs_total(&self) -> Option<u64> {
        all_to_all_num_outputs(None, self.child_num_outputs_total())
    }
}

impl Explainable for LogicalAggregate {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Aggregate")
            .with_value_opt("key", self.key.as_deref())
            .with_values("aggregates", &self.aggregates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::logical_input_data::{InputDataFactory, InputDataSource, LogicalInputData};
    use crate::logical::operator::LogicalOperator;
    use crate::testutil::bundles::labeled_bundles;

    fn eager_source(count: usize) -> LogicalOperator {
        LogicalOperator::InputData(Node::new(
            LogicalInputData {
                source: InputDataSource::Eager(labeled_bundles(0, count)),
            },
            Vec::new(),
        ))
    }

    fn deferred_source() -> LogicalOperator {
        LogicalOperator::InputData(Node::new(
            LogicalInputData {
                source: InputDataSource::Factory(InputDataFactory::new(|| Ok(Vec::new()))),
            },
            Vec::new(),
        ))
    }

    #[test]
    fn explicit_target_overrides_upstream_estimate() {
        let shuffle = Node::new(
            LogicalRandomShuffle {
                seed: None,
                num_outputs: Some(12),
                remote_args: RemoteArgs::new(),
            },
            vec![eager_source(5)],
        );
        assert_eq!(Some(12), shuffle.num_outputs_total());

        let repartition = Node::new(
            LogicalRepartition {
                num_outputs: 3,
                shuffle: true,
            },
            vec![eager_source(5)],
        );
        assert_eq!(Some(3), repartition.num_outputs_total());
    }

    #[test]
    fn falls_back_to_upstream_estimate() {
        let shuffle = Node::new(
            LogicalRandomShuffle {
                seed: Some(1),
                num_outputs: None,
                remote_args: RemoteArgs::new(),
            },
            vec![eager_source(5)],
        );
        assert_eq!(Some(5), shuffle.num_outputs_total());
    }

    #[test]
    fn defaults_to_zero_not_unknown() {
        // Unknown upstream cardinality collapses to zero for this family;
        // progress sizing depends on getting a number here.
        let sort = Node::new(
            LogicalSort {
                key: None,
                descending: false,
            },
            vec![deferred_source()],
        );
        assert_eq!(Some(0), sort.num_outputs_total());
    }

    #[test]
    fn sub_phase_names() {
        assert_eq!(
            &["Shuffle Map", "Shuffle Reduce"],
            LogicalRandomShuffle::SUB_PHASES
        );
        assert_eq!(
            &["Shuffle Map", "Shuffle Reduce"],
            LogicalRepartition::SUB_PHASES
        );
        assert_eq!(
            &["Sort Sample", "Shuffle Map", "Shuffle Reduce"],
            LogicalSort::SUB_PHASES
        );
    }

    #[test]
    fn explain_entries() {
        let sort = LogicalSort {
            key: Some("ts".to_string()),
            descending: true,
        };
        assert_eq!(
            "Sort (descending = true, key = ts)",
            sort.explain_entry(ExplainConfig::default()).to_string()
        );

        let agg = LogicalAggregate {
            key: Some("user".to_string()),
            aggregates: vec![AggregateFn::Count, AggregateFn::Mean],
        };
        assert_eq!(
            "Aggregate (aggregates = [count, mean], key = user)",
            agg.explain_entry(ExplainConfig::default()).to_string()
        );
    }

    #[test]
    fn verbose_explain_includes_remote_arg_keys() {
        let mut remote_args = RemoteArgs::new();
        remote_args.insert("num_cpus".to_string(), serde_json::json!(2));
        let shuffle = LogicalRandomShuffle {
            seed: None,
            num_outputs: None,
            remote_args,
        };

        // Opaque to the engine, so only the keys are shown, and only when
        // asked for.
        assert_eq!(
            "RandomShuffle",
            shuffle.explain_entry(ExplainConfig::default()).to_string()
        );
        assert_eq!(
            "RandomShuffle (remote_args = [num_cpus])",
            shuffle.explain_entry(ExplainConfig::VERBOSE).to_string()
        );
    }
}
