pub mod progress;

use std::fmt::Debug;

use refflow_error::Result;

use crate::bundle::{BlockRef, BundledBlock};
use crate::logical::logical_all_to_all::{AggregateFn, RemoteArgs};

/// How an exchange reorganizes rows across output partitions.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeKind {
    /// Scatter rows uniformly at random.
    RandomShuffle { seed: Option<u64> },
    /// Rebalance into a fixed number of partitions, either by scattering
    /// rows (shuffle) or by splitting blocks contiguously.
    Repartition { shuffle: bool },
    /// Range-partition by key so that concatenating the sorted partitions
    /// yields a globally sorted dataset.
    Sort {
        key: Option<String>,
        descending: bool,
    },
    /// Partition by grouping key and fold each group.
    Aggregate {
        key: Option<String>,
        aggregates: Vec<AggregateFn>,
    },
}

/// Describes one all-to-all exchange to the task runtime.
///
/// Every task submitted for the same exchange carries the same spec; the
/// runtime interprets it when executing the block-level work.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSpec {
    pub kind: ExchangeKind,
    /// Number of output partitions the exchange produces.
    pub output_partitions: usize,
    /// Opaque placement/resource hints for the runtime's scheduler.
    pub remote_args: RemoteArgs,
}

/// A single unit of block-level work submitted to the distributed runtime.
///
/// The engine never sees rows; tasks reference blocks by handle and the
/// runtime hands back new handles plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskSpec {
    /// Scatter one input block into exactly `exchange.output_partitions`
    /// intermediate blocks (some possibly empty).
    Map {
        exchange: ExchangeSpec,
        input: BlockRef,
        /// Sample blocks a preceding sample phase produced; the runtime
        /// derives range boundaries from them. Empty for non-sort exchanges.
        boundaries: Vec<BlockRef>,
    },
    /// Merge the intermediate blocks belonging to one output partition into
    /// that partition's final block.
    Reduce {
        exchange: ExchangeSpec,
        inputs: Vec<BlockRef>,
        output_index: usize,
    },
    /// Probe one input block for key samples (sort only).
    Sample {
        exchange: ExchangeSpec,
        input: BlockRef,
    },
}

/// The distributed task runtime the engine delegates block computation to.
///
/// `submit` blocks the calling thread until the unit of work finishes; the
/// runtime is free to execute many submissions in parallel internally. A
/// returned block reference may refer to a failed computation — the engine
/// passes such references through untouched and leaves detection to the
/// consumer.
pub trait TaskRuntime: Debug + Send + Sync {
    /// Execute one unit of work, returning the blocks it produced.
    ///
    /// Map tasks return one block per output partition, reduce and sample
    /// tasks a single block.
    fn submit(&self, task: TaskSpec) -> Result<Vec<BundledBlock>>;

    /// Mark blocks for eviction. Returns the number of bytes freed.
    fn release_blocks(&self, blocks: &[BlockRef]) -> u64;
}
