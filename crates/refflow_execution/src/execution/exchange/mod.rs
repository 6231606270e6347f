//! Bulk transforms realizing the all-to-all operator variants.
//!
//! A transform receives every buffered input bundle at once and produces the
//! reorganized output bundles. The block-level work happens runtime-side;
//! transforms only build task specs, submit them one unit at a time, tick the
//! matching sub-progress phase, and account for block ownership.

pub mod aggregate;
pub mod randomize_blocks;
pub mod repartition;
pub mod shuffle;
pub mod sort;

use std::fmt::Debug;

use refflow_error::Result;

use crate::bundle::{BlockRef, BundledBlock, RefBundle, StatsMap};
use crate::runtime::progress::ProgressCounter;
use crate::runtime::{ExchangeSpec, TaskRuntime, TaskSpec};

pub const PHASE_SORT_SAMPLE: &str = "Sort Sample";
pub const PHASE_SHUFFLE_MAP: &str = "Shuffle Map";
pub const PHASE_SHUFFLE_REDUCE: &str = "Shuffle Reduce";
pub const PHASE_AGGREGATE: &str = "Aggregate";

/// Sub-phase progress counters created by an all-to-all operator, in phase
/// order.
#[derive(Debug, Default)]
pub struct SubProgress {
    counters: Vec<(String, Box<dyn ProgressCounter>)>,
}

impl SubProgress {
    pub fn push(&mut self, phase: impl Into<String>, counter: Box<dyn ProgressCounter>) {
        self.counters.push((phase.into(), counter));
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Tick the counter for `phase` by one. No-op for phases without a
    /// counter.
    pub fn tick(&mut self, phase: &str) {
        if let Some((_, counter)) = self.counters.iter_mut().find(|(name, _)| name == phase) {
            counter.increment(1);
        }
    }

    pub fn close_all(&mut self) {
        for (_, counter) in &mut self.counters {
            counter.close();
        }
        self.counters.clear();
    }
}

/// Everything a transform may touch while running: the task runtime plus the
/// owning operator's progress counters and statistics.
pub struct BulkContext<'a> {
    runtime: &'a dyn TaskRuntime,
    progress: &'a mut SubProgress,
    stats: &'a mut StatsMap,
}

impl<'a> BulkContext<'a> {
    pub fn new(
        runtime: &'a dyn TaskRuntime,
        progress: &'a mut SubProgress,
        stats: &'a mut StatsMap,
    ) -> Self {
        BulkContext {
            runtime,
            progress,
            stats,
        }
    }

    pub fn runtime(&self) -> &dyn TaskRuntime {
        self.runtime
    }

    /// Submit one unit of work, ticking `phase` and recording the metadata of
    /// every block it produced under that phase.
    pub fn submit(&mut self, phase: &str, task: TaskSpec) -> Result<Vec<BundledBlock>> {
        let blocks = self.runtime.submit(task)?;
        self.progress.tick(phase);
        self.stats
            .entry(phase.to_string())
            .or_default()
            .extend(blocks.iter().map(|b| b.metadata.clone()));
        Ok(blocks)
    }

    /// Mark engine-owned intermediate blocks for eviction.
    pub fn release(&self, blocks: &[BlockRef]) -> u64 {
        self.runtime.release_blocks(blocks)
    }
}

/// A planner-built bulk transform backing one all-to-all operator.
pub trait BulkTransform: Debug + Send {
    /// Named sub-phases in execution order, for progress reporting. Empty
    /// for single-pass transforms.
    fn sub_phases(&self) -> &'static [&'static str];

    /// Reorganize `inputs` into the output bundles.
    fn run(&mut self, inputs: Vec<RefBundle>, ctx: &mut BulkContext) -> Result<Vec<RefBundle>>;
}

/// The two-phase scatter/merge shared by the shuffle-class transforms.
///
/// Map scatters each input block into one intermediate block per output
/// partition; reduce merges each partition's intermediates into its final
/// block. Consumed input blocks the engine owned, and all intermediates, are
/// released as soon as their phase no longer needs them.
pub(crate) fn run_map_reduce(
    ctx: &mut BulkContext,
    exchange: &ExchangeSpec,
    inputs: Vec<RefBundle>,
    boundaries: &[BlockRef],
) -> Result<Vec<RefBundle>> {
    let num_partitions = exchange.output_partitions;
    let input_blocks: Vec<BlockRef> = inputs.iter().flat_map(|b| b.block_refs()).collect();

    let mut partitions: Vec<Vec<BlockRef>> = vec![Vec::new(); num_partitions];
    for input in input_blocks {
        let intermediates = ctx.submit(
            PHASE_SHUFFLE_MAP,
            TaskSpec::Map {
                exchange: exchange.clone(),
                input,
                boundaries: boundaries.to_vec(),
            },
        )?;
        assert_eq!(
            num_partitions,
            intermediates.len(),
            "runtime returned wrong partition count for map task",
        );
        for (partition, block) in partitions.iter_mut().zip(intermediates) {
            partition.push(block.block);
        }
    }

    // The map phase consumed the inputs.
    for bundle in inputs {
        bundle.destroy_if_owned(ctx.runtime());
    }

    let mut outputs = Vec::with_capacity(num_partitions);
    for (output_index, intermediates) in partitions.into_iter().enumerate() {
        let blocks = ctx.submit(
            PHASE_SHUFFLE_REDUCE,
            TaskSpec::Reduce {
                exchange: exchange.clone(),
                inputs: intermediates.clone(),
                output_index,
            },
        )?;
        ctx.release(&intermediates);
        outputs.push(RefBundle::new(blocks, true));
    }

    Ok(outputs)
}
