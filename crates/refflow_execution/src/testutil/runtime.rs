use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use refflow_error::{RefflowError, Result};

use crate::bundle::{BlockExecStats, BlockMetadata, BlockRef, BundledBlock, RefBundle};
use crate::logical::logical_all_to_all::AggregateFn;
use crate::runtime::{ExchangeKind, ExchangeSpec, TaskRuntime, TaskSpec};

const ROW_BYTES: u64 = 8;

/// Task runtime executing every submission synchronously in-process, storing
/// blocks as plain `i64` rows.
///
/// Keys name a column in a real system; rows here are single values, so the
/// fixture keys on the value itself. That is enough to exercise every
/// engine-side property (ordering, cardinality, progress, statistics,
/// release accounting) without a columnar layer the engine must never
/// inspect anyway.
#[derive(Debug, Default)]
pub struct InProcessTaskRuntime {
    state: Mutex<RuntimeState>,
}

#[derive(Debug, Default)]
struct RuntimeState {
    next_id: u64,
    blocks: HashMap<BlockRef, Vec<i64>>,
    released: Vec<BlockRef>,
    fail_message: Option<String>,
}

impl RuntimeState {
    fn store(&mut self, rows: Vec<i64>, computed: bool) -> BundledBlock {
        let block = BlockRef(self.next_id);
        self.next_id += 1;

        let mut metadata = BlockMetadata::with_counts(rows.len() as u64, rows.len() as u64 * ROW_BYTES);
        if computed {
            metadata.exec_stats = Some(BlockExecStats {
                wall_time: Duration::from_micros(rows.len() as u64 + 1),
            });
        }

        self.blocks.insert(block, rows);
        BundledBlock { block, metadata }
    }

    fn rows(&self, block: BlockRef) -> Vec<i64> {
        self.blocks
            .get(&block)
            .cloned()
            .expect("block present in runtime")
    }
}

impl InProcessTaskRuntime {
    pub fn new() -> Self {
        InProcessTaskRuntime::default()
    }

    /// Store rows as a new block, as an external data source would.
    pub fn insert_block(&self, rows: Vec<i64>) -> BundledBlock {
        self.state.lock().store(rows, false)
    }

    /// Single-block bundle over freshly stored rows.
    pub fn bundle_of(&self, rows: Vec<i64>, owns_blocks: bool) -> RefBundle {
        RefBundle::new(vec![self.insert_block(rows)], owns_blocks)
    }

    pub fn rows(&self, block: BlockRef) -> Vec<i64> {
        self.state.lock().rows(block)
    }

    /// All rows referenced by a bundle, in block order.
    pub fn bundle_rows(&self, bundle: &RefBundle) -> Vec<i64> {
        let state = self.state.lock();
        bundle
            .block_refs()
            .into_iter()
            .flat_map(|block| state.rows(block))
            .collect()
    }

    /// Blocks released so far, in release order.
    pub fn released(&self) -> Vec<BlockRef> {
        self.state.lock().released.clone()
    }

    /// Make every subsequent `submit` fail with `message`.
    pub fn fail_submits(&self, message: &str) {
        self.state.lock().fail_message = Some(message.to_string());
    }
}

impl TaskRuntime for InProcessTaskRuntime {
    fn submit(&self, task: TaskSpec) -> Result<Vec<BundledBlock>> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_message.clone() {
            return Err(RefflowError::new(message));
        }

        match task {
            TaskSpec::Map {
                exchange,
                input,
                boundaries,
            } => {
                let rows = state.rows(input);
                let boundary_rows: Vec<i64> = boundaries
                    .iter()
                    .flat_map(|block| state.rows(*block))
                    .collect();
                let partitions = scatter(&exchange, input, rows, &boundary_rows);
                Ok(partitions
                    .into_iter()
                    .map(|rows| state.store(rows, true))
                    .collect())
            }
            TaskSpec::Reduce {
                exchange, inputs, ..
            } => {
                let mut rows: Vec<i64> = inputs
                    .iter()
                    .flat_map(|block| state.rows(*block))
                    .collect();
                match &exchange.kind {
                    ExchangeKind::Sort { descending, .. } => {
                        rows.sort_unstable();
                        if *descending {
                            rows.reverse();
                        }
                    }
                    ExchangeKind::Aggregate { key, aggregates } => {
                        rows = aggregate_rows(rows, key.is_some(), aggregates);
                    }
                    ExchangeKind::RandomShuffle { .. } | ExchangeKind::Repartition { .. } => {}
                }
                Ok(vec![state.store(rows, true)])
            }
            TaskSpec::Sample { input, .. } => {
                let rows = state.rows(input);
                let stride = (rows.len() / 4).max(1);
                let sampled: Vec<i64> = rows.iter().copied().step_by(stride).collect();
                Ok(vec![state.store(sampled, true)])
            }
        }
    }

    fn release_blocks(&self, blocks: &[BlockRef]) -> u64 {
        let mut state = self.state.lock();
        let mut freed = 0;
        for block in blocks {
            if let Some(rows) = state.blocks.remove(block) {
                freed += rows.len() as u64 * ROW_BYTES;
            }
            state.released.push(*block);
        }
        freed
    }
}

/// Scatter one block's rows into `output_partitions` pieces.
fn scatter(
    exchange: &ExchangeSpec,
    input: BlockRef,
    rows: Vec<i64>,
    boundary_rows: &[i64],
) -> Vec<Vec<i64>> {
    let num_partitions = exchange.output_partitions;
    let mut partitions = vec![Vec::new(); num_partitions];
    match &exchange.kind {
        ExchangeKind::RandomShuffle { seed } => {
            // Stream per (seed, block) so reruns with the same seed land rows
            // identically while blocks still scatter independently.
            let mut rng = match seed {
                Some(seed) => {
                    ChaCha12Rng::seed_from_u64(seed ^ input.0.wrapping_mul(0x9e3779b97f4a7c15))
                }
                None => ChaCha12Rng::from_os_rng(),
            };
            for row in rows {
                partitions[rng.random_range(0..num_partitions)].push(row);
            }
        }
        ExchangeKind::Repartition { shuffle: true } | ExchangeKind::Aggregate { .. } => {
            for row in rows {
                partitions[row.rem_euclid(num_partitions as i64) as usize].push(row);
            }
        }
        ExchangeKind::Repartition { shuffle: false } => {
            let chunk = rows.len().div_ceil(num_partitions).max(1);
            for (idx, piece) in rows.chunks(chunk).enumerate() {
                partitions[idx].extend_from_slice(piece);
            }
        }
        ExchangeKind::Sort { .. } => {
            let cuts = sort_cuts(boundary_rows, num_partitions);
            for row in rows {
                partitions[cuts.partition_point(|cut| *cut <= row)].push(row);
            }
        }
    }
    partitions
}

/// Range boundaries derived from sample rows: `n - 1` ascending cut points,
/// row `r` belongs to the number of cuts at or below it.
fn sort_cuts(samples: &[i64], num_partitions: usize) -> Vec<i64> {
    if samples.is_empty() || num_partitions <= 1 {
        return Vec::new();
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    (1..num_partitions)
        .map(|idx| sorted[(idx * sorted.len()) / num_partitions])
        .collect()
}

fn aggregate_rows(rows: Vec<i64>, grouped: bool, aggregates: &[AggregateFn]) -> Vec<i64> {
    if !grouped {
        return aggregates.iter().map(|agg| apply(*agg, &rows)).collect();
    }

    let mut groups: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for row in rows {
        groups.entry(row).or_default().push(row);
    }

    // (key, aggregate...) rows in key order.
    let mut out = Vec::new();
    for (key, group) in groups {
        out.push(key);
        for agg in aggregates {
            out.push(apply(*agg, &group));
        }
    }
    out
}

fn apply(agg: AggregateFn, rows: &[i64]) -> i64 {
    match agg {
        AggregateFn::Count => rows.len() as i64,
        AggregateFn::Sum => rows.iter().sum(),
        AggregateFn::Min => rows.iter().copied().min().unwrap_or(0),
        AggregateFn::Max => rows.iter().copied().max().unwrap_or(0),
        AggregateFn::Mean => {
            if rows.is_empty() {
                0
            } else {
                rows.iter().sum::<i64>() / rows.len() as i64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::logical_all_to_all::RemoteArgs;

    fn shuffle_exchange(seed: Option<u64>, output_partitions: usize) -> ExchangeSpec {
        ExchangeSpec {
            kind: ExchangeKind::RandomShuffle { seed },
            output_partitions,
            remote_args: RemoteArgs::new(),
        }
    }

    #[test]
    fn stored_rows_round_trip() {
        let runtime = InProcessTaskRuntime::new();
        let block = runtime.insert_block(vec![1, 2, 3]);
        assert_eq!(Some(3), block.metadata.num_rows);
        assert_eq!(Some(24), block.metadata.size_bytes);
        assert_eq!(vec![1, 2, 3], runtime.rows(block.block));
    }

    #[test]
    fn release_accounts_bytes_and_records_order() {
        let runtime = InProcessTaskRuntime::new();
        let a = runtime.insert_block(vec![1, 2]).block;
        let b = runtime.insert_block(vec![3]).block;

        assert_eq!(24, runtime.release_blocks(&[a, b]));
        assert_eq!(vec![a, b], runtime.released());
        // Releasing again frees nothing but is still recorded.
        assert_eq!(0, runtime.release_blocks(&[a]));
    }

    #[test]
    fn map_scatter_is_deterministic_per_seed() {
        let runtime = InProcessTaskRuntime::new();
        let input = runtime.insert_block(vec![1, 2, 3, 4, 5, 6]).block;

        let run = |seed| {
            let blocks = runtime
                .submit(TaskSpec::Map {
                    exchange: shuffle_exchange(Some(seed), 3),
                    input,
                    boundaries: Vec::new(),
                })
                .unwrap();
            let rows: Vec<Vec<i64>> = blocks
                .iter()
                .map(|b| runtime.rows(b.block))
                .collect();
            runtime.release_blocks(&blocks.iter().map(|b| b.block).collect::<Vec<_>>());
            rows
        };

        assert_eq!(run(9), run(9));
    }

    #[test]
    fn computed_blocks_carry_exec_stats() {
        let runtime = InProcessTaskRuntime::new();
        let input = runtime.insert_block(vec![5, 1]).block;
        let blocks = runtime
            .submit(TaskSpec::Reduce {
                exchange: ExchangeSpec {
                    kind: ExchangeKind::Sort {
                        key: None,
                        descending: false,
                    },
                    output_partitions: 1,
                    remote_args: RemoteArgs::new(),
                },
                inputs: vec![input],
                output_index: 0,
            })
            .unwrap();

        assert!(blocks[0].metadata.exec_stats.is_some());
        assert_eq!(vec![1, 5], runtime.rows(blocks[0].block));
    }

    #[test]
    fn injected_failure_surfaces_from_submit() {
        let runtime = InProcessTaskRuntime::new();
        let input = runtime.insert_block(vec![1]).block;
        runtime.fail_submits("worker died");

        let err = runtime
            .submit(TaskSpec::Sample {
                exchange: shuffle_exchange(None, 1),
                input,
            })
            .unwrap_err();
        assert_eq!("worker died", err.message());
    }
}
