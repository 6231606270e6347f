use refflow_error::Result;

use crate::bundle::RefBundle;
use crate::logical::logical_all_to_all::RemoteArgs;
use crate::runtime::{ExchangeKind, ExchangeSpec};

use super::{run_map_reduce, BulkContext, BulkTransform, PHASE_SHUFFLE_MAP, PHASE_SHUFFLE_REDUCE};

/// Globally shuffles every row of the dataset via a two-phase map/reduce.
#[derive(Debug)]
pub struct ShuffleTransform {
    seed: Option<u64>,
    num_outputs: Option<u64>,
    remote_args: RemoteArgs,
}

impl ShuffleTransform {
    pub fn new(seed: Option<u64>, num_outputs: Option<u64>, remote_args: RemoteArgs) -> Self {
        ShuffleTransform {
            seed,
            num_outputs,
            remote_args,
        }
    }
}

impl BulkTransform for ShuffleTransform {
    fn sub_phases(&self) -> &'static [&'static str] {
        &[PHASE_SHUFFLE_MAP, PHASE_SHUFFLE_REDUCE]
    }

    fn run(&mut self, inputs: Vec<RefBundle>, ctx: &mut BulkContext) -> Result<Vec<RefBundle>> {
        // Without an explicit target, keep the input's block count.
        let input_blocks: usize = inputs.iter().map(|b| b.num_blocks()).sum();
        let output_partitions = match self.num_outputs {
            Some(n) => n as usize,
            None => input_blocks,
        }
        .max(1);

        let exchange = ExchangeSpec {
            kind: ExchangeKind::RandomShuffle { seed: self.seed },
            output_partitions,
            remote_args: self.remote_args.clone(),
        };
        run_map_reduce(ctx, &exchange, inputs, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::StatsMap;
    use crate::execution::exchange::SubProgress;
    use crate::testutil::runtime::InProcessTaskRuntime;

    #[test]
    fn shuffle_preserves_rows_across_partitions() {
        let runtime = InProcessTaskRuntime::new();
        let inputs = vec![
            runtime.bundle_of(vec![1, 2, 3], true),
            runtime.bundle_of(vec![4, 5, 6], true),
        ];

        let mut progress = SubProgress::default();
        let mut stats = StatsMap::new();
        let mut ctx = BulkContext::new(&runtime, &mut progress, &mut stats);

        let mut transform = ShuffleTransform::new(Some(3), None, RemoteArgs::new());
        let outputs = transform.run(inputs, &mut ctx).unwrap();

        // No explicit target, so partition count follows block count.
        assert_eq!(2, outputs.len());
        assert!(outputs.iter().all(|b| b.owns_blocks()));

        let mut rows: Vec<i64> = outputs
            .iter()
            .flat_map(|b| runtime.bundle_rows(b))
            .collect();
        rows.sort_unstable();
        assert_eq!(vec![1, 2, 3, 4, 5, 6], rows);
    }

    #[test]
    fn explicit_target_sets_partition_count() {
        let runtime = InProcessTaskRuntime::new();
        let inputs = vec![runtime.bundle_of(vec![1, 2, 3, 4], true)];

        let mut progress = SubProgress::default();
        let mut stats = StatsMap::new();
        let mut ctx = BulkContext::new(&runtime, &mut progress, &mut stats);

        let mut transform = ShuffleTransform::new(None, Some(3), RemoteArgs::new());
        let outputs = transform.run(inputs, &mut ctx).unwrap();
        assert_eq!(3, outputs.len());
    }

    #[test]
    fn consumed_owned_inputs_are_released() {
        let runtime = InProcessTaskRuntime::new();
        let owned = runtime.bundle_of(vec![1, 2], true);
        let borrowed = runtime.bundle_of(vec![3, 4], false);
        let owned_ref = owned.block_refs()[0];
        let borrowed_ref = borrowed.block_refs()[0];

        let mut progress = SubProgress::default();
        let mut stats = StatsMap::new();
        let mut ctx = BulkContext::new(&runtime, &mut progress, &mut stats);

        let mut transform = ShuffleTransform::new(Some(0), None, RemoteArgs::new());
        transform.run(vec![owned, borrowed], &mut ctx).unwrap();

        let released = runtime.released();
        assert!(released.contains(&owned_ref));
        assert!(!released.contains(&borrowed_ref));
    }

    #[test]
    fn records_stats_per_phase() {
        let runtime = InProcessTaskRuntime::new();
        let inputs = vec![runtime.bundle_of(vec![1, 2, 3], true)];

        let mut progress = SubProgress::default();
        let mut stats = StatsMap::new();
        let mut ctx = BulkContext::new(&runtime, &mut progress, &mut stats);

        let mut transform = ShuffleTransform::new(Some(1), Some(2), RemoteArgs::new());
        transform.run(inputs, &mut ctx).unwrap();

        // One map task producing 2 intermediates, two reduce tasks producing
        // one block each.
        assert_eq!(2, stats[PHASE_SHUFFLE_MAP].len());
        assert_eq!(2, stats[PHASE_SHUFFLE_REDUCE].len());
    }
}
