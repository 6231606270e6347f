use refflow_error::Result;

use crate::bundle::RefBundle;
use crate::logical::logical_all_to_all::RemoteArgs;
use crate::runtime::{ExchangeKind, ExchangeSpec};

use super::{run_map_reduce, BulkContext, BulkTransform, PHASE_SHUFFLE_MAP, PHASE_SHUFFLE_REDUCE};

/// Rebalances the dataset into a fixed number of blocks.
///
/// With `shuffle` set rows scatter across all outputs; without it blocks are
/// split contiguously, keeping row order within each output.
#[derive(Debug)]
pub struct RepartitionTransform {
    num_outputs: u64,
    shuffle: bool,
}

impl RepartitionTransform {
    pub fn new(num_outputs: u64, shuffle: bool) -> Self {
        RepartitionTransform {
            num_outputs,
            shuffle,
        }
    }
}

impl BulkTransform for RepartitionTransform {
    fn sub_phases(&self) -> &'static [&'static str] {
        &[PHASE_SHUFFLE_MAP, PHASE_SHUFFLE_REDUCE]
    }

    fn run(&mut self, inputs: Vec<RefBundle>, ctx: &mut BulkContext) -> Result<Vec<RefBundle>> {
        let exchange = ExchangeSpec {
            kind: ExchangeKind::Repartition {
                shuffle: self.shuffle,
            },
            output_partitions: (self.num_outputs as usize).max(1),
            remote_args: RemoteArgs::new(),
        };
        run_map_reduce(ctx, &exchange, inputs, &[])
    }
}
