use refflow_error::Result;

use crate::bundle::{BlockRef, RefBundle};
use crate::logical::logical_all_to_all::RemoteArgs;
use crate::runtime::{ExchangeKind, ExchangeSpec, TaskSpec};

use super::{run_map_reduce, BulkContext, BulkTransform, PHASE_SHUFFLE_MAP, PHASE_SHUFFLE_REDUCE, PHASE_SORT_SAMPLE};

/// Globally sorts the dataset with a three-phase sample/map/reduce.
///
/// The sample phase probes each input block for key values; the runtime
/// derives ascending range boundaries from the probes, so the map phase can
/// scatter rows into key ranges and the reduce phase sort each range
/// locally. Concatenating the reduced partitions then yields a total order;
/// for descending sorts the partition order is reversed.
#[derive(Debug)]
pub struct SortTransform {
    key: Option<String>,
    descending: bool,
}

impl SortTransform {
    pub fn new(key: Option<String>, descending: bool) -> Self {
        SortTransform { key, descending }
    }
}

impl BulkTransform for SortTransform {
    fn sub_phases(&self) -> &'static [&'static str] {
        &[PHASE_SORT_SAMPLE, PHASE_SHUFFLE_MAP, PHASE_SHUFFLE_REDUCE]
    }

    fn run(&mut self, inputs: Vec<RefBundle>, ctx: &mut BulkContext) -> Result<Vec<RefBundle>> {
        let input_blocks: Vec<BlockRef> = inputs.iter().flat_map(|b| b.block_refs()).collect();
        let exchange = ExchangeSpec {
            kind: ExchangeKind::Sort {
                key: self.key.clone(),
                descending: self.descending,
            },
            // Sorting preserves the block count.
            output_partitions: input_blocks.len().max(1),
            remote_args: RemoteArgs::new(),
        };

        let mut samples: Vec<BlockRef> = Vec::with_capacity(input_blocks.len());
        for input in input_blocks {
            let blocks = ctx.submit(
                PHASE_SORT_SAMPLE,
                TaskSpec::Sample {
                    exchange: exchange.clone(),
                    input,
                },
            )?;
            samples.extend(blocks.into_iter().map(|b| b.block));
        }

        let mut outputs = run_map_reduce(ctx, &exchange, inputs, &samples)?;
        ctx.release(&samples);

        if self.descending {
            outputs.reverse();
        }
        Ok(outputs)
    }
}
