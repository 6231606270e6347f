use refflow_error::Result;

use crate::bundle::{BlockRef, RefBundle};
use crate::logical::logical_all_to_all::{AggregateFn, RemoteArgs};
use crate::runtime::{ExchangeKind, ExchangeSpec, TaskSpec};

use super::{BulkContext, BulkTransform, PHASE_AGGREGATE};

/// Groups the dataset and folds each group, as a single-pass reduce over
/// every input block. No named sub-phases.
#[derive(Debug)]
pub struct AggregateTransform {
    key: Option<String>,
    aggregates: Vec<AggregateFn>,
}

impl AggregateTransform {
    pub fn new(key: Option<String>, aggregates: Vec<AggregateFn>) -> Self {
        AggregateTransform { key, aggregates }
    }
}

impl BulkTransform for AggregateTransform {
    fn sub_phases(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&mut self, inputs: Vec<RefBundle>, ctx: &mut BulkContext) -> Result<Vec<RefBundle>> {
        let input_blocks: Vec<BlockRef> = inputs.iter().flat_map(|b| b.block_refs()).collect();
        let exchange = ExchangeSpec {
            kind: ExchangeKind::Aggregate {
                key: self.key.clone(),
                aggregates: self.aggregates.clone(),
            },
            output_partitions: 1,
            remote_args: RemoteArgs::new(),
        };

        let blocks = ctx.submit(
            PHASE_AGGREGATE,
            TaskSpec::Reduce {
                exchange,
                inputs: input_blocks,
                output_index: 0,
            },
        )?;

        for bundle in inputs {
            bundle.destroy_if_owned(ctx.runtime());
        }

        Ok(vec![RefBundle::new(blocks, true)])
    }
}
