use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

use refflow_error::Result;

use crate::bundle::{BundledBlock, RefBundle};

use super::{BulkContext, BulkTransform};

/// Permutes the blocks of the dataset without touching any rows.
///
/// Runs entirely in-engine; no task submissions. A fixed seed reproduces the
/// same permutation run-over-run, which is why this uses a ChaCha rng rather
/// than `StdRng` (whose algorithm may change across `rand` releases).
#[derive(Debug)]
pub struct RandomizeBlocksTransform {
    seed: Option<u64>,
}

impl RandomizeBlocksTransform {
    pub fn new(seed: Option<u64>) -> Self {
        RandomizeBlocksTransform { seed }
    }
}

impl BulkTransform for RandomizeBlocksTransform {
    fn sub_phases(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&mut self, inputs: Vec<RefBundle>, _ctx: &mut BulkContext) -> Result<Vec<RefBundle>> {
        // Blocks carry their source bundle's ownership into the bundle they
        // end up in, so one output bundle per block.
        let mut blocks: Vec<(BundledBlock, bool)> = inputs
            .into_iter()
            .flat_map(|bundle| {
                let owns = bundle.owns_blocks();
                bundle.into_blocks().into_iter().map(move |b| (b, owns))
            })
            .collect();

        let mut rng = match self.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::from_os_rng(),
        };
        blocks.shuffle(&mut rng);

        Ok(blocks
            .into_iter()
            .map(|(block, owns)| RefBundle::new(vec![block], owns))
            .collect())
    }
}
