use crate::bundle::{BlockMetadata, BlockRef, BundledBlock, RefBundle};

/// Single-block bundle whose block reference doubles as a label, for tests
/// that only care about bundle identity and ordering.
pub fn labeled_bundle(label: u64) -> RefBundle {
    RefBundle::new(
        vec![BundledBlock {
            block: BlockRef(label),
            metadata: BlockMetadata::with_counts(1, 8),
        }],
        false,
    )
}

/// `count` labeled bundles with consecutive labels starting at `start`.
pub fn labeled_bundles(start: u64, count: usize) -> Vec<RefBundle> {
    (0..count as u64).map(|i| labeled_bundle(start + i)).collect()
}

/// The label of a bundle built by `labeled_bundle`.
pub fn label(bundle: &RefBundle) -> u64 {
    bundle.blocks()[0].block.0
}
