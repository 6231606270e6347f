use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::TaskRuntime;

/// Opaque handle to a block of rows held by the distributed task runtime.
///
/// The engine moves these between operators but never dereferences them;
/// payload access happens entirely on the runtime side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockRef(pub u64);

/// Opaque handle to the schema of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaHandle(pub u64);

/// Execution statistics the task runtime reports for a computed block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockExecStats {
    pub wall_time: Duration,
}

/// Metadata describing a single block.
///
/// Row count and byte size may be unknown for lazily produced blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub num_rows: Option<u64>,
    pub size_bytes: Option<u64>,
    pub schema: Option<SchemaHandle>,
    /// Provenance of the rows in this block, if it was read from files.
    pub input_files: Option<Vec<String>>,
    pub exec_stats: Option<BlockExecStats>,
}

impl BlockMetadata {
    pub fn with_counts(num_rows: u64, size_bytes: u64) -> Self {
        BlockMetadata {
            num_rows: Some(num_rows),
            size_bytes: Some(size_bytes),
            ..Default::default()
        }
    }
}

/// A block reference paired with the metadata describing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundledBlock {
    pub block: BlockRef,
    pub metadata: BlockMetadata,
}

/// Per-phase block metadata collected while executing an operator, keyed by
/// phase name.
pub type StatsMap = HashMap<String, Vec<BlockMetadata>>;

/// The unit of data flow between physical operators: an ordered sequence of
/// block references plus their metadata.
///
/// A bundle is immutable once created. Operators forward, split, or regroup
/// bundles into new bundles; they never mutate the block list in place.
///
/// `owns_blocks` indicates the bundle exclusively owns the underlying block
/// storage and is responsible for requesting its release when discarded.
/// Splitting an owning bundle transfers that responsibility to the new
/// bundles holding the blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RefBundle {
    blocks: Vec<BundledBlock>,
    owns_blocks: bool,
}

impl RefBundle {
    pub fn new(blocks: Vec<BundledBlock>, owns_blocks: bool) -> Self {
        RefBundle {
            blocks,
            owns_blocks,
        }
    }

    pub fn blocks(&self) -> &[BundledBlock] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<BundledBlock> {
        self.blocks
    }

    pub fn owns_blocks(&self) -> bool {
        self.owns_blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total row count across blocks, unknown if any block's count is
    /// unknown.
    pub fn num_rows(&self) -> Option<u64> {
        let mut total = 0;
        for block in &self.blocks {
            total += block.metadata.num_rows?;
        }
        Some(total)
    }

    /// Total size in bytes across blocks. Blocks with unknown sizes
    /// contribute zero.
    pub fn size_bytes(&self) -> u64 {
        self.blocks
            .iter()
            .map(|b| b.metadata.size_bytes.unwrap_or(0))
            .sum()
    }

    pub fn block_refs(&self) -> Vec<BlockRef> {
        self.blocks.iter().map(|b| b.block).collect()
    }

    /// Request release of the underlying block storage if this bundle owns
    /// it. Returns the number of bytes freed.
    pub fn destroy_if_owned(self, runtime: &dyn TaskRuntime) -> u64 {
        if self.owns_blocks {
            runtime.release_blocks(&self.block_refs())
        } else {
            0
        }
    }
}
