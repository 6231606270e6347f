use serde::{Deserialize, Serialize};

/// Configuration for a single execution run.
///
/// Fixed once execution starts; every physical operator receives the same
/// options through `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// If the union of multiple input streams must emit bundles in the order
    /// a strictly sequential execution would produce.
    ///
    /// Disabled by default; preserving order forces later inputs to buffer
    /// until earlier inputs finish.
    pub preserve_order: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ExecutionOptions {
            preserve_order: false,
        }
    }
}

impl ExecutionOptions {
    pub fn preserving_order() -> Self {
        ExecutionOptions {
            preserve_order: true,
        }
    }
}
