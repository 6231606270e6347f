use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

use super::operator::{LogicalNode, Node};

/// Merges any number of input streams into one.
///
/// Whether the merge preserves the sequential input order is an execution
/// option, not a plan-time property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalUnion;

impl LogicalNode for Node<LogicalUnion> {
    fn name(&self) -> &'static str {
        "Union"
    }

    /// Sum of all children's estimates, unknown if any child is unknown.
    fn num_outputs_total(&self) -> Option<u64> {
        let mut total = 0;
        for child in &self.children {
            total += child.num_outputs_total()?;
        }
        Some(total)
    }
}

impl Explainable for LogicalUnion {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Union")
    }
}
