use std::collections::VecDeque;

use refflow_error::{Result, ResultExt};
use tracing::debug;

use crate::bundle::RefBundle;
use crate::config::execution::ExecutionOptions;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::logical::logical_input_data::InputDataSource;

use super::base::OperatorBase;

/// Leaf operator injecting externally provided bundles into the DAG.
///
/// Eager bundles are installed as-is; a factory source is materialized
/// exactly once, inside `start`. Either way the bundles then flow out
/// through the standard pull protocol.
#[derive(Debug)]
pub struct InputDataOperator {
    base: OperatorBase,
    source: Option<InputDataSource>,
    output: VecDeque<RefBundle>,
    num_outputs: Option<u64>,
}

impl InputDataOperator {
    pub fn new(source: InputDataSource) -> Self {
        InputDataOperator {
            base: OperatorBase::new("InputData", Vec::new()),
            source: Some(source),
            output: VecDeque::new(),
            num_outputs: None,
        }
    }

    pub fn base(&self) -> &OperatorBase {
        &self.base
    }

    pub fn start(&mut self, options: ExecutionOptions) -> Result<()> {
        self.base.start(options);

        // `start` is asserted to run once, so the factory runs once.
        let source = self.source.take().expect("input data source present");
        let bundles = match source {
            InputDataSource::Eager(bundles) => bundles,
            InputDataSource::Factory(factory) => factory
                .materialize()
                .context("failed to materialize input data")?,
        };

        debug!(bundles = bundles.len(), "input data materialized");
        self.num_outputs = Some(bundles.len() as u64);
        self.output.extend(bundles);
        Ok(())
    }

    pub fn add_input(&mut self, _bundle: RefBundle, input_index: usize) {
        // A leaf has no input dependencies; any index is out of range.
        self.base.assert_input_index(input_index);
        unreachable!()
    }

    pub fn inputs_done(&mut self) -> Result<()> {
        self.base.mark_inputs_complete();
        Ok(())
    }

    pub fn has_next(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn get_next(&mut self) -> RefBundle {
        self.output.pop_front().expect("output bundle available")
    }

    pub fn num_outputs_total(&self) -> Option<u64> {
        self.num_outputs
    }

    pub fn completed(&self) -> bool {
        self.base.inputs_complete() && self.output.is_empty()
    }

    pub fn shutdown(&mut self) -> Vec<RefBundle> {
        self.output.drain(..).collect()
    }
}

impl Explainable for InputDataOperator {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("InputData").with_value_opt("bundles", self.num_outputs)
    }
}
