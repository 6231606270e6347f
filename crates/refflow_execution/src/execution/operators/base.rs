use crate::config::execution::ExecutionOptions;

use super::PhysicalOperatorRef;

/// State every physical operator carries: its display name, the upstream
/// operators feeding it, the options it was started with, and whether all
/// inputs have been delivered.
///
/// Buffers stay in the concrete operators; what lives here is only the part
/// of the contract that's identical across kinds.
#[derive(Debug)]
pub struct OperatorBase {
    name: String,
    input_dependencies: Vec<PhysicalOperatorRef>,
    options: Option<ExecutionOptions>,
    inputs_complete: bool,
}

impl OperatorBase {
    pub fn new(name: impl Into<String>, input_dependencies: Vec<PhysicalOperatorRef>) -> Self {
        OperatorBase {
            name: name.into(),
            input_dependencies,
            options: None,
            inputs_complete: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_dependencies(&self) -> &[PhysicalOperatorRef] {
        &self.input_dependencies
    }

    /// Record execution options. Calling twice is a driver defect.
    pub fn start(&mut self, options: ExecutionOptions) {
        assert!(
            self.options.is_none(),
            "operator '{}' started twice",
            self.name
        );
        self.options = Some(options);
    }

    pub fn started(&self) -> bool {
        self.options.is_some()
    }

    /// Options this operator was started with. Only valid after `start`.
    pub fn options(&self) -> ExecutionOptions {
        match self.options {
            Some(options) => options,
            None => panic!("operator '{}' used before start", self.name),
        }
    }

    pub fn mark_inputs_complete(&mut self) {
        self.inputs_complete = true;
    }

    pub fn inputs_complete(&self) -> bool {
        self.inputs_complete
    }

    /// Panics unless `input_index` refers to one of this operator's input
    /// dependencies.
    pub fn assert_input_index(&self, input_index: usize) {
        assert!(
            input_index < self.input_dependencies.len(),
            "input index {input_index} out of range for operator '{}' with {} inputs",
            self.name,
            self.input_dependencies.len(),
        );
    }
}
