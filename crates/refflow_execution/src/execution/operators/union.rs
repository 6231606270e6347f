use std::collections::VecDeque;

use refflow_error::Result;
use tracing::trace;

use crate::bundle::RefBundle;
use crate::config::execution::ExecutionOptions;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

use super::base::OperatorBase;
use super::PhysicalOperatorRef;

/// N-ary merge of input streams into one output stream.
///
/// Without order preservation, bundles pass straight to the output in
/// arrival order. With it, the output order is exactly what a strictly
/// sequential execution (drain input 0, then input 1, ...) would produce,
/// no matter how arrivals interleave: a single "active" cursor admits one
/// input directly while every later input buffers until its turn.
#[derive(Debug)]
pub struct UnionOperator {
    base: OperatorBase,
    /// One FIFO per input index. Only populated in order-preserving mode.
    input_buffers: Vec<VecDeque<RefBundle>>,
    output: VecDeque<RefBundle>,
    /// Index of the input currently streaming to the output. Ordered mode
    /// only; exactly one index is active at any time.
    active_index: usize,
}

impl UnionOperator {
    pub fn new(input_dependencies: Vec<PhysicalOperatorRef>) -> Self {
        assert!(
            !input_dependencies.is_empty(),
            "union requires at least one input dependency"
        );
        let input_buffers = input_dependencies.iter().map(|_| VecDeque::new()).collect();
        UnionOperator {
            base: OperatorBase::new("Union", input_dependencies),
            input_buffers,
            output: VecDeque::new(),
            active_index: 0,
        }
    }

    pub fn base(&self) -> &OperatorBase {
        &self.base
    }

    pub fn start(&mut self, options: ExecutionOptions) -> Result<()> {
        self.base.start(options);
        Ok(())
    }

    pub fn add_input(&mut self, bundle: RefBundle, input_index: usize) {
        self.base.assert_input_index(input_index);

        if !self.base.options().preserve_order {
            self.output.push_back(bundle);
            return;
        }

        if input_index == self.active_index {
            trace!(input_index, "union forwarding bundle from active input");
            self.output.push_back(bundle);
            self.advance_past_completed();
        } else {
            // Not this input's turn yet; hold the bundle until it is.
            trace!(input_index, "union buffering bundle from inactive input");
            self.input_buffers[input_index].push_back(bundle);
        }
    }

    /// Move the active cursor past every input whose upstream has completed,
    /// flushing each newly activated input's buffer in arrival order.
    ///
    /// Looping (rather than stepping once per call) keeps bundles streaming
    /// as early as the ordering guarantee allows: a cursor parked behind a
    /// long-finished input would force all later inputs to buffer until the
    /// end of the run.
    fn advance_past_completed(&mut self) {
        while self.active_index + 1 < self.input_buffers.len()
            && self.upstream_completed(self.active_index)
        {
            self.active_index += 1;
            trace!(active_index = self.active_index, "union advancing active input");
            let flushed = self.input_buffers[self.active_index].drain(..);
            self.output.extend(flushed);
        }
    }

    fn upstream_completed(&self, input_index: usize) -> bool {
        self.base.input_dependencies()[input_index].lock().completed()
    }

    pub fn inputs_done(&mut self) -> Result<()> {
        self.base.mark_inputs_complete();

        if !self.base.options().preserve_order {
            return Ok(());
        }

        // Everything still buffered is final, so order is decided by flushing
        // in input-index order. An upstream that never reported completion
        // while we hold its bundles is a driver defect, not a runtime
        // condition.
        for (idx, dep) in self.base.input_dependencies().iter().enumerate() {
            assert!(
                dep.lock().completed(),
                "union received inputs_done while upstream {idx} has not completed",
            );
        }
        for (idx, buffer) in self.input_buffers.iter_mut().enumerate() {
            if idx < self.active_index {
                assert!(
                    buffer.is_empty(),
                    "union holds buffered bundles at passed input index {idx}",
                );
            } else {
                self.output.extend(buffer.drain(..));
            }
        }
        self.active_index = self.input_buffers.len() - 1;

        Ok(())
    }

    pub fn has_next(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn get_next(&mut self) -> RefBundle {
        self.output.pop_front().expect("output bundle available")
    }

    /// Sum of all input dependencies' totals, unknown if any one is unknown.
    pub fn num_outputs_total(&self) -> Option<u64> {
        let mut total = 0;
        for dep in self.base.input_dependencies() {
            total += dep.lock().num_outputs_total()?;
        }
        Some(total)
    }

    pub fn completed(&self) -> bool {
        self.base.inputs_complete() && self.output.is_empty()
    }

    pub fn shutdown(&mut self) -> Vec<RefBundle> {
        let mut remaining: Vec<_> = self.output.drain(..).collect();
        for buffer in &mut self.input_buffers {
            remaining.extend(buffer.drain(..));
        }
        remaining
    }
}

impl Explainable for UnionOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let ent = ExplainEntry::new("Union").with_value("inputs", self.input_buffers.len());
        if conf.verbose {
            ent.with_value("active_index", self.active_index)
        } else {
            ent
        }
    }
}
