use std::collections::VecDeque;
use std::sync::Arc;

use refflow_error::{Result, ResultExt};
use tracing::debug;

use crate::bundle::{RefBundle, StatsMap};
use crate::config::execution::ExecutionOptions;
use crate::execution::exchange::{BulkContext, BulkTransform, SubProgress};
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::runtime::progress::ProgressSink;
use crate::runtime::TaskRuntime;

use super::base::OperatorBase;
use super::PhysicalOperatorRef;

/// Operator whose output depends on globally reorganizing its entire input.
///
/// Bundles buffer until `inputs_done`, at which point the planner-built bulk
/// transform runs over all of them at once, submitting block-level work to
/// the task runtime and reporting through this operator's sub-phase progress
/// counters.
#[derive(Debug)]
pub struct AllToAllOperator {
    base: OperatorBase,
    transform: Box<dyn BulkTransform>,
    /// Explicit output count from the plan, if the variant carries one.
    explicit_num_outputs: Option<u64>,
    runtime: Arc<dyn TaskRuntime>,
    progress_sink: Arc<dyn ProgressSink>,
    sub_progress: SubProgress,
    input_buffer: Vec<RefBundle>,
    output: VecDeque<RefBundle>,
    stats: StatsMap,
}

impl AllToAllOperator {
    pub fn new(
        name: &'static str,
        input: PhysicalOperatorRef,
        explicit_num_outputs: Option<u64>,
        transform: Box<dyn BulkTransform>,
        runtime: Arc<dyn TaskRuntime>,
        progress_sink: Arc<dyn ProgressSink>,
    ) -> Self {
        AllToAllOperator {
            base: OperatorBase::new(name, vec![input]),
            transform,
            explicit_num_outputs,
            runtime,
            progress_sink,
            sub_progress: SubProgress::default(),
            input_buffer: Vec::new(),
            output: VecDeque::new(),
            stats: StatsMap::new(),
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
        self.input_buffer.push(bundle);
    }

    /// Runs the bulk transform over everything buffered.
    pub fn inputs_done(&mut self) -> Result<()> {
        self.base.mark_inputs_complete();

        let inputs = std::mem::take(&mut self.input_buffer);
        debug!(
            operator = self.base.name(),
            inputs = inputs.len(),
            "running bulk transform",
        );

        let mut ctx = BulkContext::new(
            self.runtime.as_ref(),
            &mut self.sub_progress,
            &mut self.stats,
        );
        let outputs = self
            .transform
            .run(inputs, &mut ctx)
            .context_fn(|| format!("bulk transform failed in operator '{}'", self.base.name()))?;

        self.output.extend(outputs);
        Ok(())
    }

    pub fn has_next(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn get_next(&mut self) -> RefBundle {
        self.output.pop_front().expect("output bundle available")
    }

    /// Explicit output count if set, else the upstream input's estimate,
    /// else zero. Never unknown: progress counters for this family are sized
    /// from this value.
    pub fn num_outputs_total(&self) -> Option<u64> {
        let upstream = self.base.input_dependencies()[0].lock().num_outputs_total();
        Some(self.explicit_num_outputs.or(upstream).unwrap_or(0))
    }

    pub fn completed(&self) -> bool {
        self.base.inputs_complete() && self.output.is_empty()
    }

    pub fn statistics(&self) -> StatsMap {
        self.stats.clone()
    }

    /// One counter per named sub-phase, sized to `max(num_outputs_total, 1)`
    /// and positioned sequentially from `start_position`. At most once per
    /// run; counters must be closed before initializing again.
    pub fn initialize_sub_progress_bars(&mut self, start_position: usize) -> usize {
        assert!(
            self.sub_progress.is_empty(),
            "sub-progress bars already initialized for operator '{}'",
            self.base.name(),
        );
        let total = self.num_outputs_total().unwrap_or(0).max(1);
        for (offset, &phase) in self.transform.sub_phases().iter().enumerate() {
            let mut counter =
                self.progress_sink
                    .create_counter(phase, total, start_position + offset);
            counter.set_description(&format!("  *- {phase}"));
            self.sub_progress.push(phase, counter);
        }
        self.sub_progress.len()
    }

    pub fn close_sub_progress_bars(&mut self) {
        self.sub_progress.close_all();
    }

    pub fn shutdown(&mut self) -> Vec<RefBundle> {
        self.close_sub_progress_bars();
        let mut remaining = std::mem::take(&mut self.input_buffer);
        remaining.extend(self.output.drain(..));
        remaining
    }
}

impl Explainable for AllToAllOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let ent = ExplainEntry::new(self.base.name())
            .with_value_opt("num_outputs", self.explicit_num_outputs);
        if conf.verbose {
            ent.with_values("sub_phases", self.transform.sub_phases().iter())
        } else {
            ent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::exchange::shuffle::ShuffleTransform;
    use crate::execution::exchange::sort::SortTransform;
    use crate::execution::operators::input_data::InputDataOperator;
    use crate::execution::operators::{operator_ref, PhysicalOperator};
    use crate::logical::logical_all_to_all::RemoteArgs;
    use crate::logical::logical_input_data::InputDataSource;
    use crate::testutil::bundles::labeled_bundles;
    use crate::testutil::progress::RecordingProgressSink;
    use crate::testutil::runtime::InProcessTaskRuntime;

    fn started_input(count: usize) -> PhysicalOperatorRef {
        let mut op = InputDataOperator::new(InputDataSource::Eager(labeled_bundles(0, count)));
        op.start(ExecutionOptions::default()).unwrap();
        op.inputs_done().unwrap();
        operator_ref(PhysicalOperator::InputData(op))
    }

    #[test]
    fn two_phase_operator_creates_two_counters_sized_to_upstream() {
        // Two named phases, no explicit output count, upstream total 7.
        let sink = RecordingProgressSink::new();
        let mut op = AllToAllOperator::new(
            "RandomShuffle",
            started_input(7),
            None,
            Box::new(ShuffleTransform::new(None, None, RemoteArgs::new())),
            Arc::new(InProcessTaskRuntime::new()),
            Arc::new(sink.clone()),
        );

        let created = op.initialize_sub_progress_bars(3);
        assert_eq!(2, created);

        let records = sink.records();
        assert_eq!(2, records.len());
        assert_eq!("Shuffle Map", records[0].name);
        assert_eq!("Shuffle Reduce", records[1].name);
        for (offset, record) in records.iter().enumerate() {
            assert_eq!(7, record.total);
            assert_eq!(3 + offset, record.position);
            assert_eq!(Some(format!("  *- {}", record.name)), record.description);
        }
    }

    #[test]
    fn explicit_count_overrides_upstream_estimate() {
        let op = AllToAllOperator::new(
            "RandomShuffle",
            started_input(5),
            Some(12),
            Box::new(ShuffleTransform::new(None, Some(12), RemoteArgs::new())),
            Arc::new(InProcessTaskRuntime::new()),
            Arc::new(RecordingProgressSink::new()),
        );
        assert_eq!(Some(12), op.num_outputs_total());
    }

    #[test]
    fn counter_total_clamps_to_one() {
        // Upstream estimate of zero must not size a counter to zero.
        let sink = RecordingProgressSink::new();
        let mut op = AllToAllOperator::new(
            "Sort",
            started_input(0),
            None,
            Box::new(SortTransform::new(None, false)),
            Arc::new(InProcessTaskRuntime::new()),
            Arc::new(sink.clone()),
        );

        assert_eq!(Some(0), op.num_outputs_total());
        assert_eq!(3, op.initialize_sub_progress_bars(0));
        assert!(sink.records().iter().all(|r| r.total == 1));
    }

    #[test]
    #[should_panic(expected = "already initialized")]
    fn reinitializing_sub_progress_bars_panics() {
        let mut op = AllToAllOperator::new(
            "RandomShuffle",
            started_input(1),
            None,
            Box::new(ShuffleTransform::new(None, None, RemoteArgs::new())),
            Arc::new(InProcessTaskRuntime::new()),
            Arc::new(RecordingProgressSink::new()),
        );
        op.initialize_sub_progress_bars(0);
        op.initialize_sub_progress_bars(2);
    }

    #[test]
    fn close_without_initialize_is_safe() {
        let mut op = AllToAllOperator::new(
            "Sort",
            started_input(1),
            None,
            Box::new(SortTransform::new(None, false)),
            Arc::new(InProcessTaskRuntime::new()),
            Arc::new(RecordingProgressSink::new()),
        );
        op.close_sub_progress_bars();
        op.close_sub_progress_bars();
    }

    #[test]
    fn transform_runs_at_inputs_done_and_ticks_progress() {
        let sink = RecordingProgressSink::new();
        let runtime = Arc::new(InProcessTaskRuntime::new());
        let mut op = AllToAllOperator::new(
            "Sort",
            started_input(2),
            None,
            Box::new(SortTransform::new(None, false)),
            runtime.clone(),
            Arc::new(sink.clone()),
        );
        op.start(ExecutionOptions::default()).unwrap();
        op.initialize_sub_progress_bars(0);

        op.add_input(runtime.bundle_of(vec![3, 1], true), 0);
        op.add_input(runtime.bundle_of(vec![2, 4], true), 0);
        assert!(!op.has_next());

        op.inputs_done().unwrap();

        let mut rows = Vec::new();
        while op.has_next() {
            rows.extend(runtime.bundle_rows(&op.get_next()));
        }
        assert_eq!(vec![1, 2, 3, 4], rows);
        assert!(op.completed());

        // Two input blocks: 2 sample ticks, 2 map ticks; two partitions: 2
        // reduce ticks.
        let records = sink.records();
        assert_eq!(2, records[0].increments);
        assert_eq!(2, records[1].increments);
        assert_eq!(2, records[2].increments);

        // Statistics recorded per phase.
        let stats = op.statistics();
        assert!(stats.contains_key("Sort Sample"));
        assert!(stats.contains_key("Shuffle Map"));
        assert!(stats.contains_key("Shuffle Reduce"));
    }

    #[test]
    fn shutdown_returns_buffered_bundles_and_closes_counters() {
        let sink = RecordingProgressSink::new();
        let runtime = Arc::new(InProcessTaskRuntime::new());
        let mut op = AllToAllOperator::new(
            "RandomShuffle",
            started_input(1),
            None,
            Box::new(ShuffleTransform::new(None, None, RemoteArgs::new())),
            runtime.clone(),
            Arc::new(sink.clone()),
        );
        op.start(ExecutionOptions::default()).unwrap();
        op.initialize_sub_progress_bars(0);
        op.add_input(runtime.bundle_of(vec![1], true), 0);

        let remaining = op.shutdown();
        assert_eq!(1, remaining.len());
        assert!(sink.records().iter().all(|r| r.closed));
    }
}
