use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use refflow_error::{RefflowError, Result};
use tracing::{debug, trace};

use crate::bundle::{RefBundle, StatsMap};
use crate::config::execution::ExecutionOptions;
use crate::logical::operator::LogicalOperator;
use crate::runtime::progress::ProgressSink;
use crate::runtime::TaskRuntime;

use super::operators::PhysicalOperatorRef;
use super::planner::PhysicalPlanner;

/// Output of one execution run: the root operator's bundles plus per-phase
/// block metadata merged across all operators.
#[derive(Debug)]
pub struct ExecutionResult {
    pub bundles: Vec<RefBundle>,
    pub stats: StatsMap,
}

/// Cooperative stop signal for an execution run.
///
/// Stopping does not interrupt an in-flight task submission; the executor
/// checks between steps and shuts the DAG down at the next one.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        StopHandle::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives a plan to completion in bulk topological order.
///
/// Each operator's upstreams are drained into it in dependency order before
/// its `inputs_done` fires, so by the time the root is reached every bundle
/// has flowed through. Operators never see this driver; anything honoring
/// the operator contract can replace it.
#[derive(Debug)]
pub struct BulkExecutor {
    runtime: Arc<dyn TaskRuntime>,
    progress: Arc<dyn ProgressSink>,
    options: ExecutionOptions,
    stop: StopHandle,
}

impl BulkExecutor {
    pub fn new(
        runtime: Arc<dyn TaskRuntime>,
        progress: Arc<dyn ProgressSink>,
        options: ExecutionOptions,
    ) -> Self {
        BulkExecutor {
            runtime,
            progress,
            options,
            stop: StopHandle::new(),
        }
    }

    /// Handle for cancelling this executor's runs from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn execute(&self, plan: LogicalOperator) -> Result<ExecutionResult> {
        let planner = PhysicalPlanner::new(Arc::clone(&self.runtime), Arc::clone(&self.progress));
        let root = planner.plan(plan)?;
        let operators = topological(&root);
        debug!(operators = operators.len(), "starting execution run");

        for op in &operators {
            op.lock().start(self.options)?;
        }

        // Sub-progress counters stack in display order, one block of rows per
        // multi-phase operator.
        let mut position = 0;
        for op in &operators {
            position += op.lock().initialize_sub_progress_bars(position);
        }

        let result = self.drive(&operators, &root);

        for op in &operators {
            op.lock().close_sub_progress_bars();
        }

        match result {
            Ok(bundles) => {
                let mut stats = StatsMap::new();
                for op in &operators {
                    for (phase, metas) in op.lock().statistics() {
                        stats.entry(phase).or_default().extend(metas);
                    }
                }
                debug!(bundles = bundles.len(), "execution run finished");
                Ok(ExecutionResult { bundles, stats })
            }
            Err(err) => {
                self.shutdown(&operators);
                Err(err)
            }
        }
    }

    fn drive(
        &self,
        operators: &[PhysicalOperatorRef],
        root: &PhysicalOperatorRef,
    ) -> Result<Vec<RefBundle>> {
        for op_ref in operators {
            self.check_stopped()?;

            let deps: Vec<_> = op_ref.lock().input_dependencies().to_vec();
            for (input_index, dep) in deps.iter().enumerate() {
                loop {
                    self.check_stopped()?;
                    // Release the upstream's lock before handing the bundle
                    // over; an ordered union will lock it again to observe
                    // completion.
                    let bundle = {
                        let mut dep = dep.lock();
                        if dep.has_next() {
                            Some(dep.get_next())
                        } else {
                            None
                        }
                    };
                    match bundle {
                        Some(bundle) => {
                            trace!(
                                operator = op_ref.lock().name(),
                                input_index,
                                blocks = bundle.num_blocks(),
                                "moving bundle downstream",
                            );
                            op_ref.lock().add_input(bundle, input_index);
                        }
                        None => break,
                    }
                }
            }

            op_ref.lock().inputs_done()?;
        }

        let mut root = root.lock();
        let mut bundles = Vec::new();
        while root.has_next() {
            bundles.push(root.get_next());
        }
        Ok(bundles)
    }

    fn check_stopped(&self) -> Result<()> {
        if self.stop.is_stopped() {
            return Err(RefflowError::new("execution run stopped"));
        }
        Ok(())
    }

    /// Tear the DAG down after a failed or cancelled run, releasing every
    /// still-buffered bundle the engine exclusively owns.
    fn shutdown(&self, operators: &[PhysicalOperatorRef]) {
        let mut freed = 0;
        for op in operators {
            for bundle in op.lock().shutdown() {
                freed += bundle.destroy_if_owned(self.runtime.as_ref());
            }
        }
        debug!(freed_bytes = freed, "execution run shut down");
    }
}

/// All operators reachable from `root`, dependencies before dependents.
fn topological(root: &PhysicalOperatorRef) -> Vec<PhysicalOperatorRef> {
    fn visit(op: &PhysicalOperatorRef, out: &mut Vec<PhysicalOperatorRef>) {
        if out.iter().any(|seen| Arc::ptr_eq(seen, op)) {
            return;
        }
        let deps: Vec<_> = op.lock().input_dependencies().to_vec();
        for dep in &deps {
            visit(dep, out);
        }
        out.push(Arc::clone(op));
    }

    let mut out = Vec::new();
    visit(root, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::logical_all_to_all::{
        AggregateFn,
        LogicalAggregate,
        LogicalRandomShuffle,
        LogicalSort,
        RemoteArgs,
    };
    use crate::logical::logical_input_data::{InputDataFactory, InputDataSource, LogicalInputData};
    use crate::logical::logical_union::LogicalUnion;
    use crate::logical::operator::Node;
    use crate::testutil::bundles::labeled_bundles;
    use crate::testutil::progress::RecordingProgressSink;
    use crate::testutil::runtime::InProcessTaskRuntime;

    fn input_plan(bundles: Vec<crate::bundle::RefBundle>) -> LogicalOperator {
        LogicalOperator::InputData(Node::new(
            LogicalInputData {
                source: InputDataSource::Eager(bundles),
            },
            Vec::new(),
        ))
    }

    fn executor(runtime: &Arc<InProcessTaskRuntime>, preserve_order: bool) -> BulkExecutor {
        BulkExecutor::new(
            runtime.clone(),
            Arc::new(RecordingProgressSink::new()),
            ExecutionOptions { preserve_order },
        )
    }

    #[test]
    fn ordered_union_run_yields_sequential_order() {
        let runtime = Arc::new(InProcessTaskRuntime::new());
        let plan = LogicalOperator::Union(Node::new(
            LogicalUnion,
            vec![
                input_plan(labeled_bundles(0, 2)),
                input_plan(labeled_bundles(100, 3)),
            ],
        ));

        let result = executor(&runtime, true).execute(plan).unwrap();
        let labels: Vec<u64> = result
            .bundles
            .iter()
            .map(|b| b.blocks()[0].block.0)
            .collect();
        assert_eq!(vec![0, 1, 100, 101, 102], labels);
    }

    #[test]
    fn sort_over_union_produces_global_order() {
        let runtime = Arc::new(InProcessTaskRuntime::new());
        let plan = LogicalOperator::Sort(Node::new(
            LogicalSort {
                key: None,
                descending: false,
            },
            vec![LogicalOperator::Union(Node::new(
                LogicalUnion,
                vec![
                    input_plan(vec![runtime.bundle_of(vec![5, 1], true)]),
                    input_plan(vec![runtime.bundle_of(vec![4, 2, 3], true)]),
                ],
            ))],
        ));

        let result = executor(&runtime, false).execute(plan).unwrap();
        let rows: Vec<i64> = result
            .bundles
            .iter()
            .flat_map(|b| runtime.bundle_rows(b))
            .collect();
        assert_eq!(vec![1, 2, 3, 4, 5], rows);

        // Shuffle map/reduce stats made it into the merged result.
        assert!(result.stats.contains_key("Shuffle Reduce"));
    }

    #[test]
    fn factory_input_materializes_during_run() {
        let runtime = Arc::new(InProcessTaskRuntime::new());
        let factory_runtime = runtime.clone();
        let factory = InputDataFactory::new(move || {
            Ok(vec![factory_runtime.bundle_of(vec![3, 1, 2], true)])
        });
        let plan = LogicalOperator::Aggregate(Node::new(
            LogicalAggregate {
                key: None,
                aggregates: vec![AggregateFn::Sum],
            },
            vec![LogicalOperator::InputData(Node::new(
                LogicalInputData {
                    source: InputDataSource::Factory(factory),
                },
                Vec::new(),
            ))],
        ));

        let result = executor(&runtime, false).execute(plan).unwrap();
        assert_eq!(1, result.bundles.len());
        assert_eq!(vec![6], runtime.bundle_rows(&result.bundles[0]));
    }

    #[test]
    fn sub_progress_positions_assigned_sequentially() {
        let runtime = Arc::new(InProcessTaskRuntime::new());
        let sink = RecordingProgressSink::new();
        // Shuffle (2 phases) feeding sort (3 phases).
        let plan = LogicalOperator::Sort(Node::new(
            LogicalSort {
                key: None,
                descending: false,
            },
            vec![LogicalOperator::RandomShuffle(Node::new(
                LogicalRandomShuffle {
                    seed: Some(1),
                    num_outputs: None,
                    remote_args: RemoteArgs::new(),
                },
                vec![input_plan(vec![runtime.bundle_of(vec![2, 1], true)])],
            ))],
        ));

        let executor = BulkExecutor::new(
            runtime.clone(),
            Arc::new(sink.clone()),
            ExecutionOptions::default(),
        );
        executor.execute(plan).unwrap();

        let positions: Vec<usize> = sink.records().iter().map(|r| r.position).collect();
        assert_eq!(vec![0, 1, 2, 3, 4], positions);
        assert!(sink.records().iter().all(|r| r.closed));
    }

    #[test]
    fn stopped_run_errors_and_releases_owned_bundles() {
        let runtime = Arc::new(InProcessTaskRuntime::new());
        let owned = runtime.bundle_of(vec![1, 2], true);
        let owned_ref = owned.block_refs()[0];
        let plan = LogicalOperator::Union(Node::new(LogicalUnion, vec![input_plan(vec![owned])]));

        let executor = executor(&runtime, false);
        executor.stop_handle().stop();

        let err = executor.execute(plan).unwrap_err();
        assert_eq!("execution run stopped", err.message());
        // Nothing flowed, so nothing leaked either.
        assert!(runtime.released().contains(&owned_ref));
    }

    #[test]
    fn failed_submission_aborts_the_run() {
        let runtime = Arc::new(InProcessTaskRuntime::new());
        runtime.fail_submits("node lost");
        let plan = LogicalOperator::Sort(Node::new(
            LogicalSort {
                key: None,
                descending: false,
            },
            vec![input_plan(vec![runtime.bundle_of(vec![1], true)])],
        ));

        let err = executor(&runtime, false).execute(plan).unwrap_err();
        assert!(err.to_string().contains("node lost"));
    }
}
