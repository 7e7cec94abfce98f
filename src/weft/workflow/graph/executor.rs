// SPDX-License-Identifier: MIT

//! Superstep executor
//!
//! A run proceeds in supersteps. Every task of the frontier runs
//! concurrently against the snapshot taken when the superstep began; fan-out
//! branches see only their dispatch payload. Once all tasks return, their
//! updates are validated, merged in task order, and edges are resolved
//! against the merged state to form the next frontier. The run is finished
//! when the frontier is empty.

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::adk::client::LlmClient;
use crate::adk::registry::ToolRegistry;
use crate::weft::workflow::checkpoint::{
    BarrierState, BranchId, Checkpoint, Checkpointer, PendingTask,
};
use crate::weft::workflow::state::{StateSchema, StateUpdate, WorkflowState};

use super::edge::{Edge, JoinEdge, NextSpec};
use super::error::{GraphError, GraphWarning, RunError};
use super::state_graph::{LoopGuard, StateGraph};
use super::step::{Dispatch, Goto, Step, StepContext, StepError, StepOutput};
use super::{END, START};

/// Per-invocation options
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Thread to checkpoint under; ignored without a checkpointer
    pub thread_id: Option<String>,
    /// Abort after this many supersteps
    pub recursion_limit: Option<usize>,
}

impl RunConfig {
    pub fn thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            recursion_limit: None,
        }
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    /// Halted before `before` ran; invoke again on the same thread to resume
    Interrupted { before: String },
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: WorkflowState,
    pub status: RunStatus,
    /// Every step invocation of this run, in execution order
    pub trace: Vec<String>,
    pub supersteps: u64,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// How many times `step` ran
    pub fn visits(&self, step: &str) -> usize {
        self.trace.iter().filter(|s| *s == step).count()
    }
}

/// Scheduling state carried between supersteps and into checkpoints
#[derive(Debug, Default)]
struct Schedule {
    frontier: Vec<PendingTask>,
    barriers: BTreeMap<u64, BarrierState>,
    joins: BTreeMap<String, BTreeSet<String>>,
    invocations: u64,
    step: u64,
}

impl Schedule {
    fn resume(checkpoint: Checkpoint) -> Self {
        Self {
            frontier: checkpoint.pending,
            barriers: checkpoint.barriers,
            joins: checkpoint.joins,
            invocations: checkpoint.invocations,
            step: checkpoint.step,
        }
    }

    fn next_invocation(&mut self) -> u64 {
        self.invocations += 1;
        self.invocations
    }

    fn snapshot(&self, state: &WorkflowState) -> Checkpoint {
        let mut checkpoint = Checkpoint::new(state.values().clone(), self.step);
        checkpoint.pending = self.frontier.clone();
        checkpoint.barriers = self.barriers.clone();
        checkpoint.joins = self.joins.clone();
        checkpoint.invocations = self.invocations;
        checkpoint
    }
}

/// Add tasks to a frontier; plain steps run at most once per superstep
fn push_tasks(frontier: &mut Vec<PendingTask>, tasks: impl IntoIterator<Item = PendingTask>) {
    for task in tasks {
        let duplicate = task.branch.is_none()
            && frontier
                .iter()
                .any(|t| t.branch.is_none() && t.step == task.step);
        if !duplicate {
            frontier.push(task);
        }
    }
}

/// An immutable, runnable graph
pub struct CompiledGraph {
    pub(super) schema: Arc<StateSchema>,
    pub(super) steps: BTreeMap<String, Arc<dyn Step>>,
    pub(super) order: Vec<String>,
    pub(super) edges: BTreeMap<String, Edge>,
    pub(super) joins: Vec<JoinEdge>,
    pub(super) decision_targets: BTreeMap<String, Vec<String>>,
    pub(super) loop_guard: Option<LoopGuard>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    interrupt_before: BTreeSet<String>,
    client: Option<LlmClient>,
    tools: ToolRegistry,
    warnings: Vec<GraphWarning>,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl CompiledGraph {
    pub(super) fn new(
        graph: StateGraph,
        edges: BTreeMap<String, Edge>,
        warnings: Vec<GraphWarning>,
    ) -> Self {
        Self {
            schema: graph.schema,
            steps: graph.steps,
            order: graph.order,
            edges,
            joins: graph.joins,
            decision_targets: graph.decision_targets,
            loop_guard: graph.loop_guard,
            checkpointer: graph.checkpointer,
            interrupt_before: graph.interrupt_before,
            client: graph.client,
            tools: graph.tools,
            warnings,
        }
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    pub fn step_names(&self) -> &[String] {
        &self.order
    }

    /// Latest saved state of a thread
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<WorkflowState>, GraphError> {
        let Some(saver) = &self.checkpointer else {
            return Ok(None);
        };
        let checkpoint = saver
            .get(thread_id)
            .await
            .map_err(|source| GraphError::CheckpointUnavailable {
                thread_id: thread_id.to_string(),
                source,
            })?;
        Ok(checkpoint.map(|cp| WorkflowState::restore(self.schema.clone(), cp.values)))
    }

    /// Run from START (or from an interrupted checkpoint) until no work remains
    pub async fn invoke(&self, input: StateUpdate, config: &RunConfig) -> Result<RunOutcome, RunError> {
        let run_id = Uuid::new_v4();
        let blank = WorkflowState::new(self.schema.clone());
        let thread = config
            .thread_id
            .as_deref()
            .filter(|_| self.checkpointer.is_some());

        let saved = match thread {
            Some(thread_id) => self
                .load(thread_id)
                .await
                .map_err(|e| RunError::new(e, blank.clone()))?,
            None => None,
        };

        let (base, mut schedule) = match saved {
            Some(checkpoint) => {
                log::info!(
                    "Thread {} resumes at superstep {} with {} pending task(s)",
                    thread.unwrap_or_default(),
                    checkpoint.step,
                    checkpoint.pending.len()
                );
                let values = checkpoint.values.clone();
                (
                    WorkflowState::restore(self.schema.clone(), values),
                    Schedule::resume(checkpoint),
                )
            }
            None => (blank, Schedule::default()),
        };

        let mut state = base
            .merge(&input)
            .map_err(|e| RunError::new(GraphError::schema(START, None, e), base.clone()))?;

        let resuming = !schedule.frontier.is_empty();
        if !resuming {
            schedule.joins.clear();
            let invocation = schedule.next_invocation();
            let start = PendingTask::step(START);
            let tasks = self
                .successors(&start, None, invocation, &state, &mut schedule)
                .map_err(|e| RunError::new(e, state.clone()))?;
            push_tasks(&mut schedule.frontier, tasks);
        }

        log::info!("Run {} started ({} task(s) ready)", run_id, schedule.frontier.len());

        let mut trace = Vec::new();
        let mut supersteps: u64 = 0;
        let mut skip_interrupt = resuming;

        while !schedule.frontier.is_empty() {
            if let Some(limit) = config.recursion_limit {
                if supersteps >= limit as u64 {
                    log::error!("Run {} hit the recursion limit of {}", run_id, limit);
                    return Err(RunError::new(GraphError::RecursionLimit { limit }, state));
                }
            }

            if !skip_interrupt {
                if let Some(task) = schedule
                    .frontier
                    .iter()
                    .find(|t| self.interrupt_before.contains(&t.step))
                {
                    let before = task.step.clone();
                    log::info!("Run {} interrupted before {}", run_id, before);
                    if let Some(thread_id) = thread {
                        self.save(thread_id, &schedule.snapshot(&state))
                            .await
                            .map_err(|e| RunError::new(e, state.clone()))?;
                    }
                    return Ok(RunOutcome {
                        state,
                        status: RunStatus::Interrupted { before },
                        trace,
                        supersteps,
                    });
                }
            }
            skip_interrupt = false;

            let frontier = std::mem::take(&mut schedule.frontier);
            let invocations: Vec<u64> = frontier.iter().map(|_| schedule.next_invocation()).collect();
            log::info!(
                "Superstep {}: [{}]",
                schedule.step + 1,
                frontier
                    .iter()
                    .map(|t| t.step.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let snapshot = state.clone();
            let results = join_all(frontier.iter().map(|task| self.run_task(task, &snapshot, run_id))).await;

            let mut outputs = Vec::with_capacity(results.len());
            for (task, result) in frontier.iter().zip(results) {
                match result {
                    Ok(output) => outputs.push(output),
                    Err(source) => {
                        log::error!("Step {} failed: {}", task.step, source);
                        return Err(RunError::new(
                            GraphError::StepFailure {
                                step: task.step.clone(),
                                branch: task.branch,
                                source,
                            },
                            snapshot,
                        ));
                    }
                }
            }

            for (task, output) in frontier.iter().zip(&outputs) {
                if let Err(e) = snapshot.validate(output.update()) {
                    log::error!("Step {} wrote an invalid update: {}", task.step, e);
                    return Err(RunError::new(
                        GraphError::schema(&task.step, task.branch, e),
                        snapshot,
                    ));
                }
            }

            for (task, output) in frontier.iter().zip(&outputs) {
                log::debug!("Merging update from {}: {:?}", task.step, output.update());
                state = state.merge(output.update()).map_err(|e| {
                    RunError::new(GraphError::schema(&task.step, task.branch, e), snapshot.clone())
                })?;
            }

            trace.extend(frontier.iter().map(|t| t.step.clone()));
            supersteps += 1;
            schedule.step += 1;

            for ((task, output), invocation) in frontier.iter().zip(&outputs).zip(&invocations) {
                self.advance(task, output, *invocation, &state, &mut schedule)
                    .map_err(|e| RunError::new(e, state.clone()))?;
            }

            if let Some(thread_id) = thread {
                self.save(thread_id, &schedule.snapshot(&state))
                    .await
                    .map_err(|e| RunError::new(e, state.clone()))?;
            }
        }

        if supersteps == 0 {
            if let Some(thread_id) = thread {
                self.save(thread_id, &schedule.snapshot(&state))
                    .await
                    .map_err(|e| RunError::new(e, state.clone()))?;
            }
        }

        log::info!("Run {} completed after {} superstep(s)", run_id, supersteps);
        Ok(RunOutcome {
            state,
            status: RunStatus::Completed,
            trace,
            supersteps,
        })
    }

    async fn run_task(
        &self,
        task: &PendingTask,
        snapshot: &WorkflowState,
        run_id: Uuid,
    ) -> Result<StepOutput, StepError> {
        let step = self
            .steps
            .get(&task.step)
            .ok_or_else(|| format!("step '{}' is not part of this graph", task.step))?;
        let input = match &task.payload {
            Some(payload) => WorkflowState::detached(self.schema.clone(), payload.clone()),
            None => snapshot.clone(),
        };
        let ctx = StepContext::new(
            self.client.clone(),
            self.tools.clone(),
            run_id,
            task.step.as_str(),
            task.branch,
        );
        match task.branch {
            Some(branch) => log::info!("Executing step {} (branch {})", task.step, branch),
            None => log::info!("Executing step {}", task.step),
        }
        step.run(input, ctx).await
    }

    /// Route a finished task's successors into the next frontier, holding
    /// branch successors at their parent's barrier
    fn advance(
        &self,
        task: &PendingTask,
        output: &StepOutput,
        invocation: u64,
        state: &WorkflowState,
        schedule: &mut Schedule,
    ) -> Result<(), GraphError> {
        let mut successors = self.successors(task, Some(output), invocation, state, schedule)?;
        successors.extend(self.complete_joins(&task.step, schedule));

        match task.branch {
            Some(BranchId { parent, index }) => match schedule.barriers.get_mut(&parent) {
                Some(barrier) => {
                    barrier.outstanding.remove(&index);
                    barrier.held.extend(successors);
                    if barrier.outstanding.is_empty() {
                        let held = schedule
                            .barriers
                            .remove(&parent)
                            .map(|b| b.held)
                            .unwrap_or_default();
                        log::debug!("Barrier {} released {} task(s)", parent, held.len());
                        push_tasks(&mut schedule.frontier, held);
                    }
                }
                None => push_tasks(&mut schedule.frontier, successors),
            },
            None => push_tasks(&mut schedule.frontier, successors),
        }
        Ok(())
    }

    /// Mark `step` done for every join it feeds; returns the join targets
    /// whose sources have now all completed
    fn complete_joins(&self, step: &str, schedule: &mut Schedule) -> Vec<PendingTask> {
        let mut ready = Vec::new();
        for join in self.joins.iter().filter(|j| j.sources.iter().any(|s| s == step)) {
            let done = schedule.joins.entry(join.target.clone()).or_default();
            done.insert(step.to_string());
            if join.sources.iter().all(|s| done.contains(s)) {
                schedule.joins.remove(&join.target);
                if join.target != END {
                    log::debug!("Join into {} complete", join.target);
                    ready.push(PendingTask::step(&join.target));
                }
            }
        }
        ready
    }

    /// Successor tasks of one invocation; `output` is `None` for START
    fn successors(
        &self,
        task: &PendingTask,
        output: Option<&StepOutput>,
        invocation: u64,
        state: &WorkflowState,
        schedule: &mut Schedule,
    ) -> Result<Vec<PendingTask>, GraphError> {
        if let Some(StepOutput::Decision { goto, .. }) = output {
            let declared = self
                .decision_targets
                .get(&task.step)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let check = |label: &str| -> Result<(), GraphError> {
                if declared.iter().any(|d| d == label) {
                    Ok(())
                } else {
                    Err(GraphError::UnknownLabel {
                        step: task.step.clone(),
                        label: label.to_string(),
                    })
                }
            };
            return match goto {
                Goto::End => {
                    check(END)?;
                    Ok(Vec::new())
                }
                Goto::Step(name) => {
                    check(name)?;
                    Ok(if name == END {
                        Vec::new()
                    } else {
                        vec![PendingTask::step(name)]
                    })
                }
                Goto::Dispatch(dispatches) => {
                    for d in dispatches {
                        check(&d.step)?;
                    }
                    self.spawn(invocation, dispatches.clone(), declared, state, schedule)
                }
            };
        }

        let Some(edge) = self.edges.get(&task.step) else {
            return Ok(Vec::new());
        };
        match edge.resolve(&task.step, state)? {
            NextSpec::Steps(steps) => Ok(steps.into_iter().map(PendingTask::step).collect()),
            NextSpec::Branches(dispatches) => {
                let targets = match edge {
                    Edge::FanOut(f) => f.targets.as_slice(),
                    _ => &[],
                };
                self.spawn(invocation, dispatches, targets, state, schedule)
            }
        }
    }

    /// Register branches under `parent`.
    ///
    /// With nothing to dispatch, every declared target counts as completed:
    /// its outgoing edge is resolved against `state` and the joins it feeds
    /// are advanced, so the merge point still fires.
    fn spawn(
        &self,
        parent: u64,
        dispatches: Vec<Dispatch>,
        targets: &[String],
        state: &WorkflowState,
        schedule: &mut Schedule,
    ) -> Result<Vec<PendingTask>, GraphError> {
        if dispatches.is_empty() {
            let mut merge_point = Vec::new();
            for target in targets.iter().filter(|t| *t != END) {
                if let Some(edge) = self.edges.get(target) {
                    let next = match edge.resolve(target, state)? {
                        NextSpec::Steps(steps) => steps.into_iter().map(PendingTask::step).collect(),
                        NextSpec::Branches(nested) => {
                            let nested_targets = match edge {
                                Edge::FanOut(f) => f.targets.as_slice(),
                                _ => &[],
                            };
                            let invocation = schedule.next_invocation();
                            self.spawn(invocation, nested, nested_targets, state, schedule)?
                        }
                    };
                    push_tasks(&mut merge_point, next);
                }
                let ready = self.complete_joins(target, schedule);
                push_tasks(&mut merge_point, ready);
            }
            log::info!(
                "Fan-out {} produced no branches; continuing at [{}]",
                parent,
                merge_point
                    .iter()
                    .map(|t| t.step.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(merge_point);
        }

        schedule.barriers.insert(
            parent,
            BarrierState {
                outstanding: (0..dispatches.len()).collect(),
                held: Vec::new(),
            },
        );
        log::info!("Fan-out {} dispatched {} branch(es)", parent, dispatches.len());
        Ok(dispatches
            .into_iter()
            .enumerate()
            .map(|(index, d)| PendingTask::branch(d.step, BranchId { parent, index }, d.payload))
            .collect())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        let Some(saver) = &self.checkpointer else {
            return Ok(None);
        };
        saver
            .get(thread_id)
            .await
            .map_err(|source| GraphError::CheckpointUnavailable {
                thread_id: thread_id.to_string(),
                source,
            })
    }

    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), GraphError> {
        let Some(saver) = &self.checkpointer else {
            return Ok(());
        };
        saver
            .put(thread_id, checkpoint)
            .await
            .map_err(|source| GraphError::CheckpointUnavailable {
                thread_id: thread_id.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::workflow::checkpoint::MemorySaver;
    use crate::weft::workflow::state::{FieldType, ReducerType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn append_schema() -> StateSchema {
        StateSchema::new()
            .accumulate("log", FieldType::Array, ReducerType::Append)
            .field("topic", FieldType::String)
    }

    fn logger(graph: &mut StateGraph, name: &'static str) {
        graph.add_fn(name, move |_, _| async move {
            Ok(StateUpdate::new().set("log", name).into())
        });
    }

    #[tokio::test]
    async fn test_linear_run() {
        let mut graph = StateGraph::new(append_schema());
        logger(&mut graph, "a");
        logger(&mut graph, "b");
        graph.add_edge(START, "a").add_edge("a", "b").add_edge("b", END);
        let graph = graph.compile().unwrap();

        let outcome = graph
            .invoke(StateUpdate::new().set("topic", "cats"), &RunConfig::default())
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.trace, vec!["a", "b"]);
        assert_eq!(outcome.supersteps, 2);
        assert_eq!(outcome.state.get("log"), Some(&json!(["a", "b"])));
        assert_eq!(outcome.state.get_str("topic"), Some("cats"));
    }

    #[tokio::test]
    async fn test_duplicate_successors_run_once() {
        let mut graph = StateGraph::new(append_schema());
        logger(&mut graph, "left");
        logger(&mut graph, "right");
        logger(&mut graph, "merge");
        graph
            .add_edge(START, "left")
            .add_edge(START, "right")
            .add_edge("left", "merge")
            .add_edge("right", "merge")
            .add_edge("merge", END);
        let graph = graph.compile().unwrap();

        let outcome = graph.invoke(StateUpdate::new(), &RunConfig::default()).await.unwrap();
        assert_eq!(outcome.trace, vec!["left", "right", "merge"]);
    }

    #[tokio::test]
    async fn test_step_failure_keeps_last_merged_state() {
        let mut graph = StateGraph::new(append_schema());
        logger(&mut graph, "ok");
        graph.add_fn("boom", |_, _| async { Err("model unavailable".into()) });
        graph.add_edge(START, "ok").add_edge("ok", "boom").add_edge("boom", END);
        let graph = graph.compile().unwrap();

        let err = graph.invoke(StateUpdate::new(), &RunConfig::default()).await.unwrap_err();
        assert!(matches!(err.kind, GraphError::StepFailure { ref step, .. } if step == "boom"));
        assert_eq!(err.state.get("log"), Some(&json!(["ok"])));
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_at_start() {
        let mut graph = StateGraph::new(append_schema());
        logger(&mut graph, "a");
        graph.add_edge(START, "a").add_edge("a", END);
        let graph = graph.compile().unwrap();

        let err = graph
            .invoke(StateUpdate::new().set("mood", "grumpy"), &RunConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err.kind, GraphError::SchemaViolation { ref step, .. } if step == START));
    }

    #[tokio::test]
    async fn test_decision_goto_must_be_declared() {
        let mut graph = StateGraph::new(append_schema());
        graph.add_fn("decide", |_, _| async {
            Ok(StepOutput::goto(StateUpdate::new(), "elsewhere"))
        });
        logger(&mut graph, "next");
        graph
            .add_edge(START, "decide")
            .add_decision_targets("decide", ["next", END])
            .add_edge("next", END);
        let graph = graph.compile().unwrap();

        let err = graph.invoke(StateUpdate::new(), &RunConfig::default()).await.unwrap_err();
        assert!(matches!(err.kind, GraphError::UnknownLabel { ref label, .. } if label == "elsewhere"));
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let mut graph = StateGraph::new(append_schema());
        logger(&mut graph, "spin");
        graph.add_edge(START, "spin");
        graph.add_conditional_edges("spin", |_| "again".to_string(), [("again", "spin"), ("stop", END)]);
        let graph = graph.compile().unwrap();

        let err = graph
            .invoke(StateUpdate::new(), &RunConfig::default().with_recursion_limit(5))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, GraphError::RecursionLimit { limit: 5 }));
        assert_eq!(err.state.get_array("log").len(), 5);
    }

    #[tokio::test]
    async fn test_join_waits_for_all_sources() {
        let mut graph = StateGraph::new(append_schema());
        logger(&mut graph, "fast");
        logger(&mut graph, "slow_1");
        logger(&mut graph, "slow_2");
        logger(&mut graph, "combine");
        graph
            .add_edge(START, "fast")
            .add_edge(START, "slow_1")
            .add_edge("slow_1", "slow_2")
            .add_join(["fast", "slow_2"], "combine")
            .add_edge("combine", END);
        let graph = graph.compile().unwrap();

        let outcome = graph.invoke(StateUpdate::new(), &RunConfig::default()).await.unwrap();
        assert_eq!(outcome.trace, vec!["fast", "slow_1", "slow_2", "combine"]);
        assert_eq!(outcome.visits("combine"), 1);
    }

    #[tokio::test]
    async fn test_interrupt_and_resume() {
        let calls = Arc::new(AtomicUsize::new(0));
        let saver = Arc::new(MemorySaver::new());
        let mut graph = StateGraph::new(append_schema()).with_checkpointer(saver.clone());
        logger(&mut graph, "draft");
        let counter = calls.clone();
        graph.add_fn("publish", move |_, _| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(StateUpdate::new().set("log", "publish").into())
            }
        });
        graph
            .add_edge(START, "draft")
            .add_edge("draft", "publish")
            .add_edge("publish", END)
            .interrupt_before(["publish"]);
        let graph = graph.compile().unwrap();
        let config = RunConfig::thread("t-1");

        let first = graph.invoke(StateUpdate::new(), &config).await.unwrap();
        assert_eq!(
            first.status,
            RunStatus::Interrupted {
                before: "publish".to_string()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(saver.get("t-1").await.unwrap().unwrap().is_interrupted());

        let second = graph.invoke(StateUpdate::new(), &config).await.unwrap();
        assert!(second.is_complete());
        assert_eq!(second.trace, vec!["publish"]);
        assert_eq!(second.state.get("log"), Some(&json!(["draft", "publish"])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
