// SPDX-License-Identifier: MIT

//! Graph builder: steps, edges and run-time collaborators
//!
//! Add steps with `add_step`, wire them with `add_edge(from, to)` using
//! [`START`] and [`END`] for entry and exit, then `compile`. A source has
//! either direct edges, one conditional edge, one fan-out, or declared
//! decision targets. Join edges come on top of any of those.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use crate::adk::client::LlmClient;
use crate::adk::registry::ToolRegistry;
use crate::weft::workflow::checkpoint::Checkpointer;
use crate::weft::workflow::state::{StateSchema, WorkflowState};

use super::compile;
use super::edge::{ConditionalEdge, FanOutEdge, JoinEdge};
use super::error::GraphError;
use super::executor::CompiledGraph;
use super::step::{Dispatch, FnStep, Step, StepContext, StepError, StepOutput};
use super::{END, START};

/// Declares that a cycle is bounded by a numeric state field
#[derive(Debug, Clone, PartialEq)]
pub struct LoopGuard {
    pub counter: String,
    pub bound: u64,
}

pub struct StateGraph {
    pub(super) schema: Arc<StateSchema>,
    pub(super) steps: BTreeMap<String, Arc<dyn Step>>,
    /// Insertion order, for stable rendering
    pub(super) order: Vec<String>,
    pub(super) duplicates: Vec<String>,
    pub(super) reserved: Vec<String>,
    pub(super) direct: BTreeMap<String, Vec<String>>,
    pub(super) conditional: Vec<(String, ConditionalEdge)>,
    pub(super) fan_outs: Vec<(String, FanOutEdge)>,
    pub(super) joins: Vec<JoinEdge>,
    pub(super) decision_targets: BTreeMap<String, Vec<String>>,
    pub(super) loop_guard: Option<LoopGuard>,
    pub(super) checkpointer: Option<Arc<dyn Checkpointer>>,
    pub(super) interrupt_before: BTreeSet<String>,
    pub(super) client: Option<LlmClient>,
    pub(super) tools: ToolRegistry,
}

impl StateGraph {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            steps: BTreeMap::new(),
            order: Vec::new(),
            duplicates: Vec::new(),
            reserved: Vec::new(),
            direct: BTreeMap::new(),
            conditional: Vec::new(),
            fan_outs: Vec::new(),
            joins: Vec::new(),
            decision_targets: BTreeMap::new(),
            loop_guard: None,
            checkpointer: None,
            interrupt_before: BTreeSet::new(),
            client: None,
            tools: ToolRegistry::new(),
        }
    }

    /// Client handed to every step through its context
    pub fn with_client(mut self, client: LlmClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Adds a step; names must be unique and not START or END
    pub fn add_step(&mut self, name: &str, step: impl Step + 'static) -> &mut Self {
        if name == START || name == END {
            self.reserved.push(name.to_string());
            return self;
        }
        if self.steps.insert(name.to_string(), Arc::new(step)).is_some() {
            self.duplicates.push(name.to_string());
        } else {
            self.order.push(name.to_string());
        }
        self
    }

    /// Adds a step from an async closure
    pub fn add_fn<F, Fut>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(WorkflowState, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput, StepError>> + Send + 'static,
    {
        self.add_step(name, FnStep::new(func))
    }

    /// Unconditional edge; several edges from one source all fire
    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.direct
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self
    }

    /// Route from `from` by calling `router` on the state and looking its
    /// label up in `path_map`
    pub fn add_conditional_edges<R, I, K, V>(&mut self, from: &str, router: R, path_map: I) -> &mut Self
    where
        R: Fn(&WorkflowState) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.conditional.push((
            from.to_string(),
            ConditionalEdge {
                router: Arc::new(router),
                path_map: path_map
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            },
        ));
        self
    }

    /// Spawn one isolated branch per [`Dispatch`] the generator returns;
    /// each dispatch must name one of `targets`
    pub fn add_fan_out<G, I, S>(&mut self, from: &str, targets: I, generator: G) -> &mut Self
    where
        G: Fn(&WorkflowState) -> Vec<Dispatch> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fan_outs.push((
            from.to_string(),
            FanOutEdge {
                generator: Arc::new(generator),
                targets: targets.into_iter().map(Into::into).collect(),
            },
        ));
        self
    }

    /// `target` runs once every source has completed since it last ran
    pub fn add_join<I, S>(&mut self, sources: I, target: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joins.push(JoinEdge {
            sources: sources.into_iter().map(Into::into).collect(),
            target: target.to_string(),
        });
        self
    }

    /// Destinations a step may name in a `StepOutput::Decision`
    pub fn add_decision_targets<I, S>(&mut self, step: &str, targets: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.decision_targets
            .entry(step.to_string())
            .or_default()
            .extend(targets.into_iter().map(Into::into));
        self
    }

    /// Mark the graph's cycles as bounded by `counter` reaching `bound`
    pub fn loop_guard(&mut self, counter: &str, bound: u64) -> &mut Self {
        self.loop_guard = Some(LoopGuard {
            counter: counter.to_string(),
            bound,
        });
        self
    }

    /// Halt before any of `steps` runs; the next invoke on the thread resumes
    pub fn interrupt_before<I, S>(&mut self, steps: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt_before
            .extend(steps.into_iter().map(Into::into));
        self
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// Validate the structure and freeze the graph
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let (edges, warnings) = compile::validate(&self)?;
        for warning in &warnings {
            log::warn!("{}", warning);
        }
        Ok(CompiledGraph::new(self, edges, warnings))
    }
}

/// Shorthand for a router that reads a string field as the label
pub fn route_on_field(field: &str) -> impl Fn(&WorkflowState) -> String + Send + Sync + 'static {
    let field = field.to_string();
    move |state: &WorkflowState| match state.get(&field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
