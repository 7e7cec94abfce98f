// SPDX-License-Identifier: MIT

//! Steps: the named units of work a graph runs

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::error::Error;
use std::future::Future;
use uuid::Uuid;

use crate::adk::client::LlmClient;
use crate::adk::registry::ToolRegistry;
use crate::weft::workflow::checkpoint::BranchId;
use crate::weft::workflow::state::{StateUpdate, WorkflowState};

/// Error a step reports; wrapped into `GraphError::StepFailure` by the executor
pub type StepError = Box<dyn Error + Send + Sync>;

/// One branch to spawn: the step to run and its private input
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub step: String,
    pub payload: Map<String, Value>,
}

impl Dispatch {
    pub fn new(step: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            step: step.into(),
            payload,
        }
    }

    /// Payload holding a single field
    pub fn with(step: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        let mut payload = Map::new();
        payload.insert(key.into(), value);
        Self::new(step, payload)
    }
}

/// Where a deciding step sends control
#[derive(Debug, Clone, PartialEq)]
pub enum Goto {
    Step(String),
    End,
    Dispatch(Vec<Dispatch>),
}

/// What a step returns
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// A partial state update; edges decide what runs next
    Update(StateUpdate),
    /// An update plus the step's own choice of successor
    Decision { update: StateUpdate, goto: Goto },
}

impl StepOutput {
    pub fn update(&self) -> &StateUpdate {
        match self {
            StepOutput::Update(update) | StepOutput::Decision { update, .. } => update,
        }
    }

    pub fn goto(update: StateUpdate, step: impl Into<String>) -> Self {
        StepOutput::Decision {
            update,
            goto: Goto::Step(step.into()),
        }
    }

    pub fn end(update: StateUpdate) -> Self {
        StepOutput::Decision {
            update,
            goto: Goto::End,
        }
    }
}

impl From<StateUpdate> for StepOutput {
    fn from(update: StateUpdate) -> Self {
        StepOutput::Update(update)
    }
}

/// Dependencies handed to every step invocation
#[derive(Clone)]
pub struct StepContext {
    client: Option<LlmClient>,
    tools: ToolRegistry,
    run_id: Uuid,
    step: String,
    branch: Option<BranchId>,
}

impl StepContext {
    pub fn new(
        client: Option<LlmClient>,
        tools: ToolRegistry,
        run_id: Uuid,
        step: impl Into<String>,
        branch: Option<BranchId>,
    ) -> Self {
        Self {
            client,
            tools,
            run_id,
            step: step.into(),
            branch,
        }
    }

    /// The injected LLM client; an error if the graph was built without one
    pub fn client(&self) -> Result<&LlmClient, StepError> {
        self.client
            .as_ref()
            .ok_or_else(|| format!("step '{}' needs an LLM client but none was configured", self.step).into())
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn branch(&self) -> Option<BranchId> {
        self.branch
    }
}

/// A unit of work over the state.
///
/// Steps may have side effects. The executor never retries, so a step that
/// wraps an unreliable call must itself be safe to invoke again.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError>;
}

/// Adapts an async closure into a [`Step`]
pub struct FnStep<F> {
    func: F,
}

impl<F> FnStep<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(WorkflowState, StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepOutput, StepError>> + Send,
{
    async fn run(&self, state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
        (self.func)(state, ctx).await
    }
}
