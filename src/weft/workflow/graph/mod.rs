// SPDX-License-Identifier: MIT

//! Step graph engine
//!
//! Build a [`StateGraph`] of named steps over a shared [`WorkflowState`],
//! compile it, then `invoke` the resulting [`CompiledGraph`].
//!
//! [`WorkflowState`]: crate::weft::workflow::state::WorkflowState

mod compile;
mod edge;
mod error;
mod executor;
mod mermaid;
mod state_graph;
mod step;

pub use edge::{ConditionalEdge, Edge, FanOutEdge, JoinEdge, NextSpec, Router};
pub use error::{CompileError, GraphError, GraphWarning, RunError};
pub use executor::{CompiledGraph, RunConfig, RunOutcome, RunStatus};
pub use state_graph::{route_on_field, LoopGuard, StateGraph};
pub use step::{Dispatch, FnStep, Goto, Step, StepContext, StepError, StepOutput};

/// Entry sentinel: `add_edge(START, first_step)`
pub const START: &str = "__start__";

/// Exit sentinel: `add_edge(last_step, END)`
pub const END: &str = "__end__";
