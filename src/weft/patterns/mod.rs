// SPDX-License-Identifier: MIT

//! The tutorial workflows, built in Rust on top of the step graph engine.
//!
//! Every builder takes the client to inject into its steps; none of them
//! reaches for a global model.

pub mod augmented;
pub mod chaining;
pub mod evaluator;
pub mod orchestrator;
pub mod parallel;
pub mod research_scope;
pub mod routing;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::adk::client::LlmClient;
use crate::adk::error::WeftError;
use crate::weft::workflow::checkpoint::Checkpointer;
use crate::weft::workflow::graph::CompiledGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Augmented,
    Chaining,
    Routing,
    Parallel,
    Orchestrator,
    Evaluator,
    ResearchScope,
}

impl Pattern {
    pub const ALL: [Pattern; 7] = [
        Pattern::Augmented,
        Pattern::Chaining,
        Pattern::Routing,
        Pattern::Parallel,
        Pattern::Orchestrator,
        Pattern::Evaluator,
        Pattern::ResearchScope,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Augmented => "augmented",
            Pattern::Chaining => "chaining",
            Pattern::Routing => "routing",
            Pattern::Parallel => "parallel",
            Pattern::Orchestrator => "orchestrator",
            Pattern::Evaluator => "evaluator",
            Pattern::ResearchScope => "research_scope",
        }
    }

    /// Compile the pattern's graph. `augmented` has none.
    pub fn graph(
        &self,
        client: LlmClient,
        checkpointer: Option<Arc<dyn Checkpointer>>,
    ) -> Result<CompiledGraph, WeftError> {
        let graph = match self {
            Pattern::Augmented => {
                return Err(WeftError::config(
                    "the augmented pattern calls the client directly and has no graph",
                ))
            }
            Pattern::Chaining => chaining::graph(client)?,
            Pattern::Routing => routing::graph(client)?,
            Pattern::Parallel => parallel::graph(client)?,
            Pattern::Orchestrator => orchestrator::graph(client)?,
            Pattern::Evaluator => evaluator::graph(client)?,
            Pattern::ResearchScope => research_scope::graph(client, checkpointer)?,
        };
        Ok(graph)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Pattern::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| WeftError::UnknownPattern(s.to_string()))
    }
}
