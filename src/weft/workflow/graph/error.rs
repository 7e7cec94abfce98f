// SPDX-License-Identifier: MIT

//! Graph build and run errors

use thiserror::Error;

use crate::weft::workflow::checkpoint::{BranchId, CheckpointError};
use crate::weft::workflow::state::{StateError, WorkflowState};

use super::step::StepError;

/// Structural problems found by `StateGraph::compile`
#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("step '{0}' is defined more than once")]
    DuplicateStep(String),

    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    #[error("step '{step}' has conflicting outgoing edges: {reason}")]
    ConflictingEdges { step: String, reason: String },

    #[error("graph has no entry: add an edge from START")]
    NoEntry,

    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    #[error("step '{0}' has no outgoing edge; route it to END explicitly")]
    DeadEnd(String),

    #[error("invalid state schema: {0}")]
    InvalidSchema(String),

    #[error("invalid loop guard: {0}")]
    InvalidLoopGuard(String),

    #[error("interrupt_before needs a checkpointer to resume from")]
    MissingCheckpointer,
}

/// Non-fatal findings reported by `compile`
#[derive(Debug, Clone, PartialEq)]
pub enum GraphWarning {
    /// The graph can loop and declares no `loop_guard`
    UnguardedCycle { steps: Vec<String> },
    /// No path from START reaches the step
    UnreachableStep(String),
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphWarning::UnguardedCycle { steps } => write!(
                f,
                "cycle through [{}] has no loop_guard; termination depends on step outputs",
                steps.join(", ")
            ),
            GraphWarning::UnreachableStep(step) => {
                write!(f, "step '{}' is not reachable from START", step)
            }
        }
    }
}

fn branch_suffix(branch: &Option<BranchId>) -> String {
    branch.map(|b| format!(" (branch {})", b)).unwrap_or_default()
}

/// Errors raised while compiling or running a graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("step '{step}'{} wrote an invalid update to '{field}': {reason}", branch_suffix(.branch))]
    SchemaViolation {
        step: String,
        branch: Option<BranchId>,
        field: String,
        #[source]
        reason: StateError,
    },

    #[error("step '{step}' chose '{label}', which is not a declared destination")]
    UnknownLabel { step: String, label: String },

    #[error("no path from START reaches END")]
    UnreachableTerminal,

    #[error("step '{step}'{} failed: {source}", branch_suffix(.branch))]
    StepFailure {
        step: String,
        branch: Option<BranchId>,
        #[source]
        source: StepError,
    },

    #[error("checkpoint for thread '{thread_id}' unavailable: {source}")]
    CheckpointUnavailable {
        thread_id: String,
        #[source]
        source: CheckpointError,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("recursion limit of {limit} supersteps reached")]
    RecursionLimit { limit: usize },
}

impl GraphError {
    pub(crate) fn schema(step: &str, branch: Option<BranchId>, reason: StateError) -> Self {
        GraphError::SchemaViolation {
            step: step.to_string(),
            branch,
            field: reason.field().to_string(),
            reason,
        }
    }
}

/// A failed run: the error plus the state as of the last successful merge
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct RunError {
    pub kind: GraphError,
    pub state: WorkflowState,
}

impl RunError {
    pub fn new(kind: GraphError, state: WorkflowState) -> Self {
        Self { kind, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_names_step_branch_and_field() {
        let err = GraphError::schema(
            "llm_call",
            Some(BranchId { parent: 2, index: 1 }),
            StateError::UndeclaredField {
                field: "mood".to_string(),
            },
        );
        let text = err.to_string();
        assert!(text.contains("'llm_call'"), "{}", text);
        assert!(text.contains("branch 2#1"), "{}", text);
        assert!(text.contains("'mood'"), "{}", text);
    }

    #[test]
    fn test_step_failure_display_without_branch() {
        let err = GraphError::StepFailure {
            step: "write".to_string(),
            branch: None,
            source: "model unavailable".into(),
        };
        assert_eq!(err.to_string(), "step 'write' failed: model unavailable");
    }

    #[test]
    fn test_compile_error_is_transparent() {
        let err: GraphError = CompileError::UnknownStep("x".to_string()).into();
        assert_eq!(err.to_string(), "unknown step 'x'");
    }
}
