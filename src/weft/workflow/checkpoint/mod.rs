// SPDX-License-Identifier: MIT

//! Checkpoint port: persist and restore run state keyed by thread id
//!
//! The executor calls [`Checkpointer::get`] once when a run starts on a
//! thread and [`Checkpointer::put`] after every superstep merge. Two savers
//! ship with the crate: [`MemorySaver`] and [`FileSaver`].

mod file;
mod memory;

pub use file::FileSaver;
pub use memory::MemorySaver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Error type for checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("thread id must not be empty")]
    EmptyThreadId,
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
}

/// Identity of one fan-out branch: the invocation that dispatched it plus
/// the branch's position in the dispatch list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchId {
    pub parent: u64,
    pub index: usize,
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.parent, self.index)
    }
}

/// A step invocation scheduled for a future superstep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchId>,
    /// Branch-private input; `None` means the task reads the shared state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
}

impl PendingTask {
    pub fn step(name: impl Into<String>) -> Self {
        Self {
            step: name.into(),
            branch: None,
            payload: None,
        }
    }

    pub fn branch(name: impl Into<String>, id: BranchId, payload: Map<String, Value>) -> Self {
        Self {
            step: name.into(),
            branch: Some(id),
            payload: Some(payload),
        }
    }
}

/// Branches of one fan-out still outstanding, plus the successors they
/// produced so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarrierState {
    pub outstanding: BTreeSet<usize>,
    pub held: Vec<PendingTask>,
}

/// Latest snapshot of a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// State values after the last merge
    pub values: Map<String, Value>,
    /// Supersteps completed on this thread
    pub step: u64,
    /// Tasks still to run; empty once the run completed
    #[serde(default)]
    pub pending: Vec<PendingTask>,
    /// Open fan-out barriers keyed by parent invocation id
    #[serde(default)]
    pub barriers: BTreeMap<u64, BarrierState>,
    /// Join target -> sources completed since the target last fired
    #[serde(default)]
    pub joins: BTreeMap<String, BTreeSet<String>>,
    /// Invocation counter, so resumed runs keep branch ids unique
    #[serde(default)]
    pub invocations: u64,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(values: Map<String, Value>, step: u64) -> Self {
        Self {
            values,
            step,
            pending: Vec::new(),
            barriers: BTreeMap::new(),
            joins: BTreeMap::new(),
            invocations: 0,
            created_at: Utc::now(),
        }
    }

    /// Whether the run that wrote this checkpoint stopped before finishing,
    /// at an interrupt or on a failed step
    pub fn is_interrupted(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Saves and loads the latest checkpoint of a thread.
///
/// Injected with `StateGraph::with_checkpointer`; used by
/// `CompiledGraph::invoke` whenever `RunConfig::thread_id` is set.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Load the latest checkpoint for the thread, if any
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Replace the thread's checkpoint
    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}

pub(crate) fn require_thread_id(thread_id: &str) -> Result<(), CheckpointError> {
    if thread_id.trim().is_empty() {
        return Err(CheckpointError::EmptyThreadId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_error_display() {
        assert!(CheckpointError::EmptyThreadId.to_string().contains("thread id"));
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(CheckpointError::from(io).to_string().starts_with("storage"));
    }

    #[test]
    fn test_checkpoint_serde_keeps_pending_branches() {
        let mut payload = Map::new();
        payload.insert("section".to_string(), json!({"name": "Intro"}));
        let mut checkpoint = Checkpoint::new(Map::new(), 2);
        checkpoint.pending = vec![
            PendingTask::step("synthesizer"),
            PendingTask::branch("llm_call", BranchId { parent: 4, index: 1 }, payload),
        ];
        checkpoint.barriers.insert(
            4,
            BarrierState {
                outstanding: [1].into_iter().collect(),
                held: vec![PendingTask::step("synthesizer")],
            },
        );

        let text = serde_json::to_string(&checkpoint).unwrap();
        let back: Checkpoint = serde_json::from_str(&text).unwrap();
        assert_eq!(back, checkpoint);
        assert!(back.is_interrupted());
    }

    #[test]
    fn test_branch_id_display() {
        assert_eq!(BranchId { parent: 3, index: 0 }.to_string(), "3#0");
    }
}
