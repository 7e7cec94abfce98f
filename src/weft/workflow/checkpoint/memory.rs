// SPDX-License-Identifier: MIT

//! In-memory checkpointer

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{require_thread_id, Checkpoint, CheckpointError, Checkpointer};

/// Keeps the latest checkpoint per thread for the life of the process
#[derive(Default)]
pub struct MemorySaver {
    threads: RwLock<HashMap<String, Checkpoint>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn threads(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.threads.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        require_thread_id(thread_id)?;
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        require_thread_id(thread_id)?;
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), checkpoint.clone());
        Ok(())
    }
}
