// SPDX-License-Identifier: MIT

//! JSON-file checkpointer: one `<thread>.json` per thread in a directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{require_thread_id, Checkpoint, CheckpointError, Checkpointer};

pub struct FileSaver {
    dir: PathBuf,
}

impl FileSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Thread ids become file names. `[A-Za-z0-9-]` is kept and every other
    /// byte is written as `_xx`, so an id can never escape the directory and
    /// distinct ids never share a file
    fn path_for(&self, thread_id: &str) -> PathBuf {
        let mut safe = String::with_capacity(thread_id.len());
        for byte in thread_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(char::from(byte));
            } else {
                safe.push_str(&format!("_{:02x}", byte));
            }
        }
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl Checkpointer for FileSaver {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        require_thread_id(thread_id)?;
        let path = self.path_for(thread_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        require_thread_id(thread_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(thread_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(checkpoint)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::debug!("Checkpoint for thread {} written to {}", thread_id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FileSaver::new(dir.path().join("threads"));

        assert!(saver.get("thread-1").await.unwrap().is_none());

        let mut values = Map::new();
        values.insert("messages".to_string(), json!([{"role": "user"}]));
        let checkpoint = Checkpoint::new(values, 1);
        saver.put("thread-1", &checkpoint).await.unwrap();

        let loaded = saver.get("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[tokio::test]
    async fn test_thread_id_is_sanitised() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FileSaver::new(dir.path());

        saver
            .put("../escape", &Checkpoint::new(Map::new(), 0))
            .await
            .unwrap();
        assert!(dir.path().join("_2e_2e_2fescape.json").exists());
    }

    #[tokio::test]
    async fn test_similar_thread_ids_keep_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FileSaver::new(dir.path());

        let ids = ["user.1", "user_1", "user/1", "user1"];
        for (i, id) in ids.iter().enumerate() {
            let mut values = Map::new();
            values.insert("who".to_string(), json!(i));
            saver.put(id, &Checkpoint::new(values, 1)).await.unwrap();
        }

        for (i, id) in ids.iter().enumerate() {
            let loaded = saver.get(id).await.unwrap().unwrap();
            assert_eq!(loaded.values["who"], json!(i), "thread {}", id);
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), ids.len());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("t.json"), "{not json").unwrap();
        let saver = FileSaver::new(dir.path());

        assert!(matches!(
            saver.get("t").await,
            Err(CheckpointError::Serialization(_))
        ));
    }
}
